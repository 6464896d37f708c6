//! Include resolution.
//!
//! Code blocks may pull shader fragments in with `#include "name"`. Fragments are fetched from an
//! `IncludeProvider`, which is whatever the embedding application wants it to be (a virtual file
//! system, a directory on disk, the built-in shader library…). Expansion is recursive; the
//! resulting text comes with a `SourceMap` to trace every byte back to its file.

use log::debug;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::iter::FromIterator;
use std::ops::Range;

use crate::lexer::{tokenize, LexError, LexErrorKind, Location, Token, TokenKind};
use crate::source::{Origin, SourceMap};
use crate::syntax::CodeBlock;

/// Class of include content providers.
///
/// Providers are shared by all the compilations that might run at the same time, hence the
/// `Send + Sync` requirement. Fragments are never modified once served.
pub trait IncludeProvider: Send + Sync {
  /// Get the content of the fragment called `path`, if any.
  fn resolve(&self, path: &str) -> Option<Cow<'_, str>>;
}

/// In-memory provider.
#[derive(Clone, Debug, Default)]
pub struct MapProvider {
  fragments: HashMap<String, String>
}

impl MapProvider {
  pub fn new() -> Self {
    MapProvider::default()
  }

  pub fn insert<P, T>(&mut self, path: P, text: T) where P: Into<String>, T: Into<String> {
    self.fragments.insert(path.into(), text.into());
  }

  pub fn with<P, T>(mut self, path: P, text: T) -> Self where P: Into<String>, T: Into<String> {
    self.insert(path, text);
    self
  }
}

impl<P, T> FromIterator<(P, T)> for MapProvider where P: Into<String>, T: Into<String> {
  fn from_iter<I>(iter: I) -> Self where I: IntoIterator<Item = (P, T)> {
    MapProvider {
      fragments: iter.into_iter().map(|(p, t)| (p.into(), t.into())).collect()
    }
  }
}

impl IncludeProvider for MapProvider {
  fn resolve(&self, path: &str) -> Option<Cow<'_, str>> {
    self.fragments.get(path).map(|text| Cow::Borrowed(text.as_str()))
  }
}

mod packed {
  include!(concat!(env!("OUT_DIR"), "/shaderlib.rs"));
}

/// Built-in shader library.
///
/// The fragments living in the `shaderlib` directory of this crate, packed at build time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Builtins;

impl Builtins {
  /// Names of all the built-in fragments.
  pub fn names() -> impl Iterator<Item = &'static str> {
    packed::shaderlib().iter().map(|&(name, _)| name)
  }
}

impl IncludeProvider for Builtins {
  fn resolve(&self, path: &str) -> Option<Cow<'_, str>> {
    packed::shaderlib().iter().find(|&&(name, _)| name == path).map(|&(_, text)| Cow::Borrowed(text))
  }
}

/// Try a first provider, then fall back to a second one.
#[derive(Clone, Debug, Default)]
pub struct Chain<A, B>(pub A, pub B);

impl<A, B> IncludeProvider for Chain<A, B> where A: IncludeProvider, B: IncludeProvider {
  fn resolve(&self, path: &str) -> Option<Cow<'_, str>> {
    self.0.resolve(path).or_else(|| self.1.resolve(path))
  }
}

/// Error that might occur while expanding includes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IncludeError {
  /// The provider doesn’t know the fragment.
  NotFound { path: String, origin: Origin },
  /// A fragment includes itself, directly or not. The chain goes from the code block’s file to the
  /// fragment closing the cycle.
  Circular { chain: Vec<String> },
  /// Includes are nested too deeply.
  TooDeep { path: String, limit: usize, origin: Origin },
  /// An included fragment is lexically ill-formed.
  Lex { kind: LexErrorKind, origin: Origin }
}

impl fmt::Display for IncludeError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      IncludeError::NotFound { ref path, ref origin } =>
        write!(f, "{}: cannot find include \"{}\"", origin, path),

      IncludeError::Circular { ref chain } =>
        write!(f, "circular include: {}", chain.join(" -> ")),

      IncludeError::TooDeep { ref path, limit, ref origin } =>
        write!(f, "{}: including \"{}\" exceeds the maximum include depth ({})", origin, path, limit),

      IncludeError::Lex { ref kind, ref origin } =>
        write!(f, "{}: {}", origin, kind)
    }
  }
}

impl Error for IncludeError {}

/// An `#include "path"` directive.
///
/// `span` covers the directive from its `#` to its closing quote, relative to the code it was
/// found in. `location` is where it is in its file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IncludeDirective {
  pub path: String,
  pub location: Location,
  pub span: Range<usize>
}

/// Find the include directives of a piece of code.
///
/// A directive is a `#`, the word `include` and a string, all on the same line. Directives in
/// comments are ignored.
pub fn scan_directives(text: &str) -> Result<Vec<IncludeDirective>, LexError> {
  Ok(directives(&tokenize(text)?, 0))
}

/// Find the include directives of an already lexed piece of code.
///
/// Spans are made relative to `base`, the byte offset of the beginning of the code.
pub fn directives(tokens: &[Token], base: usize) -> Vec<IncludeDirective> {
  tokens.windows(3).filter_map(|w| {
    let (hash, word, path) = (&w[0], &w[1], &w[2]);
    let same_line = hash.location.line == word.location.line && word.location.line == path.location.line;

    if hash.is_punct('#') && word.is_identifier("include") && path.kind == TokenKind::String && same_line {
      Some(IncludeDirective {
        path: path.lexeme.clone(),
        location: hash.location,
        span: hash.location.offset - base..path.end - base
      })
    } else {
      None
    }
  }).collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IncludeOptions {
  /// Maximum number of nested includes.
  pub max_depth: usize,
  /// Expand a given fragment only once per code block.
  pub include_once: bool
}

impl Default for IncludeOptions {
  fn default() -> Self {
    IncludeOptions {
      max_depth: 32,
      include_once: true
    }
  }
}

/// A code block with all its includes expanded.
#[derive(Clone, Debug)]
pub struct Expanded {
  pub text: String,
  pub map: SourceMap,
  /// Fragments inlined, in inclusion order.
  pub included: Vec<String>
}

impl Expanded {
  /// Locate a byte of the expanded text in its original file.
  pub fn origin(&self, offset: usize) -> Origin {
    self.map.locate(offset).unwrap_or_else(|| self.map.origin_in(0, 0))
  }
}

struct Expander<'a> {
  provider: &'a dyn IncludeProvider,
  options: &'a IncludeOptions,
  stack: Vec<String>,
  inlined: HashSet<String>,
  included: Vec<String>,
  out: String,
  map: SourceMap
}

impl<'a> Expander<'a> {
  fn copy(&mut self, file: usize, text: &str, range: Range<usize>) {
    if !range.is_empty() {
      self.map.push_segment(self.out.len(), file, range.start);
      self.out.push_str(&text[range]);
    }
  }

  fn expand(&mut self, file: usize, text: &str) -> Result<(), IncludeError> {
    let directives = scan_directives(text).map_err(|e| {
      IncludeError::Lex { kind: e.kind, origin: self.map.origin_in(file, e.location.offset) }
    })?;
    let mut cursor = 0;

    for directive in directives {
      self.copy(file, text, cursor..directive.span.start);
      cursor = directive.span.end;

      let path = directive.path;

      if self.stack.contains(&path) {
        let mut chain = self.stack.clone();
        chain.push(path);
        return Err(IncludeError::Circular { chain });
      }

      if self.options.include_once && self.inlined.contains(&path) {
        debug!("\"{}\" already included in {}; skipping", path, self.stack[0]);
        continue;
      }

      if self.stack.len() > self.options.max_depth {
        let origin = self.map.origin_in(file, directive.span.start);
        return Err(IncludeError::TooDeep { path, limit: self.options.max_depth, origin });
      }

      let content = match self.provider.resolve(&path) {
        Some(content) => content.into_owned(),
        None => {
          let origin = self.map.origin_in(file, directive.span.start);
          return Err(IncludeError::NotFound { path, origin });
        }
      };

      let included = self.map.add_file(path.clone(), content.as_str(), Location::start());

      self.stack.push(path.clone());
      self.inlined.insert(path.clone());
      self.included.push(path);

      self.expand(included, &content)?;

      self.stack.pop();
    }

    self.copy(file, text, cursor..text.len());

    Ok(())
  }
}

/// Expand the includes of a code block.
///
/// `file` is the name of the file the code block lives in; it’s used to report locations and to
/// detect fragments including it back.
pub fn resolve(
  block: &CodeBlock,
  file: &str,
  provider: &dyn IncludeProvider,
  options: &IncludeOptions
) -> Result<Expanded, IncludeError> {
  let mut expander = Expander {
    provider,
    options,
    stack: vec![file.to_owned()],
    inlined: HashSet::new(),
    included: Vec::new(),
    out: String::with_capacity(block.raw_text.len()),
    map: SourceMap::new()
  };

  let root = expander.map.add_file(file, block.raw_text.as_str(), block.location);
  expander.expand(root, &block.raw_text)?;

  Ok(Expanded {
    text: expander.out,
    map: expander.map,
    included: expander.included
  })
}
