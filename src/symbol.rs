//! Symbol context.
//!
//! The global `attribute`, `varying` and `uniform` declarations of a pass’ code blocks are pulled
//! out of the code and gathered in a per-pass table. The code generators synthesize them back in
//! the syntax of their target, only for the stages that actually reference them.
//!
//! Declarations under a preprocessor conditional (`#if`, `#ifdef`, `#ifndef`) are left where they
//! are, as hoisting them would drop the condition.

use log::debug;
use serde_derive::Serialize;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::ops::Range;

use crate::include::Expanded;
use crate::lexer::{tokenize, LexErrorKind, Token, TokenKind};
use crate::source::Origin;
use crate::syntax::ShaderStage;

/// GLSL types a declaration can be hoisted with. User-defined types are not, as their definition
/// lives in the code.
const BUILTIN_TYPES: &[&str] = &[
  "float", "int", "uint", "bool",
  "vec2", "vec3", "vec4", "ivec2", "ivec3", "ivec4", "uvec2", "uvec3", "uvec4", "bvec2", "bvec3", "bvec4",
  "mat2", "mat3", "mat4", "mat2x2", "mat2x3", "mat2x4", "mat3x2", "mat3x3", "mat3x4", "mat4x2", "mat4x3",
  "mat4x4",
  "sampler2D", "sampler3D", "samplerCube", "sampler2DArray", "sampler2DShadow", "samplerCubeShadow",
  "sampler2DArrayShadow", "isampler2D", "isampler3D", "isamplerCube", "isampler2DArray", "usampler2D",
  "usampler3D", "usamplerCube", "usampler2DArray"
];

const PRECISIONS: &[&str] = &["lowp", "mediump", "highp"];

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
  Attribute,
  Varying,
  Uniform
}

impl UsageKind {
  fn from_storage(word: &str) -> Option<Self> {
    match word {
      "attribute" => Some(UsageKind::Attribute),
      "varying" => Some(UsageKind::Varying),
      "uniform" => Some(UsageKind::Uniform),
      _ => None
    }
  }
}

impl fmt::Display for UsageKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      UsageKind::Attribute => f.write_str("attribute"),
      UsageKind::Varying => f.write_str("varying"),
      UsageKind::Uniform => f.write_str("uniform")
    }
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SymbolEntry {
  pub name: String,
  pub declared_type: String,
  pub precision: Option<String>,
  /// Array size, as written between the brackets.
  pub array_size: Option<String>,
  pub usage: UsageKind,
  /// First declaration of the symbol.
  pub first_reference: Origin,
  /// Whether the vertex code uses the symbol.
  pub in_vertex: bool,
  /// Whether the fragment code uses the symbol.
  pub in_fragment: bool,
  /// Whether the vertex code keeps its own declaration of the symbol, under a conditional.
  pub kept_in_vertex: bool,
  pub kept_in_fragment: bool
}

impl SymbolEntry {
  pub fn is_referenced_in(&self, stage: ShaderStage) -> bool {
    match stage {
      ShaderStage::Vertex => self.in_vertex,
      ShaderStage::Fragment => self.in_fragment
    }
  }

  pub fn is_referenced(&self) -> bool {
    self.in_vertex || self.in_fragment
  }

  /// Whether the code of `stage` declares the symbol itself, so that it must not be declared again.
  pub fn is_kept_in(&self, stage: ShaderStage) -> bool {
    match stage {
      ShaderStage::Vertex => self.kept_in_vertex,
      ShaderStage::Fragment => self.kept_in_fragment
    }
  }

  // Type with its array suffix, for diagnostics.
  fn full_type(&self) -> String {
    match self.array_size {
      Some(ref size) => format!("{}[{}]", self.declared_type, size),
      None => self.declared_type.clone()
    }
  }
}

/// Error that might occur while collecting the symbols of a pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SymbolError {
  /// The same name is declared with two different usage kinds.
  Conflict { name: String, first: UsageKind, second: UsageKind, origin: Origin },
  /// The same name is declared twice with different types.
  TypeMismatch { name: String, first: String, second: String, origin: Origin },
  Lex { kind: LexErrorKind, origin: Origin }
}

impl fmt::Display for SymbolError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      SymbolError::Conflict { ref name, first, second, ref origin } =>
        write!(f, "{}: `{}` is declared as {} and as {}", origin, name, first, second),

      SymbolError::TypeMismatch { ref name, ref first, ref second, ref origin } =>
        write!(f, "{}: `{}` is declared with type {} and {}", origin, name, first, second),

      SymbolError::Lex { ref kind, ref origin } =>
        write!(f, "{}: {}", origin, kind)
    }
  }
}

impl Error for SymbolError {}

/// Symbols of a pass, in first-declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolContext {
  entries: Vec<SymbolEntry>
}

impl SymbolContext {
  pub fn entries(&self) -> &[SymbolEntry] {
    &self.entries
  }

  pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
    self.entries.iter().find(|e| e.name == name)
  }

  pub fn of_kind(&self, usage: UsageKind) -> impl Iterator<Item = &SymbolEntry> {
    self.entries.iter().filter(move |e| e.usage == usage)
  }
}

/// Symbols of a pass along with its code, declarations removed.
#[derive(Clone, Debug)]
pub struct PassSymbols {
  pub context: SymbolContext,
  pub vertex_body: String,
  pub fragment_body: String,
  /// Whether the fragment code writes `gl_FragData` instead of `gl_FragColor`.
  pub writes_frag_data: bool
}

// One name of a declaration statement.
struct Declaration {
  name: String,
  declared_type: String,
  precision: Option<String>,
  array_size: Option<String>,
  usage: UsageKind,
  origin: Origin
}

struct StageScan {
  declarations: Vec<Declaration>,
  references: HashSet<String>,
  // Names declared under a conditional and left in the body.
  kept: HashSet<String>,
  body: String
}

// A whole declaration statement; `next` is the index of the token following its `;`.
struct Statement {
  precision: Option<String>,
  declared_type: String,
  names: Vec<(Token, Option<String>)>,
  next: usize
}

// Match `storage [precision] type name[[size]] (, name[[size]])* ;` starting at `start`.
fn match_declaration(tokens: &[Token], start: usize, usage: UsageKind) -> Option<Statement> {
  let mut j = start + 1;

  let precision = match tokens.get(j) {
    Some(t) if t.kind == TokenKind::Identifier && PRECISIONS.contains(&t.lexeme.as_str()) => {
      j += 1;
      Some(t.lexeme.clone())
    }
    _ => None
  };

  let ty = tokens.get(j)?;

  if ty.kind != TokenKind::Identifier {
    return None;
  }

  if !BUILTIN_TYPES.contains(&ty.lexeme.as_str()) {
    debug!("{} of type {} left in place", usage, ty.lexeme);
    return None;
  }

  j += 1;

  let mut names = Vec::new();

  loop {
    let name = tokens.get(j).filter(|t| t.kind == TokenKind::Identifier)?;
    j += 1;

    let mut array_size = None;

    if tokens.get(j)?.is_punct('[') {
      let size = tokens.get(j + 1).filter(|t| t.kind == TokenKind::Number || t.kind == TokenKind::Identifier)?;

      if !tokens.get(j + 2)?.is_punct(']') {
        return None;
      }

      array_size = Some(size.lexeme.clone());
      j += 3;
    }

    names.push((name.clone(), array_size));

    let sep = tokens.get(j)?;
    j += 1;

    if sep.is_punct(';') {
      return Some(Statement { precision, declared_type: ty.lexeme.clone(), names, next: j });
    } else if !sep.is_punct(',') {
      return None;
    }
  }
}

// Skip a preprocessor directive, recording its identifiers as references. A trailing `\`
// carries the directive over to the next line. Returns the directive name and the index of the
// token following the directive.
fn skip_directive(tokens: &[Token], mut i: usize, references: &mut HashSet<String>) -> (Option<String>, usize) {
  let mut line = tokens[i].location.line;
  let name = tokens
    .get(i + 1)
    .filter(|t| t.kind == TokenKind::Identifier && t.location.line == line)
    .map(|t| t.lexeme.clone());

  while i < tokens.len() && !tokens[i].is_eof() && tokens[i].location.line == line {
    if tokens[i].kind == TokenKind::Identifier {
      references.insert(tokens[i].lexeme.clone());
    } else if tokens[i].is_punct('\\') {
      if let Some(next) = tokens.get(i + 1).filter(|t| !t.is_eof() && t.location.line > line) {
        line = next.location.line;
      }
    }

    i += 1;
  }

  (name, i)
}

fn scan_stage(code: &Expanded) -> Result<StageScan, SymbolError> {
  let tokens = tokenize(&code.text).map_err(|e| {
    SymbolError::Lex { kind: e.kind, origin: code.origin(e.location.offset) }
  })?;

  let mut declarations = Vec::new();
  let mut references = HashSet::new();
  let mut kept = HashSet::new();
  let mut stripped: Vec<Range<usize>> = Vec::new();
  let mut depth = 0usize;
  let mut conditional = 0usize;
  let mut statement_start = true;
  let mut i = 0;

  while i < tokens.len() {
    let token = &tokens[i];

    if token.is_punct('#') {
      let (directive, next) = skip_directive(&tokens, i, &mut references);

      match directive.as_deref() {
        Some("if") | Some("ifdef") | Some("ifndef") => conditional += 1,
        Some("endif") => conditional = conditional.saturating_sub(1),
        _ => ()
      }

      i = next;
      continue;
    }

    if depth == 0 && statement_start && token.kind == TokenKind::Identifier {
      let matched = UsageKind::from_storage(&token.lexeme)
        .and_then(|usage| match_declaration(&tokens, i, usage).map(|m| (usage, m)));

      if let Some((_, statement)) = matched.as_ref().filter(|_| conditional > 0) {
        for (name, _) in &statement.names {
          debug!("{} declared under a conditional, left in place", name.lexeme);
          references.insert(name.lexeme.clone());
          kept.insert(name.lexeme.clone());
        }

        i = statement.next;
        continue;
      }

      if let Some((usage, statement)) = matched {
        stripped.push(token.location.offset..tokens[statement.next - 1].end);

        for (name, array_size) in statement.names {
          declarations.push(Declaration {
            origin: code.origin(name.location.offset),
            name: name.lexeme,
            declared_type: statement.declared_type.clone(),
            precision: statement.precision.clone(),
            array_size,
            usage
          });
        }

        i = statement.next;
        continue;
      }
    }

    match token.kind {
      TokenKind::Identifier => {
        references.insert(token.lexeme.clone());
      }

      TokenKind::Punctuation if token.is_punct('{') => depth += 1,
      TokenKind::Punctuation if token.is_punct('}') => depth = depth.saturating_sub(1),
      _ => ()
    }

    statement_start = token.is_punct(';') || token.is_punct('{') || token.is_punct('}');
    i += 1;
  }

  let mut body = String::with_capacity(code.text.len());
  let mut cursor = 0;

  for range in stripped {
    body.push_str(&code.text[cursor..range.start]);
    cursor = range.end;
  }

  body.push_str(&code.text[cursor..]);

  Ok(StageScan { declarations, references, kept, body })
}

/// Collect the symbols of a pass out of its expanded vertex and fragment code.
///
/// Vertex declarations come first, then fragment ones. Declaring a symbol several times with the
/// same usage and type is fine; anything else is an error.
pub fn collect(vertex: &Expanded, fragment: &Expanded) -> Result<PassSymbols, SymbolError> {
  let vertex_scan = scan_stage(vertex)?;
  let fragment_scan = scan_stage(fragment)?;

  let mut entries: Vec<SymbolEntry> = Vec::new();
  let mut index: HashMap<String, usize> = HashMap::new();

  for decl in vertex_scan.declarations.into_iter().chain(fragment_scan.declarations) {
    if let Some(&i) = index.get(&decl.name) {
      let entry = &entries[i];

      if entry.usage != decl.usage {
        return Err(SymbolError::Conflict {
          name: decl.name,
          first: entry.usage,
          second: decl.usage,
          origin: decl.origin
        });
      }

      if entry.declared_type != decl.declared_type || entry.array_size != decl.array_size {
        let second = match decl.array_size {
          Some(ref size) => format!("{}[{}]", decl.declared_type, size),
          None => decl.declared_type.clone()
        };

        return Err(SymbolError::TypeMismatch {
          name: decl.name,
          first: entry.full_type(),
          second,
          origin: decl.origin
        });
      }

      continue;
    }

    index.insert(decl.name.clone(), entries.len());
    entries.push(SymbolEntry {
      in_vertex: vertex_scan.references.contains(&decl.name),
      in_fragment: fragment_scan.references.contains(&decl.name),
      kept_in_vertex: vertex_scan.kept.contains(&decl.name),
      kept_in_fragment: fragment_scan.kept.contains(&decl.name),
      name: decl.name,
      declared_type: decl.declared_type,
      precision: decl.precision,
      array_size: decl.array_size,
      usage: decl.usage,
      first_reference: decl.origin
    });
  }

  for entry in entries.iter().filter(|e| !e.is_referenced()) {
    debug!("{} `{}` ({}) is never used", entry.usage, entry.name, entry.first_reference);
  }

  Ok(PassSymbols {
    context: SymbolContext { entries },
    vertex_body: vertex_scan.body,
    fragment_body: fragment_scan.body,
    writes_frag_data: fragment_scan.references.contains("gl_FragData")
  })
}
