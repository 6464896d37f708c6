//! Source mapping.
//!
//! Code blocks are spliced together from several texts (the shader file itself and any number of
//! included fragments). A `SourceMap` remembers where every byte of the spliced text comes from so
//! that errors can be reported against the file and line the user actually wrote.

use serde_derive::Serialize;
use std::fmt;

use crate::lexer::Location;

/// Position in an original (non-spliced) file.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct Origin {
  pub file: String,
  pub line: u32,
  pub column: u32
}

impl fmt::Display for Origin {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "{}:{}:{}", self.file, self.line, self.column)
  }
}

/// A file contributing to a spliced text.
///
/// `base` is the location of the first byte of `text` in the file it was cut from; inline code
/// blocks start somewhere in the middle of the shader file, included fragments at its very start.
#[derive(Clone, Debug)]
struct SourceFile {
  name: String,
  text: String,
  base: Location
}

// A run of bytes copied verbatim from one file.
#[derive(Clone, Copy, Debug)]
struct Segment {
  start: usize,
  file: usize,
  offset: usize
}

#[derive(Clone, Debug, Default)]
pub struct SourceMap {
  files: Vec<SourceFile>,
  segments: Vec<Segment>
}

impl SourceMap {
  pub fn new() -> Self {
    SourceMap::default()
  }

  /// Register a file and get its index back.
  pub fn add_file<N, T>(&mut self, name: N, text: T, base: Location) -> usize
  where N: Into<String>,
        T: Into<String> {
    self.files.push(SourceFile {
      name: name.into(),
      text: text.into(),
      base
    });

    self.files.len() - 1
  }

  /// Record that the spliced text, from byte `start` on, is copied from `file` at `offset`.
  pub fn push_segment(&mut self, start: usize, file: usize, offset: usize) {
    self.segments.push(Segment { start, file, offset });
  }

  /// Locate a byte offset of a registered file.
  pub fn origin_in(&self, file: usize, offset: usize) -> Origin {
    let file = &self.files[file];
    let offset = offset.min(file.text.len());
    let before = &file.text[..offset];

    let (line, column) = match before.rfind('\n') {
      Some(nl) => {
        let lines = before.matches('\n').count() as u32;
        (file.base.line + lines, before[nl + 1..].chars().count() as u32 + 1)
      }
      None => (file.base.line, file.base.column + before.chars().count() as u32)
    };

    Origin {
      file: file.name.clone(),
      line,
      column
    }
  }

  /// Locate a byte offset of the spliced text.
  pub fn locate(&self, offset: usize) -> Option<Origin> {
    let i = self.segments.partition_point(|seg| seg.start <= offset);
    let seg = self.segments.get(i.checked_sub(1)?)?;

    Some(self.origin_in(seg.file, seg.offset + (offset - seg.start)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn locate_across_files() {
    let mut map = SourceMap::new();
    let root = map.add_file("main.shader", "ab\ncd", Location { line: 10, column: 5, offset: 100 });
    let inc = map.add_file("inc.glsl", "xy\nz", Location::start());

    // spliced text: "ab\n" + "xy\nz" + "cd"
    map.push_segment(0, root, 0);
    map.push_segment(3, inc, 0);
    map.push_segment(7, root, 3);

    assert_eq!(map.locate(1), Some(Origin { file: "main.shader".to_owned(), line: 10, column: 6 }));
    assert_eq!(map.locate(6), Some(Origin { file: "inc.glsl".to_owned(), line: 2, column: 1 }));
    assert_eq!(map.locate(8), Some(Origin { file: "main.shader".to_owned(), line: 11, column: 2 }));
  }

  #[test]
  fn empty_map() {
    assert_eq!(SourceMap::new().locate(0), None);
  }
}
