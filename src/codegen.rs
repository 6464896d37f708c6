//! Versioned code generators.
//!
//! A generator knows how a GLSL dialect spells the declarations the symbol context collected and
//! what preamble each stage starts with. Everything else in the code is copied as is.

use log::warn;
use serde_derive::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::str::FromStr;

use crate::render_state::{RenderStateKey, RenderStates};
use crate::source::Origin;
use crate::symbol::{PassSymbols, SymbolContext, SymbolEntry, UsageKind};
use crate::syntax::ShaderStage;

/// GLSL dialects code can be generated for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
  /// GLSL ES 1.00 (WebGL 1).
  Es100,
  /// GLSL ES 3.00 (WebGL 2).
  Es300
}

impl Target {
  pub fn name(self) -> &'static str {
    match self {
      Target::Es100 => "es100",
      Target::Es300 => "es300"
    }
  }

  /// Number of render targets a pass can write to.
  pub fn max_render_targets(self) -> u8 {
    match self {
      Target::Es100 => 1,
      Target::Es300 => 4
    }
  }
}

impl Default for Target {
  fn default() -> Self {
    Target::Es300
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.write_str(self.name())
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownTarget(pub String);

impl fmt::Display for UnknownTarget {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "unknown target \"{}\" (expected es100 or es300)", self.0)
  }
}

impl Error for UnknownTarget {}

impl FromStr for Target {
  type Err = UnknownTarget;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "es100" | "100" => Ok(Target::Es100),
      "es300" | "300es" | "300" => Ok(Target::Es300),
      _ => Err(UnknownTarget(s.to_owned()))
    }
  }
}

/// Error that might occur while generating code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CodegenError {
  /// The target can’t express a render state.
  UnsupportedRenderState { key: RenderStateKey, target: Target }
}

impl fmt::Display for CodegenError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      CodegenError::UnsupportedRenderState { ref key, target } =>
        write!(f, "render state {} is not supported by {}", key, target)
    }
  }
}

impl Error for CodegenError {}

/// A synthesized declaration, along with where the symbol was first declared.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Declaration {
  pub text: String,
  pub origin: Origin
}

/// Final sources of a pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StageSources {
  pub vertex: String,
  pub fragment: String
}

const ES100_VERTEX_PREAMBLE: &str = "#version 100\n";

const ES100_FRAGMENT_PREAMBLE: &str = "#version 100\nprecision mediump float;\n";

const ES300_VERTEX_PREAMBLE: &str = "\
#version 300 es
#define attribute in
#define varying out
#define texture2D texture
#define textureCube texture
";

const ES300_FRAGMENT_PREAMBLE: &str = "\
#version 300 es
precision mediump float;
layout(location = 0) out vec4 glFragColor;
#define gl_FragColor glFragColor
#define varying in
#define texture2D texture
#define textureCube texture
";

// One output per ES300 render target.
const ES300_FRAG_DATA_PREAMBLE: &str = "\
#version 300 es
precision mediump float;
layout(location = 0) out vec4 glFragData[4];
#define gl_FragData glFragData
#define varying in
#define texture2D texture
#define textureCube texture
";

/// Built-in output a fragment stage writes its colors to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FragmentOutput {
  /// `gl_FragColor`.
  Color,
  /// `gl_FragData[n]`, one entry per render target.
  Data
}

impl FragmentOutput {
  pub fn of(symbols: &PassSymbols) -> Self {
    if symbols.writes_frag_data {
      FragmentOutput::Data
    } else {
      FragmentOutput::Color
    }
  }
}

/// A code generator.
///
/// There’s one variant per target, picked with `Generator::for_target`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Generator {
  Es100,
  Es300
}

impl Generator {
  pub fn for_target(target: Target) -> Self {
    match target {
      Target::Es100 => Generator::Es100,
      Target::Es300 => Generator::Es300
    }
  }

  pub fn target(self) -> Target {
    match self {
      Generator::Es100 => Target::Es100,
      Generator::Es300 => Target::Es300
    }
  }

  /// Preamble of a stage. `output` only matters to fragment stages.
  pub fn preamble(self, stage: ShaderStage, output: FragmentOutput) -> &'static str {
    match (self, stage, output) {
      (Generator::Es100, ShaderStage::Vertex, _) => ES100_VERTEX_PREAMBLE,
      (Generator::Es100, ShaderStage::Fragment, _) => ES100_FRAGMENT_PREAMBLE,
      (Generator::Es300, ShaderStage::Vertex, _) => ES300_VERTEX_PREAMBLE,
      (Generator::Es300, ShaderStage::Fragment, FragmentOutput::Color) => ES300_FRAGMENT_PREAMBLE,
      (Generator::Es300, ShaderStage::Fragment, FragmentOutput::Data) => ES300_FRAG_DATA_PREAMBLE
    }
  }

  // Declaration of `entry` in `stage`, if it belongs there. `location` is the next free attribute
  // location and is bumped when used.
  fn render_entry(self, entry: &SymbolEntry, stage: ShaderStage, location: &mut u32) -> Option<Declaration> {
    if entry.is_kept_in(stage) {
      return None;
    }

    let qualifier = match (entry.usage, stage) {
      (UsageKind::Attribute, ShaderStage::Vertex) if entry.in_vertex => {
        let qualifier = match self {
          Generator::Es100 => "attribute".to_owned(),
          Generator::Es300 => format!("layout(location = {}) in", location)
        };

        *location += 1;
        qualifier
      }

      (UsageKind::Varying, _) if entry.is_referenced() => {
        let qualifier = match (self, stage) {
          (Generator::Es100, _) => "varying",
          (Generator::Es300, ShaderStage::Vertex) => "out",
          (Generator::Es300, ShaderStage::Fragment) => "in"
        };

        qualifier.to_owned()
      }

      (UsageKind::Uniform, _) if entry.is_referenced_in(stage) => "uniform".to_owned(),

      _ => return None
    };

    let mut text = qualifier;
    text.push(' ');

    if let Some(ref precision) = entry.precision {
      text.push_str(precision);
      text.push(' ');
    }

    text.push_str(&entry.declared_type);
    text.push(' ');
    text.push_str(&entry.name);

    if let Some(ref size) = entry.array_size {
      text.push('[');
      text.push_str(size);
      text.push(']');
    }

    text.push(';');

    Some(Declaration { text, origin: entry.first_reference.clone() })
  }

  fn render_kind(self, symbols: &SymbolContext, usage: UsageKind, stage: ShaderStage) -> Vec<Declaration> {
    let mut location = 0;

    symbols
      .of_kind(usage)
      .filter_map(|entry| self.render_entry(entry, stage, &mut location))
      .collect()
  }

  /// Vertex attribute declarations, in symbol order.
  pub fn render_attribute_declarations(self, symbols: &SymbolContext) -> Vec<Declaration> {
    self.render_kind(symbols, UsageKind::Attribute, ShaderStage::Vertex)
  }

  pub fn render_varying_declarations(self, symbols: &SymbolContext, stage: ShaderStage) -> Vec<Declaration> {
    self.render_kind(symbols, UsageKind::Varying, stage)
  }

  pub fn render_uniform_declarations(self, symbols: &SymbolContext, stage: ShaderStage) -> Vec<Declaration> {
    self.render_kind(symbols, UsageKind::Uniform, stage)
  }

  /// All the declarations of a stage, in symbol order.
  pub fn stage_declarations(self, symbols: &SymbolContext, stage: ShaderStage) -> Vec<Declaration> {
    let mut location = 0;

    symbols
      .iter()
      .filter_map(|entry| self.render_entry(entry, stage, &mut location))
      .collect()
  }

  /// Check that every render state can be honored by the target.
  pub fn check_render_states(self, states: &RenderStates) -> Result<(), CodegenError> {
    let target = self.target();

    match states.keys().find(|key| key.index >= target.max_render_targets()) {
      Some(&key) => {
        warn!("render state {} needs more render targets than {} provides", key, target);
        Err(CodegenError::UnsupportedRenderState { key, target })
      }

      None => Ok(())
    }
  }

  /// Source of a stage: preamble, one declaration per line, then the body.
  pub fn assemble_stage(self, preamble: &str, declarations: &[Declaration], body: &str) -> String {
    let capacity = preamble.len() + declarations.iter().map(|d| d.text.len() + 1).sum::<usize>() + body.len();
    let mut source = String::with_capacity(capacity);

    source.push_str(preamble);

    for decl in declarations {
      source.push_str(&decl.text);
      source.push('\n');
    }

    source.push_str(body);
    source
  }

  /// Sources of a pass.
  pub fn assemble(self, symbols: &PassSymbols) -> StageSources {
    let vertex_decls = self.stage_declarations(&symbols.context, ShaderStage::Vertex);
    let fragment_decls = self.stage_declarations(&symbols.context, ShaderStage::Fragment);
    let output = FragmentOutput::of(symbols);

    StageSources {
      vertex: self.assemble_stage(self.preamble(ShaderStage::Vertex, output), &vertex_decls, &symbols.vertex_body),
      fragment: self.assemble_stage(
        self.preamble(ShaderStage::Fragment, output),
        &fragment_decls,
        &symbols.fragment_body
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::include::{resolve, IncludeOptions, MapProvider};
  use crate::lexer::Location;
  use crate::render_state::RenderStateProperty;
  use crate::symbol::collect;
  use crate::syntax::{CodeBlock, Literal, RenderStateValue};

  const VS: &str = "\
attribute vec3 a_position;
attribute vec2 a_unused;
attribute vec2 a_uv;
varying vec2 v_uv;
uniform mat4 u_mvp;
uniform vec4 u_tint;
void main() { v_uv = a_uv; gl_Position = u_mvp * vec4(a_position, 1.0); }";

  const FS: &str = "\
varying vec2 v_uv;
uniform sampler2D u_tex;
uniform vec4 u_tint;
void main() { gl_FragColor = texture2D(u_tex, v_uv) * u_tint; }";

  fn symbols(vs: &str, fs: &str) -> PassSymbols {
    let provider = MapProvider::new();
    let block = |stage, text: &str| CodeBlock {
      stage,
      raw_text: text.to_owned(),
      location: Location::start(),
      include_directives: Vec::new()
    };
    let options = IncludeOptions::default();
    let vertex = resolve(&block(ShaderStage::Vertex, vs), "test", &provider, &options).unwrap();
    let fragment = resolve(&block(ShaderStage::Fragment, fs), "test", &provider, &options).unwrap();

    collect(&vertex, &fragment).unwrap()
  }

  fn texts(decls: Vec<Declaration>) -> Vec<String> {
    decls.into_iter().map(|d| d.text).collect()
  }

  #[test]
  fn target_from_str() {
    assert_eq!("es100".parse(), Ok(Target::Es100));
    assert_eq!("100".parse(), Ok(Target::Es100));
    assert_eq!("ES300".parse(), Ok(Target::Es300));
    assert_eq!("300es".parse(), Ok(Target::Es300));
    assert!("es200".parse::<Target>().is_err());
  }

  #[test]
  fn es100_declarations() {
    let symbols = symbols(VS, FS);
    let gen = Generator::for_target(Target::Es100);

    assert_eq!(texts(gen.render_attribute_declarations(&symbols.context)), vec![
      "attribute vec3 a_position;",
      "attribute vec2 a_uv;"
    ]);
    assert_eq!(texts(gen.render_varying_declarations(&symbols.context, ShaderStage::Fragment)), vec![
      "varying vec2 v_uv;"
    ]);
    assert_eq!(texts(gen.render_uniform_declarations(&symbols.context, ShaderStage::Vertex)), vec![
      "uniform mat4 u_mvp;"
    ]);
    assert_eq!(texts(gen.render_uniform_declarations(&symbols.context, ShaderStage::Fragment)), vec![
      "uniform vec4 u_tint;",
      "uniform sampler2D u_tex;"
    ]);
  }

  #[test]
  fn es300_declarations() {
    let symbols = symbols(VS, FS);
    let gen = Generator::for_target(Target::Es300);

    assert_eq!(texts(gen.stage_declarations(&symbols.context, ShaderStage::Vertex)), vec![
      "layout(location = 0) in vec3 a_position;",
      "layout(location = 1) in vec2 a_uv;",
      "out vec2 v_uv;",
      "uniform mat4 u_mvp;"
    ]);
    assert_eq!(texts(gen.stage_declarations(&symbols.context, ShaderStage::Fragment)), vec![
      "in vec2 v_uv;",
      "uniform vec4 u_tint;",
      "uniform sampler2D u_tex;"
    ]);
  }

  #[test]
  fn declarations_keep_their_origin() {
    let symbols = symbols(VS, FS);
    let decls = Generator::Es100.render_attribute_declarations(&symbols.context);

    assert_eq!(decls[1].origin.line, 3);
  }

  #[test]
  fn precision_and_arrays() {
    let symbols = symbols("uniform highp vec4 u_bones[32];\nvoid main() { gl_Position = u_bones[0]; }", "");

    assert_eq!(texts(Generator::Es300.render_uniform_declarations(&symbols.context, ShaderStage::Vertex)), vec![
      "uniform highp vec4 u_bones[32];"
    ]);
  }

  #[test]
  fn es100_assembly() {
    let symbols = symbols("attribute vec3 a_position;\nvoid main() { gl_Position = vec4(a_position, 1.0); }", "");
    let sources = Generator::Es100.assemble(&symbols);

    assert_eq!(
      sources.vertex,
      "#version 100\nattribute vec3 a_position;\n\nvoid main() { gl_Position = vec4(a_position, 1.0); }"
    );
    assert_eq!(sources.fragment, "#version 100\nprecision mediump float;\n");
    assert_eq!(sources.vertex.matches("a_position;").count(), 1);
  }

  #[test]
  fn es300_assembly() {
    let symbols = symbols("attribute vec3 a_position;\nvoid main() { gl_Position = vec4(a_position, 1.0); }", "");
    let sources = Generator::Es300.assemble(&symbols);

    assert!(sources.vertex.starts_with("#version 300 es\n"));
    assert!(sources.vertex.contains("\nlayout(location = 0) in vec3 a_position;\n"));
    assert!(!sources.vertex.contains("attribute vec3"));
    assert!(sources.fragment.contains("#define gl_FragColor glFragColor\n"));
    assert!(!sources.fragment.contains("gl_FragData"));
  }

  #[test]
  fn es300_frag_data() {
    let symbols = symbols("", "void main() { gl_FragData[0] = vec4(1.); gl_FragData[1] = vec4(0.); }");
    let sources = Generator::Es300.assemble(&symbols);
    let outputs = format!("layout(location = 0) out vec4 glFragData[{}];\n", Target::Es300.max_render_targets());

    assert!(sources.fragment.contains(&outputs));
    assert!(sources.fragment.contains("#define gl_FragData glFragData\n"));
    assert!(!sources.fragment.contains("glFragColor"));
    assert!(sources.fragment.ends_with("void main() { gl_FragData[0] = vec4(1.); gl_FragData[1] = vec4(0.); }"));

    // ES100 has gl_FragData natively.
    let es100 = Generator::Es100.assemble(&symbols);
    assert_eq!(es100.fragment, format!("{}{}", ES100_FRAGMENT_PREAMBLE, symbols.fragment_body));
  }

  #[test]
  fn kept_declarations_are_not_repeated() {
    let symbols = symbols(
      "varying vec2 v_uv;\nvoid main() { v_uv = vec2(0.); }",
      "#ifdef USE_UV\nvarying vec2 v_uv;\n#endif\nvoid main() { }"
    );
    let sources = Generator::Es300.assemble(&symbols);

    assert!(sources.vertex.contains("\nout vec2 v_uv;\n"));
    assert!(!sources.fragment.contains("in vec2 v_uv;"));
    assert!(sources.fragment.contains("#define varying in\n"));
    assert!(sources.fragment.ends_with("#ifdef USE_UV\nvarying vec2 v_uv;\n#endif\nvoid main() { }"));
  }

  #[test]
  fn render_target_capabilities() {
    let mut states = RenderStates::default();
    let value = RenderStateValue::Literal(Literal::Bool(true));
    states.insert(RenderStateKey::indexed(RenderStateProperty::BlendEnabled, 1), &value);

    assert_eq!(Generator::Es300.check_render_states(&states), Ok(()));
    assert_eq!(Generator::Es100.check_render_states(&states), Err(CodegenError::UnsupportedRenderState {
      key: RenderStateKey::indexed(RenderStateProperty::BlendEnabled, 1),
      target: Target::Es100
    }));

    states.insert(RenderStateKey::indexed(RenderStateProperty::BlendEnabled, 4), &value);
    assert!(Generator::Es300.check_render_states(&states).is_err());
  }
}
