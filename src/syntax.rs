//! Syntax of the shader description language.
//!
//! A shader is a list of sub-shaders, each a list of passes. Passes carry the code of a vertex and
//! a fragment stage, kept as raw text. Everything is kept in declaration order.

use serde::ser::{Serialize, Serializer};
use std::fmt;

use crate::include::IncludeDirective;
use crate::lexer::Location;
use crate::render_state::{EnumConstant, RenderStateKey};

#[derive(Clone, Debug, PartialEq)]
pub struct Shader {
  pub name: String,
  pub sub_shaders: Vec<SubShader>,
  pub location: Location
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubShader {
  pub name: Option<String>,
  pub tags: Vec<TagDecl>,
  pub render_states: Vec<RenderStateDecl>,
  pub passes: Vec<Pass>,
  pub location: Location
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pass {
  pub name: String,
  pub tags: Vec<TagDecl>,
  pub render_states: Vec<RenderStateDecl>,
  pub vertex: CodeBlock,
  pub fragment: CodeBlock,
  pub location: Location
}

/// A `key = value` line of a `RenderState` block.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderStateDecl {
  pub key: RenderStateKey,
  pub value: RenderStateValue,
  pub location: Location
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderStateValue {
  /// Value known at compile time.
  Literal(Literal),
  /// Name of a material property, resolved at render time.
  Property(String)
}

/// A `key = value` line of a `Tags` block.
#[derive(Clone, Debug, PartialEq)]
pub struct TagDecl {
  pub key: String,
  pub value: TagValue,
  pub location: Location
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
  Bool(bool),
  Number(f64),
  String(String),
  /// RGBA color.
  Color([f32; 4]),
  Enum(EnumConstant)
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      Literal::Bool(b) => write!(f, "{}", b),
      Literal::Number(n) => write!(f, "{}", n),
      Literal::String(ref s) => write!(f, "{:?}", s),
      Literal::Color([r, g, b, a]) => write!(f, "Color({}, {}, {}, {})", r, g, b, a),
      Literal::Enum(ref c) => write!(f, "{}", c)
    }
  }
}

impl Serialize for Literal {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
    match *self {
      Literal::Bool(b) => serializer.serialize_bool(b),
      Literal::Number(n) => serializer.serialize_f64(n),
      Literal::String(ref s) => serializer.serialize_str(s),
      Literal::Color(ref rgba) => rgba.serialize(serializer),
      Literal::Enum(ref c) => c.serialize(serializer)
    }
  }
}

/// Tag values are plain scalars.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
  Bool(bool),
  Number(f64),
  String(String)
}

impl Serialize for TagValue {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
    match *self {
      TagValue::Bool(b) => serializer.serialize_bool(b),
      TagValue::Number(n) => serializer.serialize_f64(n),
      TagValue::String(ref s) => serializer.serialize_str(s)
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ShaderStage {
  Vertex,
  Fragment
}

impl fmt::Display for ShaderStage {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      ShaderStage::Vertex => f.write_str("vertex"),
      ShaderStage::Fragment => f.write_str("fragment")
    }
  }
}

/// Raw code of a stage, as written between the braces of its block.
///
/// `location` is the location of the first byte of `raw_text` in the shader file.
#[derive(Clone, Debug, PartialEq)]
pub struct CodeBlock {
  pub stage: ShaderStage,
  pub raw_text: String,
  pub location: Location,
  pub include_directives: Vec<IncludeDirective>
}
