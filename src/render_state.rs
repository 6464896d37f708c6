//! Render states.
//!
//! A render state is a piece of fixed-function pipeline configuration (blending, depth test,
//! stencil, rasterization…) declared next to the code of a pass. Its value is either known when the
//! shader is compiled (a literal) or looked up on the material at render time (a property
//! reference). The splitter sorts the declarations into those two tables.

use serde::ser::{Serialize, SerializeTuple, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::syntax::{Literal, RenderStateDecl, RenderStateValue};

macro_rules! render_state_properties {
  ($($variant:ident => $path:literal, $indexed:expr;)*) => {
    /// Every render state that can be declared.
    #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
    pub enum RenderStateProperty {
      $($variant),*
    }

    impl RenderStateProperty {
      pub const ALL: &'static [RenderStateProperty] = &[$(RenderStateProperty::$variant),*];

      /// Dotted path used to declare the state, as in `BlendState.Enabled`.
      pub fn path(self) -> &'static str {
        match self {
          $(RenderStateProperty::$variant => $path),*
        }
      }

      /// Whether the state is set per render target (and accepts an index suffix).
      pub fn is_indexed(self) -> bool {
        match self {
          $(RenderStateProperty::$variant => $indexed),*
        }
      }

      pub fn from_path(path: &str) -> Option<Self> {
        match path {
          $($path => Some(RenderStateProperty::$variant),)*
          _ => None
        }
      }
    }
  }
}

render_state_properties! {
  BlendEnabled => "BlendState.Enabled", true;
  BlendColorWriteMask => "BlendState.ColorWriteMask", true;
  BlendSrcFactor => "BlendState.SrcFactor", true;
  BlendDstFactor => "BlendState.DstFactor", true;
  BlendSourceColorFactor => "BlendState.SourceColorBlendFactor", true;
  BlendDestinationColorFactor => "BlendState.DestinationColorBlendFactor", true;
  BlendSourceAlphaFactor => "BlendState.SourceAlphaBlendFactor", true;
  BlendDestinationAlphaFactor => "BlendState.DestinationAlphaBlendFactor", true;
  BlendColorOperation => "BlendState.ColorBlendOperation", true;
  BlendAlphaOperation => "BlendState.AlphaBlendOperation", true;
  BlendColor => "BlendState.BlendColor", false;
  AlphaToCoverage => "BlendState.AlphaToCoverage", false;
  DepthEnabled => "DepthState.Enabled", false;
  DepthWriteEnabled => "DepthState.WriteEnabled", false;
  DepthCompareFunction => "DepthState.CompareFunction", false;
  StencilEnabled => "StencilState.Enabled", false;
  StencilReferenceValue => "StencilState.ReferenceValue", false;
  StencilMask => "StencilState.Mask", false;
  StencilWriteMask => "StencilState.WriteMask", false;
  StencilCompareFunctionFront => "StencilState.CompareFunctionFront", false;
  StencilCompareFunctionBack => "StencilState.CompareFunctionBack", false;
  StencilPassOperationFront => "StencilState.PassOperationFront", false;
  StencilPassOperationBack => "StencilState.PassOperationBack", false;
  StencilFailOperationFront => "StencilState.FailOperationFront", false;
  StencilFailOperationBack => "StencilState.FailOperationBack", false;
  StencilZFailOperationFront => "StencilState.ZFailOperationFront", false;
  StencilZFailOperationBack => "StencilState.ZFailOperationBack", false;
  CullMode => "RasterState.CullMode", false;
  DepthBias => "RasterState.DepthBias", false;
  SlopeScaledDepthBias => "RasterState.SlopeScaledDepthBias", false;
  RenderQueueType => "RenderQueueType", false;
}

/// Highest render target index accepted by the syntax.
pub const MAX_TARGET_INDEX: u8 = 7;

/// A render state key: a property and, for per-target states, the index of the render target.
///
/// An unindexed per-target state and the same state at index 0 are the same key.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RenderStateKey {
  pub property: RenderStateProperty,
  pub index: u8
}

impl RenderStateKey {
  pub fn new(property: RenderStateProperty) -> Self {
    RenderStateKey { property, index: 0 }
  }

  pub fn indexed(property: RenderStateProperty, index: u8) -> Self {
    RenderStateKey { property, index }
  }
}

impl fmt::Display for RenderStateKey {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.write_str(self.property.path())?;

    if self.index > 0 {
      write!(f, "[{}]", self.index)?;
    }

    Ok(())
  }
}

impl Serialize for RenderStateKey {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
    serializer.collect_str(self)
  }
}

/// Types of the enumerated render state constants.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum EnumType {
  BlendFactor,
  BlendOperation,
  CompareFunction,
  StencilOperation,
  CullMode,
  RenderQueueType,
  ColorWriteMask
}

impl EnumType {
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "BlendFactor" => Some(EnumType::BlendFactor),
      "BlendOperation" => Some(EnumType::BlendOperation),
      "CompareFunction" => Some(EnumType::CompareFunction),
      "StencilOperation" => Some(EnumType::StencilOperation),
      "CullMode" => Some(EnumType::CullMode),
      "RenderQueueType" => Some(EnumType::RenderQueueType),
      "ColorWriteMask" => Some(EnumType::ColorWriteMask),
      _ => None
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      EnumType::BlendFactor => "BlendFactor",
      EnumType::BlendOperation => "BlendOperation",
      EnumType::CompareFunction => "CompareFunction",
      EnumType::StencilOperation => "StencilOperation",
      EnumType::CullMode => "CullMode",
      EnumType::RenderQueueType => "RenderQueueType",
      EnumType::ColorWriteMask => "ColorWriteMask"
    }
  }

  pub fn variants(self) -> &'static [&'static str] {
    match self {
      EnumType::BlendFactor => &[
        "Zero", "One", "SourceColor", "OneMinusSourceColor", "DestinationColor",
        "OneMinusDestinationColor", "SourceAlpha", "OneMinusSourceAlpha", "DestinationAlpha",
        "OneMinusDestinationAlpha", "SourceAlphaSaturate", "BlendColor", "OneMinusBlendColor"
      ],
      EnumType::BlendOperation => &["Add", "Subtract", "ReverseSubtract", "Min", "Max"],
      EnumType::CompareFunction => &[
        "Never", "Less", "Equal", "LessEqual", "Greater", "NotEqual", "GreaterEqual", "Always"
      ],
      EnumType::StencilOperation => &[
        "Keep", "Zero", "Replace", "IncrementSaturate", "DecrementSaturate", "Invert",
        "IncrementWrap", "DecrementWrap"
      ],
      EnumType::CullMode => &["Off", "Front", "Back"],
      EnumType::RenderQueueType => &["Opaque", "AlphaTest", "Transparent"],
      EnumType::ColorWriteMask => &["None", "Red", "Green", "Blue", "Alpha", "All"]
    }
  }
}

/// An enumerated constant, such as `CompareFunction.LessEqual`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct EnumConstant {
  pub ty: EnumType,
  pub variant: &'static str
}

impl EnumConstant {
  /// Look a variant up; `None` if the type has no such variant.
  pub fn new(ty: EnumType, variant: &str) -> Option<Self> {
    ty.variants().iter().find(|&&v| v == variant).map(|&variant| EnumConstant { ty, variant })
  }
}

impl fmt::Display for EnumConstant {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "{}.{}", self.ty.name(), self.variant)
  }
}

impl Serialize for EnumConstant {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
    serializer.collect_str(self)
  }
}

/// Render states of a pass, split into compile-time constants and run-time properties.
///
/// A key is in at most one of the tables.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderStates {
  pub constant: BTreeMap<RenderStateKey, Literal>,
  pub variable: BTreeMap<RenderStateKey, String>
}

impl RenderStates {
  pub fn is_empty(&self) -> bool {
    self.constant.is_empty() && self.variable.is_empty()
  }

  pub fn len(&self) -> usize {
    self.constant.len() + self.variable.len()
  }

  pub fn keys(&self) -> impl Iterator<Item = &RenderStateKey> {
    self.constant.keys().chain(self.variable.keys())
  }

  /// Set a state, overriding any previous value in either table.
  pub fn insert(&mut self, key: RenderStateKey, value: &RenderStateValue) {
    match *value {
      RenderStateValue::Literal(ref lit) => {
        self.variable.remove(&key);
        self.constant.insert(key, lit.clone());
      }

      RenderStateValue::Property(ref name) => {
        self.constant.remove(&key);
        self.variable.insert(key, name.clone());
      }
    }
  }
}

// The engine consumes render states as a pair `[constant, variable]`.
impl Serialize for RenderStates {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
    let mut tuple = serializer.serialize_tuple(2)?;
    tuple.serialize_element(&self.constant)?;
    tuple.serialize_element(&self.variable)?;
    tuple.end()
  }
}

/// Split render state declarations.
///
/// Declarations are taken in order and a later declaration of a key overrides an earlier one, so
/// pass declarations must come after the sub-shader ones.
pub fn split<'a, I>(decls: I) -> RenderStates where I: IntoIterator<Item = &'a RenderStateDecl> {
  let mut states = RenderStates::default();

  for decl in decls {
    states.insert(decl.key, &decl.value);
  }

  states
}
