//! Compiler configuration.
//!
//! Every field has a default, so a configuration file only needs to mention what it changes:
//!
//! ```json
//! { "target": "es100", "max_include_depth": 8 }
//! ```

use serde_derive::{Deserialize, Serialize};

use crate::codegen::Target;
use crate::include::IncludeOptions;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
  pub target: Target,
  /// How deep includes can nest.
  pub max_include_depth: usize,
  /// Inline a fragment at most once per code block.
  pub include_once: bool
}

impl Default for CompilerConfig {
  fn default() -> Self {
    let include = IncludeOptions::default();

    CompilerConfig {
      target: Target::default(),
      max_include_depth: include.max_depth,
      include_once: include.include_once
    }
  }
}

impl CompilerConfig {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  pub fn include_options(&self) -> IncludeOptions {
    IncludeOptions {
      max_depth: self.max_include_depth,
      include_once: self.include_once
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let config = CompilerConfig::from_json("{}").unwrap();

    assert_eq!(config, CompilerConfig::default());
    assert_eq!(config.target, Target::Es300);
    assert_eq!(config.max_include_depth, 32);
    assert!(config.include_once);
  }

  #[test]
  fn partial() {
    let config = CompilerConfig::from_json(r#"{ "target": "es100", "include_once": false }"#).unwrap();

    assert_eq!(config.target, Target::Es100);
    assert_eq!(config.max_include_depth, 32);
    assert_eq!(config.include_options(), IncludeOptions { max_depth: 32, include_once: false });
  }

  #[test]
  fn unknown_target() {
    assert!(CompilerConfig::from_json(r#"{ "target": "es200" }"#).is_err());
  }
}
