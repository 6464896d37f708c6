//! A compiler for shader descriptions.
//!
//! A shader description gathers, in a single file, the GLSL code of the vertex and fragment stages
//! of every pass of a shader along with their tags and render states:
//!
//! ```text
//! Shader "unlit" {
//!   SubShader {
//!     Tags { "RenderType" = "Opaque" }
//!     RenderState { DepthState.Enabled = true, BlendState.SrcFactor = material.blendSrc }
//!
//!     Pass "forward" {
//!       VertexShader {
//!         #include "transform.glsl"
//!         attribute vec3 a_position;
//!         void main() { gl_Position = objectToClip(a_position); }
//!       }
//!
//!       FragmentShader {
//!         uniform vec4 u_color;
//!         void main() { gl_FragColor = u_color; }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Compiling it for a GLSL ES dialect yields, per pass, ready-to-compile sources and the render
//! states split into the ones known at compile time and the ones to look up on the material.

pub mod cache;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod error;
pub mod include;
pub mod lexer;
pub mod logger;
pub mod parser;
pub mod render_state;
pub mod source;
pub mod symbol;
pub mod syntax;

pub use crate::cache::ShaderCache;
pub use crate::codegen::{Generator, Target};
pub use crate::compiler::{compile, CompiledShader, CompiledSubShader, Context, ShaderInfo, Stage};
pub use crate::config::CompilerConfig;
pub use crate::error::CompileError;
pub use crate::include::{Builtins, Chain, IncludeProvider, MapProvider};
pub use crate::parser::parse;
pub use crate::render_state::RenderStates;
