//! Compilation entry point.
//!
//! A compilation goes through a fixed sequence of stages, each one running for the whole shader
//! before the next one starts:
//!
//! 1. lexing of the shader file;
//! 2. parsing into a `Shader`;
//! 3. include expansion of every code block;
//! 4. symbol collection, pass by pass;
//! 5. code generation for the requested target.
//!
//! The first error aborts the compilation; `CompileError::stage` tells which stage failed.

use log::{debug, info};
use serde_derive::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::codegen::{Generator, Target};
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::include::{self, Expanded, IncludeOptions, IncludeProvider};
use crate::lexer::{tokenize, LexError};
use crate::parser::Parser;
use crate::render_state::{self, RenderStates};
use crate::symbol::{self, PassSymbols};
use crate::syntax::{Pass, SubShader, TagValue};

/// Stages of a compilation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Stage {
  Init,
  Lexing,
  Parsing,
  IncludeExpansion,
  SymbolCollection,
  CodeGeneration,
  Done
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      Stage::Init => f.write_str("init"),
      Stage::Lexing => f.write_str("lexing"),
      Stage::Parsing => f.write_str("parsing"),
      Stage::IncludeExpansion => f.write_str("include expansion"),
      Stage::SymbolCollection => f.write_str("symbol collection"),
      Stage::CodeGeneration => f.write_str("code generation"),
      Stage::Done => f.write_str("done")
    }
  }
}

/// Everything a compilation needs besides the shader source.
///
/// A context is immutable and can be shared by as many concurrent compilations as needed.
#[derive(Clone)]
pub struct Context {
  provider: Arc<dyn IncludeProvider>,
  target: Target,
  file_name: String,
  include: IncludeOptions
}

impl Context {
  pub fn new<P>(provider: P, target: Target) -> Self where P: IncludeProvider + 'static {
    Context {
      provider: Arc::new(provider),
      target,
      file_name: "shader".to_owned(),
      include: IncludeOptions::default()
    }
  }

  pub fn from_config<P>(provider: P, config: &CompilerConfig) -> Self where P: IncludeProvider + 'static {
    Context {
      include: config.include_options(),
      ..Context::new(provider, config.target)
    }
  }

  /// Name of the shader file, used in error locations.
  pub fn with_file_name<N>(self, file_name: N) -> Self where N: Into<String> {
    Context {
      file_name: file_name.into(),
      ..self
    }
  }

  pub fn with_include_options(self, include: IncludeOptions) -> Self {
    Context { include, ..self }
  }

  pub fn target(&self) -> Target {
    self.target
  }

  pub fn file_name(&self) -> &str {
    &self.file_name
  }

  pub fn provider(&self) -> &dyn IncludeProvider {
    &*self.provider
  }

  pub fn include_options(&self) -> &IncludeOptions {
    &self.include
  }
}

impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("Context")
      .field("target", &self.target)
      .field("file_name", &self.file_name)
      .field("include", &self.include)
      .finish()
  }
}

/// What the engine gets for a pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderInfo {
  pub name: String,
  pub vertex_source: String,
  pub fragment_source: String,
  pub tags: BTreeMap<String, TagValue>,
  pub render_states: RenderStates
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledSubShader {
  pub name: Option<String>,
  pub passes: Vec<ShaderInfo>
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledShader {
  pub name: String,
  pub target: Target,
  pub sub_shaders: Vec<CompiledSubShader>
}

impl CompiledShader {
  /// All the passes, sub-shader after sub-shader.
  pub fn passes(&self) -> impl Iterator<Item = &ShaderInfo> {
    self.sub_shaders.iter().flat_map(|sub| sub.passes.iter())
  }
}

struct Run<'a> {
  file_name: &'a str,
  stage: Stage
}

impl<'a> Run<'a> {
  fn enter(&mut self, stage: Stage) {
    debug!("{}: {} -> {}", self.file_name, self.stage, stage);
    self.stage = stage;
  }
}

// Pass tags override sub-shader ones.
fn pass_tags(sub_shader: &SubShader, pass: &Pass) -> BTreeMap<String, TagValue> {
  sub_shader
    .tags
    .iter()
    .chain(&pass.tags)
    .map(|tag| (tag.key.clone(), tag.value.clone()))
    .collect()
}

/// Compile a shader.
pub fn compile(source: &str, ctx: &Context) -> Result<CompiledShader, CompileError> {
  let mut run = Run { file_name: &ctx.file_name, stage: Stage::Init };

  run.enter(Stage::Lexing);
  let tokens = tokenize(source)?;

  run.enter(Stage::Parsing);
  let shader = Parser::new(source, tokens.into_iter().map(Ok::<_, LexError>))?.parse_shader()?;

  run.enter(Stage::IncludeExpansion);
  let mut expanded: Vec<Vec<(Expanded, Expanded)>> = Vec::with_capacity(shader.sub_shaders.len());

  for sub_shader in &shader.sub_shaders {
    let mut passes = Vec::with_capacity(sub_shader.passes.len());

    for pass in &sub_shader.passes {
      let vertex = include::resolve(&pass.vertex, &ctx.file_name, ctx.provider(), &ctx.include)?;
      let fragment = include::resolve(&pass.fragment, &ctx.file_name, ctx.provider(), &ctx.include)?;
      passes.push((vertex, fragment));
    }

    expanded.push(passes);
  }

  run.enter(Stage::SymbolCollection);
  let mut symbols: Vec<Vec<PassSymbols>> = Vec::with_capacity(expanded.len());

  for passes in &expanded {
    let collected = passes
      .iter()
      .map(|&(ref vertex, ref fragment)| symbol::collect(vertex, fragment))
      .collect::<Result<Vec<_>, _>>()?;
    symbols.push(collected);
  }

  run.enter(Stage::CodeGeneration);
  let generator = Generator::for_target(ctx.target);
  let mut sub_shaders = Vec::with_capacity(shader.sub_shaders.len());

  for (sub_shader, pass_symbols) in shader.sub_shaders.iter().zip(&symbols) {
    let mut passes = Vec::with_capacity(sub_shader.passes.len());

    for (pass, symbols) in sub_shader.passes.iter().zip(pass_symbols) {
      let render_states = render_state::split(sub_shader.render_states.iter().chain(&pass.render_states));
      generator.check_render_states(&render_states)?;

      let sources = generator.assemble(symbols);

      passes.push(ShaderInfo {
        name: pass.name.clone(),
        vertex_source: sources.vertex,
        fragment_source: sources.fragment,
        tags: pass_tags(sub_shader, pass),
        render_states
      });
    }

    sub_shaders.push(CompiledSubShader {
      name: sub_shader.name.clone(),
      passes
    });
  }

  run.enter(Stage::Done);

  let compiled = CompiledShader {
    name: shader.name,
    target: ctx.target,
    sub_shaders
  };

  info!("compiled \"{}\" ({}) for {}: {} pass(es)", compiled.name, ctx.file_name, ctx.target, compiled.passes().count());

  Ok(compiled)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::include::MapProvider;
  use crate::render_state::{RenderStateKey, RenderStateProperty};
  use crate::syntax::Literal;

  const SHADER: &str = r#"
Shader "lit" {
  SubShader "main" {
    Tags { "RenderType" = "Opaque", "Queue" = 1 }
    RenderState { DepthState.Enabled = true, RasterState.CullMode = CullMode.Back }

    Pass "forward" {
      Tags { "Queue" = 2 }
      RenderState { RasterState.CullMode = material.cullMode }

      VertexShader {
        #include "transform"
        attribute vec3 a_position;
        void main() { gl_Position = u_mvp * vec4(a_position, 1.0); }
      }

      FragmentShader {
        uniform vec4 u_color;
        void main() { gl_FragColor = u_color; }
      }
    }
  }
}
"#;

  fn context(target: Target) -> Context {
    let provider = MapProvider::new().with("transform", "uniform mat4 u_mvp;\n");
    Context::new(provider, target).with_file_name("lit.shader")
  }

  #[test]
  fn compile_pass() {
    let compiled = compile(SHADER, &context(Target::Es100)).unwrap();

    assert_eq!(compiled.name, "lit");
    assert_eq!(compiled.sub_shaders[0].name.as_deref(), Some("main"));

    let pass = compiled.passes().next().unwrap();

    assert_eq!(pass.name, "forward");
    assert!(pass.vertex_source.starts_with("#version 100\nuniform mat4 u_mvp;\nattribute vec3 a_position;\n"));
    assert!(pass.fragment_source.contains("uniform vec4 u_color;\n"));
    assert_eq!(pass.vertex_source.matches("u_mvp;").count(), 1);
  }

  #[test]
  fn tags_and_render_states_inherit() {
    let compiled = compile(SHADER, &context(Target::Es300)).unwrap();
    let pass = compiled.passes().next().unwrap();

    assert_eq!(pass.tags["RenderType"], TagValue::String("Opaque".to_owned()));
    assert_eq!(pass.tags["Queue"], TagValue::Number(2.));

    let cull = RenderStateKey::new(RenderStateProperty::CullMode);
    let depth = RenderStateKey::new(RenderStateProperty::DepthEnabled);

    assert_eq!(pass.render_states.variable.get(&cull).map(String::as_str), Some("material.cullMode"));
    assert!(!pass.render_states.constant.contains_key(&cull));
    assert_eq!(pass.render_states.constant.get(&depth), Some(&Literal::Bool(true)));
  }

  #[test]
  fn failing_stage() {
    let ctx = context(Target::Es100);

    assert_eq!(compile("Shader \"s\" { \"", &ctx).unwrap_err().stage(), Stage::Lexing);
    assert_eq!(compile("Shader \"s\" { }", &ctx).unwrap_err().stage(), Stage::Parsing);

    let missing = SHADER.replace("\"transform\"", "\"missing\"");
    assert_eq!(compile(&missing, &ctx).unwrap_err().stage(), Stage::IncludeExpansion);

    let conflict = SHADER.replace("uniform vec4 u_color;", "uniform vec3 a_position;");
    assert_eq!(compile(&conflict, &ctx).unwrap_err().stage(), Stage::SymbolCollection);

    let mrt = SHADER.replace("RenderState { RasterState", "RenderState { BlendState.Enabled[1] = true, RasterState");
    assert_eq!(compile(&mrt, &ctx).unwrap_err().stage(), Stage::CodeGeneration);
    assert!(compile(&mrt, &context(Target::Es300)).is_ok());
  }

  #[test]
  fn json_output() {
    let compiled = compile(SHADER, &context(Target::Es300)).unwrap();
    let json = serde_json::to_value(&compiled).unwrap();
    let pass = &json["subShaders"][0]["passes"][0];

    assert_eq!(json["target"], "es300");
    assert_eq!(pass["tags"]["Queue"], 2.0);
    assert_eq!(pass["renderStates"][0]["DepthState.Enabled"], true);
    assert_eq!(pass["renderStates"][1]["RasterState.CullMode"], "material.cullMode");
    assert!(pass["vertexSource"].as_str().unwrap().starts_with("#version 300 es\n"));
  }
}
