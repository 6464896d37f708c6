//! Shader description parser.
//!
//! Recursive descent with a single token of lookahead. The first unexpected token aborts the
//! parse; there’s no recovery and no partial result.
//!
//! Code blocks are not parsed: the parser only balances their braces to find where they end and
//! keeps their text as is.

use std::error::Error;
use std::fmt;
use std::mem;

use crate::error::CompileError;
use crate::include;
use crate::lexer::{LexError, Lexer, Location, Token, TokenKind};
use crate::render_state::{EnumConstant, EnumType, RenderStateKey, RenderStateProperty, MAX_TARGET_INDEX};
use crate::syntax::{
  CodeBlock, Literal, Pass, RenderStateDecl, RenderStateValue, Shader, ShaderStage, SubShader, TagDecl,
  TagValue
};

/// Unexpected token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
  /// What the parser was looking for.
  pub expected: String,
  /// Kind of the token found instead.
  pub found: TokenKind,
  pub lexeme: String,
  pub location: Location
}

impl ParseError {
  fn new<E>(expected: E, token: &Token) -> Self where E: Into<String> {
    ParseError {
      expected: expected.into(),
      found: token.kind,
      lexeme: token.lexeme.clone(),
      location: token.location
    }
  }
}

impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match self.found {
      TokenKind::Eof => write!(f, "{}: expected {}, found end of input", self.location, self.expected),
      TokenKind::String => write!(f, "{}: expected {}, found string \"{}\"", self.location, self.expected, self.lexeme),
      found => write!(f, "{}: expected {}, found {} `{}`", self.location, self.expected, found, self.lexeme)
    }
  }
}

impl Error for ParseError {}

pub struct Parser<'a, I> {
  src: &'a str,
  tokens: I,
  current: Token
}

impl<'a, I> Parser<'a, I> where I: Iterator<Item = Result<Token, LexError>> {
  pub fn new(src: &'a str, mut tokens: I) -> Result<Self, CompileError> {
    let current = match tokens.next() {
      Some(token) => token?,
      None => eof(Location::start(), 0)
    };

    Ok(Parser { src, tokens, current })
  }

  fn peek(&self) -> &Token {
    &self.current
  }

  // Consume the current token and move to the next one.
  fn bump(&mut self) -> Result<Token, CompileError> {
    let next = match self.tokens.next() {
      Some(token) => token?,
      None => eof(self.current.location, self.current.end)
    };

    Ok(mem::replace(&mut self.current, next))
  }

  fn unexpected<T, E>(&self, expected: E) -> Result<T, CompileError> where E: Into<String> {
    Err(ParseError::new(expected, &self.current).into())
  }

  fn expect_punct(&mut self, c: char) -> Result<Token, CompileError> {
    if self.current.is_punct(c) {
      self.bump()
    } else {
      self.unexpected(format!("`{}`", c))
    }
  }

  fn expect_keyword(&mut self, keyword: &str) -> Result<Token, CompileError> {
    if self.current.is_keyword(keyword) {
      self.bump()
    } else {
      self.unexpected(format!("`{}`", keyword))
    }
  }

  fn expect_identifier(&mut self) -> Result<Token, CompileError> {
    if self.current.kind == TokenKind::Identifier {
      self.bump()
    } else {
      self.unexpected("identifier")
    }
  }

  // Accept an optional `,` or `;` after a block entry.
  fn skip_separator(&mut self) -> Result<(), CompileError> {
    if self.current.is_punct(',') || self.current.is_punct(';') {
      self.bump()?;
    }

    Ok(())
  }

  // A name is either a string or an identifier.
  fn parse_name(&mut self, what: &str) -> Result<String, CompileError> {
    match self.current.kind {
      TokenKind::String | TokenKind::Identifier => Ok(self.bump()?.lexeme),
      _ => self.unexpected(what)
    }
  }

  /// Parse a whole shader; the input must end right after it.
  pub fn parse_shader(&mut self) -> Result<Shader, CompileError> {
    let location = self.expect_keyword("Shader")?.location;
    let name = self.parse_name("shader name")?;
    let mut sub_shaders = Vec::new();

    self.expect_punct('{')?;

    loop {
      if self.peek().is_keyword("SubShader") {
        sub_shaders.push(self.parse_sub_shader()?);
      } else if self.peek().is_punct('}') && !sub_shaders.is_empty() {
        self.bump()?;
        break;
      } else if sub_shaders.is_empty() {
        return self.unexpected("`SubShader`");
      } else {
        return self.unexpected("`SubShader` or `}`");
      }
    }

    if !self.peek().is_eof() {
      return self.unexpected("end of input");
    }

    Ok(Shader { name, sub_shaders, location })
  }

  fn parse_sub_shader(&mut self) -> Result<SubShader, CompileError> {
    let location = self.expect_keyword("SubShader")?.location;
    let name = if self.peek().kind == TokenKind::String { Some(self.bump()?.lexeme) } else { None };
    let mut tags = Vec::new();
    let mut render_states = Vec::new();
    let mut passes = Vec::new();

    self.expect_punct('{')?;

    loop {
      let token = self.peek();

      if token.is_keyword("Tags") {
        self.parse_tags(&mut tags)?;
      } else if token.is_keyword("RenderState") {
        self.parse_render_state(&mut render_states)?;
      } else if token.is_keyword("Pass") {
        passes.push(self.parse_pass()?);
      } else if token.is_punct('}') && !passes.is_empty() {
        self.bump()?;
        break;
      } else if token.is_punct('}') {
        return self.unexpected("`Pass`");
      } else {
        return self.unexpected("`Tags`, `RenderState`, `Pass` or `}`");
      }
    }

    Ok(SubShader { name, tags, render_states, passes, location })
  }

  fn parse_pass(&mut self) -> Result<Pass, CompileError> {
    let location = self.expect_keyword("Pass")?.location;
    let name = self.parse_name("pass name")?;
    let mut tags = Vec::new();
    let mut render_states = Vec::new();
    let mut vertex = None;
    let mut fragment = None;

    self.expect_punct('{')?;

    loop {
      let token = self.peek();

      if token.is_keyword("Tags") {
        self.parse_tags(&mut tags)?;
      } else if token.is_keyword("RenderState") {
        self.parse_render_state(&mut render_states)?;
      } else if token.is_keyword("VertexShader") && vertex.is_none() {
        vertex = Some(self.parse_code_block(ShaderStage::Vertex)?);
      } else if token.is_keyword("FragmentShader") && fragment.is_none() {
        fragment = Some(self.parse_code_block(ShaderStage::Fragment)?);
      } else if token.is_punct('}') {
        match (vertex, fragment) {
          (Some(vertex), Some(fragment)) => {
            self.bump()?;
            return Ok(Pass { name, tags, render_states, vertex, fragment, location });
          }
          (None, _) => return self.unexpected("`VertexShader`"),
          (_, None) => return self.unexpected("`FragmentShader`")
        }
      } else {
        return self.unexpected("`Tags`, `RenderState`, a single `VertexShader`, a single `FragmentShader` or `}`");
      }
    }
  }

  fn parse_tags(&mut self, tags: &mut Vec<TagDecl>) -> Result<(), CompileError> {
    self.expect_keyword("Tags")?;
    self.expect_punct('{')?;

    while !self.peek().is_punct('}') {
      let location = self.peek().location;
      let key = self.parse_name("tag name or `}`")?;

      self.expect_punct('=')?;

      let value = self.parse_tag_value()?;
      tags.push(TagDecl { key, value, location });

      self.skip_separator()?;
    }

    self.bump()?;
    Ok(())
  }

  fn parse_tag_value(&mut self) -> Result<TagValue, CompileError> {
    let token = self.peek();

    if token.is_keyword("true") || token.is_keyword("false") {
      Ok(TagValue::Bool(self.bump()?.lexeme == "true"))
    } else if token.kind == TokenKind::String {
      Ok(TagValue::String(self.bump()?.lexeme))
    } else if token.kind == TokenKind::Number || token.is_punct('-') {
      Ok(TagValue::Number(self.parse_signed_number()?))
    } else {
      self.unexpected("tag value (boolean, number or string)")
    }
  }

  fn parse_signed_number(&mut self) -> Result<f64, CompileError> {
    let negative = if self.peek().is_punct('-') {
      self.bump()?;
      true
    } else {
      false
    };

    if self.peek().kind != TokenKind::Number {
      return self.unexpected("number");
    }

    let token = self.bump()?;

    match number_value(&token.lexeme) {
      Some(n) if negative => Ok(-n),
      Some(n) => Ok(n),
      None => Err(ParseError::new("number", &token).into())
    }
  }

  // Identifier ('.' Identifier)*
  fn parse_dotted_path(&mut self) -> Result<Vec<Token>, CompileError> {
    let mut path = vec![self.expect_identifier()?];

    while self.peek().is_punct('.') {
      self.bump()?;
      path.push(self.expect_identifier()?);
    }

    Ok(path)
  }

  fn parse_render_state(&mut self, decls: &mut Vec<RenderStateDecl>) -> Result<(), CompileError> {
    self.expect_keyword("RenderState")?;
    self.expect_punct('{')?;

    while !self.peek().is_punct('}') {
      if self.peek().kind != TokenKind::Identifier {
        return self.unexpected("render state key or `}`");
      }

      let location = self.peek().location;
      let key = self.parse_render_state_key()?;

      self.expect_punct('=')?;

      let value = self.parse_render_state_value()?;
      decls.push(RenderStateDecl { key, value, location });

      self.skip_separator()?;
    }

    self.bump()?;
    Ok(())
  }

  fn parse_render_state_key(&mut self) -> Result<RenderStateKey, CompileError> {
    let path = self.parse_dotted_path()?;
    let joined = join_path(&path);

    let property = match RenderStateProperty::from_path(&joined) {
      Some(property) => property,
      None => {
        let mut err = ParseError::new("render state key", &path[0]);
        err.lexeme = joined;
        return Err(err.into());
      }
    };

    if !(property.is_indexed() && self.peek().is_punct('[')) {
      return Ok(RenderStateKey::new(property));
    }

    self.bump()?;

    let expected = format!("render target index (0 to {})", MAX_TARGET_INDEX);

    if self.peek().kind != TokenKind::Number {
      return self.unexpected(expected);
    }

    let token = self.bump()?;
    let index = match token.lexeme.parse::<u8>() {
      Ok(index) if index <= MAX_TARGET_INDEX => index,
      _ => return Err(ParseError::new(expected, &token).into())
    };

    self.expect_punct(']')?;

    Ok(RenderStateKey::indexed(property, index))
  }

  fn parse_render_state_value(&mut self) -> Result<RenderStateValue, CompileError> {
    let token = self.peek();

    if token.is_keyword("true") || token.is_keyword("false") {
      let b = self.bump()?.lexeme == "true";
      Ok(RenderStateValue::Literal(Literal::Bool(b)))
    } else if token.kind == TokenKind::Number || token.is_punct('-') {
      Ok(RenderStateValue::Literal(Literal::Number(self.parse_signed_number()?)))
    } else if token.kind == TokenKind::String {
      Ok(RenderStateValue::Literal(Literal::String(self.bump()?.lexeme)))
    } else if token.kind == TokenKind::Identifier {
      let path = self.parse_dotted_path()?;

      if path.len() == 1 && path[0].lexeme == "Color" && self.peek().is_punct('(') {
        return Ok(RenderStateValue::Literal(Literal::Color(self.parse_color()?)));
      }

      if let (2, Some(ty)) = (path.len(), EnumType::from_name(&path[0].lexeme)) {
        return match EnumConstant::new(ty, &path[1].lexeme) {
          Some(c) => Ok(RenderStateValue::Literal(Literal::Enum(c))),
          None => Err(ParseError::new(format!("variant of `{}`", ty.name()), &path[1]).into())
        };
      }

      Ok(RenderStateValue::Property(join_path(&path)))
    } else {
      self.unexpected("render state value (literal or property name)")
    }
  }

  // '(' number (',' number)* ')', three or four components
  fn parse_color(&mut self) -> Result<[f32; 4], CompileError> {
    let mut components = Vec::with_capacity(4);

    self.expect_punct('(')?;

    loop {
      components.push(self.parse_signed_number()? as f32);

      if self.peek().is_punct(',') {
        self.bump()?;
      } else {
        break;
      }
    }

    match components[..] {
      [r, g, b] => {
        self.expect_punct(')')?;
        Ok([r, g, b, 1.])
      }
      [r, g, b, a] => {
        self.expect_punct(')')?;
        Ok([r, g, b, a])
      }
      _ => self.unexpected("color with 3 or 4 components")
    }
  }

  // The block extent is found by balancing braces; its content is kept verbatim.
  fn parse_code_block(&mut self, stage: ShaderStage) -> Result<CodeBlock, CompileError> {
    self.bump()?; // VertexShader / FragmentShader

    let open = self.expect_punct('{')?;
    let start = open.end;
    let mut body = Vec::new();
    let mut depth = 1usize;

    loop {
      let token = self.peek();

      if token.is_eof() {
        return self.unexpected("`}`");
      }

      if token.is_punct('{') {
        depth += 1;
      } else if token.is_punct('}') {
        depth -= 1;

        if depth == 0 {
          break;
        }
      }

      body.push(self.bump()?);
    }

    let end = self.bump()?.location.offset;

    Ok(CodeBlock {
      stage,
      raw_text: self.src[start..end].to_owned(),
      location: Location {
        line: open.location.line,
        column: open.location.column + 1,
        offset: start
      },
      include_directives: include::directives(&body, start)
    })
  }
}

fn eof(location: Location, end: usize) -> Token {
  Token {
    kind: TokenKind::Eof,
    lexeme: String::new(),
    location,
    end
  }
}

fn join_path(path: &[Token]) -> String {
  path.iter().map(|t| t.lexeme.as_str()).collect::<Vec<_>>().join(".")
}

// Numeric value of a number lexeme; integer suffixes and float suffixes are dropped.
fn number_value(lexeme: &str) -> Option<f64> {
  if lexeme.starts_with("0x") || lexeme.starts_with("0X") {
    let digits = lexeme[2..].trim_end_matches(|c| c == 'u' || c == 'U');
    return u64::from_str_radix(digits, 16).ok().map(|n| n as f64);
  }

  lexeme.trim_end_matches(|c| c == 'u' || c == 'U' || c == 'f' || c == 'F').parse().ok()
}

/// Parse a shader description.
pub fn parse(src: &str) -> Result<Shader, CompileError> {
  Parser::new(src, Lexer::new(src))?.parse_shader()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::render_state::RenderStateProperty as P;

  const MINIMAL: &str = r#"
Shader "unlit" {
  SubShader {
    Pass "forward" {
      VertexShader { void main() { gl_Position = vec4(0.0); } }
      FragmentShader { void main() { gl_FragColor = vec4(1.0); } }
    }
  }
}
"#;

  fn parse_err(src: &str) -> ParseError {
    match parse(src) {
      Err(CompileError::Parse(err)) => err,
      r => panic!("expected a parse error, got {:?}", r)
    }
  }

  fn wrap_pass(pass_body: &str) -> String {
    format!(
      "Shader \"s\" {{ SubShader {{ Pass \"p\" {{ {} VertexShader {{ }} FragmentShader {{ }} }} }} }}",
      pass_body
    )
  }

  fn pass_states(pass_body: &str) -> Vec<RenderStateDecl> {
    parse(&wrap_pass(pass_body)).unwrap().sub_shaders.remove(0).passes.remove(0).render_states
  }

  #[test]
  fn minimal_shader() {
    let shader = parse(MINIMAL).unwrap();

    assert_eq!(shader.name, "unlit");
    assert_eq!(shader.sub_shaders.len(), 1);

    let pass = &shader.sub_shaders[0].passes[0];

    assert_eq!(pass.name, "forward");
    assert_eq!(pass.vertex.raw_text, " void main() { gl_Position = vec4(0.0); } ");
    assert_eq!(pass.fragment.stage, ShaderStage::Fragment);
    assert_eq!(pass.vertex.location.line, 5);
  }

  #[test]
  fn code_block_location_points_inside_braces() {
    let shader = parse(MINIMAL).unwrap();
    let block = &shader.sub_shaders[0].passes[0].vertex;

    assert_eq!(&MINIMAL[block.location.offset..block.location.offset + 5], " void");
  }

  #[test]
  fn order_is_preserved() {
    let src = r#"
Shader "s" {
  SubShader "a" {
    Pass "p1" { VertexShader { } FragmentShader { } }
    Pass p2 { VertexShader { } FragmentShader { } }
  }
  SubShader "b" {
    Pass "p3" { VertexShader { } FragmentShader { } }
  }
}"#;
    let shader = parse(src).unwrap();
    let names: Vec<_> = shader.sub_shaders.iter()
      .flat_map(|s| s.passes.iter().map(|p| p.name.as_str()))
      .collect();

    assert_eq!(names, vec!["p1", "p2", "p3"]);
    assert_eq!(shader.sub_shaders[1].name.as_deref(), Some("b"));
  }

  #[test]
  fn tags() {
    let src = wrap_pass(r#"Tags { "pipelineStage" = "Forward", priority = -2, castShadow = false; }"#);
    let shader = parse(&src).unwrap();
    let tags = &shader.sub_shaders[0].passes[0].tags;

    assert_eq!(tags.len(), 3);
    assert_eq!(tags[0].value, TagValue::String("Forward".to_owned()));
    assert_eq!(tags[1].key, "priority");
    assert_eq!(tags[1].value, TagValue::Number(-2.));
    assert_eq!(tags[2].value, TagValue::Bool(false));
  }

  #[test]
  fn render_state_literals_and_properties() {
    let states = pass_states(r#"
      RenderState {
        BlendState.Enabled = true,
        BlendState.SrcFactor = material.blendSrc,
        BlendState.BlendColor = Color(1, 0.5, 0),
        DepthState.CompareFunction = CompareFunction.LessEqual;
        RasterState.DepthBias = -0.5
        StencilState.ReferenceValue = 0x10
        RenderQueueType = queueType
      }"#);

    assert_eq!(states.len(), 7);
    assert_eq!(states[0].key, RenderStateKey::new(P::BlendEnabled));
    assert_eq!(states[0].value, RenderStateValue::Literal(Literal::Bool(true)));
    assert_eq!(states[1].value, RenderStateValue::Property("material.blendSrc".to_owned()));
    assert_eq!(states[2].value, RenderStateValue::Literal(Literal::Color([1., 0.5, 0., 1.])));
    assert_eq!(states[3].value, RenderStateValue::Literal(Literal::Enum(
      EnumConstant::new(EnumType::CompareFunction, "LessEqual").unwrap()
    )));
    assert_eq!(states[4].value, RenderStateValue::Literal(Literal::Number(-0.5)));
    assert_eq!(states[5].value, RenderStateValue::Literal(Literal::Number(16.)));
    assert_eq!(states[6].value, RenderStateValue::Property("queueType".to_owned()));
  }

  #[test]
  fn indexed_render_state() {
    let states = pass_states("RenderState { BlendState.Enabled[2] = true }");
    assert_eq!(states[0].key, RenderStateKey::indexed(P::BlendEnabled, 2));
  }

  #[test]
  fn index_out_of_range() {
    let err = parse_err(&wrap_pass("RenderState { BlendState.Enabled[8] = true }"));

    assert_eq!(err.found, TokenKind::Number);
    assert_eq!(err.lexeme, "8");
  }

  #[test]
  fn unknown_render_state_key() {
    let err = parse_err(&wrap_pass("RenderState { BlendState.Wat = true }"));

    assert_eq!(err.expected, "render state key");
    assert_eq!(err.lexeme, "BlendState.Wat");
  }

  #[test]
  fn unknown_enum_variant() {
    let err = parse_err(&wrap_pass("RenderState { RasterState.CullMode = CullMode.Sideways }"));

    assert_eq!(err.expected, "variant of `CullMode`");
    assert_eq!(err.lexeme, "Sideways");
  }

  #[test]
  fn missing_closing_brace() {
    let err = parse_err("Shader \"s\" { SubShader { Pass \"p\" { RenderState { } ");

    assert_eq!(err.found, TokenKind::Eof);
  }

  #[test]
  fn unterminated_code_block() {
    let err = parse_err("Shader \"s\" { SubShader { Pass \"p\" { VertexShader { void main() { }");

    assert_eq!(err.expected, "`}`");
    assert_eq!(err.found, TokenKind::Eof);
  }

  #[test]
  fn pass_requires_both_stages() {
    let err = parse_err("Shader \"s\" { SubShader { Pass \"p\" { VertexShader { } } } }");

    assert_eq!(err.expected, "`FragmentShader`");
    assert!(err.lexeme == "}");
  }

  #[test]
  fn duplicate_stage() {
    let err = parse_err(&wrap_pass("VertexShader { }"));
    assert_eq!(err.lexeme, "VertexShader");
  }

  #[test]
  fn empty_shader() {
    let err = parse_err("Shader \"s\" { }");

    assert_eq!(err.expected, "`SubShader`");
    assert_eq!(err.location, Location { line: 1, column: 14, offset: 13 });
  }

  #[test]
  fn trailing_tokens() {
    let err = parse_err(&format!("{} extra", MINIMAL));
    assert_eq!(err.expected, "end of input");
  }

  #[test]
  fn lex_errors_abort() {
    match parse("Shader \"s\" { /* ") {
      Err(CompileError::Lex(_)) => (),
      r => panic!("expected a lex error, got {:?}", r)
    }
  }

  #[test]
  fn include_directives_are_recorded() {
    let src = wrap_pass("").replace("VertexShader { }", "VertexShader { #include \"common.glsl\"\n }");
    let shader = parse(&src).unwrap();
    let block = &shader.sub_shaders[0].passes[0].vertex;

    assert_eq!(block.include_directives.len(), 1);

    let directive = &block.include_directives[0];

    assert_eq!(directive.path, "common.glsl");
    assert_eq!(&block.raw_text[directive.span.clone()], "#include \"common.glsl\"");
  }
}
