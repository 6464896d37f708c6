//! Compilation errors.

use std::error::Error;
use std::fmt;

use crate::codegen::CodegenError;
use crate::compiler::Stage;
use crate::include::IncludeError;
use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::symbol::SymbolError;

/// Any error that aborts a compilation.
#[derive(Clone, Debug, PartialEq)]
pub enum CompileError {
  Lex(LexError),
  Parse(ParseError),
  Include(IncludeError),
  Symbol(SymbolError),
  Codegen(CodegenError)
}

impl CompileError {
  /// Stage of the compilation that failed.
  pub fn stage(&self) -> Stage {
    match *self {
      CompileError::Lex(_) => Stage::Lexing,
      CompileError::Parse(_) => Stage::Parsing,
      CompileError::Include(_) => Stage::IncludeExpansion,
      CompileError::Symbol(_) => Stage::SymbolCollection,
      CompileError::Codegen(_) => Stage::CodeGeneration
    }
  }
}

impl fmt::Display for CompileError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      CompileError::Lex(ref e) => write!(f, "lexing error: {}", e),
      CompileError::Parse(ref e) => write!(f, "parse error: {}", e),
      CompileError::Include(ref e) => write!(f, "include error: {}", e),
      CompileError::Symbol(ref e) => write!(f, "symbol error: {}", e),
      CompileError::Codegen(ref e) => write!(f, "code generation error: {}", e)
    }
  }
}

impl Error for CompileError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match *self {
      CompileError::Lex(ref e) => Some(e),
      CompileError::Parse(ref e) => Some(e),
      CompileError::Include(ref e) => Some(e),
      CompileError::Symbol(ref e) => Some(e),
      CompileError::Codegen(ref e) => Some(e)
    }
  }
}

impl From<LexError> for CompileError {
  fn from(e: LexError) -> Self {
    CompileError::Lex(e)
  }
}

impl From<ParseError> for CompileError {
  fn from(e: ParseError) -> Self {
    CompileError::Parse(e)
  }
}

impl From<IncludeError> for CompileError {
  fn from(e: IncludeError) -> Self {
    CompileError::Include(e)
  }
}

impl From<SymbolError> for CompileError {
  fn from(e: SymbolError) -> Self {
    CompileError::Symbol(e)
  }
}

impl From<CodegenError> for CompileError {
  fn from(e: CodegenError) -> Self {
    CompileError::Codegen(e)
  }
}
