//! Lexer.
//!
//! The same lexical rules are used for the shader description itself and for the GLSL-like code
//! blocks it embeds: identifiers, numbers, strings and single-character punctuation. Whitespace
//! and comments are recognized and dropped.
//!
//! The lexer is lazy: it’s an iterator that yields tokens on demand and always terminates with a
//! single `TokenKind::Eof` token. It can be cloned to restart from any point.

use std::error::Error;
use std::fmt;

/// Words that have a meaning in the shader description language.
pub const KEYWORDS: &[&str] = &[
  "Shader",
  "SubShader",
  "Pass",
  "Tags",
  "RenderState",
  "VertexShader",
  "FragmentShader",
  "true",
  "false"
];

/// Position of a character in a piece of text.
///
/// Lines and columns start at 1; the offset is in bytes and starts at 0.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Location {
  pub line: u32,
  pub column: u32,
  pub offset: usize
}

impl Location {
  /// Location of the very first character of a text.
  pub fn start() -> Self {
    Location {
      line: 1,
      column: 1,
      offset: 0
    }
  }
}

impl Default for Location {
  fn default() -> Self {
    Location::start()
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "{}:{}", self.line, self.column)
  }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TokenKind {
  Identifier,
  Number,
  /// Double-quoted string; the lexeme holds the unescaped content, without the quotes.
  String,
  Keyword,
  Punctuation,
  Eof
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    let s = match *self {
      TokenKind::Identifier => "identifier",
      TokenKind::Number => "number",
      TokenKind::String => "string",
      TokenKind::Keyword => "keyword",
      TokenKind::Punctuation => "punctuation",
      TokenKind::Eof => "end of input"
    };

    f.write_str(s)
  }
}

/// A token.
///
/// `location` is where the token starts and `end` the byte offset right after its last character.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub location: Location,
  pub end: usize
}

impl Token {
  pub fn is_keyword(&self, keyword: &str) -> bool {
    self.kind == TokenKind::Keyword && self.lexeme == keyword
  }

  pub fn is_punct(&self, c: char) -> bool {
    self.kind == TokenKind::Punctuation && self.lexeme.len() == 1 && self.lexeme.starts_with(c)
  }

  pub fn is_identifier(&self, name: &str) -> bool {
    self.kind == TokenKind::Identifier && self.lexeme == name
  }

  pub fn is_eof(&self) -> bool {
    self.kind == TokenKind::Eof
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LexErrorKind {
  UnterminatedComment,
  UnterminatedString,
  IllegalCharacter(char)
}

impl fmt::Display for LexErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      LexErrorKind::UnterminatedComment => f.write_str("unterminated block comment"),
      LexErrorKind::UnterminatedString => f.write_str("unterminated string literal"),
      LexErrorKind::IllegalCharacter(c) => write!(f, "illegal character {:?}", c)
    }
  }
}

/// Error that might occur while lexing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LexError {
  pub kind: LexErrorKind,
  pub location: Location
}

impl fmt::Display for LexError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "{}: {}", self.location, self.kind)
  }
}

impl Error for LexError {}

#[derive(Clone, Debug)]
pub struct Lexer<'a> {
  src: &'a str,
  loc: Location,
  done: bool
}

impl<'a> Lexer<'a> {
  pub fn new(src: &'a str) -> Self {
    Lexer {
      src,
      loc: Location::start(),
      done: false
    }
  }

  /// Current position of the lexer.
  pub fn location(&self) -> Location {
    self.loc
  }

  fn peek(&self) -> Option<char> {
    self.src[self.loc.offset..].chars().next()
  }

  fn peek_at(&self, n: usize) -> Option<char> {
    self.src[self.loc.offset..].chars().nth(n)
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek()?;

    self.loc.offset += c.len_utf8();

    if c == '\n' {
      self.loc.line += 1;
      self.loc.column = 1;
    } else {
      self.loc.column += 1;
    }

    Some(c)
  }

  fn bump_while<F>(&mut self, pred: F) where F: Fn(char) -> bool {
    while self.peek().map_or(false, &pred) {
      self.bump();
    }
  }

  // Skip whitespace and comments.
  fn skip_trivia(&mut self) -> Result<(), LexError> {
    loop {
      match (self.peek(), self.peek_at(1)) {
        (Some(c), _) if c.is_whitespace() => {
          self.bump();
        }

        (Some('/'), Some('/')) => {
          self.bump_while(|c| c != '\n');
        }

        (Some('/'), Some('*')) => {
          let start = self.loc;
          self.bump();
          self.bump();

          loop {
            match self.bump() {
              Some('*') if self.peek() == Some('/') => {
                self.bump();
                break;
              }
              Some(_) => (),
              None => {
                return Err(LexError { kind: LexErrorKind::UnterminatedComment, location: start });
              }
            }
          }
        }

        _ => return Ok(())
      }
    }
  }

  fn lex_identifier(&mut self) -> TokenKind {
    let start = self.loc.offset;
    self.bump_while(|c| c.is_ascii_alphanumeric() || c == '_');

    if KEYWORDS.contains(&&self.src[start..self.loc.offset]) {
      TokenKind::Keyword
    } else {
      TokenKind::Identifier
    }
  }

  fn lex_number(&mut self) {
    if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
      self.bump();
      self.bump();
      self.bump_while(|c| c.is_ascii_hexdigit());
    } else {
      self.bump_while(|c| c.is_ascii_digit());

      if self.peek() == Some('.') {
        self.bump();
        self.bump_while(|c| c.is_ascii_digit());
      }

      // exponent, only when actually followed by digits
      if let Some('e') | Some('E') = self.peek() {
        let digit_at = if let Some('+') | Some('-') = self.peek_at(1) { 2 } else { 1 };

        if self.peek_at(digit_at).map_or(false, |c| c.is_ascii_digit()) {
          for _ in 0..digit_at {
            self.bump();
          }

          self.bump_while(|c| c.is_ascii_digit());
        }
      }
    }

    if let Some('u') | Some('U') | Some('f') | Some('F') = self.peek() {
      self.bump();
    }
  }

  fn lex_string(&mut self, start: Location) -> Result<String, LexError> {
    let unterminated = LexError { kind: LexErrorKind::UnterminatedString, location: start };
    let mut content = String::new();

    // opening quote
    self.bump();

    loop {
      match self.bump() {
        Some('"') => return Ok(content),
        Some('\\') => {
          match self.bump() {
            Some('n') => content.push('\n'),
            Some('t') => content.push('\t'),
            Some(c) if c != '\n' => content.push(c),
            _ => return Err(unterminated)
          }
        }
        Some('\n') | None => return Err(unterminated),
        Some(c) => content.push(c)
      }
    }
  }

  fn next_token(&mut self) -> Result<Token, LexError> {
    self.skip_trivia()?;

    let start = self.loc;

    let (kind, lexeme) = match self.peek() {
      None => (TokenKind::Eof, String::new()),

      Some(c) if c.is_ascii_alphabetic() || c == '_' => {
        let kind = self.lex_identifier();
        (kind, self.src[start.offset..self.loc.offset].to_owned())
      }

      Some(c) if c.is_ascii_digit() || (c == '.' && self.peek_at(1).map_or(false, |c| c.is_ascii_digit())) => {
        self.lex_number();
        (TokenKind::Number, self.src[start.offset..self.loc.offset].to_owned())
      }

      Some('"') => (TokenKind::String, self.lex_string(start)?),

      Some(c) if c.is_ascii_punctuation() => {
        self.bump();
        (TokenKind::Punctuation, c.to_string())
      }

      Some(c) => {
        return Err(LexError { kind: LexErrorKind::IllegalCharacter(c), location: start });
      }
    };

    Ok(Token {
      kind,
      lexeme,
      location: start,
      end: self.loc.offset
    })
  }
}

impl<'a> Iterator for Lexer<'a> {
  type Item = Result<Token, LexError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    let token = self.next_token();

    match token {
      Ok(ref t) if !t.is_eof() => (),
      _ => self.done = true
    }

    Some(token)
  }
}

/// Lex a whole text at once.
///
/// The returned vector always ends with the `TokenKind::Eof` token.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
  Lexer::new(src).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(src: &str) -> Vec<(TokenKind, String)> {
    tokenize(src).unwrap().into_iter().map(|t| (t.kind, t.lexeme)).collect()
  }

  #[test]
  fn classify_tokens() {
    let tokens = kinds("Pass \"forward\" { a_pos = 1.5e-3; }");

    assert_eq!(tokens, vec![
      (TokenKind::Keyword, "Pass".to_owned()),
      (TokenKind::String, "forward".to_owned()),
      (TokenKind::Punctuation, "{".to_owned()),
      (TokenKind::Identifier, "a_pos".to_owned()),
      (TokenKind::Punctuation, "=".to_owned()),
      (TokenKind::Number, "1.5e-3".to_owned()),
      (TokenKind::Punctuation, ";".to_owned()),
      (TokenKind::Punctuation, "}".to_owned()),
      (TokenKind::Eof, String::new())
    ]);
  }

  #[test]
  fn numeric_forms() {
    let lexemes: Vec<_> = tokenize("0 42 3.14 .5 2. 0xFF 1e10 7u 1.0f").unwrap().into_iter()
      .filter(|t| t.kind == TokenKind::Number)
      .map(|t| t.lexeme)
      .collect();

    assert_eq!(lexemes, vec!["0", "42", "3.14", ".5", "2.", "0xFF", "1e10", "7u", "1.0f"]);
  }

  #[test]
  fn member_access_is_not_a_number() {
    let tokens = kinds("v.xy");

    assert_eq!(tokens[0], (TokenKind::Identifier, "v".to_owned()));
    assert_eq!(tokens[1], (TokenKind::Punctuation, ".".to_owned()));
    assert_eq!(tokens[2], (TokenKind::Identifier, "xy".to_owned()));
  }

  #[test]
  fn comments_are_skipped() {
    let tokens = kinds("a // line comment\n/* block\ncomment */ b");

    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[1].1, "b");
  }

  #[test]
  fn locations() {
    let tokens = tokenize("a\n  bc").unwrap();

    assert_eq!(tokens[1].location, Location { line: 2, column: 3, offset: 4 });
    assert_eq!(tokens[1].end, 6);
  }

  #[test]
  fn unterminated_block_comment() {
    let err = tokenize("a /* never closed").unwrap_err();

    assert_eq!(err.kind, LexErrorKind::UnterminatedComment);
    assert_eq!(err.location, Location { line: 1, column: 3, offset: 2 });
  }

  #[test]
  fn unterminated_string() {
    let err = tokenize("Shader \"oops\n").unwrap_err();

    assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    assert_eq!(err.location.column, 8);
  }

  #[test]
  fn illegal_character() {
    let err = tokenize("a é").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::IllegalCharacter('é'));
  }

  #[test]
  fn restartable() {
    let mut lexer = Lexer::new("a b c");
    lexer.next();

    let fork = lexer.clone();

    assert_eq!(lexer.count(), 3);
    assert_eq!(fork.count(), 3);
  }

  #[test]
  fn stops_after_eof() {
    let mut lexer = Lexer::new("");

    assert!(lexer.next().unwrap().unwrap().is_eof());
    assert!(lexer.next().is_none());
  }
}
