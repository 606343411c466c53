//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer is intentionally tiny – it knows nothing about semantics
//! beyond recognising keywords, operators and numeric literals.
//! Multi-character operators are matched before single-character ones to
//! avoid ambiguity, and every token records the line and column where it
//! started so later stages can point at the offending source.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  // Keywords
  Var,
  If,
  Else,
  While,
  Do,
  Input,
  Output,

  // Punctuation
  Semicolon,
  OpenParen,
  CloseParen,
  OpenBrace,
  CloseBrace,
  Comma,

  // Operators
  Assign,
  Plus,
  Minus,
  Increment,
  Decrement,
  LogicAnd,
  LogicOr,
  LogicXor,
  LogicNot,
  BitAnd,
  BitOr,
  BitXor,
  BitNot,
  ShiftLeft,
  ShiftRight,
  LessThan,
  LessEq,
  GreaterThan,
  GreaterEq,
  Equal,
  NotEqual,

  Num,
  Ident,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub value: Option<u8>,
  pub line: usize,
  pub column: usize,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
    Self {
      kind,
      lexeme: lexeme.into(),
      value: None,
      line,
      column,
    }
  }
}

// Two-character operators first so the scan is greedy longest-first.
const OPERATORS: &[(&str, TokenKind)] = &[
  ("==", TokenKind::Equal),
  ("!=", TokenKind::NotEqual),
  ("<=", TokenKind::LessEq),
  (">=", TokenKind::GreaterEq),
  ("<<", TokenKind::ShiftLeft),
  (">>", TokenKind::ShiftRight),
  ("&&", TokenKind::LogicAnd),
  ("||", TokenKind::LogicOr),
  ("^^", TokenKind::LogicXor),
  ("++", TokenKind::Increment),
  ("--", TokenKind::Decrement),
  ("=", TokenKind::Assign),
  ("+", TokenKind::Plus),
  ("-", TokenKind::Minus),
  ("&", TokenKind::BitAnd),
  ("|", TokenKind::BitOr),
  ("^", TokenKind::BitXor),
  ("~", TokenKind::BitNot),
  ("!", TokenKind::LogicNot),
  ("<", TokenKind::LessThan),
  (">", TokenKind::GreaterThan),
  (";", TokenKind::Semicolon),
  ("(", TokenKind::OpenParen),
  (")", TokenKind::CloseParen),
  ("{", TokenKind::OpenBrace),
  ("}", TokenKind::CloseBrace),
  (",", TokenKind::Comma),
];

fn keyword_kind(ident: &str) -> Option<TokenKind> {
  match ident {
    "var" => Some(TokenKind::Var),
    "if" => Some(TokenKind::If),
    "else" => Some(TokenKind::Else),
    "while" => Some(TokenKind::While),
    "do" => Some(TokenKind::Do),
    "input" => Some(TokenKind::Input),
    "output" => Some(TokenKind::Output),
    _ => None,
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;
  let mut line = 1;
  let mut column = 1;

  while i < bytes.len() {
    let c = bytes[i];

    if c.is_ascii_whitespace() {
      if c == b'\n' {
        line += 1;
        column = 1;
      } else {
        column += 1;
      }
      i += 1;
      continue;
    }

    // Line comment: runs to the end of the line.
    if input[i..].starts_with("//") {
      while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
        column += 1;
      }
      continue;
    }

    // Block comment: may span lines; missing terminator is a lex error.
    if input[i..].starts_with("/*") {
      let (start_line, start_column) = (line, column);
      i += 2;
      column += 2;
      loop {
        if i >= bytes.len() {
          return Err(CompileError::lex(
            start_line,
            start_column,
            "unterminated block comment",
          ));
        }
        if input[i..].starts_with("*/") {
          i += 2;
          column += 2;
          break;
        }
        if bytes[i] == b'\n' {
          line += 1;
          column = 1;
        } else {
          column += 1;
        }
        i += 1;
      }
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<u32>()
        .ok()
        .filter(|n| *n <= 255)
        .ok_or_else(|| {
          CompileError::lex(
            line,
            column,
            format!("integer literal out of range 0-255: {text}"),
          )
        })?;
      let mut token = Token::new(TokenKind::Num, text, line, column);
      token.value = Some(value as u8);
      tokens.push(token);
      column += text.len();
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let text = &input[start..i];
      let kind = keyword_kind(text).unwrap_or(TokenKind::Ident);
      tokens.push(Token::new(kind, text, line, column));
      column += text.len();
      continue;
    }

    if let Some((symbol, kind)) = OPERATORS
      .iter()
      .find(|(symbol, _)| input[i..].starts_with(symbol))
    {
      tokens.push(Token::new(*kind, *symbol, line, column));
      i += symbol.len();
      column += symbol.len();
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::lex(
      line,
      column,
      format!("unexpected character: '{invalid_char}'"),
    ));
  }

  tokens.push(Token::new(TokenKind::Eof, "", line, column));
  Ok(tokens)
}

/// Human-friendly spelling of a token kind, used in diagnostics.
pub fn kind_name(kind: TokenKind) -> &'static str {
  match kind {
    TokenKind::Var => "var",
    TokenKind::If => "if",
    TokenKind::Else => "else",
    TokenKind::While => "while",
    TokenKind::Do => "do",
    TokenKind::Input => "input",
    TokenKind::Output => "output",
    TokenKind::Semicolon => ";",
    TokenKind::OpenParen => "(",
    TokenKind::CloseParen => ")",
    TokenKind::OpenBrace => "{",
    TokenKind::CloseBrace => "}",
    TokenKind::Comma => ",",
    TokenKind::Assign => "=",
    TokenKind::Plus => "+",
    TokenKind::Minus => "-",
    TokenKind::Increment => "++",
    TokenKind::Decrement => "--",
    TokenKind::LogicAnd => "&&",
    TokenKind::LogicOr => "||",
    TokenKind::LogicXor => "^^",
    TokenKind::LogicNot => "!",
    TokenKind::BitAnd => "&",
    TokenKind::BitOr => "|",
    TokenKind::BitXor => "^",
    TokenKind::BitNot => "~",
    TokenKind::ShiftLeft => "<<",
    TokenKind::ShiftRight => ">>",
    TokenKind::LessThan => "<",
    TokenKind::LessEq => "<=",
    TokenKind::GreaterThan => ">",
    TokenKind::GreaterEq => ">=",
    TokenKind::Equal => "==",
    TokenKind::NotEqual => "!=",
    TokenKind::Num => "integer literal",
    TokenKind::Ident => "identifier",
    TokenKind::Eof => "EOF",
  }
}

/// Human-friendly description of a concrete token, used in diagnostics.
pub fn describe_token(token: &Token) -> String {
  match token.kind {
    TokenKind::Eof => "EOF".to_string(),
    _ => token.lexeme.clone(),
  }
}
