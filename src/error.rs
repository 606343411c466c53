//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – every error carries the
//! source position (line, column) where it was detected and renders as a
//! single human-readable line. The pipeline stops at the first error in a
//! stage; no recovery is attempted and no assembly is produced on failure.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("lex error at line {line}, column {column}: {message}"))]
  Lex {
    line: usize,
    column: usize,
    message: String,
  },

  #[snafu(display("parse error at line {line}, column {column}: {message}"))]
  Parse {
    line: usize,
    column: usize,
    message: String,
  },

  #[snafu(display(
    "semantic error at line {line}, column {column}: use of undeclared variable '{name}'"
  ))]
  UndeclaredName {
    name: String,
    line: usize,
    column: usize,
  },

  #[snafu(display("semantic error at line {line}, column {column}: redeclaration of '{name}'"))]
  Redeclaration {
    name: String,
    line: usize,
    column: usize,
  },

  #[snafu(display(
    "semantic error at line {line}, column {column}: out of zero-page slots for variables"
  ))]
  OutOfSlots { line: usize, column: usize },

  #[snafu(display("internal error: {message}"))]
  Internal { message: String },
}

impl CompileError {
  /// Construct a lexical error anchored at a source position.
  pub fn lex(line: usize, column: usize, message: impl Into<String>) -> Self {
    Self::Lex {
      line,
      column,
      message: message.into(),
    }
  }

  /// Construct a syntax error anchored at a source position.
  pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
    Self::Parse {
      line,
      column,
      message: message.into(),
    }
  }

  /// Construct an internal invariant failure. Unreachable with a valid AST.
  pub fn internal(message: impl Into<String>) -> Self {
    Self::Internal {
      message: message.into(),
    }
  }
}
