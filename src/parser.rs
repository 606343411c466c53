//! Recursive-descent parser producing a statement list and expression AST.
//!
//! Expressions descend through one helper per precedence level, lowest
//! binding first; every binary level loops on its operators so the trees
//! come out left-associative. Statements are parsed by a small dispatcher
//! keyed on the leading token. A quirk of the source language is kept
//! deliberately: the closing `}` of `if`/`while`/`do-while` must itself be
//! followed by `;`.

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, kind_name};

/// Unary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  BitNot,
  LogicNot,
}

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  BitAnd,
  BitOr,
  BitXor,
  ShiftLeft,
  ShiftRight,
  LogicAnd,
  LogicOr,
  LogicXor,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

/// Built-in I/O routines callable from expressions and statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
  Input,
  Output,
}

/// Expression tree produced by the parser.
///
/// `Var` nodes carry their declaration slot once semantic analysis has run;
/// the parser always leaves it `None`.
#[derive(Debug, Clone)]
pub enum Expr {
  Literal {
    value: u8,
  },
  Var {
    name: String,
    line: usize,
    column: usize,
    slot: Option<u8>,
  },
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Call {
    builtin: Builtin,
    args: Vec<Expr>,
  },
}

impl Expr {
  pub fn literal(value: u8) -> Self {
    Self::Literal { value }
  }

  pub fn var(name: impl Into<String>, line: usize, column: usize) -> Self {
    Self::Var {
      name: name.into(),
      line,
      column,
      slot: None,
    }
  }

  pub fn unary(op: UnaryOp, operand: Expr) -> Self {
    Self::Unary {
      op,
      operand: Box::new(operand),
    }
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn call(builtin: Builtin, args: Vec<Expr>) -> Self {
    Self::Call { builtin, args }
  }
}

/// Statements of the language. Assignment targets carry their slot after
/// semantic analysis, mirroring `Expr::Var`.
#[derive(Debug, Clone)]
pub enum Stmt {
  VarDecl {
    name: String,
    line: usize,
    column: usize,
    slot: Option<u8>,
    init: Expr,
  },
  Assign {
    name: String,
    line: usize,
    column: usize,
    slot: Option<u8>,
    value: Expr,
  },
  PostInc {
    name: String,
    line: usize,
    column: usize,
    slot: Option<u8>,
  },
  PostDec {
    name: String,
    line: usize,
    column: usize,
    slot: Option<u8>,
  },
  If {
    cond: Expr,
    then_body: Vec<Stmt>,
    else_body: Option<Vec<Stmt>>,
  },
  While {
    cond: Expr,
    body: Vec<Stmt>,
  },
  DoWhile {
    body: Vec<Stmt>,
    cond: Expr,
  },
  Output {
    value: Expr,
  },
  Expr {
    expr: Expr,
  },
}

#[derive(Debug, Clone)]
pub struct Program {
  pub stmts: Vec<Stmt>,
}

/// Parse a token stream into a program.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens);

  let mut stmts = Vec::new();
  while !stream.is_eof() {
    stmts.push(parse_stmt(&mut stream)?);
  }

  Ok(Program { stmts })
}

// ----- Statement parsing -----

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  match stream.peek_kind() {
    TokenKind::Var => parse_var_decl(stream),
    TokenKind::If => parse_if_stmt(stream),
    TokenKind::While => parse_while_stmt(stream),
    TokenKind::Do => parse_do_while_stmt(stream),
    TokenKind::Output => parse_output_stmt(stream),
    TokenKind::Input => parse_input_stmt(stream),
    TokenKind::Ident => parse_ident_stmt(stream),
    TokenKind::Else => {
      let (line, column) = stream.position();
      Err(CompileError::parse(
        line,
        column,
        "unexpected 'else' without a matching 'if'",
      ))
    }
    _ => {
      let (line, column) = stream.position();
      Err(CompileError::parse(
        line,
        column,
        format!("expected a statement, but got \"{}\"", stream.describe()),
      ))
    }
  }
}

fn parse_var_decl(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip(TokenKind::Var)?;
  let (name, line, column) = stream.get_ident()?;
  stream.skip(TokenKind::Assign)?;
  let init = parse_expr(stream)?;
  stream.skip(TokenKind::Semicolon)?;

  Ok(Stmt::VarDecl {
    name,
    line,
    column,
    slot: None,
    init,
  })
}

/// Assignment, post-increment or post-decrement, all led by an identifier.
fn parse_ident_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let (name, line, column) = stream.get_ident()?;

  let stmt = if stream.equal(TokenKind::Assign) {
    let value = parse_expr(stream)?;
    Stmt::Assign {
      name,
      line,
      column,
      slot: None,
      value,
    }
  } else if stream.equal(TokenKind::Increment) {
    Stmt::PostInc {
      name,
      line,
      column,
      slot: None,
    }
  } else if stream.equal(TokenKind::Decrement) {
    Stmt::PostDec {
      name,
      line,
      column,
      slot: None,
    }
  } else {
    let (line, column) = stream.position();
    return Err(CompileError::parse(
      line,
      column,
      format!(
        "expected \"=\", \"++\" or \"--\" after '{name}', but got \"{}\"",
        stream.describe()
      ),
    ));
  };

  stream.skip(TokenKind::Semicolon)?;
  Ok(stmt)
}

fn parse_if_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip(TokenKind::If)?;
  stream.skip(TokenKind::OpenParen)?;
  let cond = parse_expr(stream)?;
  stream.skip(TokenKind::CloseParen)?;
  let then_body = parse_block(stream)?;

  let else_body = if stream.equal(TokenKind::Else) {
    Some(parse_block(stream)?)
  } else {
    None
  };

  stream.skip(TokenKind::Semicolon)?;
  Ok(Stmt::If {
    cond,
    then_body,
    else_body,
  })
}

fn parse_while_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip(TokenKind::While)?;
  stream.skip(TokenKind::OpenParen)?;
  let cond = parse_expr(stream)?;
  stream.skip(TokenKind::CloseParen)?;
  let body = parse_block(stream)?;
  stream.skip(TokenKind::Semicolon)?;

  Ok(Stmt::While { cond, body })
}

fn parse_do_while_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip(TokenKind::Do)?;
  let body = parse_block(stream)?;
  stream.skip(TokenKind::While)?;
  stream.skip(TokenKind::OpenParen)?;
  let cond = parse_expr(stream)?;
  stream.skip(TokenKind::CloseParen)?;
  stream.skip(TokenKind::Semicolon)?;

  Ok(Stmt::DoWhile { body, cond })
}

fn parse_output_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip(TokenKind::Output)?;
  stream.skip(TokenKind::OpenParen)?;
  let value = parse_expr(stream)?;
  stream.skip(TokenKind::CloseParen)?;
  stream.skip(TokenKind::Semicolon)?;

  Ok(Stmt::Output { value })
}

/// A bare `input();` call. The read value is discarded.
fn parse_input_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip(TokenKind::Input)?;
  stream.skip(TokenKind::OpenParen)?;
  stream.skip(TokenKind::CloseParen)?;
  stream.skip(TokenKind::Semicolon)?;

  Ok(Stmt::Expr {
    expr: Expr::call(Builtin::Input, Vec::new()),
  })
}

fn parse_block(stream: &mut TokenStream) -> CompileResult<Vec<Stmt>> {
  stream.skip(TokenKind::OpenBrace)?;

  let mut stmts = Vec::new();
  while !stream.equal(TokenKind::CloseBrace) {
    if stream.is_eof() {
      let (line, column) = stream.position();
      return Err(CompileError::parse(line, column, "expected \"}\""));
    }
    stmts.push(parse_stmt(stream)?);
  }

  Ok(stmts)
}

// ----- Expression parsing -----
// One helper per precedence level, lowest binding first. Each level loops
// on its operators so chains associate to the left.

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_logic_or(stream)
}

fn parse_logic_or(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_logic_xor(stream)?;

  while stream.equal(TokenKind::LogicOr) {
    let rhs = parse_logic_xor(stream)?;
    node = Expr::binary(BinaryOp::LogicOr, node, rhs);
  }

  Ok(node)
}

fn parse_logic_xor(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_logic_and(stream)?;

  while stream.equal(TokenKind::LogicXor) {
    let rhs = parse_logic_and(stream)?;
    node = Expr::binary(BinaryOp::LogicXor, node, rhs);
  }

  Ok(node)
}

fn parse_logic_and(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_bit_or(stream)?;

  while stream.equal(TokenKind::LogicAnd) {
    let rhs = parse_bit_or(stream)?;
    node = Expr::binary(BinaryOp::LogicAnd, node, rhs);
  }

  Ok(node)
}

fn parse_bit_or(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_bit_xor(stream)?;

  while stream.equal(TokenKind::BitOr) {
    let rhs = parse_bit_xor(stream)?;
    node = Expr::binary(BinaryOp::BitOr, node, rhs);
  }

  Ok(node)
}

fn parse_bit_xor(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_bit_and(stream)?;

  while stream.equal(TokenKind::BitXor) {
    let rhs = parse_bit_and(stream)?;
    node = Expr::binary(BinaryOp::BitXor, node, rhs);
  }

  Ok(node)
}

fn parse_bit_and(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_equality(stream)?;

  while stream.equal(TokenKind::BitAnd) {
    let rhs = parse_equality(stream)?;
    node = Expr::binary(BinaryOp::BitAnd, node, rhs);
  }

  Ok(node)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_relational(stream)?;

  loop {
    let op = match stream.peek_kind() {
      TokenKind::Equal => BinaryOp::Eq,
      TokenKind::NotEqual => BinaryOp::Ne,
      _ => break,
    };

    stream.advance();
    let rhs = parse_relational(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_shift(stream)?;

  loop {
    let op = match stream.peek_kind() {
      TokenKind::LessThan => BinaryOp::Lt,
      TokenKind::LessEq => BinaryOp::Le,
      TokenKind::GreaterThan => BinaryOp::Gt,
      TokenKind::GreaterEq => BinaryOp::Ge,
      _ => break,
    };

    stream.advance();
    let rhs = parse_shift(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_shift(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_add(stream)?;

  loop {
    let op = match stream.peek_kind() {
      TokenKind::ShiftLeft => BinaryOp::ShiftLeft,
      TokenKind::ShiftRight => BinaryOp::ShiftRight,
      _ => break,
    };

    stream.advance();
    let rhs = parse_add(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_unary(stream)?;

  loop {
    let op = match stream.peek_kind() {
      TokenKind::Plus => BinaryOp::Add,
      TokenKind::Minus => BinaryOp::Sub,
      _ => break,
    };

    stream.advance();
    let rhs = parse_unary(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Expr> {
  let op = match stream.peek_kind() {
    TokenKind::Minus => UnaryOp::Neg,
    TokenKind::BitNot => UnaryOp::BitNot,
    TokenKind::LogicNot => UnaryOp::LogicNot,
    _ => return parse_primary(stream),
  };

  stream.advance();
  let operand = parse_unary(stream)?;
  Ok(Expr::unary(op, operand))
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  match stream.peek_kind() {
    TokenKind::Num => {
      let value = stream.get_number()?;
      Ok(Expr::literal(value))
    }
    TokenKind::Ident => {
      let (name, line, column) = stream.get_ident()?;
      Ok(Expr::var(name, line, column))
    }
    TokenKind::Input => {
      stream.advance();
      stream.skip(TokenKind::OpenParen)?;
      stream.skip(TokenKind::CloseParen)?;
      Ok(Expr::call(Builtin::Input, Vec::new()))
    }
    TokenKind::Output => {
      // output(e) in expression position: the written value stays in A.
      stream.advance();
      stream.skip(TokenKind::OpenParen)?;
      let arg = parse_expr(stream)?;
      stream.skip(TokenKind::CloseParen)?;
      Ok(Expr::call(Builtin::Output, vec![arg]))
    }
    TokenKind::OpenParen => {
      stream.advance();
      let node = parse_expr(stream)?;
      stream.skip(TokenKind::CloseParen)?;
      Ok(node)
    }
    _ => {
      let (line, column) = stream.position();
      Err(CompileError::parse(
        line,
        column,
        format!("expected an expression, but got \"{}\"", stream.describe()),
      ))
    }
  }
}

// ----- Token cursor -----

/// Lightweight cursor over the token vector. The tokenizer guarantees the
/// vector ends with `Eof`, so `peek` never runs past the end.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
}

impl TokenStream {
  fn new(tokens: Vec<Token>) -> Self {
    Self { tokens, pos: 0 }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn peek_kind(&self) -> TokenKind {
    self.peek().map(|token| token.kind).unwrap_or(TokenKind::Eof)
  }

  fn position(&self) -> (usize, usize) {
    self
      .peek()
      .map(|token| (token.line, token.column))
      .unwrap_or((1, 1))
  }

  fn describe(&self) -> String {
    self
      .peek()
      .map(describe_token)
      .unwrap_or_else(|| "EOF".to_string())
  }

  fn advance(&mut self) {
    if self.peek_kind() != TokenKind::Eof {
      self.pos += 1;
    }
  }

  /// Consume the current token if it matches the given kind.
  fn equal(&mut self, kind: TokenKind) -> bool {
    if self.peek_kind() == kind {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, kind: TokenKind) -> CompileResult<()> {
    if self.equal(kind) {
      Ok(())
    } else {
      let (line, column) = self.position();
      Err(CompileError::parse(
        line,
        column,
        format!(
          "expected \"{}\", but got \"{}\"",
          kind_name(kind),
          self.describe()
        ),
      ))
    }
  }

  /// Parse the current token as an integer literal.
  fn get_number(&mut self) -> CompileResult<u8> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::internal("numeric token missing value")
      })?;
      self.pos += 1;
      return Ok(value);
    }

    let (line, column) = self.position();
    Err(CompileError::parse(
      line,
      column,
      format!("expected a number, but got \"{}\"", self.describe()),
    ))
  }

  /// Parse the current token as an identifier, returning its position.
  fn get_ident(&mut self) -> CompileResult<(String, usize, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let result = (token.lexeme.clone(), token.line, token.column);
      self.pos += 1;
      return Ok(result);
    }

    let (line, column) = self.position();
    Err(CompileError::parse(
      line,
      column,
      format!("expected an identifier, but got \"{}\"", self.describe()),
    ))
  }

  fn is_eof(&self) -> bool {
    self.peek_kind() == TokenKind::Eof
  }
}
