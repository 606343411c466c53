//! Semantic analysis: binds identifiers to zero-page slots.
//!
//! The language is single-scope, so the whole pass is one walk over the
//! statement list with a flat symbol table. Each declaration claims the
//! next free zero-page byte starting at `$10`; slots are never reused,
//! even across blocks. The walk annotates every `Var` node and assignment
//! target with its slot so the code generator never has to look names up
//! again.

use crate::error::{CompileError, CompileResult};
use crate::parser::{Expr, Program, Stmt};
use std::collections::HashMap;

/// First zero-page byte available to user variables. `$00`-`$0F` is left
/// to the system.
pub const VAR_BASE: u8 = 0x10;

/// Last zero-page byte available to user variables. `$FA`-`$FE` above it
/// is scratch for the generated code and I/O routines.
pub const VAR_TOP: u8 = 0xF9;

/// Maximum number of declarations a program can hold.
pub const MAX_VARIABLES: usize = (VAR_TOP - VAR_BASE) as usize + 1;

struct SymbolTable {
  slots: HashMap<String, u8>,
  next: u16,
}

impl SymbolTable {
  fn new() -> Self {
    Self {
      slots: HashMap::new(),
      next: VAR_BASE as u16,
    }
  }

  fn declare(&mut self, name: &str, line: usize, column: usize) -> CompileResult<u8> {
    if self.slots.contains_key(name) {
      return Err(CompileError::Redeclaration {
        name: name.to_string(),
        line,
        column,
      });
    }
    if self.next > VAR_TOP as u16 {
      return Err(CompileError::OutOfSlots { line, column });
    }
    let slot = self.next as u8;
    self.slots.insert(name.to_string(), slot);
    self.next += 1;
    Ok(slot)
  }

  fn lookup(&self, name: &str, line: usize, column: usize) -> CompileResult<u8> {
    self.slots.get(name).copied().ok_or_else(|| {
      CompileError::UndeclaredName {
        name: name.to_string(),
        line,
        column,
      }
    })
  }
}

/// Analyze a parsed program in place, annotating every variable reference
/// with its zero-page slot. Returns the number of declared variables.
pub fn analyze(program: &mut Program) -> CompileResult<usize> {
  let mut table = SymbolTable::new();

  for stmt in &mut program.stmts {
    analyze_stmt(stmt, &mut table)?;
  }

  Ok(table.slots.len())
}

fn analyze_stmt(stmt: &mut Stmt, table: &mut SymbolTable) -> CompileResult<()> {
  match stmt {
    Stmt::VarDecl {
      name,
      line,
      column,
      slot,
      init,
    } => {
      // The initialiser is checked first so `var x = x;` is rejected.
      analyze_expr(init, table)?;
      *slot = Some(table.declare(name, *line, *column)?);
    }
    Stmt::Assign {
      name,
      line,
      column,
      slot,
      value,
    } => {
      analyze_expr(value, table)?;
      *slot = Some(table.lookup(name, *line, *column)?);
    }
    Stmt::PostInc {
      name,
      line,
      column,
      slot,
    }
    | Stmt::PostDec {
      name,
      line,
      column,
      slot,
    } => {
      *slot = Some(table.lookup(name, *line, *column)?);
    }
    Stmt::If {
      cond,
      then_body,
      else_body,
    } => {
      analyze_expr(cond, table)?;
      for stmt in then_body {
        analyze_stmt(stmt, table)?;
      }
      if let Some(else_body) = else_body {
        for stmt in else_body {
          analyze_stmt(stmt, table)?;
        }
      }
    }
    Stmt::While { cond, body } => {
      analyze_expr(cond, table)?;
      for stmt in body {
        analyze_stmt(stmt, table)?;
      }
    }
    Stmt::DoWhile { body, cond } => {
      for stmt in body {
        analyze_stmt(stmt, table)?;
      }
      analyze_expr(cond, table)?;
    }
    Stmt::Output { value } => {
      analyze_expr(value, table)?;
    }
    Stmt::Expr { expr } => {
      analyze_expr(expr, table)?;
    }
  }

  Ok(())
}

fn analyze_expr(expr: &mut Expr, table: &SymbolTable) -> CompileResult<()> {
  match expr {
    Expr::Literal { .. } => {}
    Expr::Var {
      name,
      line,
      column,
      slot,
    } => {
      *slot = Some(table.lookup(name, *line, *column)?);
    }
    Expr::Unary { operand, .. } => {
      analyze_expr(operand, table)?;
    }
    Expr::Binary { lhs, rhs, .. } => {
      analyze_expr(lhs, table)?;
      analyze_expr(rhs, table)?;
    }
    Expr::Call { args, .. } => {
      for arg in args {
        analyze_expr(arg, table)?;
      }
    }
  }

  Ok(())
}
