//! Code generation: lower the analyzed AST into DASM-syntax 6502 assembly.
//!
//! The emitter uses the hardware stack for expression evaluation: every
//! subexpression leaves its value in the accumulator, and binary operators
//! push the left operand with `PHA` while the right side is computed. The
//! right operand is then parked in zero-page scratch `$FE` so the left can
//! be pulled back into `A` for the operator kernel. Operators without a
//! native 6502 instruction (shifts, comparisons, the logical connectives)
//! expand into small branch fragments with freshly minted labels.

use crate::error::{CompileError, CompileResult};
use crate::parser::{BinaryOp, Builtin, Expr, Program, Stmt, UnaryOp};

/// Emulator the generated I/O runtime is tailored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
  /// Memory-mapped console at `$F001`/`$F004`, single-digit input.
  #[default]
  Generic,
  /// py65mon console: same ports, input polls and accumulates digits
  /// until Enter.
  Py65mon,
}

/// Emit a complete assembly program for the analyzed AST.
pub fn generate(program: &Program, target: Target) -> CompileResult<String> {
  CodeGen::new(target).generate(program)
}

struct CodeGen {
  out: String,
  label_counter: usize,
  target: Target,
}

impl CodeGen {
  fn new(target: Target) -> Self {
    Self {
      out: String::new(),
      label_counter: 0,
      target,
    }
  }

  fn emit(&mut self, line: &str) {
    self.out.push_str(line);
    self.out.push('\n');
  }

  /// Mint a unique label. The counter is instance state, so independent
  /// compilations cannot collide and labels within one program never
  /// repeat.
  fn label(&mut self, prefix: &str) -> String {
    let label = format!("{prefix}{}", self.label_counter);
    self.label_counter += 1;
    label
  }

  fn generate(mut self, program: &Program) -> CompileResult<String> {
    self.emit("; Generated 6502 Assembly Code");
    self.emit("; Processor: 6502");
    self.emit("");
    self.emit("    processor 6502");
    self.emit("    org $0600    ; Start program at $0600");
    self.emit("");

    // The hardware stack lives at $0100-$01FF and grows down from $01FF.
    self.emit("start:");
    self.emit("    LDX #$FF");
    self.emit("    TXS          ; Initialize stack pointer");
    self.emit("");

    for stmt in &program.stmts {
      self.gen_stmt(stmt)?;
    }

    self.emit("");
    self.emit("    BRK          ; End program");
    self.emit("");

    self.emit("; ==================== I/O Routines ====================");
    self.emit("");
    self.gen_io_routines();

    Ok(self.out)
  }

  // ----- Statement lowering -----

  fn gen_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::VarDecl {
        name, slot, init, ..
      } => {
        let addr = slot_of(*slot, name)?;
        self.emit(&format!("    ; var {name} = <expression>"));
        self.gen_expr(init)?;
        self.emit(&format!("    STA ${addr:02X}        ; Store to {name}"));
        self.emit("");
      }
      Stmt::Assign {
        name, slot, value, ..
      } => {
        let addr = slot_of(*slot, name)?;
        self.emit(&format!("    ; {name} = <expression>"));
        self.gen_expr(value)?;
        self.emit(&format!("    STA ${addr:02X}        ; Store to {name}"));
        self.emit("");
      }
      Stmt::PostInc { name, slot, .. } => {
        let addr = slot_of(*slot, name)?;
        self.emit(&format!("    ; {name}++"));
        self.emit(&format!("    INC ${addr:02X}"));
        self.emit("");
      }
      Stmt::PostDec { name, slot, .. } => {
        let addr = slot_of(*slot, name)?;
        self.emit(&format!("    ; {name}--"));
        self.emit(&format!("    DEC ${addr:02X}"));
        self.emit("");
      }
      Stmt::If {
        cond,
        then_body,
        else_body,
      } => {
        self.emit("    ; if statement");
        self.gen_expr(cond)?;

        let else_label = self.label("ELSE");
        let end_label = self.label("ENDIF");

        self.emit("    CMP #0");
        self.emit(&format!("    BEQ {else_label}    ; Jump to else if false"));
        self.emit("");

        for stmt in then_body {
          self.gen_stmt(stmt)?;
        }
        self.emit(&format!("    JMP {end_label}     ; Skip else branch"));
        self.emit("");

        self.emit(&format!("{else_label}:"));
        if let Some(else_body) = else_body {
          for stmt in else_body {
            self.gen_stmt(stmt)?;
          }
        }
        self.emit(&format!("{end_label}:"));
        self.emit("");
      }
      Stmt::While { cond, body } => {
        let loop_start = self.label("WHILE");
        let loop_end = self.label("ENDWHILE");

        self.emit(&format!("{loop_start}:"));
        self.emit("    ; while condition");
        self.gen_expr(cond)?;
        self.emit("    CMP #0");
        self.emit(&format!("    BEQ {loop_end}      ; Exit loop if false"));
        self.emit("");

        for stmt in body {
          self.gen_stmt(stmt)?;
        }

        self.emit(&format!("    JMP {loop_start}    ; Loop back"));
        self.emit(&format!("{loop_end}:"));
        self.emit("");
      }
      Stmt::DoWhile { body, cond } => {
        let loop_start = self.label("DO");

        self.emit(&format!("{loop_start}:"));
        self.emit("    ; do-while body");

        for stmt in body {
          self.gen_stmt(stmt)?;
        }

        self.emit("    ; while condition");
        self.gen_expr(cond)?;
        self.emit("    CMP #0");
        self.emit(&format!("    BNE {loop_start}    ; Loop if true"));
        self.emit("");
      }
      Stmt::Output { value } => {
        self.emit("    ; output(<value>)");
        self.gen_expr(value)?;
        self.emit("    JSR output_routine");
        self.emit("");
      }
      Stmt::Expr { expr } => {
        if let Expr::Call {
          builtin: Builtin::Input,
          ..
        } = expr
        {
          self.emit("    ; input()");
          self.emit("    JSR input_routine");
        } else {
          self.gen_expr(expr)?;
        }
        self.emit("");
      }
    }

    Ok(())
  }

  // ----- Expression lowering -----
  // Post-order traversal; the result of every subexpression is left in A.

  fn gen_expr(&mut self, expr: &Expr) -> CompileResult<()> {
    match expr {
      Expr::Literal { value } => {
        self.emit(&format!("    LDA #${value:02X}      ; Load literal {value}"));
      }
      Expr::Var { name, slot, .. } => {
        let addr = slot_of(*slot, name)?;
        self.emit(&format!("    LDA ${addr:02X}        ; Load {name}"));
      }
      Expr::Unary { op, operand } => {
        self.gen_expr(operand)?;
        match op {
          UnaryOp::Neg => {
            self.emit("    EOR #$FF        ; One's complement");
            self.emit("    CLC");
            self.emit("    ADC #1          ; Two's complement (negate)");
          }
          UnaryOp::BitNot => {
            self.emit("    EOR #$FF        ; Bitwise NOT");
          }
          UnaryOp::LogicNot => self.gen_logic_not(),
        }
      }
      Expr::Binary { op, lhs, rhs } => {
        self.gen_expr(lhs)?;
        self.emit("    PHA             ; Save left operand");
        self.gen_expr(rhs)?;
        self.gen_binary_kernel(*op);
      }
      Expr::Call { builtin, args } => match builtin {
        Builtin::Input => {
          self.emit("    ; input() function call");
          self.emit("    JSR input_routine");
        }
        Builtin::Output => {
          // In expression position the written value is the call's value;
          // the output routine clobbers A, so park it on the stack.
          let arg = args
            .first()
            .ok_or_else(|| CompileError::internal("output call without argument"))?;
          self.emit("    ; output(<value>) function call");
          self.gen_expr(arg)?;
          self.emit("    PHA             ; Save output value");
          self.emit("    JSR output_routine");
          self.emit("    PLA             ; Written value stays in A");
        }
      },
    }

    Ok(())
  }

  /// Combine the pushed left operand with the right operand in A.
  fn gen_binary_kernel(&mut self, op: BinaryOp) {
    match op {
      BinaryOp::Add => {
        self.stage_operands();
        self.emit("    CLC");
        self.emit("    ADC $FE         ; Add");
      }
      BinaryOp::Sub => {
        self.stage_operands();
        self.emit("    SEC");
        self.emit("    SBC $FE         ; Subtract");
      }
      BinaryOp::BitAnd => {
        self.stage_operands();
        self.emit("    AND $FE         ; Bitwise AND");
      }
      BinaryOp::BitOr => {
        self.stage_operands();
        self.emit("    ORA $FE         ; Bitwise OR");
      }
      BinaryOp::BitXor => {
        self.stage_operands();
        self.emit("    EOR $FE         ; Bitwise XOR");
      }
      BinaryOp::ShiftLeft => {
        self.gen_shift("ASL             ; Shift left accumulator", "SHL");
      }
      BinaryOp::ShiftRight => {
        self.gen_shift("LSR             ; Shift right accumulator", "SHR");
      }
      BinaryOp::LogicAnd => self.gen_logic_and(),
      BinaryOp::LogicOr => self.gen_logic_or(),
      BinaryOp::LogicXor => self.gen_logic_xor(),
      BinaryOp::Eq => self.gen_equal(),
      BinaryOp::Ne => self.gen_not_equal(),
      BinaryOp::Lt => self.gen_less_than(),
      BinaryOp::Le => self.gen_less_equal(),
      BinaryOp::Gt => self.gen_greater_than(),
      BinaryOp::Ge => self.gen_greater_equal(),
    }
  }

  /// Park the right operand in `$FE` and pull the left back into A.
  fn stage_operands(&mut self) {
    self.emit("    STA $FE         ; Save right operand");
    self.emit("    PLA             ; Restore left operand");
  }

  /// `left << right` / `left >> right` by repeated single-bit shifts; the
  /// 6502 has no shift-by-count instruction. Entry: A = count (right
  /// operand), stack = value (left operand). A shift count over 7 leaves
  /// zero in A, matching the hardware bit by bit.
  fn gen_shift(&mut self, shift_line: &str, prefix: &str) {
    self.emit("    TAX             ; Shift count in X");
    self.emit("    PLA             ; Get value");
    let loop_label = self.label(prefix);
    let end_label = self.label(&format!("{prefix}_E"));
    self.emit(&format!("{loop_label}:"));
    self.emit("    CPX #0");
    self.emit(&format!("    BEQ {end_label}"));
    self.emit(&format!("    {shift_line}"));
    self.emit("    DEX");
    self.emit(&format!("    JMP {loop_label}"));
    self.emit(&format!("{end_label}:"));
  }

  /// `!x`: 1 if A is zero, else 0. Distinct from bitwise NOT.
  fn gen_logic_not(&mut self) {
    let label_false = self.label("LNOT_F");
    let label_end = self.label("LNOT_E");
    self.emit("    CMP #0");
    self.emit(&format!("    BNE {label_false}"));
    self.emit("    LDA #1          ; Was zero, return 1");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_false}:"));
    self.emit("    LDA #0          ; Was non-zero, return 0");
    self.emit(&format!("{label_end}:"));
  }

  /// `left && right`: 1 if both operands are non-zero, else 0.
  fn gen_logic_and(&mut self) {
    self.emit("    TAY             ; Save right in Y");
    self.emit("    PLA             ; Get left");
    let label_false = self.label("AND_F");
    let label_end = self.label("AND_E");
    self.emit("    CMP #0");
    self.emit(&format!("    BEQ {label_false}   ; Left is false"));
    self.emit("    TYA             ; Check right");
    self.emit("    CMP #0");
    self.emit(&format!("    BEQ {label_false}   ; Right is false"));
    self.emit("    LDA #1          ; Both true");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_false}:"));
    self.emit("    LDA #0          ; At least one false");
    self.emit(&format!("{label_end}:"));
  }

  /// `left || right`: 1 if either operand is non-zero, else 0.
  fn gen_logic_or(&mut self) {
    self.emit("    TAY             ; Save right in Y");
    self.emit("    PLA             ; Get left");
    let label_true = self.label("OR_T");
    let label_false = self.label("OR_F");
    let label_end = self.label("OR_E");
    self.emit("    CMP #0");
    self.emit(&format!("    BNE {label_true}    ; Left is true"));
    self.emit("    TYA             ; Check right");
    self.emit("    CMP #0");
    self.emit(&format!("    BNE {label_true}    ; Right is true"));
    self.emit(&format!("    JMP {label_false}"));
    self.emit(&format!("{label_true}:"));
    self.emit("    LDA #1          ; At least one true");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_false}:"));
    self.emit("    LDA #0          ; Both false");
    self.emit(&format!("{label_end}:"));
  }

  /// `left ^^ right`: 1 if exactly one operand is non-zero, else 0.
  /// Four-arm selection on (left != 0, right != 0).
  fn gen_logic_xor(&mut self) {
    self.emit("    TAY             ; Save right in Y");
    self.emit("    PLA             ; Get left");
    let label_l_true = self.label("XOR_LT");
    let label_l_false = self.label("XOR_LF");
    let label_true = self.label("XOR_RT");
    let label_false = self.label("XOR_RF");
    let label_end = self.label("XOR_E");
    self.emit("    CMP #0");
    self.emit(&format!("    BNE {label_l_true}"));
    self.emit(&format!("{label_l_false}:"));
    self.emit("    TYA");
    self.emit("    CMP #0");
    self.emit(&format!("    BEQ {label_false}  ; L=F, R=F -> F"));
    self.emit(&format!("    JMP {label_true}   ; L=F, R=T -> T"));
    self.emit(&format!("{label_l_true}:"));
    self.emit("    TYA");
    self.emit("    CMP #0");
    self.emit(&format!("    BEQ {label_true}   ; L=T, R=F -> T"));
    self.emit(&format!("    JMP {label_false}  ; L=T, R=T -> F"));
    self.emit(&format!("{label_true}:"));
    self.emit("    LDA #1");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_false}:"));
    self.emit("    LDA #0");
    self.emit(&format!("{label_end}:"));
  }

  /// `left == right`: 1 if equal, else 0.
  fn gen_equal(&mut self) {
    self.stage_operands();
    let label_true = self.label("EQ_T");
    let label_end = self.label("EQ_E");
    self.emit("    CMP $FE");
    self.emit(&format!("    BEQ {label_true}"));
    self.emit("    LDA #0          ; Not equal");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_true}:"));
    self.emit("    LDA #1          ; Equal");
    self.emit(&format!("{label_end}:"));
  }

  /// `left != right`: 1 if not equal, else 0.
  fn gen_not_equal(&mut self) {
    self.stage_operands();
    let label_true = self.label("NE_T");
    let label_end = self.label("NE_E");
    self.emit("    CMP $FE");
    self.emit(&format!("    BNE {label_true}"));
    self.emit("    LDA #0          ; Equal");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_true}:"));
    self.emit("    LDA #1          ; Not equal");
    self.emit(&format!("{label_end}:"));
  }

  // Relational kernels. CMP performs left - right on the unsigned bytes:
  // carry clear means left < right, zero set means left == right.

  /// `left < right`.
  fn gen_less_than(&mut self) {
    self.stage_operands();
    let label_true = self.label("LT_T");
    let label_end = self.label("LT_E");
    self.emit("    CMP $FE         ; Compare left with right");
    self.emit(&format!("    BCC {label_true}    ; Branch if left < right"));
    self.emit("    LDA #0          ; False");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_true}:"));
    self.emit("    LDA #1          ; True");
    self.emit(&format!("{label_end}:"));
  }

  /// `left <= right`.
  fn gen_less_equal(&mut self) {
    self.stage_operands();
    let label_true = self.label("LE_T");
    let label_end = self.label("LE_E");
    self.emit("    CMP $FE         ; Compare left with right");
    self.emit(&format!("    BCC {label_true}    ; Branch if left < right"));
    self.emit(&format!("    BEQ {label_true}    ; Branch if left == right"));
    self.emit("    LDA #0          ; False");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_true}:"));
    self.emit("    LDA #1          ; True");
    self.emit(&format!("{label_end}:"));
  }

  /// `left > right`: false on equal or below, true otherwise.
  fn gen_greater_than(&mut self) {
    self.stage_operands();
    let label_false = self.label("GT_F");
    let label_end = self.label("GT_E");
    self.emit("    CMP $FE         ; Compare left with right");
    self.emit(&format!("    BEQ {label_false}     ; Equal, return 0"));
    self.emit(&format!("    BCC {label_false}     ; left < right, return 0"));
    self.emit("    LDA #1          ; left > right");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_false}:"));
    self.emit("    LDA #0          ; Not greater");
    self.emit(&format!("{label_end}:"));
  }

  /// `left >= right`: not below is enough.
  fn gen_greater_equal(&mut self) {
    self.stage_operands();
    let label_false = self.label("GE_F");
    let label_end = self.label("GE_E");
    self.emit("    CMP $FE         ; Compare left with right");
    self.emit(&format!("    BCC {label_false}     ; left < right, return 0"));
    self.emit("    LDA #1          ; left >= right");
    self.emit(&format!("    JMP {label_end}"));
    self.emit(&format!("{label_false}:"));
    self.emit("    LDA #0          ; Less than");
    self.emit(&format!("{label_end}:"));
  }

  // ----- I/O runtime -----
  // I/O is not standardised on the 6502, so the routines appended to the
  // program depend on the selected target. Both share the decimal output
  // routine; only input differs.

  fn gen_io_routines(&mut self) {
    match self.target {
      Target::Generic => {
        self.emit("; Target: generic memory-mapped console");
        self.emit("; Console output at $F001, console input at $F004");
        self.emit("");
        self.gen_output_routine();
        self.gen_generic_input();
      }
      Target::Py65mon => {
        self.emit("; Target: py65mon emulator");
        self.emit("; Console output at $F001, console input at $F004");
        self.emit("");
        self.gen_output_routine();
        self.gen_py65mon_input();
      }
    }
  }

  /// Print A as a decimal number (0-255) followed by a newline. Digits are
  /// extracted by repeated subtraction of 100 and 10; `$FB` holds the
  /// remainder and `$FD` the leading-zero suppression flag.
  fn gen_output_routine(&mut self) {
    self.emit("output_routine:");
    self.emit("    ; Output value in A as decimal number (0-255)");
    self.emit("    ; Suppresses leading zeros (5 prints as '5', not '005')");
    self.emit("    STA $FB          ; Store number to output");
    self.emit("    LDA #1");
    self.emit("    STA $FD          ; Start suppressing leading zeros");
    self.emit("");
    self.emit("    ; ===== Output hundreds digit =====");
    self.emit("    LDA $FB");
    self.emit("    LDX #0           ; X will count hundreds");
    self.emit("output_hundreds:");
    self.emit("    CMP #100");
    self.emit("    BCC output_hundreds_done");
    self.emit("    SBC #100         ; Subtract 100 (carry is set)");
    self.emit("    INX");
    self.emit("    JMP output_hundreds");
    self.emit("output_hundreds_done:");
    self.emit("    STA $FB          ; Save remainder");
    self.emit("    TXA");
    self.emit("    BEQ skip_hundreds ; Skip if zero (suppress leading zero)");
    self.emit("    LDA #0");
    self.emit("    STA $FD          ; Found non-zero, stop suppressing");
    self.emit("    TXA");
    self.emit("    CLC");
    self.emit("    ADC #48          ; Convert to ASCII ('0' = 48)");
    self.emit("    STA $F001        ; Output hundreds digit");
    self.emit("skip_hundreds:");
    self.emit("");
    self.emit("    ; ===== Output tens digit =====");
    self.emit("    LDA $FB");
    self.emit("    LDX #0           ; X will count tens");
    self.emit("output_tens:");
    self.emit("    CMP #10");
    self.emit("    BCC output_tens_done");
    self.emit("    SBC #10          ; Subtract 10 (carry is set)");
    self.emit("    INX");
    self.emit("    JMP output_tens");
    self.emit("output_tens_done:");
    self.emit("    STA $FB          ; Save remainder (ones digit)");
    self.emit("    TXA");
    self.emit("    BNE print_tens   ; Print if non-zero");
    self.emit("    LDA $FD");
    self.emit("    BNE skip_tens    ; Skip if still suppressing zeros");
    self.emit("print_tens:");
    self.emit("    LDA #0");
    self.emit("    STA $FD          ; Stop suppressing");
    self.emit("    TXA");
    self.emit("    CLC");
    self.emit("    ADC #48          ; Convert to ASCII");
    self.emit("    STA $F001        ; Output tens digit");
    self.emit("skip_tens:");
    self.emit("");
    self.emit("    ; ===== Output ones digit =====");
    self.emit("    LDA $FB");
    self.emit("    CLC");
    self.emit("    ADC #48          ; Convert to ASCII");
    self.emit("    STA $F001        ; Output ones digit");
    self.emit("");
    self.emit("    ; Newline for readability");
    self.emit("    LDA #10");
    self.emit("    STA $F001");
    self.emit("    RTS");
    self.emit("");
  }

  /// Read one ASCII digit and return its value in A.
  fn gen_generic_input(&mut self) {
    self.emit("input_routine:");
    self.emit("    ; Read one ASCII digit from the console");
    self.emit("    LDA $F004       ; Read from input port");
    self.emit("    SEC");
    self.emit("    SBC #48         ; ASCII digit to value");
    self.emit("    RTS");
    self.emit("");
  }

  /// Read a multi-digit decimal number, terminated by Enter. The result
  /// accumulates in `$FA` as `result * 10 + digit`; the decimal multiply
  /// is `((result << 2) + result) << 1` with a copy saved in `$FD` and
  /// the incoming digit in `$FE`.
  fn gen_py65mon_input(&mut self) {
    self.emit("input_routine:");
    self.emit("    ; Read multi-digit number from console until Enter");
    self.emit("    LDA #0");
    self.emit("    STA $FA         ; Initialize result to 0");
    self.emit("");
    self.emit("input_loop:");
    self.emit("input_wait:");
    self.emit("    LDA $F004       ; Poll for input (non-blocking)");
    self.emit("    BEQ input_wait  ; Keep waiting if no key pressed");
    self.emit("");
    self.emit("    CMP #10");
    self.emit("    BEQ input_done  ; Enter (LF) terminates");
    self.emit("    CMP #13");
    self.emit("    BEQ input_done  ; Enter (CR) terminates");
    self.emit("");
    self.emit("    ; ASCII digit to value");
    self.emit("    SEC");
    self.emit("    SBC #48");
    self.emit("    STA $FE         ; Store new digit");
    self.emit("");
    self.emit("    ; Multiply result by 10: ((result << 2) + result) << 1");
    self.emit("    LDA $FA         ; Load current result");
    self.emit("    STA $FD         ; Save copy");
    self.emit("    ASL             ; result * 2");
    self.emit("    ASL             ; result * 4");
    self.emit("    CLC");
    self.emit("    ADC $FD         ; result * 5");
    self.emit("    ASL             ; result * 10");
    self.emit("    CLC");
    self.emit("    ADC $FE         ; Add new digit");
    self.emit("    STA $FA         ; Store updated result");
    self.emit("");
    self.emit("    JMP input_loop  ; Read next character");
    self.emit("");
    self.emit("input_done:");
    self.emit("    LDA $FA         ; Load final result into A");
    self.emit("    RTS");
    self.emit("");
  }
}

fn slot_of(slot: Option<u8>, name: &str) -> CompileResult<u8> {
  slot.ok_or_else(|| {
    CompileError::internal(format!(
      "variable '{name}' has no slot; semantic analysis did not run"
    ))
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::sema::analyze;
  use crate::tokenizer::tokenize;

  fn compile(source: &str, target: Target) -> String {
    let mut program = parse(tokenize(source).unwrap()).unwrap();
    analyze(&mut program).unwrap();
    generate(&program, target).unwrap()
  }

  /// Index of the first line matching `needle` exactly after trimming.
  fn line_index(asm: &str, needle: &str) -> usize {
    asm
      .lines()
      .position(|line| line.trim() == needle)
      .unwrap_or_else(|| panic!("line not found: {needle}"))
  }

  #[test]
  fn test_skeleton() {
    let asm = compile("", Target::Generic);
    let processor = line_index(&asm, "processor 6502");
    let org = line_index(&asm, "org $0600    ; Start program at $0600");
    let start = line_index(&asm, "start:");
    let brk = line_index(&asm, "BRK          ; End program");
    let output = line_index(&asm, "output_routine:");
    assert!(processor < org && org < start && start < brk && brk < output);
    assert!(asm.starts_with("; Generated 6502 Assembly Code\n; Processor: 6502\n"));
  }

  #[test]
  fn test_slots_in_declaration_order() {
    let asm = compile("var a = 1; var b = 2; var c = 3;", Target::Generic);
    let a = line_index(&asm, "STA $10        ; Store to a");
    let b = line_index(&asm, "STA $11        ; Store to b");
    let c = line_index(&asm, "STA $12        ; Store to c");
    assert!(a < b && b < c);
  }

  #[test]
  fn test_literal_is_hex_immediate() {
    let asm = compile("var a = 255;", Target::Generic);
    assert!(asm.contains("LDA #$FF      ; Load literal 255"));
  }

  #[test]
  fn test_binary_operand_discipline() {
    // Left is pushed, right parked in $FE, left pulled back, then the op.
    let asm = compile("var a = 1; var b = a + 2;", Target::Generic);
    let push = line_index(&asm, "PHA             ; Save left operand");
    let park = line_index(&asm, "STA $FE         ; Save right operand");
    let pull = line_index(&asm, "PLA             ; Restore left operand");
    let add = line_index(&asm, "ADC $FE         ; Add");
    assert!(push < park && park < pull && pull < add);
  }

  #[test]
  fn test_shift_count_goes_through_x() {
    // The right operand (count) must be transferred to X before the left
    // value is pulled back; swapping the order breaks shifts.
    let asm = compile("var a = 1; var b = a << 2;", Target::Generic);
    let tax = line_index(&asm, "TAX             ; Shift count in X");
    let pla = line_index(&asm, "PLA             ; Get value");
    assert!(tax < pla);
    assert!(asm.contains("ASL             ; Shift left accumulator"));
  }

  #[test]
  fn test_unary_minus_is_twos_complement() {
    let asm = compile("var a = 1; var b = -a;", Target::Generic);
    let ones = line_index(&asm, "EOR #$FF        ; One's complement");
    let add = line_index(&asm, "ADC #1          ; Two's complement (negate)");
    assert!(ones < add);
  }

  #[test]
  fn test_logic_not_is_not_bitwise() {
    let asm = compile("var a = 1; var b = !a;", Target::Generic);
    assert!(asm.contains("LNOT_F"));
    assert!(!asm.contains("EOR #$FF"));

    let asm = compile("var a = 1; var b = ~a;", Target::Generic);
    assert!(asm.contains("EOR #$FF        ; Bitwise NOT"));
    assert!(!asm.contains("LNOT_F"));
  }

  #[test]
  fn test_post_increment_and_decrement() {
    let asm = compile("var a = 1; a++; a--;", Target::Generic);
    assert!(asm.contains("INC $10"));
    assert!(asm.contains("DEC $10"));
  }

  #[test]
  fn test_if_else_shape() {
    let asm = compile(
      "var x = 1; if (x) { output(1); } else { output(0); };",
      Target::Generic,
    );
    assert!(asm.contains("BEQ ELSE"));
    assert!(asm.contains("JMP ENDIF"));
  }

  #[test]
  fn test_while_shape() {
    let asm = compile("var c = 0; while (c < 3) { c++; };", Target::Generic);
    let start = line_index(&asm, "WHILE0:");
    let exit = line_index(&asm, "BEQ ENDWHILE1      ; Exit loop if false");
    let back = line_index(&asm, "JMP WHILE0    ; Loop back");
    let end = line_index(&asm, "ENDWHILE1:");
    assert!(start < exit && exit < back && back < end);
  }

  #[test]
  fn test_do_while_shape() {
    let asm = compile("var x = 3; do { x--; } while (x > 0);", Target::Generic);
    let start = line_index(&asm, "DO0:");
    let back = line_index(&asm, "BNE DO0    ; Loop if true");
    assert!(start < back);
  }

  #[test]
  fn test_labels_unique_in_nested_program() {
    let asm = compile(
      "var a = 1; \
       while (a < 10) { \
         if (a > 5 && a < 8) { output(a ^^ 1); } else { output(a << 1); }; \
         a++; \
       };",
      Target::Py65mon,
    );
    let mut seen = std::collections::HashSet::new();
    for line in asm.lines() {
      let line = line.trim();
      if let Some(label) = line.strip_suffix(':')
        && !label.contains(' ')
      {
        assert!(seen.insert(label.to_string()), "duplicate label {label}");
      }
    }
  }

  #[test]
  fn test_io_routines_by_target() {
    let generic = compile("output(1);", Target::Generic);
    assert!(generic.contains("; Target: generic memory-mapped console"));
    assert!(generic.contains("SBC #48         ; ASCII digit to value"));
    assert!(!generic.contains("input_loop:"));

    let py65mon = compile("output(1);", Target::Py65mon);
    assert!(py65mon.contains("; Target: py65mon emulator"));
    assert!(py65mon.contains("input_loop:"));

    // The decimal output routine is shared.
    assert!(generic.contains("output_hundreds:"));
    assert!(py65mon.contains("output_hundreds:"));
  }

  #[test]
  fn test_deterministic_output() {
    let source = "var a = 1; while (a < 5) { output(a); a++; };";
    assert_eq!(
      compile(source, Target::Py65mon),
      compile(source, Target::Py65mon)
    );
  }

  #[test]
  fn test_unannotated_ast_is_internal_error() {
    // Skipping semantic analysis leaves the Var node without a slot.
    let program = parse(tokenize("output(x);").unwrap()).unwrap();
    assert!(matches!(
      generate(&program, Target::Generic),
      Err(CompileError::Internal { .. })
    ));
  }
}
