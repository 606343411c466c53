//! Shared test support: a small 6502 interpreter covering exactly the
//! instruction subset the code generator emits.
//!
//! The generated assembly text is executed directly: a first pass collects
//! labels and instructions (skipping comments and assembler directives),
//! then execution runs with the A/X/Y registers, the carry and zero flags,
//! one byte of memory per zero-page address, and the two console ports.
//! Writes to `$F001` are captured; reads from `$F004` come from a scripted
//! input string, returning 0 once it is exhausted (the idle console).

use std::collections::HashMap;

const STEP_LIMIT: usize = 2_000_000;

#[derive(Debug, Clone)]
enum Operand {
  None,
  Immediate(u8),
  ZeroPage(u8),
  OutputPort,
  InputPort,
  Label(String),
}

#[derive(Debug)]
struct Inst {
  op: String,
  operand: Operand,
}

pub struct Machine {
  a: u8,
  x: u8,
  y: u8,
  carry: bool,
  zero: bool,
  zero_page: [u8; 256],
  stack: Vec<u8>,
  calls: Vec<usize>,
  input: Vec<u8>,
  input_pos: usize,
  pub output: Vec<u8>,
}

/// Compile-free entry point used by most tests: execute `asm` with the
/// given console input and return everything written to the output port.
pub fn run_assembly(asm: &str, input: &str) -> String {
  let mut machine = Machine::new(input);
  machine.run(asm);
  String::from_utf8_lossy(&machine.output).into_owned()
}

impl Machine {
  pub fn new(input: &str) -> Self {
    Self {
      a: 0,
      x: 0,
      y: 0,
      carry: false,
      zero: false,
      zero_page: [0; 256],
      stack: Vec::new(),
      calls: Vec::new(),
      input: input.as_bytes().to_vec(),
      input_pos: 0,
      output: Vec::new(),
    }
  }

  pub fn run(&mut self, asm: &str) {
    let (insts, labels) = parse_program(asm);
    let mut pc = 0;
    let mut steps = 0;

    while pc < insts.len() {
      steps += 1;
      assert!(steps <= STEP_LIMIT, "step limit exceeded (runaway program?)");

      let inst = &insts[pc];
      pc += 1;

      match inst.op.as_str() {
        "LDA" => {
          self.a = self.read(&inst.operand);
          self.zero = self.a == 0;
        }
        "LDX" => {
          self.x = self.read(&inst.operand);
          self.zero = self.x == 0;
        }
        "STA" => match &inst.operand {
          Operand::ZeroPage(addr) => self.zero_page[*addr as usize] = self.a,
          Operand::OutputPort => self.output.push(self.a),
          other => panic!("STA with unsupported operand {other:?}"),
        },
        "PHA" => self.stack.push(self.a),
        "PLA" => {
          self.a = self.stack.pop().expect("hardware stack underflow");
          self.zero = self.a == 0;
        }
        "CLC" => self.carry = false,
        "SEC" => self.carry = true,
        "ADC" => {
          let operand = self.read(&inst.operand);
          let sum = self.a as u16 + operand as u16 + self.carry as u16;
          self.carry = sum > 0xFF;
          self.a = sum as u8;
          self.zero = self.a == 0;
        }
        "SBC" => {
          let operand = self.read(&inst.operand);
          let diff = self.a as i16 - operand as i16 - (1 - self.carry as i16);
          self.carry = diff >= 0;
          self.a = diff as u8;
          self.zero = self.a == 0;
        }
        "AND" => {
          self.a &= self.read(&inst.operand);
          self.zero = self.a == 0;
        }
        "ORA" => {
          self.a |= self.read(&inst.operand);
          self.zero = self.a == 0;
        }
        "EOR" => {
          self.a ^= self.read(&inst.operand);
          self.zero = self.a == 0;
        }
        "CMP" => {
          let operand = self.read(&inst.operand);
          self.carry = self.a >= operand;
          self.zero = self.a == operand;
        }
        "CPX" => {
          let operand = self.read(&inst.operand);
          self.carry = self.x >= operand;
          self.zero = self.x == operand;
        }
        "TAX" => {
          self.x = self.a;
          self.zero = self.x == 0;
        }
        "TAY" => {
          self.y = self.a;
          self.zero = self.y == 0;
        }
        "TXA" => {
          self.a = self.x;
          self.zero = self.a == 0;
        }
        "TYA" => {
          self.a = self.y;
          self.zero = self.a == 0;
        }
        // The hardware stack is modeled as a growable Vec, so the stack
        // pointer initialisation is a no-op here.
        "TXS" => {}
        "ASL" => {
          self.carry = self.a & 0x80 != 0;
          self.a <<= 1;
          self.zero = self.a == 0;
        }
        "LSR" => {
          self.carry = self.a & 0x01 != 0;
          self.a >>= 1;
          self.zero = self.a == 0;
        }
        "INC" => match &inst.operand {
          Operand::ZeroPage(addr) => {
            let value = self.zero_page[*addr as usize].wrapping_add(1);
            self.zero_page[*addr as usize] = value;
            self.zero = value == 0;
          }
          other => panic!("INC with unsupported operand {other:?}"),
        },
        "DEC" => match &inst.operand {
          Operand::ZeroPage(addr) => {
            let value = self.zero_page[*addr as usize].wrapping_sub(1);
            self.zero_page[*addr as usize] = value;
            self.zero = value == 0;
          }
          other => panic!("DEC with unsupported operand {other:?}"),
        },
        "INX" => {
          self.x = self.x.wrapping_add(1);
          self.zero = self.x == 0;
        }
        "DEX" => {
          self.x = self.x.wrapping_sub(1);
          self.zero = self.x == 0;
        }
        "BEQ" => {
          if self.zero {
            pc = branch_target(&labels, &inst.operand);
          }
        }
        "BNE" => {
          if !self.zero {
            pc = branch_target(&labels, &inst.operand);
          }
        }
        "BCC" => {
          if !self.carry {
            pc = branch_target(&labels, &inst.operand);
          }
        }
        "BCS" => {
          if self.carry {
            pc = branch_target(&labels, &inst.operand);
          }
        }
        "JMP" => pc = branch_target(&labels, &inst.operand),
        "JSR" => {
          self.calls.push(pc);
          pc = branch_target(&labels, &inst.operand);
        }
        "RTS" => pc = self.calls.pop().expect("RTS without JSR"),
        "BRK" => break,
        other => panic!("unsupported instruction: {other}"),
      }
    }
  }

  fn read(&mut self, operand: &Operand) -> u8 {
    match operand {
      Operand::Immediate(value) => *value,
      Operand::ZeroPage(addr) => self.zero_page[*addr as usize],
      Operand::InputPort => {
        if self.input_pos < self.input.len() {
          let byte = self.input[self.input_pos];
          self.input_pos += 1;
          byte
        } else {
          0
        }
      }
      other => panic!("read from unsupported operand {other:?}"),
    }
  }
}

fn parse_program(asm: &str) -> (Vec<Inst>, HashMap<String, usize>) {
  let mut insts = Vec::new();
  let mut labels = HashMap::new();

  for raw_line in asm.lines() {
    let line = match raw_line.find(';') {
      Some(idx) => &raw_line[..idx],
      None => raw_line,
    };
    let line = line.trim();

    if line.is_empty() || line.starts_with("processor ") || line.starts_with("org ") {
      continue;
    }

    if let Some(label) = line.strip_suffix(':') {
      assert!(
        !label.contains(char::is_whitespace),
        "malformed label line: {raw_line}"
      );
      labels.insert(label.to_string(), insts.len());
      continue;
    }

    let mut parts = line.split_whitespace();
    let op = parts.next().expect("blank instruction line").to_string();
    let operand = match parts.next() {
      Some(text) => parse_operand(text),
      None => Operand::None,
    };
    assert!(parts.next().is_none(), "trailing operand text: {raw_line}");
    insts.push(Inst { op, operand });
  }

  (insts, labels)
}

fn parse_operand(text: &str) -> Operand {
  if let Some(hex) = text.strip_prefix("#$") {
    Operand::Immediate(u8::from_str_radix(hex, 16).expect("bad hex immediate"))
  } else if let Some(dec) = text.strip_prefix('#') {
    Operand::Immediate(dec.parse().expect("bad decimal immediate"))
  } else if text == "$F001" {
    Operand::OutputPort
  } else if text == "$F004" {
    Operand::InputPort
  } else if let Some(hex) = text.strip_prefix('$') {
    Operand::ZeroPage(u8::from_str_radix(hex, 16).expect("bad zero-page address"))
  } else {
    Operand::Label(text.to_string())
  }
}

fn branch_target(labels: &HashMap<String, usize>, operand: &Operand) -> usize {
  match operand {
    Operand::Label(name) => *labels
      .get(name)
      .unwrap_or_else(|| panic!("undefined label: {name}")),
    other => panic!("branch to unsupported operand {other:?}"),
  }
}
