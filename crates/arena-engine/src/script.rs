//! Bytecode strategies
//!
//! Scripts are at most 64 bytes and run on a fixed 8-slot u8 stack. Jumps
//! only go forward, so every program halts within its own length. Values
//! follow the result-file convention: non-zero means cooperate.
//!
//! Unlike the built-ins, a script can fail at runtime (stack underflow,
//! stack overflow, running off the end). Those failures are reported to the
//! arbiter and disqualify the owner.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::payoff;
use crate::strategy::{Decision, Strategy};

/// Maximum script length in bytes.
pub const MAX_SCRIPT_LEN: usize = 64;

/// Stack depth (fixed array, no heap).
const STACK_SIZE: usize = 8;

pub mod op {
    pub const COOP: u8 = 0x00;
    pub const PUSH: u8 = 0x01;
    pub const OPP_LAST: u8 = 0x02;
    pub const MY_LAST: u8 = 0x03;
    pub const OPP_AGO: u8 = 0x04;
    pub const MY_AGO: u8 = 0x05;
    pub const OPP_DEFECTS: u8 = 0x06;
    pub const MY_DEFECTS: u8 = 0x07;
    pub const TURN: u8 = 0x08;
    pub const RAND: u8 = 0x09;
    pub const ADD: u8 = 0x0A;
    pub const SUB: u8 = 0x0B;
    pub const MUL: u8 = 0x0C;
    pub const GT: u8 = 0x0D;
    pub const LT: u8 = 0x0E;
    pub const EQ: u8 = 0x0F;
    pub const NOT: u8 = 0x10;
    pub const AND: u8 = 0x11;
    pub const OR: u8 = 0x12;
    pub const DUP: u8 = 0x13;
    pub const JMP_FWD: u8 = 0x14;
    pub const JMP_FWD_IF: u8 = 0x15;
    pub const DEFECT: u8 = 0x16;
    pub const SCORE_LAST: u8 = 0x17;
    pub const RETURN: u8 = 0x18;
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script is empty")]
    Empty,
    #[error("script exceeds {} bytes", MAX_SCRIPT_LEN)]
    TooLong,
    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },
    #[error("truncated immediate at offset {offset}")]
    TruncatedImmediate { offset: usize },
    #[error("forward jump out of bounds at offset {offset}")]
    JumpOutOfBounds { offset: usize },
    #[error("no terminal instruction (COOP/DEFECT/RETURN)")]
    NoTerminal,
    #[error("stack underflow at offset {offset}")]
    StackUnderflow { offset: usize },
    #[error("stack overflow at offset {offset}")]
    StackOverflow { offset: usize },
    #[error("ran off the end without deciding")]
    NoDecision,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Cooperate,
    Defect,
    Return,
    Push(u8),
    OppLast,
    MyLast,
    OppAgo,
    MyAgo,
    OppDefects,
    MyDefects,
    Turn,
    Rand,
    Add,
    Sub,
    Mul,
    Gt,
    Lt,
    Eq,
    Not,
    And,
    Or,
    Dup,
    Jump(u8),
    JumpIf(u8),
    ScoreLast,
}

impl Op {
    /// Decode the instruction at `pc` together with its width in bytes
    fn decode(code: &[u8], pc: usize) -> Result<(Op, usize), ScriptError> {
        let opcode = code[pc];
        let immediate = || {
            code.get(pc + 1)
                .copied()
                .ok_or(ScriptError::TruncatedImmediate { offset: pc })
        };
        let decoded = match opcode {
            op::COOP => Op::Cooperate,
            op::DEFECT => Op::Defect,
            op::RETURN => Op::Return,
            op::PUSH => return Ok((Op::Push(immediate()?), 2)),
            op::JMP_FWD => return Ok((Op::Jump(immediate()?), 2)),
            op::JMP_FWD_IF => return Ok((Op::JumpIf(immediate()?), 2)),
            op::OPP_LAST => Op::OppLast,
            op::MY_LAST => Op::MyLast,
            op::OPP_AGO => Op::OppAgo,
            op::MY_AGO => Op::MyAgo,
            op::OPP_DEFECTS => Op::OppDefects,
            op::MY_DEFECTS => Op::MyDefects,
            op::TURN => Op::Turn,
            op::RAND => Op::Rand,
            op::ADD => Op::Add,
            op::SUB => Op::Sub,
            op::MUL => Op::Mul,
            op::GT => Op::Gt,
            op::LT => Op::Lt,
            op::EQ => Op::Eq,
            op::NOT => Op::Not,
            op::AND => Op::And,
            op::OR => Op::Or,
            op::DUP => Op::Dup,
            op::SCORE_LAST => Op::ScoreLast,
            _ => return Err(ScriptError::UnknownOpcode { offset: pc, opcode }),
        };
        Ok((decoded, 1))
    }

    fn is_terminal(self) -> bool {
        matches!(self, Op::Cooperate | Op::Defect | Op::Return)
    }
}

/// A validated bytecode program
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    code: Vec<u8>,
}

impl Script {
    /// Validate bytecode: non-empty, at most `MAX_SCRIPT_LEN` bytes, known
    /// opcodes, complete immediates, in-bounds jumps, at least one terminal.
    pub fn compile(code: &[u8]) -> Result<Self, ScriptError> {
        if code.is_empty() {
            return Err(ScriptError::Empty);
        }
        if code.len() > MAX_SCRIPT_LEN {
            return Err(ScriptError::TooLong);
        }

        let mut pc = 0;
        let mut has_terminal = false;
        while pc < code.len() {
            let (op, width) = Op::decode(code, pc)?;
            if let Op::Jump(skip) | Op::JumpIf(skip) = op {
                if pc + width + skip as usize > code.len() {
                    return Err(ScriptError::JumpOutOfBounds { offset: pc });
                }
            }
            has_terminal |= op.is_terminal();
            pc += width;
        }

        if !has_terminal {
            return Err(ScriptError::NoTerminal);
        }
        Ok(Self { code: code.to_vec() })
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Execute once against the current histories
    pub fn run<R: Rng>(
        &self,
        own: &[Decision],
        opponent: &[Decision],
        rng: &mut R,
    ) -> Result<Decision, ScriptError> {
        let mut machine = Machine::default();
        let mut pc = 0;

        while pc < self.code.len() {
            let (op, width) = Op::decode(&self.code, pc)?;
            let at = pc;
            pc += width;

            match op {
                Op::Cooperate => return Ok(Decision::Cooperate),
                Op::Defect => return Ok(Decision::Defect),
                Op::Return => return Ok(Decision::from(machine.pop(at)? != 0)),
                Op::Push(v) => machine.push(at, v)?,
                Op::OppLast => machine.push(at, moves_ago(opponent, 0))?,
                Op::MyLast => machine.push(at, moves_ago(own, 0))?,
                Op::OppAgo => {
                    let n = machine.pop(at)? as usize;
                    machine.push(at, moves_ago(opponent, n))?;
                }
                Op::MyAgo => {
                    let n = machine.pop(at)? as usize;
                    machine.push(at, moves_ago(own, n))?;
                }
                Op::OppDefects => machine.push(at, count_defects(opponent))?,
                Op::MyDefects => machine.push(at, count_defects(own))?,
                Op::Turn => machine.push(at, own.len().min(u8::MAX as usize) as u8)?,
                Op::Rand => machine.push(at, rng.gen_range(0..100))?,
                Op::Add => machine.binary(at, u8::saturating_add)?,
                Op::Sub => machine.binary(at, u8::saturating_sub)?,
                Op::Mul => machine.binary(at, u8::saturating_mul)?,
                Op::Gt => machine.binary(at, |a, b| u8::from(a > b))?,
                Op::Lt => machine.binary(at, |a, b| u8::from(a < b))?,
                Op::Eq => machine.binary(at, |a, b| u8::from(a == b))?,
                Op::And => machine.binary(at, |a, b| u8::from(a != 0 && b != 0))?,
                Op::Or => machine.binary(at, |a, b| u8::from(a != 0 || b != 0))?,
                Op::Not => {
                    let a = machine.pop(at)?;
                    machine.push(at, u8::from(a == 0))?;
                }
                Op::Dup => {
                    let a = machine.pop(at)?;
                    machine.push(at, a)?;
                    machine.push(at, a)?;
                }
                Op::Jump(skip) => pc += skip as usize,
                Op::JumpIf(skip) => {
                    if machine.pop(at)? != 0 {
                        pc += skip as usize;
                    }
                }
                Op::ScoreLast => {
                    let points = match (own.last(), opponent.last()) {
                        (Some(&mine), Some(&theirs)) => payoff(mine, theirs).0,
                        _ => 3,
                    };
                    machine.push(at, points)?;
                }
            }
        }

        Err(ScriptError::NoDecision)
    }
}

#[derive(Default)]
struct Machine {
    stack: [u8; STACK_SIZE],
    sp: usize,
}

impl Machine {
    fn push(&mut self, offset: usize, value: u8) -> Result<(), ScriptError> {
        let slot = self
            .stack
            .get_mut(self.sp)
            .ok_or(ScriptError::StackOverflow { offset })?;
        *slot = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self, offset: usize) -> Result<u8, ScriptError> {
        if self.sp == 0 {
            return Err(ScriptError::StackUnderflow { offset });
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }

    fn binary(&mut self, offset: usize, f: impl Fn(u8, u8) -> u8) -> Result<(), ScriptError> {
        let b = self.pop(offset)?;
        let a = self.pop(offset)?;
        self.push(offset, f(a, b))
    }
}

/// 1 if the move `n` turns back was a cooperation; no data counts as cooperation
fn moves_ago(history: &[Decision], n: usize) -> u8 {
    match history.len().checked_sub(n + 1).map(|i| history[i]) {
        Some(Decision::Defect) => 0,
        _ => 1,
    }
}

fn count_defects(history: &[Decision]) -> u8 {
    let count = history.iter().filter(|d| **d == Decision::Defect).count();
    count.min(u8::MAX as usize) as u8
}

/// Match-scoped runner for a shared script
pub struct ScriptStrategy {
    script: Arc<Script>,
    rng: StdRng,
}

impl ScriptStrategy {
    pub fn new(script: Arc<Script>) -> Self {
        Self {
            script,
            rng: StdRng::from_entropy(),
        }
    }
}

impl Strategy for ScriptStrategy {
    fn decide(&mut self, own: &[Decision], opponent: &[Decision]) -> anyhow::Result<Decision> {
        Ok(self.script.run(own, opponent, &mut self.rng)?)
    }
}
