//! Bytecode interpreter.
//!
//! [`step`] executes exactly one opcode of one process: the scheduler's
//! unit of work. Program bytes are fetched read-only from the store the
//! FAT sits on; operands live on the process's own stack.
//!
//! Error policy (one process can never take down the system):
//! - pops that underflow or mismatch log a warning and continue with a
//!   sentinel-style outcome,
//! - a program counter out of range, an unknown opcode, or an overflow
//!   while pushing a literal is a [`Fault`] — fatal to this process only.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Write;

use byteos_storage::{Fat, StorageDevice};

use crate::bytecode::{self, op};
use crate::process::{Pid, Process, ProcessState};
use crate::stack::Stack;
use crate::value::Value;
use crate::vars::VarTable;

/// Outcome of one executed opcode, for the scheduler.
#[derive(Debug, PartialEq)]
pub enum Step {
    /// Keep going next pass.
    Continue,
    /// The process executed STOP.
    Stop,
    /// The process asked to spawn a stored program.
    Fork { name: String },
    /// The process is waiting for another process to finish.
    Wait { pid: Pid },
}

/// Unrecoverable runtime error; terminates the faulting process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    PcOutOfRange(usize),
    UnknownOpcode(u8),
    StackOverflow,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::PcOutOfRange(pc) => write!(f, "program counter out of range ({:#06x})", pc),
            Fault::UnknownOpcode(code) => write!(f, "unknown opcode {}", code),
            Fault::StackOverflow => write!(f, "stack overflow"),
        }
    }
}

/// Fetch the next program byte, advancing the program counter.
fn fetch<D: StorageDevice>(proc: &mut Process, fat: &Fat<D>) -> Result<u8, Fault> {
    if proc.pc >= proc.end {
        return Err(Fault::PcOutOfRange(proc.pc));
    }
    let byte = fat.read_byte(proc.pc);
    proc.pc += 1;
    Ok(byte)
}

/// Execute one opcode of `proc`.
pub fn step<D: StorageDevice, W: Write>(
    proc: &mut Process,
    fat: &Fat<D>,
    vars: &mut VarTable,
    out: &mut W,
) -> Result<Step, Fault> {
    let op_addr = proc.pc;
    let opcode = fetch(proc, fat)?;

    match opcode {
        op::STOP => {
            vars.clear_all_vars(proc.pid);
            proc.state = ProcessState::Terminated;
            return Ok(Step::Stop);
        }

        // Literals: payload follows the opcode in the program stream.
        op::CHAR => {
            let c = fetch(proc, fat)?;
            proc.stack.push_char(c).map_err(|_| Fault::StackOverflow)?;
        }
        op::INT => {
            let hi = fetch(proc, fat)?;
            let lo = fetch(proc, fat)?;
            proc.stack
                .push_int(i16::from_be_bytes([hi, lo]))
                .map_err(|_| Fault::StackOverflow)?;
        }
        op::FLOAT => {
            let mut bytes = [0u8; 4];
            for b in bytes.iter_mut() {
                *b = fetch(proc, fat)?;
            }
            proc.stack
                .push_float(f32::from_be_bytes(bytes))
                .map_err(|_| Fault::StackOverflow)?;
        }
        op::STRING => {
            let mut bytes = Vec::new();
            loop {
                match fetch(proc, fat)? {
                    0 => break,
                    b => bytes.push(b),
                }
            }
            let s = match String::from_utf8_lossy(&bytes) {
                Cow::Borrowed(s) => String::from(s),
                Cow::Owned(s) => s,
            };
            proc.stack.push_str(&s).map_err(|_| Fault::StackOverflow)?;
        }

        op::SET => {
            let name = fetch(proc, fat)?;
            if let Err(e) = vars.set_var(name, proc.pid, &mut proc.stack) {
                log::warn!("[Interp] pid {}: SET '{}': {}", proc.pid, name as char, e);
            }
        }
        op::GET => {
            let name = fetch(proc, fat)?;
            if let Err(e) = vars.get_var(name, proc.pid, &mut proc.stack) {
                log::warn!("[Interp] pid {}: GET '{}': {}", proc.pid, name as char, e);
            }
        }

        op::INCREMENT => apply_delta(proc, 1),
        op::DECREMENT => apply_delta(proc, -1),

        op::PLUS
        | op::MINUS
        | op::TIMES
        | op::DIVIDEDBY
        | op::EQUALS
        | op::NOTEQUALS
        | op::LESSTHAN
        | op::GREATERTHAN => binary_op(proc, opcode),

        op::PRINT => match proc.stack.pop_value() {
            Ok(v) => {
                let _ = write!(out, "{}", v);
            }
            Err(e) => log::warn!("[Interp] pid {}: PRINT: {}", proc.pid, e),
        },
        op::PRINTLN => match proc.stack.pop_value() {
            Ok(v) => {
                let _ = writeln!(out, "{}", v);
            }
            Err(e) => log::warn!("[Interp] pid {}: PRINTLN: {}", proc.pid, e),
        },

        // Control flow. Distances are raw bytes from the converter; the
        // condition for a WHILE sits just before the opcode, so a taken
        // loop restarts at `op_addr - cond_len`.
        op::IF => {
            let skip = fetch(proc, fat)? as usize;
            if !pop_condition(proc) {
                proc.pc += skip;
            }
        }
        op::ELSE => {
            // Reached only by falling out of a completed if-branch.
            let skip = fetch(proc, fat)? as usize;
            proc.pc += skip;
        }
        op::ENDIF => {}
        op::WHILE => {
            let cond_len = fetch(proc, fat)? as usize;
            let body_len = fetch(proc, fat)? as usize;
            if pop_condition(proc) {
                proc.loop_addr = op_addr.saturating_sub(cond_len);
            } else {
                proc.pc += body_len;
            }
        }
        op::ENDWHILE | op::ENDLOOP => {
            proc.pc = proc.loop_addr;
        }
        op::LOOP => {
            proc.loop_addr = proc.pc;
        }

        op::FORK => match proc.stack.pop_str() {
            Ok(name) => return Ok(Step::Fork { name }),
            Err(e) => log::warn!("[Interp] pid {}: FORK: {}", proc.pid, e),
        },
        op::WAITUNTILDONE => match proc.stack.pop_int() {
            Ok(id) if id > 0 => return Ok(Step::Wait { pid: Pid(id as u32) }),
            Ok(id) => log::warn!("[Interp] pid {}: WAITUNTILDONE: bad pid {}", proc.pid, id),
            Err(e) => log::warn!("[Interp] pid {}: WAITUNTILDONE: {}", proc.pid, e),
        },

        other => return Err(Fault::UnknownOpcode(other)),
    }
    Ok(Step::Continue)
}

/// Pop a conditional's operand; a failed pop counts as false.
fn pop_condition(proc: &mut Process) -> bool {
    match proc.stack.pop_value() {
        Ok(v) => v.is_truthy(),
        Err(e) => {
            log::warn!("[Interp] pid {}: condition: {}", proc.pid, e);
            false
        }
    }
}

/// INCREMENT/DECREMENT: ±1 preserving the operand's tag.
///
/// Applying them to a string is a defined no-op: the value goes back
/// unchanged.
fn apply_delta(proc: &mut Process, delta: i16) {
    match proc.stack.pop_value() {
        Ok(Value::Char(c)) => push_back(&mut proc.stack, &Value::Char(c.wrapping_add_signed(delta as i8))),
        Ok(Value::Int(i)) => push_back(&mut proc.stack, &Value::Int(i.wrapping_add(delta))),
        Ok(Value::Float(f)) => push_back(&mut proc.stack, &Value::Float(f + delta as f32)),
        Ok(v @ Value::Str(_)) => push_back(&mut proc.stack, &v),
        Err(e) => log::warn!("[Interp] pid {}: increment/decrement: {}", proc.pid, e),
    }
}

/// Numeric view of an operand; chars promote to int, strings don't
/// participate.
enum Num {
    Int(i16),
    Float(f32),
}

fn numeric(v: &Value) -> Option<Num> {
    match v {
        Value::Char(c) => Some(Num::Int(*c as i16)),
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        Value::Str(_) => None,
    }
}

/// Pop two operands and push the result of a binary operation.
///
/// Int operands promote to float as soon as either side is a float.
/// Comparisons push Int 0/1. A string operand or an integer division by
/// zero logs a warning and pushes Int 0.
fn binary_op(proc: &mut Process, opcode: u8) {
    let insn = bytecode::name(opcode).unwrap_or("?");
    let rhs = match proc.stack.pop_value() {
        Ok(v) => v,
        Err(e) => {
            log::warn!("[Interp] pid {}: {}: {}", proc.pid, insn, e);
            return;
        }
    };
    let lhs = match proc.stack.pop_value() {
        Ok(v) => v,
        Err(e) => {
            log::warn!("[Interp] pid {}: {}: {}", proc.pid, insn, e);
            return;
        }
    };

    let (a, b) = match (numeric(&lhs), numeric(&rhs)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            log::warn!("[Interp] pid {}: {}: string operand", proc.pid, insn);
            push_back(&mut proc.stack, &Value::Int(0));
            return;
        }
    };

    let result = match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_op(proc.pid, insn, opcode, x, y),
        (Num::Int(x), Num::Float(y)) => float_op(opcode, x as f32, y),
        (Num::Float(x), Num::Int(y)) => float_op(opcode, x, y as f32),
        (Num::Float(x), Num::Float(y)) => float_op(opcode, x, y),
    };
    push_back(&mut proc.stack, &result);
}

fn int_op(pid: Pid, insn: &str, opcode: u8, x: i16, y: i16) -> Value {
    match opcode {
        op::PLUS => Value::Int(x.wrapping_add(y)),
        op::MINUS => Value::Int(x.wrapping_sub(y)),
        op::TIMES => Value::Int(x.wrapping_mul(y)),
        op::DIVIDEDBY => {
            if y == 0 {
                log::warn!("[Interp] pid {}: {}: division by zero", pid, insn);
                Value::Int(0)
            } else {
                Value::Int(x.wrapping_div(y))
            }
        }
        op::EQUALS => Value::Int((x == y) as i16),
        op::NOTEQUALS => Value::Int((x != y) as i16),
        op::LESSTHAN => Value::Int((x < y) as i16),
        op::GREATERTHAN => Value::Int((x > y) as i16),
        _ => Value::Int(0),
    }
}

fn float_op(opcode: u8, x: f32, y: f32) -> Value {
    match opcode {
        op::PLUS => Value::Float(x + y),
        op::MINUS => Value::Float(x - y),
        op::TIMES => Value::Float(x * y),
        op::DIVIDEDBY => Value::Float(x / y),
        op::EQUALS => Value::Int((x == y) as i16),
        op::NOTEQUALS => Value::Int((x != y) as i16),
        op::LESSTHAN => Value::Int((x < y) as i16),
        op::GREATERTHAN => Value::Int((x > y) as i16),
        _ => Value::Int(0),
    }
}

/// Push a result; re-pushing freed operand bytes cannot overflow, so a
/// failure here only warrants a warning.
fn push_back(stack: &mut Stack, value: &Value) {
    if let Err(e) = stack.push_value(value) {
        log::warn!("[Interp] push back: {}", e);
    }
}
