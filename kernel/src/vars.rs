//! RAM variable table.
//!
//! Backs the `SET`/`GET` instruction family: variables are popped off a
//! process's stack into a small RAM arena and pushed back on demand,
//! re-creating the exact stack encoding. Each variable belongs to one
//! process and is released when that process terminates.
//!
//! Allocation mirrors the FAT: entries are sorted by arena address and
//! the first fitting gap wins (head, between entries, tail).

use alloc::vec::Vec;
use core::fmt;

use crate::process::Pid;
use crate::stack::{Stack, StackError};
use crate::value::tag;

/// Maximum number of live variables across all processes.
pub const MAX_VARS: usize = 25;

/// Arena capacity in bytes.
pub const MEM_SIZE: usize = 256;

/// Variable table errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarError {
    /// All variable slots are in use.
    TableFull,
    /// No contiguous arena run fits the value.
    NoSpace,
    /// No variable with that name for that process.
    NotFound,
    /// The donating or receiving stack failed.
    Stack(StackError),
}

impl From<StackError> for VarError {
    fn from(e: StackError) -> Self {
        VarError::Stack(e)
    }
}

impl fmt::Display for VarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarError::TableFull => write!(f, "variable table is full"),
            VarError::NoSpace => write!(f, "not enough RAM for variable"),
            VarError::NotFound => write!(f, "variable not found"),
            VarError::Stack(e) => write!(f, "{}", e),
        }
    }
}

/// One variable table entry.
#[derive(Debug, Clone, Copy)]
struct Variable {
    /// One-byte variable name.
    name: u8,
    /// Stack tag of the stored value.
    tag: u8,
    /// Payload size in bytes (strings: content plus NUL).
    size: u8,
    /// First arena byte.
    addr: u8,
    /// Owning process.
    pid: Pid,
}

impl Variable {
    fn end(&self) -> usize {
        self.addr as usize + self.size as usize
    }
}

/// The RAM variable table and its arena.
pub struct VarTable {
    vars: Vec<Variable>,
    memory: [u8; MEM_SIZE],
}

impl VarTable {
    /// Create an empty table.
    pub fn new() -> Self {
        VarTable {
            vars: Vec::new(),
            memory: [0; MEM_SIZE],
        }
    }

    /// Number of live variables.
    pub fn count(&self) -> usize {
        self.vars.len()
    }

    /// Number of live variables owned by `pid`.
    pub fn count_for(&self, pid: Pid) -> usize {
        self.vars.iter().filter(|v| v.pid == pid).count()
    }

    /// Pop one typed value off `stack` and store it under `name`.
    ///
    /// An existing variable with the same name and process is replaced.
    /// On failure the value's tag (and, for strings, its length byte)
    /// has already been consumed.
    pub fn set_var(&mut self, name: u8, pid: Pid, stack: &mut Stack) -> Result<(), VarError> {
        let value_tag = stack.pop_byte()?;
        let size = match value_tag {
            tag::CHAR => 1usize,
            tag::INT => 2,
            tag::FLOAT => 4,
            tag::STRING => stack.pop_byte()? as usize,
            found => return Err(VarError::Stack(StackError::TypeMismatch { found })),
        };

        // Replace rather than shadow.
        let _ = self.clear_var(name, pid);
        if self.vars.len() == MAX_VARS {
            return Err(VarError::TableFull);
        }
        let addr = self.find_free(size)?;

        // Bytes come off the stack top-down, reverse of push order.
        for i in 0..size {
            let b = stack.pop_byte()?;
            self.memory[addr as usize + size - 1 - i] = b;
        }
        self.vars.push(Variable {
            name,
            tag: value_tag,
            size: size as u8,
            addr,
            pid,
        });
        Ok(())
    }

    /// Push a copy of a stored variable back onto `stack`, re-creating
    /// the original encoding (payload, [length,] tag).
    pub fn get_var(&self, name: u8, pid: Pid, stack: &mut Stack) -> Result<(), VarError> {
        let var = self
            .vars
            .iter()
            .find(|v| v.name == name && v.pid == pid)
            .ok_or(VarError::NotFound)?;

        let extra = if var.tag == tag::STRING { 2 } else { 1 };
        stack.require(var.size as usize + extra)?;
        for addr in var.addr as usize..var.end() {
            stack.push_byte(self.memory[addr])?;
        }
        if var.tag == tag::STRING {
            stack.push_byte(var.size)?;
        }
        stack.push_byte(var.tag)?;
        Ok(())
    }

    /// Remove one variable.
    pub fn clear_var(&mut self, name: u8, pid: Pid) -> Result<(), VarError> {
        let pos = self
            .vars
            .iter()
            .position(|v| v.name == name && v.pid == pid)
            .ok_or(VarError::NotFound)?;
        self.vars.remove(pos);
        Ok(())
    }

    /// Remove every variable owned by `pid`.
    pub fn clear_all_vars(&mut self, pid: Pid) {
        self.vars.retain(|v| v.pid != pid);
    }

    /// First arena address of a free run of `size` bytes.
    fn find_free(&mut self, size: usize) -> Result<u8, VarError> {
        if size == 0 || size > MEM_SIZE {
            return Err(VarError::NoSpace);
        }
        self.vars.sort_unstable_by_key(|v| v.addr);

        let mut prev_end = 0usize;
        for var in &self.vars {
            if var.addr as usize - prev_end >= size {
                return Ok(prev_end as u8);
            }
            prev_end = var.end();
        }
        if MEM_SIZE - prev_end >= size {
            return Ok(prev_end as u8);
        }
        Err(VarError::NoSpace)
    }
}

impl Default for VarTable {
    fn default() -> Self {
        Self::new()
    }
}
