//! ByteOS kernel.
//!
//! A cooperatively scheduled bytecode machine for very small hosts:
//! programs live as files in the storage FAT, run as fixed-slot
//! processes with their own typed byte stacks, and share a RAM variable
//! table. The host owns the outer loop, alternating between feeding
//! command lines to [`command`] and advancing the scheduler with
//! [`System::tick`].
//!
//! The crate is `no_std` + `alloc`; diagnostics go through the `log`
//! facade (see [`logger`]), program output and command reports through
//! the console sink the [`System`] is built with.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bytecode;
pub mod command;
pub mod interp;
pub mod logger;
pub mod process;
pub mod stack;
pub mod system;
pub mod value;
pub mod vars;

pub use command::{parse_line, CommandArgs, CommandError};
pub use process::{Pid, ProcessState};
pub use stack::{Stack, StackError};
pub use system::System;
pub use value::Value;
