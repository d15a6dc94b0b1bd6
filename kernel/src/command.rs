//! Command layer.
//!
//! Parses whitespace-separated command lines from the host into a fixed
//! argument buffer and maps each command name onto a [`System`] handler.
//! Every handler writes a one-line report (or `Error: ...`) to the
//! system console, so an interactive host only has to echo the console
//! back to the user.

use core::fmt::Write;
use core::str;

use byteos_storage::{FsError, StorageDevice, ERASE_BYTE};

use crate::process::{Pid, ProcessError, MAX_PROCESSES};
use crate::system::System;

/// Maximum number of arguments per command.
pub const MAX_ARGS: usize = 3;

/// Maximum length of a single argument in bytes.
pub const ARG_SIZE: usize = 64;

/// Command layer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// A missing, oversized, or malformed argument; names the argument.
    Argument(&'static str),
    Fs(FsError),
    Process(ProcessError),
}

impl From<FsError> for CommandError {
    fn from(e: FsError) -> Self {
        CommandError::Fs(e)
    }
}

impl From<ProcessError> for CommandError {
    fn from(e: ProcessError) -> Self {
        CommandError::Process(e)
    }
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CommandError::Argument(what) => write!(f, "invalid argument: {}", what),
            CommandError::Fs(e) => write!(f, "{}", e),
            CommandError::Process(e) => write!(f, "{}", e),
        }
    }
}

/// Fixed-capacity argument buffer, filled once per command line.
#[derive(Debug)]
pub struct CommandArgs {
    bufs: [[u8; ARG_SIZE]; MAX_ARGS],
    lens: [usize; MAX_ARGS],
    count: usize,
}

impl CommandArgs {
    /// An empty argument list.
    pub fn new() -> Self {
        CommandArgs {
            bufs: [[0; ARG_SIZE]; MAX_ARGS],
            lens: [0; MAX_ARGS],
            count: 0,
        }
    }

    /// Copy up to [`MAX_ARGS`] tokens into the buffer.
    pub fn parse<'a, I>(tokens: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut args = CommandArgs::new();
        for token in tokens {
            if args.count == MAX_ARGS {
                return Err(CommandError::Argument("too many arguments"));
            }
            if token.len() > ARG_SIZE {
                return Err(CommandError::Argument("argument too long"));
            }
            args.bufs[args.count][..token.len()].copy_from_slice(token.as_bytes());
            args.lens[args.count] = token.len();
            args.count += 1;
        }
        Ok(args)
    }

    /// Number of arguments present.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Argument `i`, or the empty string past the end.
    pub fn arg(&self, i: usize) -> &str {
        if i >= self.count {
            return "";
        }
        // Filled from &str tokens, so always valid UTF-8.
        str::from_utf8(&self.bufs[i][..self.lens[i]]).unwrap_or("")
    }
}

impl Default for CommandArgs {
    fn default() -> Self {
        Self::new()
    }
}

/// Split one input line into a command name and its arguments.
/// `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<(&str, CommandArgs)>, CommandError> {
    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return Ok(None);
    };
    let args = CommandArgs::parse(tokens)?;
    Ok(Some((command, args)))
}

fn required<'a>(args: &'a CommandArgs, i: usize, what: &'static str) -> Result<&'a str, CommandError> {
    let arg = args.arg(i);
    if arg.is_empty() {
        return Err(CommandError::Argument(what));
    }
    Ok(arg)
}

fn parse_pid(text: &str) -> Result<Pid, CommandError> {
    match text.parse::<u32>() {
        Ok(id) if id > 0 => Ok(Pid(id)),
        _ => Err(ProcessError::InvalidId.into()),
    }
}

impl<D: StorageDevice, W: Write> System<D, W> {
    /// Run one command line against the system, reporting to the console.
    pub fn dispatch(&mut self, command: &str, args: &CommandArgs) {
        let result = match command {
            "store" => self.cmd_store(args),
            "retrieve" => self.cmd_retrieve(args),
            "erase" => self.cmd_erase(args),
            "files" => self.cmd_files(),
            "freespace" => self.cmd_freespace(),
            "run" => self.cmd_run(args),
            "list" => self.cmd_list(),
            "suspend" => self.cmd_suspend(args),
            "resume" => self.cmd_resume(args),
            "kill" => self.cmd_kill(args),
            _ => {
                let _ = writeln!(self.console, "Command \"{}\" not found.", command);
                return;
            }
        };
        if let Err(e) = result {
            let _ = writeln!(self.console, "Error: {}", e);
        }
    }

    /// `store <name> <size> [data]`: allocate a file, seeding it with the
    /// bytes of `data` if given.
    pub fn cmd_store(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        let name = required(args, 0, "file name")?;
        let size = required(args, 1, "size")?
            .parse::<u16>()
            .map_err(|_| CommandError::Argument("size"))?;
        let data = args.arg(2);

        self.fat.store(name, size, data.as_bytes())?;
        let _ = writeln!(self.console, "Stored \"{}\" ({} bytes).", name, size);
        Ok(())
    }

    /// `retrieve <name>`: print a file's contents. Never-written bytes
    /// (still at the erase value) are skipped.
    pub fn cmd_retrieve(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        let name = required(args, 0, "file name")?;
        let data = self.fat.retrieve(name)?;
        for &byte in data.iter().filter(|&&b| b != ERASE_BYTE) {
            let _ = self.console.write_char(byte as char);
        }
        let _ = writeln!(self.console);
        Ok(())
    }

    /// `erase <name>`: remove a file and free its bytes.
    pub fn cmd_erase(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        let name = required(args, 0, "file name")?;
        self.fat.erase(name)?;
        let _ = writeln!(self.console, "Erased \"{}\".", name);
        Ok(())
    }

    /// `files`: list every stored file with its size.
    pub fn cmd_files(&mut self) -> Result<(), CommandError> {
        let _ = writeln!(
            self.console,
            "{} of {} file slots in use:",
            self.fat.file_count(),
            byteos_storage::MAX_FILES
        );
        for entry in self.fat.entries() {
            let _ = writeln!(self.console, "  {}  {} bytes", entry.name_str(), entry.size);
        }
        Ok(())
    }

    /// `freespace`: report the largest storable file size and the total
    /// free byte count.
    pub fn cmd_freespace(&mut self) -> Result<(), CommandError> {
        let largest = self.fat.max_free();
        let total = self.fat.total_free();
        let _ = writeln!(
            self.console,
            "Largest free block: {} bytes ({} bytes free in total).",
            largest, total
        );
        Ok(())
    }

    /// `run <name>`: start a stored program as a new process.
    pub fn cmd_run(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        let name = required(args, 0, "file name")?;
        let pid = self.run_program(name)?;
        let _ = writeln!(self.console, "Started \"{}\" as process {}.", name, pid);
        Ok(())
    }

    /// `list`: list every live process with its state.
    pub fn cmd_list(&mut self) -> Result<(), CommandError> {
        let _ = writeln!(
            self.console,
            "{} of {} process slots in use:",
            self.procs.live_count(),
            MAX_PROCESSES
        );
        for proc in self.procs.live() {
            let _ = writeln!(self.console, "  {}  {}  {}", proc.pid, proc.name, proc.state);
        }
        Ok(())
    }

    /// `suspend <pid>`: pause a running process.
    pub fn cmd_suspend(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        let pid = parse_pid(required(args, 0, "process id")?)?;
        if self.procs.suspend(pid)? {
            let _ = writeln!(self.console, "Suspended process {}.", pid);
        } else {
            let _ = writeln!(self.console, "Process {} is already paused.", pid);
        }
        Ok(())
    }

    /// `resume <pid>`: wake a paused process.
    pub fn cmd_resume(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        let pid = parse_pid(required(args, 0, "process id")?)?;
        if self.procs.resume(pid)? {
            let _ = writeln!(self.console, "Resumed process {}.", pid);
        } else {
            let _ = writeln!(self.console, "Process {} is already running.", pid);
        }
        Ok(())
    }

    /// `kill <pid>`: terminate a process, releasing its variables.
    pub fn cmd_kill(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        let pid = parse_pid(required(args, 0, "process id")?)?;
        self.kill_process(pid)?;
        let _ = writeln!(self.console, "Killed process {}.", pid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_splits_command_and_args() {
        let (command, args) = parse_line("store test 12 hello").unwrap().unwrap();
        assert_eq!(command, "store");
        assert_eq!(args.count(), 3);
        assert_eq!(args.arg(0), "test");
        assert_eq!(args.arg(1), "12");
        assert_eq!(args.arg(2), "hello");
    }

    #[test]
    fn blank_lines_parse_to_nothing() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   \t ").unwrap().is_none());
    }

    #[test]
    fn excess_arguments_are_rejected() {
        assert_eq!(
            parse_line("store a b c d").unwrap_err(),
            CommandError::Argument("too many arguments")
        );
    }

    #[test]
    fn missing_argument_reads_as_empty() {
        let (_, args) = parse_line("files").unwrap().unwrap();
        assert_eq!(args.count(), 0);
        assert_eq!(args.arg(0), "");
        assert_eq!(args.arg(7), "");
    }

    #[test]
    fn pids_must_be_positive_integers() {
        assert_eq!(parse_pid("3"), Ok(Pid(3)));
        assert_eq!(
            parse_pid("0"),
            Err(CommandError::Process(ProcessError::InvalidId))
        );
        assert_eq!(
            parse_pid("-1"),
            Err(CommandError::Process(ProcessError::InvalidId))
        );
        assert_eq!(
            parse_pid("abc"),
            Err(CommandError::Process(ProcessError::InvalidId))
        );
    }
}
