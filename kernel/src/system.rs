//! System state and the scheduler.
//!
//! [`System`] owns every table in the machine: the FAT (with its storage
//! device), the process table, the RAM variable table, and the output
//! sink. There are no hidden globals; the embedding host constructs one
//! `System` and interleaves its own input polling with [`System::tick`]
//! calls in a non-blocking outer loop.
//!
//! Scheduling is cooperative round-robin at opcode granularity: one tick
//! visits every process slot in index order and executes exactly one
//! opcode per running process. Paused and terminated processes consume
//! no cycles. A process that never yields still gets only its
//! one-opcode-per-pass share, so nothing can monopolize a round.

use core::fmt::Write;

use byteos_storage::{Fat, FsError, StorageDevice};

use crate::command::CommandError;
use crate::interp::{self, Step};
use crate::process::{Pid, ProcessState, ProcessTable, MAX_PROCESSES};
use crate::vars::VarTable;

/// The whole machine.
pub struct System<D: StorageDevice, W: Write> {
    pub(crate) fat: Fat<D>,
    pub(crate) procs: ProcessTable,
    pub(crate) vars: VarTable,
    pub(crate) console: W,
}

impl<D: StorageDevice, W: Write> System<D, W> {
    /// Bring up a system over a mounted FAT and an output sink.
    pub fn new(fat: Fat<D>, console: W) -> Self {
        System {
            fat,
            procs: ProcessTable::new(),
            vars: VarTable::new(),
            console,
        }
    }

    /// The file allocation table.
    pub fn fat(&self) -> &Fat<D> {
        &self.fat
    }

    /// Mutable FAT access, for hosts that receive file data out of band.
    pub fn fat_mut(&mut self) -> &mut Fat<D> {
        &mut self.fat
    }

    /// The process table.
    pub fn procs(&self) -> &ProcessTable {
        &self.procs
    }

    /// The variable table.
    pub fn vars(&self) -> &VarTable {
        &self.vars
    }

    /// The output sink.
    pub fn console(&self) -> &W {
        &self.console
    }

    /// Mutable output sink access (e.g. to drain a buffered console).
    pub fn console_mut(&mut self) -> &mut W {
        &mut self.console
    }

    /// Create a running process for the stored program `name`.
    pub fn run_program(&mut self, name: &str) -> Result<Pid, CommandError> {
        let entry = self.fat.find_entry(name).ok_or(FsError::NotFound)?;
        let (base, end) = (entry.addr as usize, entry.end());
        let pid = self.procs.spawn(name, base, end)?;
        Ok(pid)
    }

    /// Release a process's variables and terminate it.
    pub fn kill_process(&mut self, pid: Pid) -> Result<(), CommandError> {
        if !self.procs.is_live(pid) {
            return Err(crate::process::ProcessError::NotFound.into());
        }
        self.vars.clear_all_vars(pid);
        self.procs.terminate(pid)?;
        Ok(())
    }

    /// One scheduling pass over all process slots.
    pub fn tick(&mut self) {
        self.procs.reap();
        for slot in 0..MAX_PROCESSES {
            let Some(pid) = self.procs.pid_at(slot) else {
                continue;
            };
            let result = {
                let Some(proc) = self.procs.get_mut(pid) else {
                    continue;
                };
                if proc.state != ProcessState::Running {
                    continue;
                }
                interp::step(proc, &self.fat, &mut self.vars, &mut self.console)
            };

            match result {
                Ok(Step::Continue) => {}
                Ok(Step::Stop) => {
                    log::debug!("[Sched] pid {} stopped", pid);
                }
                Ok(Step::Fork { name }) => self.finish_fork(pid, &name),
                Ok(Step::Wait { pid: target }) => self.finish_wait(pid, target),
                Err(fault) => {
                    // Fatal to this process only; the rest of the round
                    // continues untouched.
                    self.vars.clear_all_vars(pid);
                    let _ = self.procs.terminate(pid);
                    let _ = writeln!(self.console, "Process {} terminated: {}", pid, fault);
                    log::warn!("[Sched] pid {} fault: {}", pid, fault);
                }
            }
        }
    }

    /// Second half of FORK: spawn the requested program and hand the
    /// child pid (or 0 on failure) back on the parent's stack.
    ///
    /// Stack ints are 16-bit, so a child pid past `i16::MAX` cannot be
    /// handed back; the parent gets the failure value 0 (the child still
    /// runs).
    fn finish_fork(&mut self, parent: Pid, name: &str) {
        let child = match self.run_program(name) {
            Ok(pid) => match i16::try_from(pid.0) {
                Ok(id) => id,
                Err(_) => {
                    log::warn!(
                        "[Sched] pid {}: fork \"{}\": child pid {} exceeds stack range",
                        parent,
                        name,
                        pid
                    );
                    0
                }
            },
            Err(e) => {
                log::warn!("[Sched] pid {}: fork \"{}\": {}", parent, name, e);
                0
            }
        };
        if let Some(proc) = self.procs.get_mut(parent) {
            if let Err(e) = proc.stack.push_int(child) {
                log::warn!("[Sched] pid {}: fork result: {}", parent, e);
            }
        }
    }

    /// Second half of WAITUNTILDONE: if the target still lives, put the
    /// operand back and step the waiter onto the same opcode so it
    /// retries next pass. The target pid was popped as a positive i16,
    /// so the re-push cannot truncate.
    fn finish_wait(&mut self, waiter: Pid, target: Pid) {
        if !self.procs.is_live(target) {
            return;
        }
        if let Some(proc) = self.procs.get_mut(waiter) {
            if let Err(e) = proc.stack.push_int(target.0 as i16) {
                log::warn!("[Sched] pid {}: wait: {}", waiter, e);
            }
            proc.pc -= 1;
        }
    }
}
