//! Process table.
//!
//! Maintains the fixed set of process slots, the pid-to-slot map, and the
//! process state machine: Running → Paused → Running → Terminated (or
//! Running → Terminated directly, via STOP, kill, or a fatal fault).
//!
//! Pids come from a monotonic counter and are never reused for the
//! lifetime of the system, so a terminated process's id can never alias
//! a later one even though its table slot is physically recycled.

use alloc::string::String;
use core::fmt;
use hashbrown::HashMap;

use crate::stack::Stack;

/// Maximum number of process table slots.
pub const MAX_PROCESSES: usize = 10;

/// Process ID type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Stepped once per scheduling pass.
    Running,
    /// Skipped by the scheduler, resumable.
    Paused,
    /// Finished; the slot is reaped on the next pass.
    Terminated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Running => write!(f, "running"),
            ProcessState::Paused => write!(f, "paused"),
            ProcessState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Process table errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    /// The id is not a positive integer.
    InvalidId,
    /// No live process with that id.
    NotFound,
    /// Every table slot is occupied.
    TableFull,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::InvalidId => write!(f, "process id must be a positive integer"),
            ProcessError::NotFound => write!(f, "process not found"),
            ProcessError::TableFull => write!(f, "process table is full"),
        }
    }
}

/// One bytecode process.
pub struct Process {
    /// Unique for the lifetime of the system.
    pub pid: Pid,
    /// Name of the stored program this process runs.
    pub name: String,
    pub state: ProcessState,
    /// Program counter: an offset into the store.
    pub pc: usize,
    /// First byte of the program on the store.
    pub base: usize,
    /// One past the last program byte.
    pub end: usize,
    /// Restart address of the innermost active loop.
    pub loop_addr: usize,
    /// This process's own value stack.
    pub stack: Stack,
}

/// Fixed-slot process table.
pub struct ProcessTable {
    slots: [Option<Process>; MAX_PROCESSES],
    /// pid → slot index, live processes only.
    index: HashMap<Pid, usize>,
    next_pid: u32,
}

impl ProcessTable {
    /// Create an empty table. The first pid handed out is 1.
    pub fn new() -> Self {
        ProcessTable {
            slots: core::array::from_fn(|_| None),
            index: HashMap::new(),
            next_pid: 1,
        }
    }

    /// Number of live (non-terminated) processes.
    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    /// Iterate live processes in slot order.
    pub fn live(&self) -> impl Iterator<Item = &Process> {
        self.slots
            .iter()
            .flatten()
            .filter(|p| p.state != ProcessState::Terminated)
    }

    /// Pid occupying a slot, if any.
    pub fn pid_at(&self, slot: usize) -> Option<Pid> {
        self.slots.get(slot)?.as_ref().map(|p| p.pid)
    }

    /// Look up a live process.
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        let slot = *self.index.get(&pid)?;
        self.slots[slot]
            .as_ref()
            .filter(|p| p.state != ProcessState::Terminated)
    }

    /// Look up a live process mutably.
    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        let slot = *self.index.get(&pid)?;
        self.slots[slot]
            .as_mut()
            .filter(|p| p.state != ProcessState::Terminated)
    }

    /// Check whether a pid refers to a live process.
    pub fn is_live(&self, pid: Pid) -> bool {
        self.get(pid).is_some()
    }

    /// Create a new running process for a program stored at
    /// `[base, end)`, with a fresh empty stack.
    pub fn spawn(&mut self, name: &str, base: usize, end: usize) -> Result<Pid, ProcessError> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ProcessError::TableFull)?;
        let pid = Pid(self.next_pid);
        self.next_pid += 1;

        self.slots[slot] = Some(Process {
            pid,
            name: String::from(name),
            state: ProcessState::Running,
            pc: base,
            base,
            end,
            loop_addr: base,
            stack: Stack::new(),
        });
        self.index.insert(pid, slot);
        log::debug!("[Proc] Spawned \"{}\" as pid {} in slot {}", name, pid.0, slot);
        Ok(pid)
    }

    /// Pause a running process. `Ok(false)` if it was already paused.
    pub fn suspend(&mut self, pid: Pid) -> Result<bool, ProcessError> {
        let proc = self.get_mut(pid).ok_or(ProcessError::NotFound)?;
        if proc.state == ProcessState::Paused {
            return Ok(false);
        }
        proc.state = ProcessState::Paused;
        Ok(true)
    }

    /// Resume a paused process. `Ok(false)` if it was already running.
    pub fn resume(&mut self, pid: Pid) -> Result<bool, ProcessError> {
        let proc = self.get_mut(pid).ok_or(ProcessError::NotFound)?;
        if proc.state == ProcessState::Running {
            return Ok(false);
        }
        proc.state = ProcessState::Running;
        Ok(true)
    }

    /// Mark a process terminated. Its slot is reclaimed by [`Self::reap`].
    pub fn terminate(&mut self, pid: Pid) -> Result<(), ProcessError> {
        let proc = self.get_mut(pid).ok_or(ProcessError::NotFound)?;
        proc.state = ProcessState::Terminated;
        Ok(())
    }

    /// Free the slots of terminated processes, dropping their stacks.
    pub fn reap(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(proc) = slot {
                if proc.state == ProcessState::Terminated {
                    self.index.remove(&proc.pid);
                    *slot = None;
                }
            }
        }
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_hands_out_monotonic_pids() {
        let mut table = ProcessTable::new();
        let a = table.spawn("a", 0, 10).unwrap();
        let b = table.spawn("b", 0, 10).unwrap();
        assert_eq!(a, Pid(1));
        assert_eq!(b, Pid(2));
        assert_eq!(table.live_count(), 2);
    }

    #[test]
    fn pids_are_never_reused_after_reap() {
        let mut table = ProcessTable::new();
        let a = table.spawn("a", 0, 10).unwrap();
        table.terminate(a).unwrap();
        table.reap();
        let b = table.spawn("b", 0, 10).unwrap();
        assert_ne!(a, b);
        assert!(table.get(a).is_none());
    }

    #[test]
    fn table_capacity_is_enforced() {
        let mut table = ProcessTable::new();
        for _ in 0..MAX_PROCESSES {
            table.spawn("p", 0, 10).unwrap();
        }
        assert_eq!(table.spawn("extra", 0, 10), Err(ProcessError::TableFull));
    }

    #[test]
    fn suspend_resume_cycle() {
        let mut table = ProcessTable::new();
        let pid = table.spawn("p", 0, 10).unwrap();

        assert_eq!(table.suspend(pid), Ok(true));
        assert_eq!(table.suspend(pid), Ok(false)); // already paused
        assert_eq!(table.resume(pid), Ok(true));
        assert_eq!(table.resume(pid), Ok(false)); // already running
    }

    #[test]
    fn unknown_pid_is_not_found() {
        let mut table = ProcessTable::new();
        assert_eq!(table.suspend(Pid(99)), Err(ProcessError::NotFound));
        assert_eq!(table.resume(Pid(99)), Err(ProcessError::NotFound));
        assert_eq!(table.terminate(Pid(99)), Err(ProcessError::NotFound));
    }

    #[test]
    fn terminated_pid_is_never_matched_again() {
        let mut table = ProcessTable::new();
        let pid = table.spawn("p", 0, 10).unwrap();
        table.terminate(pid).unwrap();
        // Not yet reaped, but already invisible to lookups.
        assert!(!table.is_live(pid));
        assert_eq!(table.suspend(pid), Err(ProcessError::NotFound));
    }
}
