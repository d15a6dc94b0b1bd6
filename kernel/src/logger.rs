//! Kernel logger.
//!
//! Routes the `log` facade to a host-provided sink behind a spinlock, so
//! kernel code can use `log::warn!` and friends without knowing where
//! diagnostics end up (serial port, host stderr, a test buffer).
//! Diagnostics are deliberately separate from the system console, which
//! carries program output and command reports only.

use alloc::boxed::Box;
use alloc::format;
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// Destination for formatted log lines.
pub trait LogSink: Send {
    fn write_line(&mut self, line: &str);
}

static SINK: Mutex<Option<Box<dyn LogSink>>> = Mutex::new(None);

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = SINK.lock().as_mut() {
            sink.write_line(&format!("[{:5}] {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

/// Install `sink` as the global log destination.
///
/// Fails if a logger was already installed; the sink itself can be
/// swapped at any time with [`set_sink`].
pub fn init(sink: Box<dyn LogSink>, level: LevelFilter) -> Result<(), log::SetLoggerError> {
    *SINK.lock() = Some(sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Replace the log destination.
pub fn set_sink(sink: Box<dyn LogSink>) {
    *SINK.lock() = Some(sink);
}
