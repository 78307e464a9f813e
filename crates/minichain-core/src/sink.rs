//! Where the ledger reports progress.
//!
//! The core never logs through a global: every [`Ledger`](crate::Ledger) owns a
//! [`LogSink`]. [`TracingSink`] is the default and forwards to `tracing`.
use std::cell::RefCell;

use tracing::Level;

pub trait LogSink {
    fn log(&self, level: Level, message: &str);
}

/// Forwards each message to the `tracing` macro of the same level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!("{message}"),
            Level::WARN => tracing::warn!("{message}"),
            Level::INFO => tracing::info!("{message}"),
            Level::DEBUG => tracing::debug!("{message}"),
            _ => tracing::trace!("{message}"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Keeps every message in memory, in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: RefCell<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.borrow().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// True if any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|(_, message)| message.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        self.entries.borrow_mut().push((level, message.to_string()));
    }
}

impl<F> LogSink for F
where
    F: Fn(Level, &str),
{
    fn log(&self, level: Level, message: &str) {
        self(level, message)
    }
}
