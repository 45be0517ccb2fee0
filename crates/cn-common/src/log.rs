// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Logging model for the cellnode firmware
//!
//! Producers never touch the serial port. They format into a bounded
//! string and hand a [`LogMessage`] to the log task through its queue; the
//! log task applies the level and the task filter and writes the line.
//!
//! Kernel services that need to report (watchdog, allocator) only see the
//! [`LogSink`] trait, so they stay independent of the queue fabric.
//!
//! # Security
//!
//! - Credentials must never be logged

use core::fmt::{self, Write};
use heapless::{String, Vec};

use crate::constants::{LOG_MAX_LIST, MEDIUM_MSG_MAX, TASK_NAME_WIDTH};
use crate::time::Ticks;
use crate::types::TaskHandle;

/// Text carried by a log message
pub type LogText = String<MEDIUM_MSG_MAX>;

/// Log severity, ordered from silent to most verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Nothing is emitted
    None = 0,
    /// Errors
    Error = 1,
    /// Informational messages
    Info = 2,
    /// Debug messages
    Debug = 3,
    /// Everything, including per-iteration chatter
    Insane = 4,
}

impl LogLevel {
    /// Convert from the numeric level used on the shell
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Error),
            2 => Some(Self::Info),
            3 => Some(Self::Debug),
            4 => Some(Self::Insane),
            _ => None,
        }
    }

    /// Level name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Error => "ERROR",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Insane => "INSANE",
        }
    }

    /// Whether a message at `self` passes a logger configured at `current`
    #[must_use]
    pub const fn enabled_at(&self, current: LogLevel) -> bool {
        (*self as u8) <= (current as u8)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LogLevel {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.as_str());
    }
}

/// Task filter mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Every task is shown
    #[default]
    All,
    /// Only listed tasks are shown
    Show,
    /// Listed tasks are hidden
    Hide,
}

/// Bounded set of task handles scoping which tasks' lines are emitted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskFilter {
    mode: FilterMode,
    tasks: Vec<TaskHandle, LOG_MAX_LIST>,
}

impl TaskFilter {
    /// Filter that shows every task
    #[must_use]
    pub const fn all() -> Self {
        Self {
            mode: FilterMode::All,
            tasks: Vec::new(),
        }
    }

    /// Build a show-only or hide-only filter
    ///
    /// Returns `None` if more than [`LOG_MAX_LIST`] handles are given.
    #[must_use]
    pub fn new(mode: FilterMode, tasks: &[TaskHandle]) -> Option<Self> {
        let tasks = Vec::from_slice(tasks).ok()?;
        Some(Self { mode, tasks })
    }

    /// Filter mode
    #[must_use]
    pub const fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Listed handles
    #[must_use]
    pub fn tasks(&self) -> &[TaskHandle] {
        &self.tasks
    }

    /// Whether lines from `task` pass the filter
    #[must_use]
    pub fn shows(&self, task: TaskHandle) -> bool {
        let listed = self.tasks.contains(&task);
        match self.mode {
            FilterMode::All => true,
            FilterMode::Show => listed,
            FilterMode::Hide => !listed,
        }
    }
}

/// Message consumed by the log task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogMessage {
    /// Single raw character (shell echo)
    Char(u8),
    /// Forced text, written regardless of level and filter
    Plain(LogText),
    /// Leveled line with its producer and capture time
    Leveled {
        /// Severity
        level: LogLevel,
        /// Producing task
        task: TaskHandle,
        /// Tick count at capture
        ticks: Ticks,
        /// Line text without terminator
        text: LogText,
    },
    /// Replace the log task's filter
    Filter(TaskFilter),
}

/// Destination for log output
///
/// Implemented by the queue-backed producer in the application and by
/// capture sinks in tests.
pub trait LogSink {
    /// Emit a leveled line from the calling task
    fn emit(&self, level: LogLevel, args: fmt::Arguments<'_>);

    /// Emit forced text verbatim (no prefix, no terminator added)
    fn print(&self, args: fmt::Arguments<'_>);

    /// Emit one raw character
    fn putchar(&self, c: u8);
}

impl<T: LogSink + ?Sized> LogSink for &T {
    fn emit(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        (**self).emit(level, args);
    }

    fn print(&self, args: fmt::Arguments<'_>) {
        (**self).print(args);
    }

    fn putchar(&self, c: u8) {
        (**self).putchar(c);
    }
}

/// Format arguments into a bounded log string, truncating on overflow
#[must_use]
pub fn format_text(args: fmt::Arguments<'_>) -> LogText {
    let mut text = Truncating(LogText::new());
    let _ = text.write_fmt(args);
    text.0
}

struct Truncating(LogText);

impl Write for Truncating {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                return Err(fmt::Error);
            }
        }
        Ok(())
    }
}

/// Write the `[name        ] <stamp>: ` prefix of a leveled line
///
/// # Errors
/// Propagates writer errors.
pub fn write_prefix<W: Write>(out: &mut W, task_name: &str, stamp: &dyn fmt::Display) -> fmt::Result {
    write!(out, "[{task_name:<width$}] <{stamp}>: ", width = TASK_NAME_WIDTH)
}

/// Log an error-level line
#[macro_export]
macro_rules! log_error {
    ($sink:expr, $($arg:tt)*) => {
        $crate::log::LogSink::emit(&$sink, $crate::log::LogLevel::Error, format_args!($($arg)*))
    };
}

/// Log an info-level line
#[macro_export]
macro_rules! log_info {
    ($sink:expr, $($arg:tt)*) => {
        $crate::log::LogSink::emit(&$sink, $crate::log::LogLevel::Info, format_args!($($arg)*))
    };
}

/// Log a debug-level line
#[macro_export]
macro_rules! log_debug {
    ($sink:expr, $($arg:tt)*) => {
        $crate::log::LogSink::emit(&$sink, $crate::log::LogLevel::Debug, format_args!($($arg)*))
    };
}

/// Log an insane-level line
#[macro_export]
macro_rules! log_insane {
    ($sink:expr, $($arg:tt)*) => {
        $crate::log::LogSink::emit(&$sink, $crate::log::LogLevel::Insane, format_args!($($arg)*))
    };
}

/// Print forced text
#[macro_export]
macro_rules! log_print {
    ($sink:expr, $($arg:tt)*) => {
        $crate::log::LogSink::print(&$sink, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Level
    // ========================================================================

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error.enabled_at(LogLevel::Info));
        assert!(LogLevel::Info.enabled_at(LogLevel::Info));
        assert!(!LogLevel::Debug.enabled_at(LogLevel::Info));
        assert!(!LogLevel::Error.enabled_at(LogLevel::None));
    }

    #[test]
    fn test_level_from_u8() {
        assert_eq!(LogLevel::from_u8(3), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_u8(5), None);
    }

    // ========================================================================
    // Filter
    // ========================================================================

    #[test]
    fn test_filter_modes() {
        let a = TaskHandle::new(1);
        let b = TaskHandle::new(2);

        assert!(TaskFilter::all().shows(a));

        let show = TaskFilter::new(FilterMode::Show, &[a]).unwrap();
        assert!(show.shows(a));
        assert!(!show.shows(b));

        let hide = TaskFilter::new(FilterMode::Hide, &[a]).unwrap();
        assert!(!hide.shows(a));
        assert!(hide.shows(b));
    }

    #[test]
    fn test_filter_capacity() {
        let h: [TaskHandle; 4] = [1, 2, 3, 4].map(TaskHandle::new);
        assert!(TaskFilter::new(FilterMode::Show, &h[..3]).is_some());
        assert!(TaskFilter::new(FilterMode::Show, &h).is_none());
    }

    // ========================================================================
    // Formatting
    // ========================================================================

    #[test]
    fn test_format_text_truncates() {
        let long = [b'x'; MEDIUM_MSG_MAX + 10];
        let s = core::str::from_utf8(&long).unwrap();
        let text = format_text(format_args!("{s}"));
        assert_eq!(text.len(), MEDIUM_MSG_MAX);
    }

    #[test]
    fn test_prefix_pads_task_name() {
        let mut out: String<64> = String::new();
        write_prefix(&mut out, "CLI", &"+0:00:01.000").unwrap();
        assert_eq!(out.as_str(), "[CLI         ] <+0:00:01.000>: ");
    }
}
