// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Common types for the cellnode firmware
//!
//! Task handles, task snapshots and the fixed-capacity text classes that
//! cross queue boundaries.

use core::fmt;
use heapless::{String, Vec};

use crate::constants::{LONG_MSG_MAX, MAX_TASKS, MEDIUM_MSG_MAX, SHORT_MSG_MAX};

/// Opaque kernel task identifier
///
/// Handles are assigned by the kernel port and are only compared for
/// equality; the numeric value carries no meaning to the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u16);

impl TaskHandle {
    /// Create a handle from the kernel's raw identifier
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw identifier
    #[must_use]
    pub const fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskHandle {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "task#{}", self.0);
    }
}

/// Snapshot of registered task handles, sent to the shell on request
pub type TaskList = Vec<TaskHandle, MAX_TASKS>;

/// Short message text (commands, AT responses, topics)
pub type ShortText = String<SHORT_MSG_MAX>;

/// Medium message text (log lines)
pub type MediumText = String<MEDIUM_MSG_MAX>;

/// Long message text (network payloads)
pub type LongText = String<LONG_MSG_MAX>;

/// Copy `src` into a bounded string, truncating on a character boundary
#[must_use]
pub fn truncated<const N: usize>(src: &str) -> String<N> {
    let mut out = String::new();
    for c in src.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_keeps_prefix() {
        let s: String<4> = truncated("abcdef");
        assert_eq!(s.as_str(), "abcd");
    }

    #[test]
    fn test_truncated_respects_char_boundary() {
        let s: String<3> = truncated("aéb");
        assert_eq!(s.as_str(), "aé");
    }

    #[test]
    fn test_task_handle_equality() {
        assert_eq!(TaskHandle::new(3), TaskHandle::new(3));
        assert_ne!(TaskHandle::new(3), TaskHandle::new(4));
        assert_eq!(TaskHandle::new(7).raw(), 7);
    }
}
