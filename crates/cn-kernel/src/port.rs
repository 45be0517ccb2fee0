// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Kernel port
//!
//! The firmware runs on a preemptive RTOS that it does not implement. This
//! trait is the whole surface the services in this crate need from it:
//! the tick counter, the identity of the running task, and the two ways of
//! giving up the CPU.

use cn_common::{TaskHandle, TickRate, Ticks};

/// RTOS services consumed by the firmware
pub trait Kernel: Sync {
    /// Current tick count
    fn ticks(&self) -> Ticks;

    /// Tick rate of [`Kernel::ticks`]
    fn tick_rate(&self) -> TickRate;

    /// Handle of the calling task
    fn current_task(&self) -> TaskHandle;

    /// Name of a task, as given at creation
    fn task_name(&self, task: TaskHandle) -> &str;

    /// Peak stack usage of a task, in tenths of a percent
    fn stack_usage_permille(&self, task: TaskHandle) -> u16;

    /// Block the calling task for at least `ms` milliseconds
    fn delay_ms(&self, ms: u32);

    /// Let other ready tasks of equal priority run
    fn yield_now(&self);

    /// Convert milliseconds to ticks
    fn ms_to_ticks(&self, ms: u32) -> u32 {
        self.tick_rate().ms_to_ticks(ms)
    }

    /// Convert ticks to milliseconds
    fn ticks_to_ms(&self, ticks: u32) -> u32 {
        self.tick_rate().ticks_to_ms(ticks)
    }

    /// Milliseconds since the scheduler started (wraps with the tick counter)
    fn uptime_ms(&self) -> u32 {
        self.ticks_to_ms(self.ticks().as_u32())
    }
}
