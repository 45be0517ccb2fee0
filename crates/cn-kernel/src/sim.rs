// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Simulated kernel for host builds
//!
//! Time only moves when a task gives up the CPU: `yield_now` advances one
//! tick and `delay_ms` advances the requested time. This keeps every
//! bounded wait in the crate finite and makes service loops deterministic
//! under test.

use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use cn_common::constants::MAX_TASKS;
use cn_common::{TaskHandle, TickRate, Ticks};

use crate::port::Kernel;

/// Atomic tick counter and task table standing in for the RTOS
pub struct SimKernel {
    ticks: AtomicU32,
    rate: TickRate,
    current: AtomicU16,
    names: &'static [&'static str],
    stack: [AtomicU16; MAX_TASKS],
}

impl SimKernel {
    /// Create a kernel whose tasks are `names`; handle `n` is `names[n - 1]`
    #[must_use]
    pub const fn new(names: &'static [&'static str]) -> Self {
        const ZERO: AtomicU16 = AtomicU16::new(0);
        Self {
            ticks: AtomicU32::new(0),
            rate: TickRate::KHZ_1,
            current: AtomicU16::new(1),
            names,
            stack: [ZERO; MAX_TASKS],
        }
    }

    /// Same as [`SimKernel::new`] with a different tick rate
    #[must_use]
    pub const fn with_rate(names: &'static [&'static str], rate: TickRate) -> Self {
        let mut k = Self::new(names);
        k.rate = rate;
        k
    }

    /// Handle of the task called `name`
    #[must_use]
    pub fn handle_of(&self, name: &str) -> Option<TaskHandle> {
        let idx = self.names.iter().position(|n| *n == name)?;
        u16::try_from(idx + 1).ok().map(TaskHandle::new)
    }

    /// Make `task` the running task
    pub fn switch_to(&self, task: TaskHandle) {
        self.current.store(task.raw(), Ordering::Release);
    }

    /// Move time forward without yielding
    pub fn advance_ms(&self, ms: u32) {
        let ticks = self.rate.ms_to_ticks(ms);
        self.ticks.fetch_add(ticks, Ordering::AcqRel);
    }

    /// Set the tick counter
    pub fn set_ticks(&self, ticks: u32) {
        self.ticks.store(ticks, Ordering::Release);
    }

    /// Record a stack high-water mark for `task`
    pub fn set_stack_usage(&self, task: TaskHandle, permille: u16) {
        if let Some(slot) = usize::from(task.raw()).checked_sub(1).and_then(|i| self.stack.get(i)) {
            slot.store(permille, Ordering::Release);
        }
    }
}

impl Kernel for SimKernel {
    fn ticks(&self) -> Ticks {
        Ticks::new(self.ticks.load(Ordering::Acquire))
    }

    fn tick_rate(&self) -> TickRate {
        self.rate
    }

    fn current_task(&self) -> TaskHandle {
        TaskHandle::new(self.current.load(Ordering::Acquire))
    }

    fn task_name(&self, task: TaskHandle) -> &str {
        usize::from(task.raw())
            .checked_sub(1)
            .and_then(|i| self.names.get(i))
            .copied()
            .unwrap_or("?")
    }

    fn stack_usage_permille(&self, task: TaskHandle) -> u16 {
        usize::from(task.raw())
            .checked_sub(1)
            .and_then(|i| self.stack.get(i))
            .map_or(0, |s| s.load(Ordering::Acquire))
    }

    fn delay_ms(&self, ms: u32) {
        let ticks = self.rate.ms_to_ticks(ms).max(1);
        self.ticks.fetch_add(ticks, Ordering::AcqRel);
    }

    fn yield_now(&self) {
        self.ticks.fetch_add(1, Ordering::AcqRel);
        #[cfg(test)]
        {
            extern crate std;
            std::thread::yield_now();
        }
    }
}
