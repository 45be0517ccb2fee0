// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Task health registry
//!
//! Fixed table of per-task liveness records. A task appends its record
//! once with [`TaskRegistry::configure`] and refreshes it with
//! [`TaskRegistry::update`] on every service-loop iteration. Records are
//! never removed.
//!
//! The average update interval is an exponentially weighted moving average
//! with weight 7/8 on the old value; the first sample becomes the average
//! directly.

use cn_common::constants::MAX_TASKS;
use cn_common::log::LogSink;
use cn_common::{log_print, Error, Result, TaskHandle, TaskList, Ticks};
use heapless::Vec;

use crate::port::Kernel;
use crate::queue::Queue;
use crate::sync::{BoundedGuard, BoundedMutex};

/// Liveness record of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRecord {
    /// Owning task
    pub handle: TaskHandle,
    /// Tick count of the last heartbeat
    pub last_update: Ticks,
    /// Staleness limit in ticks; 0 disables the check
    pub timeout_ticks: u32,
    /// Smoothed interval between heartbeats, in ticks
    pub avg_ticks: Option<u32>,
}

impl TaskRecord {
    /// Whether the record has gone longer than its timeout without a heartbeat
    #[must_use]
    pub const fn is_stale(&self, now: Ticks) -> bool {
        self.timeout_ticks > 0 && self.last_update.elapsed(now) > self.timeout_ticks
    }

    fn record_sample(&mut self, now: Ticks) {
        let sample = self.last_update.elapsed(now);
        self.avg_ticks = Some(match self.avg_ticks {
            None => sample,
            Some(avg) => ewma(avg, sample),
        });
        self.last_update = now;
    }
}

/// `(7 * avg + sample) / 8` without intermediate overflow
#[must_use]
pub const fn ewma(avg: u32, sample: u32) -> u32 {
    ((7 * avg as u64 + sample as u64) >> 3) as u32
}

/// Shared table of task health records
pub struct TaskRegistry<'k> {
    kernel: &'k dyn Kernel,
    records: BoundedMutex<Vec<TaskRecord, MAX_TASKS>>,
    lock_timeout_ms: u32,
}

impl<'k> TaskRegistry<'k> {
    /// Create an empty registry
    #[must_use]
    pub const fn new(kernel: &'k dyn Kernel, lock_timeout_ms: u32) -> Self {
        Self {
            kernel,
            records: BoundedMutex::new(Vec::new()),
            lock_timeout_ms,
        }
    }

    /// Kernel the registry reads time and task identity from
    #[must_use]
    pub fn kernel(&self) -> &'k dyn Kernel {
        self.kernel
    }

    /// Register the calling task with a staleness limit (0 disables it)
    ///
    /// A task that registers again replaces its own record.
    ///
    /// # Errors
    /// - [`Error::WdogTooManyClients`] if the table is full
    /// - [`Error::LockTimeout`] if the registry lock was not obtained
    pub fn configure(&self, timeout_ms: u32) -> Result<()> {
        let handle = self.kernel.current_task();
        let record = TaskRecord {
            handle,
            last_update: self.kernel.ticks(),
            timeout_ticks: self.kernel.ms_to_ticks(timeout_ms),
            avg_ticks: None,
        };
        let mut records = self.lock()?;
        if let Some(existing) = records.iter_mut().find(|r| r.handle == handle) {
            *existing = record;
            return Ok(());
        }
        records.push(record).map_err(|_| Error::WdogTooManyClients)
    }

    /// Heartbeat from the calling task
    ///
    /// # Errors
    /// - [`Error::WdogNotRegistered`] if the task never called `configure`
    /// - [`Error::LockTimeout`] if the registry lock was not obtained
    pub fn update(&self) -> Result<()> {
        let handle = self.kernel.current_task();
        let now = self.kernel.ticks();
        let mut records = self.lock()?;
        let record = records
            .iter_mut()
            .find(|r| r.handle == handle)
            .ok_or(Error::WdogNotRegistered)?;
        record.record_sample(now);
        Ok(())
    }

    /// Change the calling task's timeout without touching its last heartbeat
    ///
    /// # Errors
    /// - [`Error::WdogNotRegistered`] if the task never called `configure`
    /// - [`Error::LockTimeout`] if the registry lock was not obtained
    pub fn set_timeout(&self, timeout_ms: u32) -> Result<()> {
        let handle = self.kernel.current_task();
        let ticks = self.kernel.ms_to_ticks(timeout_ms);
        let mut records = self.lock()?;
        let record = records
            .iter_mut()
            .find(|r| r.handle == handle)
            .ok_or(Error::WdogNotRegistered)?;
        record.timeout_ticks = ticks;
        Ok(())
    }

    /// Record of `handle`, if registered
    pub fn record(&self, handle: TaskHandle) -> Option<TaskRecord> {
        self.lock().ok()?.iter().find(|r| r.handle == handle).copied()
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |r| r.len())
    }

    /// Whether no task has registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of registered handles in registration order
    ///
    /// # Errors
    /// [`Error::LockTimeout`] if the registry lock was not obtained.
    pub fn list(&self) -> Result<TaskList> {
        Ok(self.lock()?.iter().map(|r| r.handle).collect())
    }

    /// Push the handle snapshot onto `queue` (the shell's inbound queue)
    ///
    /// # Errors
    /// Lock timeout, or [`Error::QueueFull`] from the send.
    pub fn list_to<const N: usize>(&self, queue: &Queue<TaskList, N>, timeout_ms: u32) -> Result<()> {
        let list = self.list()?;
        queue.send(self.kernel, list, timeout_ms)
    }

    /// Find records past their timeout, re-stamp them and return their handles
    ///
    /// Re-stamping means a stalled task is reported once per timeout period
    /// rather than on every scan.
    ///
    /// # Errors
    /// [`Error::LockTimeout`] if the registry lock was not obtained.
    pub fn take_stale(&self) -> Result<Vec<TaskHandle, MAX_TASKS>> {
        let now = self.kernel.ticks();
        let mut stale = Vec::new();
        let mut records = self.lock()?;
        for r in records.iter_mut().filter(|r| r.is_stale(now)) {
            r.last_update = now;
            // capacity equals the table size
            let _ = stale.push(r.handle);
        }
        Ok(stale)
    }

    /// Print name, average heartbeat interval and stack usage of every task
    ///
    /// # Errors
    /// [`Error::LockTimeout`] if the registry lock was not obtained.
    pub fn report(&self, sink: &dyn LogSink) -> Result<()> {
        let snapshot = self.lock()?.clone();
        log_print!(sink, "Task report:\r\n");
        log_print!(sink, "Name\t\tAvg. Time\t%Stack\r\n");
        for r in &snapshot {
            let avg_ms = self.kernel.ticks_to_ms(r.avg_ticks.unwrap_or(0));
            let stack = self.kernel.stack_usage_permille(r.handle);
            log_print!(
                sink,
                "{:<10}\t{}\t\t{}.{}\r\n",
                self.kernel.task_name(r.handle),
                avg_ms,
                stack / 10,
                stack % 10
            );
        }
        Ok(())
    }

    fn lock(&self) -> Result<BoundedGuard<'_, Vec<TaskRecord, MAX_TASKS>>> {
        self.records
            .lock_within(self.kernel, self.lock_timeout_ms)
            .ok_or(Error::LockTimeout)
    }
}
