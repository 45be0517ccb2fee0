// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Software timers
//!
//! A [`SoftTimer`] is shared by reference between the task that arms it and
//! the [`TimerService`] that polls it, so all of its state is atomic.
//! Handlers run in the timer service's own context, never in the arming
//! task.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use cn_common::{Error, Result, Ticks};
use heapless::Vec;

use crate::port::Kernel;

/// Periodic or one-shot timer
pub struct SoftTimer {
    name: &'static str,
    period_ms: AtomicU32,
    auto_reload: bool,
    running: AtomicBool,
    started: AtomicU32,
    period_ticks: AtomicU32,
}

impl SoftTimer {
    /// Create a stopped timer
    #[must_use]
    pub const fn new(name: &'static str, period_ms: u32, auto_reload: bool) -> Self {
        Self {
            name,
            period_ms: AtomicU32::new(period_ms),
            auto_reload,
            running: AtomicBool::new(false),
            started: AtomicU32::new(0),
            period_ticks: AtomicU32::new(0),
        }
    }

    /// Timer name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Current period in milliseconds
    pub fn period_ms(&self) -> u32 {
        self.period_ms.load(Ordering::Acquire)
    }

    /// Whether the timer re-arms itself on expiry
    #[must_use]
    pub const fn is_auto_reload(&self) -> bool {
        self.auto_reload
    }

    /// Whether the timer is armed
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Arm the timer, counting from now
    ///
    /// # Errors
    /// - [`Error::TimerRunning`] if it is already armed
    /// - [`Error::TimerBadParam`] if the period is zero
    pub fn start(&self, kernel: &dyn Kernel) -> Result<()> {
        if self.is_running() {
            return Err(Error::TimerRunning);
        }
        self.arm(kernel)
    }

    /// Disarm the timer
    ///
    /// # Errors
    /// [`Error::TimerStopped`] if it was not armed.
    pub fn stop(&self) -> Result<()> {
        if self.running.swap(false, Ordering::AcqRel) {
            Ok(())
        } else {
            Err(Error::TimerStopped)
        }
    }

    /// Restart the countdown from now, arming the timer if needed
    ///
    /// # Errors
    /// [`Error::TimerBadParam`] if the period is zero.
    pub fn reset(&self, kernel: &dyn Kernel) -> Result<()> {
        self.arm(kernel)
    }

    /// Change the period; a running timer restarts with the new value
    ///
    /// # Errors
    /// [`Error::TimerBadParam`] if `period_ms` is zero.
    pub fn set_period(&self, kernel: &dyn Kernel, period_ms: u32) -> Result<()> {
        if period_ms == 0 {
            return Err(Error::TimerBadParam);
        }
        self.period_ms.store(period_ms, Ordering::Release);
        if self.is_running() {
            self.arm(kernel)?;
        }
        Ok(())
    }

    /// Check for expiry at `now`
    ///
    /// Returns `true` once per elapsed period. An auto-reload timer re-arms
    /// from `now`; a one-shot timer stops.
    pub fn poll(&self, now: Ticks) -> bool {
        if !self.is_running() {
            return false;
        }
        let started = Ticks::new(self.started.load(Ordering::Acquire));
        if !started.has_elapsed(now, self.period_ticks.load(Ordering::Acquire)) {
            return false;
        }
        if self.auto_reload {
            self.started.store(now.as_u32(), Ordering::Release);
        } else {
            self.running.store(false, Ordering::Release);
        }
        true
    }

    fn arm(&self, kernel: &dyn Kernel) -> Result<()> {
        let period_ms = self.period_ms();
        if period_ms == 0 {
            return Err(Error::TimerBadParam);
        }
        self.period_ticks
            .store(kernel.ms_to_ticks(period_ms).max(1), Ordering::Release);
        self.started.store(kernel.ticks().as_u32(), Ordering::Release);
        self.running.store(true, Ordering::Release);
        Ok(())
    }
}

/// Callback run by the timer service when a timer expires
pub trait TimerHandler: Sync {
    /// Handle expiry of `timer`
    fn on_expiry(&self, timer: &SoftTimer);
}

/// Maximum number of timers one service polls
pub const MAX_TIMERS: usize = 8;

/// Timer-service task: polls registered timers and runs their handlers
pub struct TimerService<'a> {
    kernel: &'a dyn Kernel,
    resolution_ms: u32,
    entries: Vec<(&'a SoftTimer, &'a dyn TimerHandler), MAX_TIMERS>,
}

impl<'a> TimerService<'a> {
    /// Create a service polling every `resolution_ms`
    #[must_use]
    pub const fn new(kernel: &'a dyn Kernel, resolution_ms: u32) -> Self {
        Self {
            kernel,
            resolution_ms,
            entries: Vec::new(),
        }
    }

    /// Attach `handler` to `timer`
    ///
    /// # Errors
    /// [`Error::TimerTableFull`] when [`MAX_TIMERS`] timers are registered.
    pub fn register(&mut self, timer: &'a SoftTimer, handler: &'a dyn TimerHandler) -> Result<()> {
        self.entries
            .push((timer, handler))
            .map_err(|_| Error::TimerTableFull)
    }

    /// Number of registered timers
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timer is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fire every expired timer once; returns how many fired
    pub fn poll_once(&self) -> usize {
        let now = self.kernel.ticks();
        let mut fired = 0;
        for (timer, handler) in &self.entries {
            if timer.poll(now) {
                handler.on_expiry(timer);
                fired += 1;
            }
        }
        fired
    }

    /// Service loop
    pub fn run(&self) -> ! {
        loop {
            self.poll_once();
            self.kernel.delay_ms(self.resolution_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKernel;

    static NAMES: &[&str] = &["Timer"];

    struct Counter(AtomicU32);

    impl TimerHandler for Counter {
        fn on_expiry(&self, _timer: &SoftTimer) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_one_shot_fires_once() {
        let k = SimKernel::new(NAMES);
        let t = SoftTimer::new("once", 100, false);
        t.start(&k).unwrap();
        k.advance_ms(99);
        assert!(!t.poll(k.ticks()));
        k.advance_ms(1);
        assert!(t.poll(k.ticks()));
        assert!(!t.is_running());
        k.advance_ms(500);
        assert!(!t.poll(k.ticks()));
    }

    #[test]
    fn test_auto_reload_rearms() {
        let k = SimKernel::new(NAMES);
        let t = SoftTimer::new("tick", 50, true);
        t.start(&k).unwrap();
        let mut fired = 0;
        for _ in 0..10 {
            k.advance_ms(25);
            if t.poll(k.ticks()) {
                fired += 1;
            }
        }
        assert_eq!(fired, 5);
        assert!(t.is_running());
    }

    #[test]
    fn test_start_stop_errors() {
        let k = SimKernel::new(NAMES);
        let t = SoftTimer::new("t", 10, true);
        assert_eq!(t.stop(), Err(Error::TimerStopped));
        t.start(&k).unwrap();
        assert_eq!(t.start(&k), Err(Error::TimerRunning));
        t.stop().unwrap();
        assert!(!t.is_running());

        let zero = SoftTimer::new("z", 0, false);
        assert_eq!(zero.start(&k), Err(Error::TimerBadParam));
    }

    #[test]
    fn test_reset_restarts_countdown() {
        let k = SimKernel::new(NAMES);
        let t = SoftTimer::new("t", 100, false);
        t.start(&k).unwrap();
        k.advance_ms(80);
        t.reset(&k).unwrap();
        k.advance_ms(80);
        assert!(!t.poll(k.ticks()));
        k.advance_ms(20);
        assert!(t.poll(k.ticks()));
    }

    #[test]
    fn test_set_period() {
        let k = SimKernel::new(NAMES);
        let t = SoftTimer::new("t", 100, true);
        assert_eq!(t.set_period(&k, 0), Err(Error::TimerBadParam));
        t.start(&k).unwrap();
        t.set_period(&k, 10).unwrap();
        k.advance_ms(10);
        assert!(t.poll(k.ticks()));
        assert_eq!(t.period_ms(), 10);
    }

    #[test]
    fn test_service_runs_handlers() {
        let k = SimKernel::new(NAMES);
        let fast = SoftTimer::new("fast", 10, true);
        let slow = SoftTimer::new("slow", 30, true);
        let fast_count = Counter(AtomicU32::new(0));
        let slow_count = Counter(AtomicU32::new(0));

        let mut svc = TimerService::new(&k, 10);
        svc.register(&fast, &fast_count).unwrap();
        svc.register(&slow, &slow_count).unwrap();
        fast.start(&k).unwrap();
        slow.start(&k).unwrap();

        for _ in 0..6 {
            k.advance_ms(10);
            svc.poll_once();
        }
        assert_eq!(fast_count.0.load(Ordering::Relaxed), 6);
        assert_eq!(slow_count.0.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_service_table_full() {
        let k = SimKernel::new(NAMES);
        let t = SoftTimer::new("t", 10, true);
        let h = Counter(AtomicU32::new(0));
        let mut svc = TimerService::new(&k, 10);
        for _ in 0..MAX_TIMERS {
            svc.register(&t, &h).unwrap();
        }
        assert_eq!(svc.register(&t, &h), Err(Error::TimerTableFull));
    }
}
