// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Software watchdog
//!
//! Detect-and-log supervisor over the [`TaskRegistry`]. A task that misses
//! its heartbeat for longer than its timeout gets one error line per
//! overrun period. Nothing is restarted or reset.

use cn_common::config::WatchdogConfig;
use cn_common::log::LogSink;
use cn_common::{log_error, log_info};

use crate::registry::TaskRegistry;

/// Supervisor task state
///
/// The watchdog is not a registry client itself, so it takes no slot and
/// never shows up in task reports or filters.
pub struct Watchdog<'a> {
    registry: &'a TaskRegistry<'a>,
    log: &'a dyn LogSink,
    scan_period_ms: u32,
}

impl<'a> Watchdog<'a> {
    /// Announce the watchdog task
    pub fn start(
        registry: &'a TaskRegistry<'a>,
        log: &'a dyn LogSink,
        config: &WatchdogConfig,
    ) -> Self {
        log_info!(log, "WatchDog task started");
        Self {
            registry,
            log,
            scan_period_ms: config.scan_period_ms,
        }
    }

    /// Pause between scans
    #[must_use]
    pub const fn scan_period_ms(&self) -> u32 {
        self.scan_period_ms
    }

    /// One supervision pass; returns the number of overruns logged
    pub fn scan(&self) -> usize {
        let kernel = self.registry.kernel();
        let stale = match self.registry.take_stale() {
            Ok(stale) => stale,
            Err(e) => {
                log_error!(self.log, "Watchdog scan skipped: {}", e);
                return 0;
            }
        };
        for handle in &stale {
            log_error!(self.log, "Watchdog timeout: {}", kernel.task_name(*handle));
        }
        stale.len()
    }

    /// Scan, sleep, repeat
    pub fn run(&self) -> ! {
        let kernel = self.registry.kernel();
        loop {
            self.scan();
            kernel.delay_ms(self.scan_period_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::port::Kernel;
    use crate::sim::SimKernel;
    use cn_common::{LogLevel, TaskHandle};
    use core::cell::RefCell;
    use core::fmt::Arguments;
    use std::string::{String, ToString};
    use std::vec::Vec;

    static NAMES: &[&str] = &["Watchdog", "Worker"];

    #[derive(Default)]
    struct Lines(RefCell<Vec<(LogLevel, String)>>);

    impl LogSink for Lines {
        fn emit(&self, level: LogLevel, args: Arguments<'_>) {
            self.0.borrow_mut().push((level, args.to_string()));
        }
        fn print(&self, _args: Arguments<'_>) {}
        fn putchar(&self, _c: u8) {}
    }

    impl Lines {
        fn timeouts(&self) -> usize {
            self.0
                .borrow()
                .iter()
                .filter(|(l, s)| *l == LogLevel::Error && s.starts_with("Watchdog timeout"))
                .count()
        }
    }

    const WATCHDOG: TaskHandle = TaskHandle::new(1);
    const WORKER: TaskHandle = TaskHandle::new(2);

    fn config(scan_period_ms: u32) -> WatchdogConfig {
        WatchdogConfig {
            scan_period_ms,
            ..WatchdogConfig::DEFAULT
        }
    }

    // =========================================================================
    // Startup
    // =========================================================================

    #[test]
    fn test_start_announces_without_registering() {
        let k = SimKernel::new(NAMES);
        let reg = TaskRegistry::new(&k, 100);
        let log = Lines::default();
        k.switch_to(WATCHDOG);
        let wd = Watchdog::start(&reg, &log, &config(300));

        assert_eq!(wd.scan_period_ms(), 300);
        assert!(reg.record(WATCHDOG).is_none());
        k.advance_ms(60_000);
        assert_eq!(wd.scan(), 0);
        assert!(reg.list().unwrap().is_empty());
        assert_eq!(log.0.borrow()[0], (LogLevel::Info, "WatchDog task started".to_string()));
    }

    // =========================================================================
    // Staleness
    // =========================================================================

    #[test]
    fn test_stall_logged_once_per_overrun() {
        let k = SimKernel::new(NAMES);
        let reg = TaskRegistry::new(&k, 100);
        let log = Lines::default();

        k.switch_to(WORKER);
        reg.configure(1000).unwrap();
        k.switch_to(WATCHDOG);
        let wd = Watchdog::start(&reg, &log, &config(300));

        // worker stalls for 1500 ms, scans every 300 ms
        let mut logged_at = Vec::new();
        while k.uptime_ms() < 1500 {
            k.advance_ms(300);
            if wd.scan() > 0 {
                logged_at.push(k.uptime_ms());
            }
        }
        assert_eq!(logged_at, [1200]);
        assert_eq!(log.timeouts(), 1);
        assert_eq!(log.0.borrow()[1].1, "Watchdog timeout: Worker");

        // next overrun needs another full timeout
        while k.uptime_ms() < 2400 {
            k.advance_ms(300);
            if wd.scan() > 0 {
                logged_at.push(k.uptime_ms());
            }
        }
        assert_eq!(logged_at, [1200, 2400]);
    }

    #[test]
    fn test_heartbeat_prevents_overrun() {
        let k = SimKernel::new(NAMES);
        let reg = TaskRegistry::new(&k, 100);
        let log = Lines::default();

        k.switch_to(WORKER);
        reg.configure(1000).unwrap();
        k.switch_to(WATCHDOG);
        let wd = Watchdog::start(&reg, &log, &config(300));

        for _ in 0..20 {
            k.advance_ms(300);
            k.switch_to(WORKER);
            reg.update().unwrap();
            k.switch_to(WATCHDOG);
            assert_eq!(wd.scan(), 0);
        }
        assert_eq!(log.timeouts(), 0);
    }

    #[test]
    fn test_zero_timeout_never_checked() {
        let k = SimKernel::new(NAMES);
        let reg = TaskRegistry::new(&k, 100);
        let log = Lines::default();

        k.switch_to(WORKER);
        reg.configure(0).unwrap();
        k.switch_to(WATCHDOG);
        let wd = Watchdog::start(&reg, &log, &config(3000));

        for _ in 0..5 {
            k.advance_ms(3000);
            wd.scan();
        }
        assert_eq!(log.timeouts(), 0);
    }
}
