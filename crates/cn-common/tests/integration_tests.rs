// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Integration tests for cn-common
//!
//! Error taxonomy, log model, configuration and time formatting as seen
//! from a dependent crate.

mod error_tests {
    use cn_common::Error;

    #[test]
    fn test_error_display_includes_code() {
        let s = format!("{}", Error::DmmNullPointer);
        assert_eq!(s, "[0x1804] heap region too small");
    }

    #[test]
    fn test_error_bands_are_disjoint() {
        let samples = [
            (Error::LockTimeout, 0x0300),
            (Error::TimerRunning, 0x0500),
            (Error::MqttNoMemory, 0x0B00),
            (Error::FsNotFound, 0x0C00),
            (Error::SlmBadParam, 0x0D00),
            (Error::GpioBadParam, 0x1100),
            (Error::CliInvalidTask, 0x1200),
            (Error::LogBadParam, 0x1300),
            (Error::ModemNotInit, 0x1400),
            (Error::AppNoResources, 0x1500),
            (Error::DmmBadPointer, 0x1800),
            (Error::WdogTooManyClients, 0x1D00),
            (Error::UartRead, 0x1E00),
            (Error::BlinkyInit, 0x2000),
        ];
        for (err, band) in samples {
            assert_eq!(err.band(), band, "{err:?}");
            assert_ne!(err.module(), "unknown");
        }
    }

    #[test]
    fn test_error_is_copy_and_comparable() {
        let a = Error::QueueFull;
        let b = a;
        assert_eq!(a, b);
        assert_ne!(a, Error::LockTimeout);
    }
}

mod log_tests {
    use cn_common::log::{format_text, FilterMode, LogMessage, TaskFilter};
    use cn_common::{LogLevel, LogSink, TaskHandle, Ticks};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Capture {
        lines: RefCell<Vec<(Option<LogLevel>, String)>>,
    }

    impl LogSink for Capture {
        fn emit(&self, level: LogLevel, args: core::fmt::Arguments<'_>) {
            self.lines.borrow_mut().push((Some(level), args.to_string()));
        }

        fn print(&self, args: core::fmt::Arguments<'_>) {
            self.lines.borrow_mut().push((None, args.to_string()));
        }

        fn putchar(&self, c: u8) {
            self.lines.borrow_mut().push((None, char::from(c).to_string()));
        }
    }

    #[test]
    fn test_macros_route_to_sink() {
        let sink = Capture::default();
        cn_common::log_error!(sink, "bad {}", 1);
        cn_common::log_info!(sink, "ok");
        cn_common::log_print!(sink, "raw\r\n");

        let lines = sink.lines.borrow();
        assert_eq!(lines[0], (Some(LogLevel::Error), "bad 1".to_string()));
        assert_eq!(lines[1], (Some(LogLevel::Info), "ok".to_string()));
        assert_eq!(lines[2], (None, "raw\r\n".to_string()));
    }

    #[test]
    fn test_macros_accept_sink_references() {
        let sink = Capture::default();
        let dyn_sink: &dyn LogSink = &sink;
        cn_common::log_debug!(dyn_sink, "via dyn");
        assert_eq!(sink.lines.borrow().len(), 1);
    }

    #[test]
    fn test_leveled_message_carries_producer() {
        let msg = LogMessage::Leveled {
            level: LogLevel::Info,
            task: TaskHandle::new(5),
            ticks: Ticks::new(1234),
            text: format_text(format_args!("hello")),
        };
        match msg {
            LogMessage::Leveled { task, text, .. } => {
                assert_eq!(task, TaskHandle::new(5));
                assert_eq!(text.as_str(), "hello");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_filter_round_trip_through_message() {
        let filter = TaskFilter::new(FilterMode::Hide, &[TaskHandle::new(2)]).unwrap();
        let msg = LogMessage::Filter(filter.clone());
        assert_eq!(msg, LogMessage::Filter(filter));
    }
}

mod config_tests {
    use cn_common::config::{BlinkyConfig, CliConfig, HeapConfig, MqttConfig};
    use cn_common::constants::{APP_HEAP_SIZE, MODEM_TX_HEAP_SIZE};
    use cn_common::{LogLevel, SystemConfig};

    #[test]
    fn test_default_system_config() {
        let c = SystemConfig::default();
        assert_eq!(c.log.initial_level, LogLevel::Info);
        assert_eq!(c.queues.send_timeout_ms, 100);
        assert_eq!(c.watchdog.task_timeout_ms, 30_000);
        assert_eq!(c.watchdog.scan_period_ms, 3_000);
    }

    #[test]
    fn test_heap_sizes() {
        let h = HeapConfig::DEFAULT;
        assert_eq!(h.app_heap_size, APP_HEAP_SIZE);
        assert_eq!(h.modem_tx_heap_size, MODEM_TX_HEAP_SIZE);
        assert_eq!(h.app_heap_size, 8192);
    }

    #[test]
    fn test_mqtt_defaults() {
        let m = MqttConfig::default();
        assert_eq!(m.port, 8883);
        assert_eq!(m.keep_alive_secs, 60);
        assert_eq!(m.default_topic, "test");
    }

    #[test]
    fn test_shell_and_blink_defaults() {
        assert_eq!(CliConfig::DEFAULT.prompt, "nRF91 -> ");
        assert_eq!(CliConfig::DEFAULT.modem_prompt, "Modem -> ");
        assert_eq!(BlinkyConfig::DEFAULT.period_ms, 1_000);
        assert_eq!(BlinkyConfig::DEFAULT.min_period_ms, 50);
    }
}

mod time_tests {
    use cn_common::time::{Uptime, WallClock};
    use cn_common::{TickRate, Ticks};

    #[test]
    fn test_uptime_and_wall_clock_render() {
        assert_eq!(Uptime(61_001).to_string(), "+0:01:01.001");
        assert_eq!(WallClock::from_ms(3_600_000 * 25).to_string(), "01:00:00:000");
    }

    #[test]
    fn test_tick_math() {
        let rate = TickRate::KHZ_1;
        let t0 = Ticks::new(10);
        let t1 = t0 + rate.ms_to_ticks(250);
        assert_eq!(t0.elapsed(t1), 250);
        assert!(t0.has_elapsed(t1, 250));
        assert!(!t0.has_elapsed(t1, 251));
    }
}
