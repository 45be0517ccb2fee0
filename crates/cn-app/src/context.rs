// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Shared application context
//!
//! Every object more than one task touches lives in one [`SharedContext`]:
//! the heaps, the task registry, the logger and its queue, the per-task
//! request queues, the shell-active flag and the blink settings. It is
//! built once at start-up and every task receives it by reference.
//!
//! On target the context goes into a [`StaticCell`], which rejects a
//! second installation.
//!
//! ```rust,ignore
//! static CONTEXT: StaticCell<SharedContext<'static>> = StaticCell::new();
//!
//! let ctx = install(&CONTEXT, SharedContext::new(&KERNEL, SystemConfig::DEFAULT))?;
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use cn_common::config::BlinkyConfig;
use cn_common::constants::QUEUE_LEN;
use cn_common::{log_print, Error, Result, SystemConfig, TaskList};
use cn_kernel::{HeapSet, Kernel, Queue, TaskRegistry};
use static_cell::StaticCell;

use crate::fs::FsRequest;
use crate::logger::Logger;
use crate::mqtt::MqttRequest;
use crate::slm::SlmRequest;

/// Blink demo settings shared between the shell and the blink task
pub struct BlinkySettings {
    period_ms: AtomicU32,
    count: AtomicUsize,
    mqtt_enable: AtomicBool,
    min_period_ms: u32,
    max_leds: usize,
}

impl BlinkySettings {
    /// Settings from `config`, with at most `max_leds` LEDs in use
    #[must_use]
    pub const fn new(config: &BlinkyConfig, max_leds: usize) -> Self {
        let count = if config.num_leds < max_leds {
            config.num_leds
        } else {
            max_leds
        };
        Self {
            period_ms: AtomicU32::new(config.period_ms),
            count: AtomicUsize::new(count),
            mqtt_enable: AtomicBool::new(false),
            min_period_ms: config.min_period_ms,
            max_leds,
        }
    }

    /// On and off time of each LED
    pub fn period_ms(&self) -> u32 {
        self.period_ms.load(Ordering::Acquire)
    }

    /// Number of LEDs cycled through
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Whether the blink task publishes over MQTT
    pub fn mqtt_enabled(&self) -> bool {
        self.mqtt_enable.load(Ordering::Acquire)
    }

    /// Apply `ms` if it is above the minimum period; returns whether it was applied
    pub fn set_period(&self, ms: u32) -> bool {
        if ms > self.min_period_ms {
            self.period_ms.store(ms, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Apply `count` if it is between 1 and the board's LED count
    pub fn set_count(&self, count: usize) -> bool {
        if (1..=self.max_leds).contains(&count) {
            self.count.store(count, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Switch MQTT publishing on or off
    pub fn set_mqtt_enabled(&self, enable: bool) {
        self.mqtt_enable.store(enable, Ordering::Release);
    }
}

/// State shared by all application tasks
pub struct SharedContext<'k> {
    /// RTOS port
    pub kernel: &'k dyn Kernel,
    /// Build-time configuration
    pub config: SystemConfig,
    /// Heap 0 (application) and heap 1 (modem transmit)
    pub heaps: HeapSet<'k>,
    /// Task health records
    pub registry: TaskRegistry<'k>,
    /// Log producer and the log queue
    pub logger: Logger<'k>,
    /// Task-handle snapshots for the shell
    pub cli_queue: Queue<TaskList, QUEUE_LEN>,
    /// Requests for the secondary modem shell
    pub slm_queue: Queue<SlmRequest, QUEUE_LEN>,
    /// Requests for the filesystem task
    pub fs_queue: Queue<FsRequest, QUEUE_LEN>,
    /// Requests for the messaging task
    pub mqtt_queue: Queue<MqttRequest, QUEUE_LEN>,
    /// Blink demo settings
    pub blinky: BlinkySettings,
    cli_active: AtomicBool,
}

impl<'k> SharedContext<'k> {
    /// Build the context; no heap is initialized yet
    #[must_use]
    pub const fn new(kernel: &'k dyn Kernel, config: SystemConfig) -> Self {
        Self {
            kernel,
            heaps: HeapSet::new(kernel, config.heap.lock_timeout_ms),
            registry: TaskRegistry::new(kernel, config.watchdog.lock_timeout_ms),
            logger: Logger::new(kernel, config.log.initial_level, config.queues.send_timeout_ms),
            cli_queue: Queue::new("CLI"),
            slm_queue: Queue::new("SLM"),
            fs_queue: Queue::new("FS"),
            mqtt_queue: Queue::new("MQTT"),
            blinky: BlinkySettings::new(&config.blinky, cn_hal::NUM_LEDS),
            cli_active: AtomicBool::new(true),
            config,
        }
    }

    /// Whether the command shell owns the console
    pub fn cli_active(&self) -> bool {
        self.cli_active.load(Ordering::Acquire)
    }

    /// Hand the console to the shell (`true`) or take it away
    pub fn set_cli_active(&self, active: bool) {
        self.cli_active.store(active, Ordering::Release);
    }

    /// Print depth and drop count of every queue
    pub fn report_queues(&self) {
        let log = &self.logger;
        log_print!(log, "Queue\tLen\tDropped\r\n");
        let q = self.logger.queue();
        log_print!(log, "{}\t{}\t{}\r\n", q.name(), q.len(), q.dropped());
        log_print!(log, "{}\t{}\t{}\r\n", self.cli_queue.name(), self.cli_queue.len(), self.cli_queue.dropped());
        log_print!(log, "{}\t{}\t{}\r\n", self.slm_queue.name(), self.slm_queue.len(), self.slm_queue.dropped());
        log_print!(log, "{}\t{}\t{}\r\n", self.fs_queue.name(), self.fs_queue.len(), self.fs_queue.dropped());
        log_print!(log, "{}\t{}\t{}\r\n", self.mqtt_queue.name(), self.mqtt_queue.len(), self.mqtt_queue.dropped());
    }
}

/// Place `ctx` in `cell` and hand out the shared reference
///
/// # Errors
/// [`Error::AppAlreadyInit`] if the cell was already filled.
pub fn install(
    cell: &'static StaticCell<SharedContext<'static>>,
    ctx: SharedContext<'static>,
) -> Result<&'static SharedContext<'static>> {
    cell.try_init(ctx)
        .map(|c| &*c)
        .ok_or(Error::AppAlreadyInit)
}
