// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Log producer and log task
//!
//! [`Logger`] is what every task logs through: it stamps leveled lines with
//! the calling task and the tick count and queues them. [`LogTask`] is the
//! only writer of the console. It applies the level and the task filter at
//! output time, so a level change also affects lines already queued.

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU8, Ordering};

use cn_common::constants::QUEUE_LEN_LONG;
use cn_common::log::{format_text, write_prefix, TaskFilter};
use cn_common::time::{Uptime, WallClock, MS_PER_DAY};
use cn_common::{LogLevel, LogMessage, LogSink, Result, TaskHandle, Ticks};
use cn_hal::{HalError, UartInterface};
use cn_kernel::{Kernel, Queue};

use crate::context::SharedContext;

/// Source of network wall-clock time for log timestamps
pub trait NetworkClock: Sync {
    /// Milliseconds to add to uptime (modulo one day) to get the time of
    /// day, once the network has reported it
    fn wall_offset_ms(&self) -> Option<u32>;
}

/// Clock for builds without a modem: timestamps stay on uptime
pub struct NoClock;

impl NetworkClock for NoClock {
    fn wall_offset_ms(&self) -> Option<u32> {
        None
    }
}

/// Queue-backed log producer
pub struct Logger<'k> {
    kernel: &'k dyn Kernel,
    level: AtomicU8,
    queue: Queue<LogMessage, QUEUE_LEN_LONG>,
    send_timeout_ms: u32,
}

impl<'k> Logger<'k> {
    /// Create a producer with its queue
    #[must_use]
    pub const fn new(kernel: &'k dyn Kernel, level: LogLevel, send_timeout_ms: u32) -> Self {
        Self {
            kernel,
            level: AtomicU8::new(level as u8),
            queue: Queue::new("Log"),
            send_timeout_ms,
        }
    }

    /// Current output level
    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Acquire)).unwrap_or(LogLevel::Info)
    }

    /// Change the output level; takes effect immediately
    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Release);
    }

    /// Ask the log task to replace its task filter
    ///
    /// # Errors
    /// [`cn_common::Error::QueueFull`] if the log queue stayed full.
    pub fn set_filter(&self, filter: TaskFilter) -> Result<()> {
        self.queue
            .send(self.kernel, LogMessage::Filter(filter), self.send_timeout_ms)
    }

    /// The log queue
    pub fn queue(&self) -> &Queue<LogMessage, QUEUE_LEN_LONG> {
        &self.queue
    }

    fn post(&self, msg: LogMessage) {
        // a full queue counts the drop
        let _ = self.queue.send(self.kernel, msg, self.send_timeout_ms);
    }
}

impl LogSink for Logger<'_> {
    fn emit(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        self.post(LogMessage::Leveled {
            level,
            task: self.kernel.current_task(),
            ticks: self.kernel.ticks(),
            text: format_text(args),
        });
    }

    fn print(&self, args: fmt::Arguments<'_>) {
        self.post(LogMessage::Plain(format_text(args)));
    }

    fn putchar(&self, c: u8) {
        self.post(LogMessage::Char(c));
    }
}

enum Timestamp {
    Wall(WallClock),
    Up(Uptime),
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wall(t) => fmt::Display::fmt(t, f),
            Self::Up(t) => fmt::Display::fmt(t, f),
        }
    }
}

/// `fmt::Write` over a UART, remembering the driver error
struct UartWriter<'u, U> {
    uart: &'u mut U,
    error: Option<HalError>,
}

impl<U: UartInterface> Write for UartWriter<'_, U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.uart.write(s.as_bytes()).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}

/// Console writer task
pub struct LogTask<'a, U> {
    ctx: &'a SharedContext<'a>,
    uart: U,
    clock: &'a dyn NetworkClock,
    filter: TaskFilter,
}

impl<'a, U: UartInterface> LogTask<'a, U> {
    /// Register with the watchdog and announce the task on the console
    ///
    /// # Errors
    /// Registration or UART errors.
    pub fn start(ctx: &'a SharedContext<'a>, uart: U, clock: &'a dyn NetworkClock) -> Result<Self> {
        ctx.registry.configure(ctx.config.watchdog.task_timeout_ms)?;
        let mut task = Self {
            ctx,
            uart,
            clock,
            filter: TaskFilter::all(),
        };
        let kernel = ctx.kernel;
        task.write_line(kernel.current_task(), kernel.ticks(), "Log task started")?;
        Ok(task)
    }

    /// One loop iteration: heartbeat, then wait for a message
    ///
    /// Returns whether a message was written or applied.
    ///
    /// # Errors
    /// UART errors.
    pub fn service_once(&mut self) -> Result<bool> {
        let _ = self.ctx.registry.update();
        let timeout = self.ctx.config.queues.receive_timeout_ms;
        match self.ctx.logger.queue().receive(self.ctx.kernel, timeout) {
            Some(msg) => self.handle(msg).map(|()| true),
            None => Ok(false),
        }
    }

    /// Handle every message already queued, without waiting
    ///
    /// # Errors
    /// UART errors; the remaining messages stay queued.
    pub fn drain(&mut self) -> Result<usize> {
        let mut n = 0;
        while let Some(msg) = self.ctx.logger.queue().try_receive() {
            self.handle(msg)?;
            n += 1;
        }
        Ok(n)
    }

    /// Write or apply one message
    ///
    /// # Errors
    /// UART errors.
    pub fn handle(&mut self, msg: LogMessage) -> Result<()> {
        match msg {
            LogMessage::Char(c) => self.uart.write_byte(c)?,
            LogMessage::Plain(text) => self.uart.write(text.as_bytes())?,
            LogMessage::Filter(filter) => self.filter = filter,
            LogMessage::Leveled {
                level,
                task,
                ticks,
                text,
            } => {
                if level.enabled_at(self.ctx.logger.level()) && self.filter.shows(task) {
                    self.write_line(task, ticks, &text)?;
                }
            }
        }
        Ok(())
    }

    /// Active task filter
    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    /// Console driver
    pub fn uart(&self) -> &U {
        &self.uart
    }

    /// Console driver, mutably
    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    /// Serve the log queue forever
    pub fn run(mut self) -> ! {
        loop {
            // a failing console has nowhere to report to
            let _ = self.service_once();
        }
    }

    fn write_line(&mut self, task: TaskHandle, ticks: Ticks, text: &str) -> Result<()> {
        let kernel = self.ctx.kernel;
        let ms = kernel.ticks_to_ms(ticks.as_u32());
        let stamp = match self.clock.wall_offset_ms() {
            Some(offset) => Timestamp::Wall(WallClock::from_ms(offset % MS_PER_DAY + ms % MS_PER_DAY)),
            None => Timestamp::Up(Uptime(ms)),
        };
        let mut out = UartWriter {
            uart: &mut self.uart,
            error: None,
        };
        let written = write_prefix(&mut out, kernel.task_name(task), &stamp)
            .and_then(|()| out.write_str(text))
            .and_then(|()| out.write_str("\r\n"));
        match (written, out.error) {
            (Ok(()), _) => Ok(()),
            (Err(_), Some(e)) => Err(e.into()),
            (Err(_), None) => Err(cn_common::Error::LogEventProcessing),
        }
    }
}
