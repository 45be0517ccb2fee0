// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Command shell
//!
//! Reads the console one byte at a time, echoes through the logger and
//! dispatches a line on carriage return. While a line is being typed the
//! log level is parked at [`LogLevel::None`] so log output does not break
//! into the input; the level comes back on `\r`, before the command runs.
//!
//! `modem ...` hands the console to the secondary modem shell, which clears
//! [`SharedContext::cli_active`] until it is done.

use cn_common::constants::{CLI_MAX_TOKENS, LOG_MAX_LIST};
use cn_common::log::{FilterMode, TaskFilter};
use cn_common::{
    log_debug, log_error, log_info, log_print, types::truncated, Error, LogLevel, LogSink, Result, ShortText,
    TaskHandle,
};
use cn_hal::UartInterface;
use cn_kernel::{BoundedMutex, HeapId};
use heapless::Vec;

use crate::context::SharedContext;
use crate::modem::ModemControl;
use crate::slm::SlmRequest;

/// Shell commands and their help text
pub const COMMANDS: &[(&str, &str)] = &[
    ("help", "Print list of commands"),
    ("set-led", "Set LED timing in ms/number of LEDs: set-led 1000 4"),
    (
        "set-level",
        "Set log level (0 = no log, 1 = error, 2 = info, 3 = debug, 4 = insane): set-level 3",
    ),
    (
        "get-level",
        "Get log level (0 = no log, 1 = error, 2 = info, 3 = debug, 4 = insane): get-level",
    ),
    ("get-status", "Get the system status"),
    ("show-tasks", "Show logs from task list (up to 3)"),
    ("hide-tasks", "Hide logs from task list (up to 3)"),
    ("clear-tasks", "Clear task filter lists"),
    ("modem", "Send modem commands"),
];

/// Console line editor shared by both shells
#[derive(Debug, Default)]
pub struct LineEditor {
    line: ShortText,
}

impl LineEditor {
    /// Empty line
    #[must_use]
    pub const fn new() -> Self {
        Self { line: ShortText::new() }
    }

    /// Text typed so far
    pub fn pending(&self) -> &str {
        &self.line
    }

    /// Feed one byte, echoing through `echo`; returns the line on `\r`
    pub fn feed(&mut self, byte: u8, echo: &dyn LogSink) -> Option<ShortText> {
        match byte {
            b'\r' => {
                echo.putchar(b'\r');
                echo.putchar(b'\n');
                Some(core::mem::take(&mut self.line))
            }
            0x08 | 0x7f => {
                if self.line.pop().is_some() {
                    echo.putchar(0x08);
                    echo.putchar(b' ');
                    echo.putchar(0x08);
                }
                None
            }
            b if b == b' ' || b.is_ascii_graphic() => {
                // a full line swallows further input
                if self.line.push(char::from(b)).is_ok() {
                    echo.putchar(b);
                }
                None
            }
            _ => None,
        }
    }
}

/// Read one byte from a shared console without waiting on its lock
pub(crate) fn read_console<U: UartInterface>(input: &BoundedMutex<U>) -> Option<u8> {
    input.try_lock().and_then(|mut uart| uart.read_byte().ok().flatten())
}

/// Command shell task
pub struct Cli<'a, U> {
    ctx: &'a SharedContext<'a>,
    modem: &'a dyn ModemControl,
    input: &'a BoundedMutex<U>,
    editor: LineEditor,
    saved_level: LogLevel,
    was_active: bool,
}

impl<'a, U: UartInterface> Cli<'a, U> {
    /// Announce the shell and print the first prompt
    ///
    /// The shell blocks on input, so it registers without a watchdog timeout.
    ///
    /// # Errors
    /// Registration errors.
    pub fn start(ctx: &'a SharedContext<'a>, modem: &'a dyn ModemControl, input: &'a BoundedMutex<U>) -> Result<Self> {
        ctx.registry.configure(0)?;
        log_info!(ctx.logger, "CLI task started");
        log_print!(ctx.logger, "{}", ctx.config.cli.prompt);
        Ok(Self {
            ctx,
            modem,
            input,
            editor: LineEditor::new(),
            saved_level: ctx.logger.level(),
            was_active: true,
        })
    }

    /// One loop iteration; returns whether a byte was consumed
    pub fn service_once(&mut self) -> bool {
        let ctx = self.ctx;
        let _ = ctx.registry.update();
        if !ctx.cli_active() {
            self.was_active = false;
            ctx.kernel.delay_ms(ctx.config.cli.idle_ms);
            return false;
        }
        if !self.was_active {
            self.was_active = true;
            log_print!(ctx.logger, "{}", ctx.config.cli.prompt);
        }

        let Some(byte) = read_console(self.input) else {
            ctx.kernel.delay_ms(ctx.config.cli.idle_ms);
            return false;
        };

        let logger = &ctx.logger;
        if logger.level() != LogLevel::None {
            self.saved_level = logger.level();
            logger.set_level(LogLevel::None);
        }
        if byte == b'\r' {
            logger.set_level(self.saved_level);
        }
        if let Some(line) = self.editor.feed(byte, logger) {
            self.execute(&line);
            if ctx.cli_active() {
                log_print!(logger, "{}", ctx.config.cli.prompt);
            }
        }
        true
    }

    /// Run one command line
    pub fn execute(&mut self, line: &str) {
        let log = &self.ctx.logger;
        let mut tokens = line.split_ascii_whitespace();
        let Some(name) = tokens.next() else {
            return;
        };
        log_debug!(log, "Received: {}", name);

        let mut args: Vec<&str, CLI_MAX_TOKENS> = Vec::new();
        let mut overflow = false;
        for t in tokens {
            overflow |= args.push(t).is_err();
        }

        let result = if overflow {
            Err(Error::CliBadParam)
        } else {
            match name {
                "help" => {
                    self.help();
                    Ok(())
                }
                "set-led" => self.set_led(&args),
                "set-level" => self.set_level(&args),
                "get-level" => {
                    log_print!(log, "Log level: {}\r\n", log.level() as u8);
                    Ok(())
                }
                "get-status" => {
                    self.status();
                    Ok(())
                }
                "show-tasks" => self.filter_tasks(FilterMode::Show, &args),
                "hide-tasks" => self.filter_tasks(FilterMode::Hide, &args),
                "clear-tasks" => log.set_filter(TaskFilter::all()),
                "modem" => self.hand_over(line),
                _ => {
                    self.raw(name, line);
                    Ok(())
                }
            }
        };

        match result {
            Ok(()) => {}
            Err(Error::CliBadParam) => log_error!(log, "No valid arguments"),
            Err(e) => log_error!(log, "Error: {}", e),
        }
    }

    fn help(&self) {
        let log = &self.ctx.logger;
        for (name, help) in COMMANDS {
            log_print!(log, " * {}\r\n\t{}\r\n", name, help);
        }
    }

    fn set_led(&self, args: &[&str]) -> Result<()> {
        let [ms, count] = args else {
            return Err(Error::CliBadParam);
        };
        let ms: u32 = ms.parse().map_err(|_| Error::CliBadParam)?;
        let count: usize = count.parse().map_err(|_| Error::CliBadParam)?;
        let blinky = &self.ctx.blinky;
        blinky.set_period(ms);
        blinky.set_count(count);
        log_debug!(
            self.ctx.logger,
            "LED period: {} ms, LEDs: {}",
            blinky.period_ms(),
            blinky.count()
        );
        Ok(())
    }

    fn set_level(&mut self, args: &[&str]) -> Result<()> {
        let [level] = args else {
            return Err(Error::CliBadParam);
        };
        let level = level
            .parse()
            .ok()
            .and_then(LogLevel::from_u8)
            .ok_or(Error::CliBadParam)?;
        self.saved_level = level;
        self.ctx.logger.set_level(level);
        Ok(())
    }

    fn status(&self) {
        let ctx = self.ctx;
        let log = &ctx.logger;
        if let Err(e) = ctx.registry.report(log) {
            log_error!(log, "Error: {}", e);
        }
        for id in [HeapId::APP, HeapId::MODEM_TX] {
            if let Err(e) = ctx.heaps.report(id, log) {
                log_error!(log, "Error: {}", e);
            }
        }
        ctx.report_queues();
    }

    fn filter_tasks(&self, mode: FilterMode, names: &[&str]) -> Result<()> {
        let ctx = self.ctx;
        if names.len() > LOG_MAX_LIST {
            return Err(Error::CliBadParam);
        }
        ctx.registry
            .list_to(&ctx.cli_queue, ctx.config.queues.send_timeout_ms)?;
        let tasks = ctx
            .cli_queue
            .receive(ctx.kernel, ctx.config.queues.receive_timeout_ms)
            .ok_or(Error::CliEventProcessing)?;

        let mut handles: Vec<TaskHandle, LOG_MAX_LIST> = Vec::new();
        for name in names {
            let Some(handle) = tasks.iter().find(|t| ctx.kernel.task_name(**t) == *name) else {
                log_print!(ctx.logger, "Invalid task: {}\r\n", name);
                return Ok(());
            };
            handles.push(*handle).map_err(|_| Error::CliBadParam)?;
        }
        let filter = TaskFilter::new(mode, &handles).ok_or(Error::CliBadParam)?;
        ctx.logger.set_filter(filter)
    }

    fn hand_over(&self, line: &str) -> Result<()> {
        let ctx = self.ctx;
        let rest = line
            .trim_start()
            .strip_prefix("modem")
            .map_or("", str::trim);
        let request = SlmRequest {
            line: (!rest.is_empty()).then(|| truncated(rest)),
        };
        ctx.set_cli_active(false);
        let sent = ctx
            .slm_queue
            .send(ctx.kernel, request, ctx.config.queues.send_timeout_ms);
        if sent.is_err() {
            ctx.set_cli_active(true);
        }
        sent
    }

    fn raw(&self, name: &str, line: &str) {
        let log = &self.ctx.logger;
        let is_at = name
            .as_bytes()
            .get(..2)
            .is_some_and(|p| p.eq_ignore_ascii_case(b"at"));
        if !is_at {
            log_error!(log, "Error: Not Supported!");
            return;
        }
        match self.modem.at_command(line.trim()) {
            Ok(response) => {
                log_info!(log, "Modem command: {}", line.trim());
                log_info!(log, "Modem response: {}", response);
            }
            Err(e) => log_error!(log, "Modem command failed: {}", e),
        }
    }

    /// Serve the console forever
    pub fn run(mut self) -> ! {
        loop {
            self.service_once();
        }
    }
}
