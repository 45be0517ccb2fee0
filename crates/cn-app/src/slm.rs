// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Secondary modem shell
//!
//! Woken by an [`SlmRequest`] from the command shell. A request with a line
//! runs that one sub-command; an empty request takes over the console with
//! the `Modem -> ` prompt until `exit`. The command shell is inactive for
//! the whole time.
//!
//! MQTT sub-commands become [`MqttRequest`]s for the messaging task, so a
//! slow broker never holds the console.

use cn_common::{log_debug, log_error, log_info, log_print, types::truncated, LogLevel, Result, ShortText};
use cn_hal::{SocketFd, Transport, UartInterface};
use cn_kernel::BoundedMutex;

use crate::cli::{read_console, LineEditor};
use crate::context::SharedContext;
use crate::modem::ModemControl;
use crate::mqtt::MqttRequest;

/// Work for the modem shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlmRequest {
    /// One sub-command, or `None` for an interactive session
    pub line: Option<ShortText>,
}

/// Secondary modem shell task
pub struct SlmTask<'a, U> {
    ctx: &'a SharedContext<'a>,
    modem: &'a dyn ModemControl,
    input: &'a BoundedMutex<U>,
    editor: LineEditor,
    saved_level: LogLevel,
    active: bool,
    socket: Option<SocketFd>,
}

impl<'a, U: UartInterface> SlmTask<'a, U> {
    /// Register with the watchdog and announce the task
    ///
    /// # Errors
    /// Registration errors.
    pub fn start(ctx: &'a SharedContext<'a>, modem: &'a dyn ModemControl, input: &'a BoundedMutex<U>) -> Result<Self> {
        ctx.registry.configure(ctx.config.watchdog.task_timeout_ms)?;
        log_info!(ctx.logger, "SLM task started");
        Ok(Self {
            ctx,
            modem,
            input,
            editor: LineEditor::new(),
            saved_level: ctx.logger.level(),
            active: false,
            socket: None,
        })
    }

    /// Socket opened by the last `connect`
    pub fn socket(&self) -> Option<SocketFd> {
        self.socket
    }

    /// One loop iteration; returns whether a request was served
    pub fn service_once(&mut self) -> bool {
        let ctx = self.ctx;
        let _ = ctx.registry.update();
        let Some(request) = ctx.slm_queue.receive(ctx.kernel, ctx.config.queues.receive_timeout_ms) else {
            return false;
        };
        ctx.set_cli_active(false);
        match request.line {
            Some(line) => self.execute(&line),
            None => self.interactive(),
        }
        ctx.set_cli_active(true);
        true
    }

    fn interactive(&mut self) {
        let ctx = self.ctx;
        self.active = true;
        log_print!(ctx.logger, "{}", ctx.config.cli.modem_prompt);
        while self.active {
            let _ = ctx.registry.update();
            let Some(byte) = read_console(self.input) else {
                ctx.kernel.delay_ms(ctx.config.cli.idle_ms);
                continue;
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
                if self.active {
                    log_print!(logger, "{}", ctx.config.cli.modem_prompt);
                }
            }
        }
    }

    /// Run one sub-command
    pub fn execute(&mut self, line: &str) {
        let log = &self.ctx.logger;
        let mut tokens = line.split_ascii_whitespace();
        let Some(name) = tokens.next() else {
            return;
        };
        let mut args: heapless::Vec<&str, { cn_common::constants::CLI_MAX_TOKENS }> = heapless::Vec::new();
        for t in tokens {
            if args.push(t).is_err() {
                log_error!(log, "Invalid argument");
                return;
            }
        }

        match name {
            "connect" => self.connect(&args),
            "disconnect" => self.disconnect(&args),
            "status" => {
                if let Err(e) = self.modem.status() {
                    log_error!(log, "Error: {}", e);
                }
            }
            "start" => {
                if let Err(e) = self.modem.start() {
                    log_error!(log, "Error: {}", e);
                }
            }
            "stop" => {
                if let Err(e) = self.modem.stop() {
                    log_error!(log, "Error: {}", e);
                }
            }
            "mqtt" => self.mqtt(&args),
            "exit" => self.active = false,
            _ => log_error!(log, "Unrecognized modem command."),
        }
    }

    fn connect(&mut self, args: &[&str]) {
        let log = &self.ctx.logger;
        log_debug!(log, "Number of args: {}", args.len());
        self.socket = match args {
            [transport, host, port] => match (transport.parse::<Transport>(), port.parse::<u16>()) {
                (Ok(t), Ok(p)) => self.modem.open(t, host, p).ok(),
                _ => None,
            },
            _ => None,
        };
        match self.socket {
            Some(fd) => log_info!(log, "Connect successful to socket: {}", fd),
            None => log_error!(log, "Connect unsuccessful"),
        }
    }

    fn disconnect(&mut self, args: &[&str]) {
        let log = &self.ctx.logger;
        log_debug!(log, "Number of args: {}", args.len());
        let fd = match args.first() {
            Some(arg) => arg.parse().ok().map(SocketFd),
            None => self.socket.take(),
        };
        match fd.map(|fd| (fd, self.modem.close(fd))) {
            Some((fd, Ok(()))) => log_info!(log, "Disconnect from socket: {} successful", fd),
            _ => log_error!(log, "Disconnect unsuccessful"),
        }
    }

    fn mqtt(&self, args: &[&str]) {
        let ctx = self.ctx;
        let request = match args {
            ["send", message] => MqttRequest::Send {
                topic: None,
                message: truncated(message),
            },
            ["send", topic, message] => MqttRequest::Send {
                topic: Some(truncated(topic)),
                message: truncated(message),
            },
            ["subscribe"] => MqttRequest::Subscribe(None),
            ["subscribe", topic] => MqttRequest::Subscribe(Some(truncated(topic))),
            ["unsubscribe"] => MqttRequest::Unsubscribe,
            ["status"] => MqttRequest::Status,
            ["enable"] => return ctx.blinky.set_mqtt_enabled(true),
            ["disable"] => return ctx.blinky.set_mqtt_enabled(false),
            _ => return log_error!(ctx.logger, "Invalid argument"),
        };
        if let Err(e) = ctx
            .mqtt_queue
            .send(ctx.kernel, request, ctx.config.queues.send_timeout_ms)
        {
            log_error!(ctx.logger, "Error: {}", e);
        }
    }

    /// Serve requests forever
    pub fn run(mut self) -> ! {
        loop {
            self.service_once();
        }
    }
}
