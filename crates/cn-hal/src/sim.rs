// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Host simulation drivers
//!
//! In-memory implementations of the HAL traits. They let every application
//! task run one service iteration inside a host test and expose what the
//! task did to the hardware.

use heapless::{Deque, String, Vec};

use crate::error::{HalError, HalResult};
use crate::traits::{AtResponse, GpioPin, ModemInterface, SocketFd, SocketTimeouts, Transport, UartInterface};

// ============================================================================
// UART
// ============================================================================

/// Receive buffer size of [`SimUart`]
pub const SIM_UART_RX: usize = 256;
/// Transmit capture size of [`SimUart`]
pub const SIM_UART_TX: usize = 4096;

/// UART with a scripted receive side and a captured transmit side
#[derive(Default)]
pub struct SimUart {
    baud_rate: u32,
    rx: Deque<u8, SIM_UART_RX>,
    tx: Vec<u8, SIM_UART_TX>,
}

impl SimUart {
    /// Idle UART
    #[must_use]
    pub const fn new() -> Self {
        Self {
            baud_rate: 0,
            rx: Deque::new(),
            tx: Vec::new(),
        }
    }

    /// Queue bytes as if typed on the serial line; excess bytes are dropped
    pub fn push_input(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.rx.push_back(b).is_err() {
                break;
            }
        }
    }

    /// Everything written so far
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.tx
    }

    /// Written bytes as text (empty if not UTF-8)
    #[must_use]
    pub fn output_str(&self) -> &str {
        core::str::from_utf8(&self.tx).unwrap_or("")
    }

    /// Forget captured output
    pub fn clear_output(&mut self) {
        self.tx.clear();
    }

    /// Baud rate passed to `init`
    #[must_use]
    pub const fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl UartInterface for SimUart {
    fn init(&mut self, baud_rate: u32) -> HalResult<()> {
        if baud_rate == 0 {
            return Err(HalError::InvalidParameter);
        }
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> HalResult<()> {
        self.tx.push(byte).map_err(|_| HalError::UartError)
    }

    fn read_byte(&mut self) -> HalResult<Option<u8>> {
        Ok(self.rx.pop_front())
    }

    fn flush(&mut self) -> HalResult<()> {
        Ok(())
    }
}

// ============================================================================
// GPIO
// ============================================================================

/// Output pin that remembers its level and how often it changed
#[derive(Debug, Default, Clone, Copy)]
pub struct SimPin {
    high: bool,
    edges: u32,
}

impl SimPin {
    /// Pin driven low
    #[must_use]
    pub const fn new() -> Self {
        Self {
            high: false,
            edges: 0,
        }
    }

    /// Number of level changes
    #[must_use]
    pub const fn edges(&self) -> u32 {
        self.edges
    }

    fn drive(&mut self, high: bool) {
        if self.high != high {
            self.edges += 1;
        }
        self.high = high;
    }
}

impl GpioPin for SimPin {
    fn set_high(&mut self) -> HalResult<()> {
        self.drive(true);
        Ok(())
    }

    fn set_low(&mut self) -> HalResult<()> {
        self.drive(false);
        Ok(())
    }

    fn is_high(&self) -> HalResult<bool> {
        Ok(self.high)
    }
}

// ============================================================================
// Modem
// ============================================================================

/// Commands remembered by [`SimModem`]
pub const SIM_MODEM_LOG: usize = 64;
/// Sockets [`SimModem`] can hold open
pub const SIM_MODEM_SOCKETS: usize = 8;

/// Last connect request seen by [`SimModem`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConnect {
    /// Transport requested
    pub transport: Transport,
    /// Remote host
    pub host: String<64>,
    /// Remote port
    pub port: u16,
    /// Timeouts requested
    pub timeouts: SocketTimeouts,
}

/// Scripted cellular modem
///
/// Every command answers `OK` unless a reply was registered for its prefix
/// or it matches the failing prefix. Sockets succeed unless refusal is
/// switched on. Inbound data is released after a configurable number of
/// would-block results.
pub struct SimModem {
    initialized: bool,
    registered: bool,
    refuse_connect: bool,
    fail_prefix: Option<&'static str>,
    replies: Vec<(&'static str, &'static str), 8>,
    commands: Vec<String<128>, SIM_MODEM_LOG>,
    sockets: Vec<SocketFd, SIM_MODEM_SOCKETS>,
    next_fd: i32,
    last_connect: Option<SimConnect>,
    sent: Vec<u8, 2048>,
    inbound: Deque<u8, 1024>,
    would_block: u32,
}

impl Default for SimModem {
    fn default() -> Self {
        Self::new()
    }
}

impl SimModem {
    /// Unregistered modem with no scripted replies
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initialized: false,
            registered: false,
            refuse_connect: false,
            fail_prefix: None,
            replies: Vec::new(),
            commands: Vec::new(),
            sockets: Vec::new(),
            next_fd: 1,
            last_connect: None,
            sent: Vec::new(),
            inbound: Deque::new(),
            would_block: 0,
        }
    }

    /// Attach to or detach from the network
    pub fn set_registered(&mut self, registered: bool) {
        self.registered = registered;
    }

    /// Make connect attempts fail
    pub fn set_refuse_connect(&mut self, refuse: bool) {
        self.refuse_connect = refuse;
    }

    /// Answer `ERROR` to commands starting with `prefix`
    pub fn fail_commands(&mut self, prefix: &'static str) {
        self.fail_prefix = Some(prefix);
    }

    /// Reply `reply` to commands starting with `prefix`
    pub fn set_reply(&mut self, prefix: &'static str, reply: &'static str) {
        if let Some(slot) = self.replies.iter_mut().find(|(p, _)| *p == prefix) {
            slot.1 = reply;
        } else {
            let _ = self.replies.push((prefix, reply));
        }
    }

    /// Make `data` readable after `would_block` empty polls
    pub fn push_inbound(&mut self, data: &[u8], would_block: u32) {
        self.would_block = would_block;
        for &b in data {
            if self.inbound.push_back(b).is_err() {
                break;
            }
        }
    }

    /// Commands received, oldest first
    pub fn commands(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().map(String::as_str)
    }

    /// Bytes sent on any socket
    #[must_use]
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Currently open sockets
    #[must_use]
    pub fn open_sockets(&self) -> &[SocketFd] {
        &self.sockets
    }

    /// Most recent connect request
    #[must_use]
    pub fn last_connect(&self) -> Option<&SimConnect> {
        self.last_connect.as_ref()
    }

    /// Whether `init` was called
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn is_open(&self, fd: SocketFd) -> bool {
        self.sockets.contains(&fd)
    }
}

impl ModemInterface for SimModem {
    fn init(&mut self) -> HalResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn at_command(&mut self, command: &str, response: &mut AtResponse) -> HalResult<()> {
        let mut logged = String::new();
        for c in command.chars() {
            if logged.push(c).is_err() {
                break;
            }
        }
        let _ = self.commands.push(logged);

        response.clear();
        if self.fail_prefix.is_some_and(|p| command.starts_with(p)) {
            let _ = response.push_str("ERROR");
            return Err(HalError::ModemError);
        }
        match command {
            "AT+CFUN=1" => self.registered = true,
            "AT+CFUN=0" => self.registered = false,
            _ => {}
        }
        let reply = self
            .replies
            .iter()
            .find(|(p, _)| command.starts_with(p))
            .map_or("OK", |(_, r)| *r);
        response.push_str(reply).map_err(|()| HalError::ModemError)
    }

    fn connect(
        &mut self,
        transport: Transport,
        host: &str,
        port: u16,
        timeouts: SocketTimeouts,
    ) -> HalResult<SocketFd> {
        if !self.registered {
            return Err(HalError::NotRegistered);
        }
        if host.is_empty() || port == 0 {
            return Err(HalError::InvalidParameter);
        }
        let mut name = String::new();
        name.push_str(host).map_err(|()| HalError::InvalidParameter)?;
        self.last_connect = Some(SimConnect {
            transport,
            host: name,
            port,
            timeouts,
        });
        if self.refuse_connect {
            return Err(HalError::ConnectionRefused);
        }
        let fd = SocketFd(self.next_fd);
        self.sockets.push(fd).map_err(|_| HalError::NoSockets)?;
        self.next_fd += 1;
        Ok(fd)
    }

    fn disconnect(&mut self, fd: SocketFd) -> HalResult<()> {
        let index = self
            .sockets
            .iter()
            .position(|s| *s == fd)
            .ok_or(HalError::SocketError)?;
        self.sockets.swap_remove(index);
        Ok(())
    }

    fn send(&mut self, fd: SocketFd, data: &[u8]) -> HalResult<usize> {
        if !self.is_open(fd) {
            return Err(HalError::SocketError);
        }
        let room = self.sent.capacity() - self.sent.len();
        let n = data.len().min(room);
        // n never exceeds the remaining capacity
        let _ = self.sent.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn receive(&mut self, fd: SocketFd, buffer: &mut [u8]) -> HalResult<usize> {
        if !self.is_open(fd) {
            return Err(HalError::SocketError);
        }
        if self.would_block > 0 || self.inbound.is_empty() {
            self.would_block = self.would_block.saturating_sub(1);
            return Err(HalError::WouldBlock);
        }
        let mut n = 0;
        while n < buffer.len() {
            let Some(b) = self.inbound.pop_front() else { break };
            buffer[n] = b;
            n += 1;
        }
        Ok(n)
    }

    fn is_registered(&mut self) -> bool {
        self.registered
    }
}
