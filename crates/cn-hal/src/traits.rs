// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Hardware abstraction traits
//!
//! Platform-agnostic interfaces the application tasks drive. Board drivers
//! and the host simulation implement them.

use core::fmt;
use core::str::FromStr;

use crate::error::{HalError, HalResult};

/// GPIO interface
pub trait GpioPin {
    /// Set pin high
    fn set_high(&mut self) -> HalResult<()>;

    /// Set pin low
    fn set_low(&mut self) -> HalResult<()>;

    /// Read pin state
    fn is_high(&self) -> HalResult<bool>;

    /// Toggle pin
    fn toggle(&mut self) -> HalResult<()> {
        if self.is_high()? {
            self.set_low()
        } else {
            self.set_high()
        }
    }
}

/// UART serial interface
pub trait UartInterface {
    /// Initialize the UART with the given baud rate
    fn init(&mut self, baud_rate: u32) -> HalResult<()>;

    /// Write a byte (blocking)
    fn write_byte(&mut self, byte: u8) -> HalResult<()>;

    /// Take one received byte if any is pending; never blocks
    fn read_byte(&mut self) -> HalResult<Option<u8>>;

    /// Write a buffer of bytes (blocking)
    fn write(&mut self, data: &[u8]) -> HalResult<()> {
        for &byte in data {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Flush the transmit buffer
    fn flush(&mut self) -> HalResult<()>;
}

/// Reply text of one AT command
pub type AtResponse = heapless::String<{ cn_common::constants::MEDIUM_MSG_MAX }>;

/// Modem socket descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketFd(pub i32);

impl fmt::Display for SocketFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Socket transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Plain TCP stream
    Tcp,
    /// UDP datagrams
    Udp,
    /// TCP with TLS using the provisioned credentials
    Tls,
}

impl Transport {
    /// Lower-case name as typed in the shell
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Tls => "tls",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = HalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("tcp") {
            Ok(Self::Tcp)
        } else if s.eq_ignore_ascii_case("udp") {
            Ok(Self::Udp)
        } else if s.eq_ignore_ascii_case("tls") {
            Ok(Self::Tls)
        } else {
            Err(HalError::InvalidParameter)
        }
    }
}

/// Socket I/O timeouts applied at connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketTimeouts {
    /// Receive timeout in milliseconds
    pub recv_ms: u32,
    /// Send timeout in milliseconds
    pub send_ms: u32,
}

/// Cellular modem: AT command channel plus the socket API of the modem library
pub trait ModemInterface {
    /// Bring up the modem library
    fn init(&mut self) -> HalResult<()>;

    /// Run one AT command, writing the reply into `response`
    ///
    /// # Errors
    /// [`HalError::ModemError`] when the modem answers `ERROR`.
    fn at_command(&mut self, command: &str, response: &mut AtResponse) -> HalResult<()>;

    /// Open a socket and connect it to `host:port`
    fn connect(
        &mut self,
        transport: Transport,
        host: &str,
        port: u16,
        timeouts: SocketTimeouts,
    ) -> HalResult<SocketFd>;

    /// Close a socket
    fn disconnect(&mut self, fd: SocketFd) -> HalResult<()>;

    /// Send bytes, returning how many were accepted
    fn send(&mut self, fd: SocketFd, data: &[u8]) -> HalResult<usize>;

    /// Receive bytes without blocking
    ///
    /// # Errors
    /// [`HalError::WouldBlock`] when nothing has arrived yet.
    fn receive(&mut self, fd: SocketFd, buffer: &mut [u8]) -> HalResult<usize>;

    /// Whether the modem is attached to the cellular network
    fn is_registered(&mut self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_parse_ignores_case() {
        assert_eq!("TCP".parse::<Transport>(), Ok(Transport::Tcp));
        assert_eq!("udp".parse::<Transport>(), Ok(Transport::Udp));
        assert_eq!("Tls".parse::<Transport>(), Ok(Transport::Tls));
        assert_eq!("sctp".parse::<Transport>(), Err(HalError::InvalidParameter));
    }
}
