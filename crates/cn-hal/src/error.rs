// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! HAL error types

use core::fmt;

/// HAL error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Hardware not initialized
    NotInitialized,
    /// Hardware initialization failed
    InitFailed,
    /// GPIO error
    GpioError,
    /// UART error
    UartError,
    /// Modem returned an error for an AT command
    ModemError,
    /// Modem is not attached to the network
    NotRegistered,
    /// Socket operation failed
    SocketError,
    /// Remote end refused or dropped the connection
    ConnectionRefused,
    /// No socket slot left in the modem
    NoSockets,
    /// Invalid parameter
    InvalidParameter,
    /// Operation timeout
    Timeout,
    /// Hardware busy
    Busy,
    /// Nothing to read yet; try again
    WouldBlock,
    /// Operation not supported
    NotSupported,
}

impl HalError {
    /// Get error code
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::NotInitialized => 0x0801,
            Self::InitFailed => 0x0802,
            Self::GpioError => 0x0840,
            Self::UartError => 0x0870,
            Self::ModemError => 0x08E0,
            Self::NotRegistered => 0x08E1,
            Self::SocketError => 0x08E2,
            Self::ConnectionRefused => 0x08E3,
            Self::NoSockets => 0x08E4,
            Self::InvalidParameter => 0x08F0,
            Self::Timeout => 0x08F1,
            Self::Busy => 0x08F2,
            Self::WouldBlock => 0x08F5,
            Self::NotSupported => 0x08FF,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not initialized",
            Self::InitFailed => "initialization failed",
            Self::GpioError => "GPIO error",
            Self::UartError => "UART error",
            Self::ModemError => "modem command failed",
            Self::NotRegistered => "modem not registered",
            Self::SocketError => "socket error",
            Self::ConnectionRefused => "connection refused",
            Self::NoSockets => "no free socket",
            Self::InvalidParameter => "invalid parameter",
            Self::Timeout => "timeout",
            Self::Busy => "busy",
            Self::WouldBlock => "operation would block",
            Self::NotSupported => "not supported",
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for HalError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

impl From<HalError> for cn_common::Error {
    fn from(e: HalError) -> Self {
        match e {
            HalError::NotInitialized => Self::ModemNotInit,
            HalError::InitFailed => Self::ModemInit,
            HalError::GpioError => Self::GpioGeneral,
            HalError::UartError => Self::UartGeneral,
            HalError::ModemError | HalError::Busy | HalError::Timeout => Self::ModemGeneral,
            HalError::NotRegistered => Self::ModemNotRegistered,
            HalError::SocketError | HalError::ConnectionRefused => Self::MqttTransport,
            HalError::NoSockets => Self::ModemSocketTableFull,
            HalError::InvalidParameter => Self::ModemBadParam,
            HalError::WouldBlock => Self::ModemWouldBlock,
            HalError::NotSupported => Self::CliNotSupported,
        }
    }
}

/// HAL Result type
pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cn_common::Error;

    #[test]
    fn test_codes_in_hal_band() {
        for e in [
            HalError::NotInitialized,
            HalError::GpioError,
            HalError::WouldBlock,
            HalError::NotSupported,
        ] {
            assert_eq!(e.code() & 0xFF00, 0x0800);
        }
    }

    #[test]
    fn test_conversion_into_firmware_error() {
        assert_eq!(Error::from(HalError::WouldBlock), Error::ModemWouldBlock);
        assert_eq!(Error::from(HalError::NotRegistered), Error::ModemNotRegistered);
        assert_eq!(Error::from(HalError::UartError), Error::UartGeneral);
    }
}
