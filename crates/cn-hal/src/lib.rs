// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Hardware Abstraction Layer for the cellnode firmware
//!
//! Application tasks only see the traits in [`traits`]:
//!
//! - **GPIO**: LED outputs of the blink demo
//! - **UART**: the console line shared by the logger and the shell
//! - **Modem**: AT command channel and sockets of the cellular modem
//!
//! The target board is chosen with a Cargo feature (`nrf9160dk` by default,
//! or `thingy91`). [`sim`] provides in-memory drivers for host tests.

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod sim;
pub mod traits;

// Re-export main traits
pub use error::{HalError, HalResult};
pub use traits::*;

/// Supported boards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    /// nRF9160 development kit
    Nrf9160Dk,
    /// Thingy:91 prototyping platform
    Thingy91,
}

impl Board {
    /// Board selected at build time
    #[must_use]
    pub const fn current() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "thingy91")] {
                Self::Thingy91
            } else {
                Self::Nrf9160Dk
            }
        }
    }

    /// Human-readable board name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Nrf9160Dk => "nRF9160 DK",
            Self::Thingy91 => "Thingy:91",
        }
    }

    /// Number of user LEDs
    #[must_use]
    pub const fn num_leds(&self) -> usize {
        match self {
            Self::Nrf9160Dk => 4,
            Self::Thingy91 => 3,
        }
    }

    /// MQTT client identifier provisioned for the board
    #[must_use]
    pub const fn mqtt_client_id(&self) -> &'static str {
        match self {
            Self::Nrf9160Dk => "TestDevice-nRF9160DK",
            Self::Thingy91 => "TestDevice-Thingy91",
        }
    }

    /// Console baud rate
    #[must_use]
    pub const fn console_baud(&self) -> u32 {
        115_200
    }
}

/// LED count of the board selected at build time
pub const NUM_LEDS: usize = Board::current().num_leds();

/// Largest LED count of any supported board
pub const MAX_LEDS: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_constants_agree() {
        let board = Board::current();
        assert_eq!(NUM_LEDS, board.num_leds());
        assert!(NUM_LEDS <= MAX_LEDS);
        assert!(board.mqtt_client_id().starts_with("TestDevice-"));
    }
}
