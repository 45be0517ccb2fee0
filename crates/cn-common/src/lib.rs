// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Cellnode Common Library
//!
//! Types shared by every cellnode firmware crate: the module-banded error
//! taxonomy, the log message model and [`log::LogSink`] trait, wrapping tick
//! arithmetic, compile-time configuration and sizing constants.
//!
//! # Features
//!
//! - `std`: Enable standard library support (disabled by default for embedded)
//! - `defmt`: Enable defmt formatting of errors and log levels
//!
//! No heap allocations are performed; every buffer is a fixed-size array or
//! a heapless collection.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

pub mod types;
pub mod errors;
pub mod config;
pub mod log;
pub mod constants;
pub mod time;

// Re-export commonly used items
pub use errors::{Error, Result};
pub use types::*;
pub use config::SystemConfig;
pub use log::{LogLevel, LogMessage, LogSink};
pub use time::{Ticks, TickRate};
