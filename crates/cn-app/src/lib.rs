// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Cellnode application tasks
//!
//! Everything above the kernel services: the log task, the two console
//! shells, the modem channel, the MQTT session, the filesystem counters and
//! the LED demo. All tasks share one [`SharedContext`].
//!
//! | Task     | Queue it serves | Watchdog timeout |
//! |----------|-----------------|------------------|
//! | Log      | log             | 30 s             |
//! | CLI      | CLI             | none             |
//! | SLM      | SLM             | 30 s             |
//! | MQTT     | MQTT            | 30 s             |
//! | FS       | FS              | 30 s             |
//! | Blinky   |                 | 30 s             |
//! | App      |                 | 30 s             |
//!
//! The MQTT protocol engine, the filesystem and the modem library are
//! external; they come in through [`mqtt::MqttClient`],
//! [`fs::KeyValueStore`] and [`cn_hal::ModemInterface`].

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod blinky;
pub mod cli;
pub mod context;
pub mod fs;
pub mod logger;
pub mod modem;
pub mod mqtt;
pub mod slm;

pub use app::{bring_up, AppTask};
pub use blinky::Blinky;
pub use cli::{Cli, LineEditor};
pub use context::{install, BlinkySettings, SharedContext};
pub use fs::{FsRequest, FsTask, KeyValueStore, MemStore};
pub use logger::{LogTask, Logger, NetworkClock, NoClock};
pub use modem::{ModemChannel, ModemControl, NetworkLink};
pub use mqtt::{MqttClient, MqttControl, MqttRequest, MqttSession, MqttTask};
pub use slm::{SlmRequest, SlmTask};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
