// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! System configuration for the cellnode firmware
//!
//! All configuration is compile-time. Each component takes its own section
//! by value at construction; board-dependent values (LED count, client
//! identifier) are patched in by the application from the HAL board
//! description.

use crate::constants::{
    APP_HEAP_SIZE, AT_SCRIPT_DELAY, CLI_WAIT_TIME, MODEM_TX_HEAP_SIZE, QUEUE_WAIT_TIME,
    RECEIVE_RETRY_DELAY, RECEIVE_RETRY_MAX, TWDT_KICK_TIME, TWDT_TIMEOUT,
};
use crate::log::LogLevel;

/// System-wide configuration
#[derive(Debug, Clone, Copy)]
pub struct SystemConfig {
    /// Queue fabric
    pub queues: QueueConfig,
    /// Heaps
    pub heap: HeapConfig,
    /// Task watchdog
    pub watchdog: WatchdogConfig,
    /// Logger
    pub log: LogConfig,
    /// Command shells
    pub cli: CliConfig,
    /// Modem channel
    pub modem: ModemConfig,
    /// MQTT session
    pub mqtt: MqttConfig,
    /// Blink demo
    pub blinky: BlinkyConfig,
}

impl SystemConfig {
    /// Default configuration
    pub const DEFAULT: Self = Self {
        queues: QueueConfig::DEFAULT,
        heap: HeapConfig::DEFAULT,
        watchdog: WatchdogConfig::DEFAULT,
        log: LogConfig::DEFAULT,
        cli: CliConfig::DEFAULT,
        modem: ModemConfig::DEFAULT,
        mqtt: MqttConfig::DEFAULT,
        blinky: BlinkyConfig::DEFAULT,
    };
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Queue fabric configuration
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Producer send timeout in milliseconds
    pub send_timeout_ms: u32,
    /// Consumer receive timeout in milliseconds (service loop quantum)
    pub receive_timeout_ms: u32,
}

impl QueueConfig {
    /// Default queue configuration
    pub const DEFAULT: Self = Self {
        send_timeout_ms: QUEUE_WAIT_TIME,
        receive_timeout_ms: TWDT_KICK_TIME,
    };
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Heap configuration
#[derive(Debug, Clone, Copy)]
pub struct HeapConfig {
    /// Bounded wait for a heap lock in milliseconds
    pub lock_timeout_ms: u32,
    /// Size of heap 0
    pub app_heap_size: usize,
    /// Size of heap 1 (modem TX shared memory)
    pub modem_tx_heap_size: usize,
}

impl HeapConfig {
    /// Default heap configuration
    pub const DEFAULT: Self = Self {
        lock_timeout_ms: QUEUE_WAIT_TIME,
        app_heap_size: APP_HEAP_SIZE,
        modem_tx_heap_size: MODEM_TX_HEAP_SIZE,
    };
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Task watchdog configuration
#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    /// Timeout registered by ordinary service tasks, in milliseconds
    pub task_timeout_ms: u32,
    /// Delay between watchdog scans, in milliseconds
    pub scan_period_ms: u32,
    /// Bounded wait for the registry lock in milliseconds
    pub lock_timeout_ms: u32,
}

impl WatchdogConfig {
    /// Default watchdog configuration
    pub const DEFAULT: Self = Self {
        task_timeout_ms: TWDT_TIMEOUT,
        scan_period_ms: TWDT_KICK_TIME,
        lock_timeout_ms: QUEUE_WAIT_TIME,
    };
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Logger configuration
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Level in effect when the log task starts
    pub initial_level: LogLevel,
}

impl LogConfig {
    /// Default logger configuration
    pub const DEFAULT: Self = Self {
        initial_level: LogLevel::Info,
    };
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Command shell configuration
#[derive(Debug, Clone, Copy)]
pub struct CliConfig {
    /// Prompt of the main shell
    pub prompt: &'static str,
    /// Prompt of the modem shell
    pub modem_prompt: &'static str,
    /// Idle poll period in milliseconds
    pub idle_ms: u32,
}

impl CliConfig {
    /// Default shell configuration
    pub const DEFAULT: Self = Self {
        prompt: "nRF91 -> ",
        modem_prompt: "Modem -> ",
        idle_ms: CLI_WAIT_TIME,
    };
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Modem channel configuration
#[derive(Debug, Clone, Copy)]
pub struct ModemConfig {
    /// Bounded wait for the modem lock in milliseconds
    pub lock_timeout_ms: u32,
    /// Commands run by `start`
    pub start_script: &'static [&'static str],
    /// Commands run by `stop`
    pub stop_script: &'static [&'static str],
    /// Pause after each scripted command in milliseconds
    pub script_delay_ms: u32,
    /// Receive retries while the socket would block
    pub receive_retries: u32,
    /// Pause between receive retries in milliseconds
    pub receive_retry_delay_ms: u32,
    /// Socket receive timeout used for shell connects
    pub recv_timeout_ms: u32,
    /// Socket send timeout used for shell connects
    pub send_timeout_ms: u32,
}

/// LTE-M bring-up sequence
pub const MODEM_START_SCRIPT: &[&str] = &[
    "AT+CFUN?",
    "AT+CFUN=0",
    "AT%XMAGPIO=1,1,1,7,0,791,849,1,880,960,3,824,894,4,1574,1577,5,698,748,5,1710,2200,7,746,803",
    "AT%HWVERSION",
    "AT+CGMR",
    "AT+CGSN",
    "AT%XSYSTEMMODE=1,0,0,0",
    "AT+CSCON=3",
    "AT+CNEC=24",
    "AT%CESQ=1",
    "AT%XOPNAME=1",
    "AT+CEREG=5",
    "AT+CPSMS=0",
    "AT%XDATAPRFL=4",
    "AT+CFUN=1",
    "AT+CFUN?",
];

/// Radio off
pub const MODEM_STOP_SCRIPT: &[&str] = &["AT+CFUN=0"];

impl ModemConfig {
    /// Default modem configuration
    pub const DEFAULT: Self = Self {
        lock_timeout_ms: QUEUE_WAIT_TIME,
        start_script: MODEM_START_SCRIPT,
        stop_script: MODEM_STOP_SCRIPT,
        script_delay_ms: AT_SCRIPT_DELAY,
        receive_retries: RECEIVE_RETRY_MAX,
        receive_retry_delay_ms: RECEIVE_RETRY_DELAY,
        recv_timeout_ms: 5_000,
        send_timeout_ms: 5_000,
    };
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// MQTT session configuration
#[derive(Debug, Clone, Copy)]
pub struct MqttConfig {
    /// Broker host name
    pub endpoint: &'static str,
    /// Broker TLS port
    pub port: u16,
    /// Client identifier
    pub client_id: &'static str,
    /// Topic used when none is given
    pub default_topic: &'static str,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Process loop and connect timeout in milliseconds
    pub timeout_ms: u32,
    /// Bounded wait for the session lock in milliseconds
    pub lock_timeout_ms: u32,
    /// Socket receive timeout in milliseconds
    pub recv_timeout_ms: u32,
    /// Socket send timeout in milliseconds
    pub send_timeout_ms: u32,
}

impl MqttConfig {
    /// Default MQTT configuration
    pub const DEFAULT: Self = Self {
        endpoint: "a3kaq5feq0kj3v-ats.iot.us-east-1.amazonaws.com",
        port: 8883,
        client_id: "TestDevice-nRF9160DK",
        default_topic: "test",
        keep_alive_secs: 60,
        timeout_ms: 500,
        lock_timeout_ms: QUEUE_WAIT_TIME,
        recv_timeout_ms: 5_000,
        send_timeout_ms: 5_000,
    };

    /// Keep-alive timer period: half the keep-alive interval
    #[must_use]
    pub const fn keep_alive_period_ms(&self) -> u32 {
        self.keep_alive_secs as u32 * 500
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Blink demo configuration
#[derive(Debug, Clone, Copy)]
pub struct BlinkyConfig {
    /// Initial on/off period in milliseconds
    pub period_ms: u32,
    /// Shortest period accepted from the shell, exclusive
    pub min_period_ms: u32,
    /// Number of LEDs cycled
    pub num_leds: usize,
    /// Topic used when MQTT reporting is enabled
    pub topic: &'static str,
}

impl BlinkyConfig {
    /// Default blink configuration
    pub const DEFAULT: Self = Self {
        period_ms: 1_000,
        min_period_ms: 50,
        num_leds: 4,
        topic: "LED",
    };
}

impl Default for BlinkyConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_scan_is_tenth_of_timeout() {
        let c = WatchdogConfig::DEFAULT;
        assert_eq!(c.scan_period_ms * 10, c.task_timeout_ms);
    }

    #[test]
    fn test_keep_alive_period() {
        assert_eq!(MqttConfig::DEFAULT.keep_alive_period_ms(), 30_000);
    }

    #[test]
    fn test_modem_scripts_end_radio_states() {
        assert_eq!(MODEM_START_SCRIPT.last(), Some(&"AT+CFUN?"));
        assert_eq!(MODEM_STOP_SCRIPT, &["AT+CFUN=0"]);
    }
}
