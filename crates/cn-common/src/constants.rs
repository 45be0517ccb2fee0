// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! System-wide constants for the cellnode firmware
//!
//! Sizes are chosen for the nRF9160 (256 KiB RAM shared by all tasks and
//! the modem).

// =============================================================================
// Message classes
// =============================================================================

/// Short message payload (commands, topics, AT responses)
pub const SHORT_MSG_MAX: usize = 128;

/// Medium message payload (log lines)
pub const MEDIUM_MSG_MAX: usize = 256;

/// Long message payload (network buffers)
pub const LONG_MSG_MAX: usize = 1024;

// =============================================================================
// Queues
// =============================================================================

/// Default bounded wait for queue and lock operations, in milliseconds
pub const QUEUE_WAIT_TIME: u32 = 100;

/// Depth of every request queue
pub const QUEUE_LEN: usize = 5;

/// Depth of the log queue
pub const QUEUE_LEN_LONG: usize = 10;

// =============================================================================
// Tasks
// =============================================================================

/// Capacity of the task health table
pub const MAX_TASKS: usize = 16;

/// Maximum entries in the log task filter
pub const LOG_MAX_LIST: usize = 3;

/// Width of the task name column in log lines
pub const TASK_NAME_WIDTH: usize = 12;

// =============================================================================
// Watchdog
// =============================================================================

/// Reference task timeout in milliseconds
pub const TWDT_TIMEOUT: u32 = 30_000;

/// Heartbeat period derived from the reference timeout
pub const TWDT_KICK_TIME: u32 = TWDT_TIMEOUT / 10;

// =============================================================================
// Heaps
// =============================================================================

/// Number of independent heaps
pub const NHEAPS: usize = 4;

/// Allocation granularity in bytes
pub const HEAP_ALIGNMENT: usize = 4;

/// Size of the general application heap
pub const APP_HEAP_SIZE: usize = 8192;

/// Size of the modem transmit shared-memory heap
pub const MODEM_TX_HEAP_SIZE: usize = 0x1A00;

// =============================================================================
// Modem
// =============================================================================

/// Open socket table entries
pub const ADDRESS_TABLE_ENTRY_CNT: usize = 5;

/// Maximum would-block retries on receive
pub const RECEIVE_RETRY_MAX: u32 = 20;

/// Pause between receive retries in milliseconds
pub const RECEIVE_RETRY_DELAY: u32 = 500;

/// Pause between scripted AT commands in milliseconds
pub const AT_SCRIPT_DELAY: u32 = 100;

// =============================================================================
// Shell
// =============================================================================

/// Idle poll period of the shells in milliseconds
pub const CLI_WAIT_TIME: u32 = 50;

/// Maximum tokens in one command line
pub const CLI_MAX_TOKENS: usize = 8;
