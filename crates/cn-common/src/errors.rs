// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Error types for the cellnode firmware
//!
//! Every module owns a fixed numeric band in the upper byte of the error
//! code; the lower byte selects the condition within the module. A code of
//! zero means "no error" and is never represented by an [`Error`] value.
//!
//! Within a band most modules share the same layout:
//!
//! | offset | condition        |
//! |--------|------------------|
//! | 0x00   | general          |
//! | 0x01   | already init     |
//! | 0x02   | init failed      |
//! | 0x03   | not init         |
//! | 0x04   | bad parameter    |
//! | 0x05   | event processing |
//!
//! The allocator, watchdog, UART, blink and application bands keep their
//! own historic ordering. Codes at offset 0x10 and above are conditions
//! added on top of the common layout.

use core::fmt;

/// Result type alias for firmware operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified firmware error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // OS / kernel primitives (0x03xx)
    // =========================================================================
    /// Unspecified kernel failure
    OsGeneral,
    /// Kernel object created twice
    OsAlreadyInit,
    /// Kernel object could not be created
    OsInit,
    /// Kernel object used before creation
    OsNotInit,
    /// Invalid argument to a kernel primitive
    OsBadParam,
    /// Bounded lock acquisition timed out
    LockTimeout,
    /// Queue stayed full for the whole send timeout
    QueueFull,

    // =========================================================================
    // Timer manager (0x05xx)
    // =========================================================================
    /// Unspecified timer failure
    TimerGeneral,
    /// Timer used before creation
    TimerNotInit,
    /// Timer created twice
    TimerAlreadyInit,
    /// Invalid timer period or handle
    TimerBadParam,
    /// Operation requires a stopped timer
    TimerRunning,
    /// Operation requires a running timer
    TimerStopped,
    /// No free slot in the timer service
    TimerTableFull,

    // =========================================================================
    // MQTT session (0x0Bxx)
    // =========================================================================
    /// Unspecified messaging failure
    MqttGeneral,
    /// Session created twice
    MqttAlreadyInit,
    /// Session could not be created
    MqttInit,
    /// Session used before creation
    MqttNotInit,
    /// Invalid topic or payload
    MqttBadParam,
    /// Incoming packet processing failed
    MqttEventProcessing,
    /// Session lock not obtained, or request invalid in the current state
    MqttIllegalState,
    /// Network buffer allocation failed
    MqttNoMemory,
    /// Broker socket could not be opened
    MqttServerRefused,
    /// Transport send or receive failed
    MqttTransport,

    // =========================================================================
    // Filesystem (0x0Cxx)
    // =========================================================================
    /// Unspecified filesystem failure
    FsGeneral,
    /// Filesystem mounted twice
    FsAlreadyInit,
    /// Filesystem mount failed
    FsInit,
    /// Filesystem used before mount
    FsNotInit,
    /// Invalid key or value
    FsBadParam,
    /// Request processing failed
    FsEventProcessing,
    /// Key not present in the store
    FsNotFound,

    // =========================================================================
    // Secondary modem shell (0x0Dxx)
    // =========================================================================
    /// Unspecified modem shell failure
    SlmGeneral,
    /// Modem shell created twice
    SlmAlreadyInit,
    /// Modem shell could not be created
    SlmInit,
    /// Modem shell used before creation
    SlmNotInit,
    /// Invalid sub-command argument
    SlmBadParam,
    /// Sub-command processing failed
    SlmEventProcessing,

    // =========================================================================
    // GPIO (0x11xx)
    // =========================================================================
    /// Unspecified GPIO failure
    GpioGeneral,
    /// Pin configured twice
    GpioAlreadyInit,
    /// Pin configuration failed
    GpioInit,
    /// Pin used before configuration
    GpioNotInit,
    /// Invalid pin number
    GpioBadParam,

    // =========================================================================
    // Command shell (0x12xx)
    // =========================================================================
    /// Unspecified shell failure
    CliGeneral,
    /// Shell created twice
    CliAlreadyInit,
    /// Shell could not be created
    CliInit,
    /// Shell used before creation
    CliNotInit,
    /// Invalid command argument
    CliBadParam,
    /// Command processing failed
    CliEventProcessing,
    /// Command not recognized
    CliNotSupported,
    /// Task name did not resolve to a registered task
    CliInvalidTask,

    // =========================================================================
    // Logger (0x13xx)
    // =========================================================================
    /// Unspecified logger failure
    LogGeneral,
    /// Logger created twice
    LogAlreadyInit,
    /// Logger could not be created
    LogInit,
    /// Logger used before creation
    LogNotInit,
    /// Invalid level or filter
    LogBadParam,
    /// Message processing failed
    LogEventProcessing,

    // =========================================================================
    // Cellular modem (0x14xx)
    // =========================================================================
    /// Unspecified modem failure
    ModemGeneral,
    /// Modem channel created twice
    ModemAlreadyInit,
    /// Modem library initialization failed
    ModemInit,
    /// Modem channel unavailable
    ModemNotInit,
    /// Invalid host, port or protocol
    ModemBadParam,
    /// Modem event processing failed
    ModemEventProcessing,
    /// Operation requires network registration
    ModemNotRegistered,
    /// All socket table entries are in use
    ModemSocketTableFull,
    /// Socket has no data yet
    ModemWouldBlock,

    // =========================================================================
    // Application (0x15xx)
    // =========================================================================
    /// Application bring-up failed
    AppInit,
    /// Application started twice
    AppAlreadyInit,
    /// Application used before bring-up
    AppNotInit,
    /// Missing resource handle
    AppNullPointer,
    /// Requested feature is not available
    AppNotSupported,
    /// Shutdown sequence failed
    AppShutdownFailed,
    /// Power-on self test failed
    AppSelfTestFailed,
    /// Not enough kernel resources to start a task
    AppNoResources,

    // =========================================================================
    // Dynamic memory manager (0x18xx)
    // =========================================================================
    /// Unspecified allocator failure
    DmmGeneral,
    /// Heap region rejected during initialization
    DmmInit,
    /// Heap used before initialization
    DmmNotInit,
    /// Heap initialized twice
    DmmAlreadyInit,
    /// Region too small to hold a single block header
    DmmNullPointer,
    /// Heap write failed
    DmmWrite,
    /// Heap read failed
    DmmRead,
    /// Pointer does not denote a live block of this heap
    DmmBadPointer,
    /// Heap index out of range
    DmmBadHeap,
    /// Region larger than the block links can address
    DmmRegionTooLarge,

    // =========================================================================
    // Task watchdog (0x1Dxx)
    // =========================================================================
    /// Unspecified watchdog failure
    WdogGeneral,
    /// Watchdog created twice
    WdogAlreadyInit,
    /// Watchdog used before creation
    WdogNotInit,
    /// Watchdog could not be created
    WdogInit,
    /// Task table is full
    WdogTooManyClients,
    /// Invalid timeout
    WdogBadParam,
    /// Calling task never registered
    WdogNotRegistered,

    // =========================================================================
    // UART (0x1Exx)
    // =========================================================================
    /// Unspecified UART failure
    UartGeneral,
    /// UART configuration failed
    UartInit,
    /// UART used before configuration
    UartNotInit,
    /// UART configured twice
    UartAlreadyInit,
    /// Missing buffer
    UartNullPointer,
    /// Transmit failed
    UartWrite,
    /// Receive failed
    UartRead,

    // =========================================================================
    // Blink demo (0x20xx)
    // =========================================================================
    /// Unspecified blink failure
    BlinkyGeneral,
    /// Blink task could not be created
    BlinkyInit,
    /// Blink task used before creation
    BlinkyNotInit,
    /// Blink task created twice
    BlinkyAlreadyInit,
}

impl Error {
    /// Get the numeric error code
    ///
    /// The upper byte is the module band, see [`Error::band`].
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            // OS (0x03xx)
            Self::OsGeneral => 0x0300,
            Self::OsAlreadyInit => 0x0301,
            Self::OsInit => 0x0302,
            Self::OsNotInit => 0x0303,
            Self::OsBadParam => 0x0304,
            Self::LockTimeout => 0x0310,
            Self::QueueFull => 0x0311,

            // Timer manager (0x05xx)
            Self::TimerGeneral => 0x0500,
            Self::TimerNotInit => 0x0501,
            Self::TimerAlreadyInit => 0x0502,
            Self::TimerBadParam => 0x0504,
            Self::TimerRunning => 0x0505,
            Self::TimerStopped => 0x0506,
            Self::TimerTableFull => 0x0510,

            // MQTT (0x0Bxx)
            Self::MqttGeneral => 0x0B00,
            Self::MqttAlreadyInit => 0x0B01,
            Self::MqttInit => 0x0B02,
            Self::MqttNotInit => 0x0B03,
            Self::MqttBadParam => 0x0B04,
            Self::MqttEventProcessing => 0x0B05,
            Self::MqttIllegalState => 0x0B10,
            Self::MqttNoMemory => 0x0B11,
            Self::MqttServerRefused => 0x0B12,
            Self::MqttTransport => 0x0B13,

            // Filesystem (0x0Cxx)
            Self::FsGeneral => 0x0C00,
            Self::FsAlreadyInit => 0x0C01,
            Self::FsInit => 0x0C02,
            Self::FsNotInit => 0x0C03,
            Self::FsBadParam => 0x0C04,
            Self::FsEventProcessing => 0x0C05,
            Self::FsNotFound => 0x0C10,

            // Modem shell (0x0Dxx)
            Self::SlmGeneral => 0x0D00,
            Self::SlmAlreadyInit => 0x0D01,
            Self::SlmInit => 0x0D02,
            Self::SlmNotInit => 0x0D03,
            Self::SlmBadParam => 0x0D04,
            Self::SlmEventProcessing => 0x0D05,

            // GPIO (0x11xx)
            Self::GpioGeneral => 0x1100,
            Self::GpioAlreadyInit => 0x1101,
            Self::GpioInit => 0x1102,
            Self::GpioNotInit => 0x1103,
            Self::GpioBadParam => 0x1104,

            // Shell (0x12xx)
            Self::CliGeneral => 0x1200,
            Self::CliAlreadyInit => 0x1201,
            Self::CliInit => 0x1202,
            Self::CliNotInit => 0x1203,
            Self::CliBadParam => 0x1204,
            Self::CliEventProcessing => 0x1205,
            Self::CliNotSupported => 0x1210,
            Self::CliInvalidTask => 0x1211,

            // Logger (0x13xx)
            Self::LogGeneral => 0x1300,
            Self::LogAlreadyInit => 0x1301,
            Self::LogInit => 0x1302,
            Self::LogNotInit => 0x1303,
            Self::LogBadParam => 0x1304,
            Self::LogEventProcessing => 0x1305,

            // Modem (0x14xx)
            Self::ModemGeneral => 0x1400,
            Self::ModemAlreadyInit => 0x1401,
            Self::ModemInit => 0x1402,
            Self::ModemNotInit => 0x1403,
            Self::ModemBadParam => 0x1404,
            Self::ModemEventProcessing => 0x1405,
            Self::ModemNotRegistered => 0x1410,
            Self::ModemSocketTableFull => 0x1411,
            Self::ModemWouldBlock => 0x1412,

            // Application (0x15xx)
            Self::AppInit => 0x1500,
            Self::AppAlreadyInit => 0x1501,
            Self::AppNotInit => 0x1502,
            Self::AppNullPointer => 0x1503,
            Self::AppNotSupported => 0x1504,
            Self::AppShutdownFailed => 0x1505,
            Self::AppSelfTestFailed => 0x1506,
            Self::AppNoResources => 0x1507,

            // Allocator (0x18xx)
            Self::DmmGeneral => 0x1800,
            Self::DmmInit => 0x1801,
            Self::DmmNotInit => 0x1802,
            Self::DmmAlreadyInit => 0x1803,
            Self::DmmNullPointer => 0x1804,
            Self::DmmWrite => 0x1805,
            Self::DmmRead => 0x1806,
            Self::DmmBadPointer => 0x1810,
            Self::DmmBadHeap => 0x1811,
            Self::DmmRegionTooLarge => 0x1812,

            // Watchdog (0x1Dxx)
            Self::WdogGeneral => 0x1D00,
            Self::WdogAlreadyInit => 0x1D01,
            Self::WdogNotInit => 0x1D02,
            Self::WdogInit => 0x1D03,
            Self::WdogTooManyClients => 0x1D04,
            Self::WdogBadParam => 0x1D05,
            Self::WdogNotRegistered => 0x1D10,

            // UART (0x1Exx)
            Self::UartGeneral => 0x1E00,
            Self::UartInit => 0x1E01,
            Self::UartNotInit => 0x1E02,
            Self::UartAlreadyInit => 0x1E03,
            Self::UartNullPointer => 0x1E04,
            Self::UartWrite => 0x1E05,
            Self::UartRead => 0x1E06,

            // Blink (0x20xx)
            Self::BlinkyGeneral => 0x2000,
            Self::BlinkyInit => 0x2001,
            Self::BlinkyNotInit => 0x2002,
            Self::BlinkyAlreadyInit => 0x2003,
        }
    }

    /// Module band of this error (upper byte of the code)
    #[must_use]
    pub const fn band(&self) -> u16 {
        self.code() & 0xFF00
    }

    /// Short name of the module owning this error
    #[must_use]
    pub const fn module(&self) -> &'static str {
        match self.band() {
            0x0300 => "os",
            0x0500 => "timer",
            0x0B00 => "mqtt",
            0x0C00 => "fs",
            0x0D00 => "slm",
            0x1100 => "gpio",
            0x1200 => "cli",
            0x1300 => "log",
            0x1400 => "modem",
            0x1500 => "app",
            0x1800 => "dmm",
            0x1D00 => "wdog",
            0x1E00 => "uart",
            0x2000 => "blinky",
            _ => "unknown",
        }
    }

    /// Get a human-readable description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::OsGeneral => "kernel failure",
            Self::OsAlreadyInit => "kernel object already created",
            Self::OsInit => "kernel object creation failed",
            Self::OsNotInit => "kernel object not created",
            Self::OsBadParam => "invalid kernel argument",
            Self::LockTimeout => "lock timeout",
            Self::QueueFull => "queue full",
            Self::TimerGeneral => "timer failure",
            Self::TimerNotInit => "timer not created",
            Self::TimerAlreadyInit => "timer already created",
            Self::TimerBadParam => "invalid timer argument",
            Self::TimerRunning => "timer running",
            Self::TimerStopped => "timer stopped",
            Self::TimerTableFull => "timer table full",
            Self::MqttGeneral => "mqtt failure",
            Self::MqttAlreadyInit => "mqtt already initialized",
            Self::MqttInit => "mqtt init failed",
            Self::MqttNotInit => "mqtt not initialized",
            Self::MqttBadParam => "invalid mqtt argument",
            Self::MqttEventProcessing => "mqtt event processing failed",
            Self::MqttIllegalState => "mqtt illegal state",
            Self::MqttNoMemory => "mqtt out of memory",
            Self::MqttServerRefused => "mqtt server refused",
            Self::MqttTransport => "mqtt transport failure",
            Self::FsGeneral => "filesystem failure",
            Self::FsAlreadyInit => "filesystem already mounted",
            Self::FsInit => "filesystem mount failed",
            Self::FsNotInit => "filesystem not mounted",
            Self::FsBadParam => "invalid filesystem argument",
            Self::FsEventProcessing => "filesystem request failed",
            Self::FsNotFound => "key not found",
            Self::SlmGeneral => "modem shell failure",
            Self::SlmAlreadyInit => "modem shell already initialized",
            Self::SlmInit => "modem shell init failed",
            Self::SlmNotInit => "modem shell not initialized",
            Self::SlmBadParam => "invalid modem shell argument",
            Self::SlmEventProcessing => "modem shell command failed",
            Self::GpioGeneral => "gpio failure",
            Self::GpioAlreadyInit => "gpio already configured",
            Self::GpioInit => "gpio configuration failed",
            Self::GpioNotInit => "gpio not configured",
            Self::GpioBadParam => "invalid gpio pin",
            Self::CliGeneral => "shell failure",
            Self::CliAlreadyInit => "shell already initialized",
            Self::CliInit => "shell init failed",
            Self::CliNotInit => "shell not initialized",
            Self::CliBadParam => "invalid command argument",
            Self::CliEventProcessing => "command failed",
            Self::CliNotSupported => "command not supported",
            Self::CliInvalidTask => "invalid task",
            Self::LogGeneral => "logger failure",
            Self::LogAlreadyInit => "logger already initialized",
            Self::LogInit => "logger init failed",
            Self::LogNotInit => "logger not initialized",
            Self::LogBadParam => "invalid log argument",
            Self::LogEventProcessing => "log message processing failed",
            Self::ModemGeneral => "modem failure",
            Self::ModemAlreadyInit => "modem already initialized",
            Self::ModemInit => "modem init failed",
            Self::ModemNotInit => "modem not initialized",
            Self::ModemBadParam => "invalid modem argument",
            Self::ModemEventProcessing => "modem event processing failed",
            Self::ModemNotRegistered => "modem not registered",
            Self::ModemSocketTableFull => "socket table full",
            Self::ModemWouldBlock => "socket would block",
            Self::AppInit => "application init failed",
            Self::AppAlreadyInit => "application already initialized",
            Self::AppNotInit => "application not initialized",
            Self::AppNullPointer => "missing resource",
            Self::AppNotSupported => "not supported",
            Self::AppShutdownFailed => "shutdown failed",
            Self::AppSelfTestFailed => "self test failed",
            Self::AppNoResources => "no resources",
            Self::DmmGeneral => "allocator failure",
            Self::DmmInit => "heap init failed",
            Self::DmmNotInit => "heap not initialized",
            Self::DmmAlreadyInit => "heap already initialized",
            Self::DmmNullPointer => "heap region too small",
            Self::DmmWrite => "heap write failed",
            Self::DmmRead => "heap read failed",
            Self::DmmBadPointer => "pointer not a live block",
            Self::DmmBadHeap => "invalid heap",
            Self::DmmRegionTooLarge => "heap region too large",
            Self::WdogGeneral => "watchdog failure",
            Self::WdogAlreadyInit => "watchdog already initialized",
            Self::WdogNotInit => "watchdog not initialized",
            Self::WdogInit => "watchdog init failed",
            Self::WdogTooManyClients => "too many watchdog clients",
            Self::WdogBadParam => "invalid watchdog timeout",
            Self::WdogNotRegistered => "task not registered",
            Self::UartGeneral => "uart failure",
            Self::UartInit => "uart configuration failed",
            Self::UartNotInit => "uart not configured",
            Self::UartAlreadyInit => "uart already configured",
            Self::UartNullPointer => "missing uart buffer",
            Self::UartWrite => "uart write failed",
            Self::UartRead => "uart read failed",
            Self::BlinkyGeneral => "blink failure",
            Self::BlinkyInit => "blink init failed",
            Self::BlinkyNotInit => "blink not initialized",
            Self::BlinkyAlreadyInit => "blink already initialized",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}
