// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Time utilities
//!
//! The kernel tick counter is 32 bits wide and wraps. All elapsed-time
//! arithmetic uses wrapping subtraction so a single wrap between two samples
//! is handled transparently.

use core::fmt;
use core::ops::Add;

/// Kernel tick count (wrapping)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ticks(u32);

impl Ticks {
    /// Create from raw tick count
    #[must_use]
    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Raw tick count
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Ticks elapsed from `self` to `now`
    #[must_use]
    pub const fn elapsed(&self, now: Self) -> u32 {
        now.0.wrapping_sub(self.0)
    }

    /// Check if `duration` ticks have passed since this timestamp
    #[must_use]
    pub const fn has_elapsed(&self, now: Self, duration: u32) -> bool {
        self.elapsed(now) >= duration
    }
}

impl From<u32> for Ticks {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Ticks> for u32 {
    fn from(value: Ticks) -> Self {
        value.0
    }
}

impl Add<u32> for Ticks {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

/// Tick rate for converting between ticks and milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRate {
    hz: u32,
}

impl TickRate {
    /// Create from frequency in Hz
    #[must_use]
    pub const fn from_hz(hz: u32) -> Self {
        Self { hz }
    }

    /// 1 kHz (1 tick = 1 millisecond)
    pub const KHZ_1: Self = Self { hz: 1_000 };

    /// Ticks per second
    #[must_use]
    pub const fn hz(&self) -> u32 {
        self.hz
    }

    /// Convert ticks to milliseconds
    #[must_use]
    pub const fn ticks_to_ms(&self, ticks: u32) -> u32 {
        if self.hz == 0 {
            return 0;
        }
        ((ticks as u64 * 1_000) / self.hz as u64) as u32
    }

    /// Convert milliseconds to ticks
    #[must_use]
    pub const fn ms_to_ticks(&self, ms: u32) -> u32 {
        ((ms as u64 * self.hz as u64) / 1_000) as u32
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self::KHZ_1
    }
}

/// Simple deadline tracker
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Ticks,
    timeout: u32,
}

impl Deadline {
    /// Create a deadline `timeout_ticks` after `start`
    #[must_use]
    pub const fn new(start: Ticks, timeout_ticks: u32) -> Self {
        Self {
            start,
            timeout: timeout_ticks,
        }
    }

    /// Check if the deadline has expired
    #[must_use]
    pub const fn is_expired(&self, now: Ticks) -> bool {
        self.start.elapsed(now) >= self.timeout
    }

    /// Remaining ticks until the deadline (0 if expired)
    #[must_use]
    pub const fn remaining(&self, now: Ticks) -> u32 {
        let elapsed = self.start.elapsed(now);
        if elapsed >= self.timeout {
            0
        } else {
            self.timeout - elapsed
        }
    }
}

/// Uptime stamp rendered as `+H:MM:SS.mmm`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uptime(pub u32);

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0;
        write!(
            f,
            "+{}:{:02}:{:02}.{:03}",
            ms / 3_600_000,
            (ms / 60_000) % 60,
            (ms / 1_000) % 60,
            ms % 1_000
        )
    }
}

/// Milliseconds in one day
pub const MS_PER_DAY: u32 = 86_400_000;

/// Wall-clock time of day rendered as `HH:MM:SS:mmm`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock(pub u32);

impl WallClock {
    /// Time of day from milliseconds since midnight, hours wrapped at 24
    #[must_use]
    pub const fn from_ms(ms: u32) -> Self {
        Self(ms % MS_PER_DAY)
    }

    /// Parse `hh:mm:ss` at the start of `s`
    #[must_use]
    pub fn parse_hms(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let hr: u32 = parts.next()?.trim().parse().ok()?;
        let min: u32 = parts.next()?.trim().parse().ok()?;
        let rest = parts.next()?;
        let sec_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let sec: u32 = rest.get(..sec_len)?.parse().ok()?;
        if hr > 23 || min > 59 || sec > 59 {
            return None;
        }
        Some(Self(1_000 * (60 * (60 * hr + min) + sec)))
    }

    /// Milliseconds since midnight
    #[must_use]
    pub const fn as_ms(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0;
        write!(
            f,
            "{:02}:{:02}:{:02}:{:03}",
            (ms / 3_600_000) % 24,
            (ms / 60_000) % 60,
            (ms / 1_000) % 60,
            ms % 1_000
        )
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::ToString;

    #[test]
    fn test_elapsed_across_wrap() {
        let before = Ticks::new(u32::MAX - 4);
        let after = before + 10;
        assert_eq!(after.as_u32(), 5);
        assert_eq!(before.elapsed(after), 10);
    }

    #[test]
    fn test_deadline_remaining() {
        let d = Deadline::new(Ticks::new(100), 50);
        assert_eq!(d.remaining(Ticks::new(120)), 30);
        assert!(!d.is_expired(Ticks::new(149)));
        assert!(d.is_expired(Ticks::new(150)));
        assert_eq!(d.remaining(Ticks::new(200)), 0);
    }

    #[test]
    fn test_tick_rate_conversion() {
        let rate = TickRate::from_hz(100);
        assert_eq!(rate.ms_to_ticks(1000), 100);
        assert_eq!(rate.ticks_to_ms(25), 250);
        assert_eq!(TickRate::from_hz(0).ticks_to_ms(10), 0);
    }

    #[test]
    fn test_uptime_format() {
        assert_eq!(Uptime(0).to_string(), "+0:00:00.000");
        assert_eq!(Uptime(3_723_004).to_string(), "+1:02:03.004");
        assert_eq!(Uptime(36_000_000).to_string(), "+10:00:00.000");
    }

    #[test]
    fn test_wall_clock_parse_and_format() {
        let t = WallClock::parse_hms("13:45:07+04").unwrap();
        assert_eq!(t.as_ms(), 1000 * (13 * 3600 + 45 * 60 + 7));
        assert_eq!(t.to_string(), "13:45:07:000");
        assert_eq!(WallClock::from_ms(t.as_ms() + 11 * 3_600_000 + 5).to_string(), "00:45:07:005");
        assert!(WallClock::parse_hms("xx:00:00").is_none());
        assert!(WallClock::parse_hms("25:00:00").is_none());
    }
}
