// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Filesystem task
//!
//! Persistent counters behind a [`KeyValueStore`]. The embedded filesystem
//! and its block device live outside this crate; [`MemStore`] is the RAM
//! disk used when no flash store is attached.

use cn_common::{log_error, log_info, types::truncated, Error, Result};
use heapless::{String, Vec};

use crate::context::SharedContext;

/// Key of a stored value
pub type Key = String<32>;

/// Boot counter
pub const BOOT_COUNT: &str = "boot_count";

/// Accumulated uptime in ticks
pub const TIME: &str = "time";

/// Persistent u32 store
pub trait KeyValueStore: Send {
    /// Value stored under `key`, if any
    ///
    /// # Errors
    /// Backend read errors.
    fn load(&mut self, key: &str) -> Result<Option<u32>>;

    /// Store `value` under `key`
    ///
    /// # Errors
    /// Backend write errors, [`Error::FsGeneral`] when full.
    fn store(&mut self, key: &str, value: u32) -> Result<()>;
}

/// RAM-backed store with room for `N` keys
#[derive(Debug, Default)]
pub struct MemStore<const N: usize> {
    entries: Vec<(Key, u32), N>,
}

impl<const N: usize> MemStore<N> {
    /// Empty store
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<const N: usize> KeyValueStore for MemStore<N> {
    fn load(&mut self, key: &str) -> Result<Option<u32>> {
        Ok(self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v))
    }

    fn store(&mut self, key: &str, value: u32) -> Result<()> {
        if key.is_empty() || key.len() > 32 {
            return Err(Error::FsBadParam);
        }
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
            return Ok(());
        }
        self.entries
            .push((truncated(key), value))
            .map_err(|_| Error::FsGeneral)
    }
}

/// Request for the filesystem task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsRequest {
    /// Write a value
    Store {
        /// Key
        key: Key,
        /// Value
        value: u32,
    },
    /// Read a value and log it
    Load {
        /// Key
        key: Key,
    },
}

/// Filesystem task
pub struct FsTask<'a, S> {
    ctx: &'a SharedContext<'a>,
    store: S,
}

impl<'a, S: KeyValueStore> FsTask<'a, S> {
    /// Register with the watchdog and update the boot counters
    ///
    /// # Errors
    /// Registration or store errors.
    pub fn start(ctx: &'a SharedContext<'a>, store: S) -> Result<Self> {
        ctx.registry.configure(ctx.config.watchdog.task_timeout_ms)?;
        log_info!(ctx.logger, "File system task started");
        let mut task = Self { ctx, store };
        task.update_counters()?;
        Ok(task)
    }

    fn update_counters(&mut self) -> Result<()> {
        let log = &self.ctx.logger;
        let kernel = self.ctx.kernel;

        let boots = self.store.load(BOOT_COUNT)?.unwrap_or(0);
        log_info!(log, "boot_count initialized: {}", boots);
        let boots = boots.wrapping_add(1);
        self.store.store(BOOT_COUNT, boots)?;
        log_info!(log, "boot_count written: {}", boots);

        let time = self.store.load(TIME)?.unwrap_or(0);
        log_info!(log, "time initialized: {}, {} (ms)", time, kernel.ticks_to_ms(time));
        let time = time.wrapping_add(kernel.ticks().as_u32());
        self.store.store(TIME, time)?;
        log_info!(log, "time written: {}, {} (ms)", time, kernel.ticks_to_ms(time));
        Ok(())
    }

    /// Serve one request
    ///
    /// # Errors
    /// [`Error::FsNotFound`] for a missing key, store errors otherwise.
    pub fn handle(&mut self, request: &FsRequest) -> Result<()> {
        let log = &self.ctx.logger;
        match request {
            FsRequest::Store { key, value } => {
                self.store.store(key, *value)?;
                log_info!(log, "{} written: {}", key, value);
            }
            FsRequest::Load { key } => {
                let value = self.store.load(key)?.ok_or(Error::FsNotFound)?;
                log_info!(log, "{} read: {}", key, value);
            }
        }
        Ok(())
    }

    /// One loop iteration; returns whether a request was served
    pub fn service_once(&mut self) -> bool {
        let _ = self.ctx.registry.update();
        let timeout = self.ctx.config.queues.receive_timeout_ms;
        let Some(request) = self.ctx.fs_queue.receive(self.ctx.kernel, timeout) else {
            return false;
        };
        if let Err(e) = self.handle(&request) {
            log_error!(self.ctx.logger, "Error: {}", e);
        }
        true
    }

    /// Backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stop the task and hand back the store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Serve requests forever
    pub fn run(mut self) -> ! {
        loop {
            self.service_once();
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use cn_common::{LogMessage, SystemConfig};
    use cn_kernel::SimKernel;
    use std::string::String;
    use std::vec::Vec;

    static NAMES: &[&str] = &["FS"];

    fn logged(ctx: &SharedContext<'_>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(msg) = ctx.logger.queue().try_receive() {
            if let LogMessage::Leveled { text, .. } = msg {
                lines.push(String::from(text.as_str()));
            }
        }
        lines
    }

    #[test]
    fn test_mem_store() {
        let mut s = MemStore::<2>::new();
        assert_eq!(s.load("a"), Ok(None));
        s.store("a", 1).unwrap();
        s.store("a", 2).unwrap();
        s.store("b", 3).unwrap();
        assert_eq!(s.load("a"), Ok(Some(2)));
        assert_eq!(s.store("c", 4), Err(Error::FsGeneral));
        assert_eq!(s.store("", 4), Err(Error::FsBadParam));
    }

    #[test]
    fn test_start_updates_counters() {
        let k = SimKernel::new(NAMES);
        let ctx = SharedContext::new(&k, SystemConfig::DEFAULT);
        let mut store = MemStore::<4>::new();
        store.store(BOOT_COUNT, 6).unwrap();
        store.store(TIME, 1_000).unwrap();
        k.set_ticks(250);

        let mut task = FsTask::start(&ctx, store).unwrap();
        assert_eq!(task.store.load(BOOT_COUNT), Ok(Some(7)));
        assert_eq!(task.store.load(TIME), Ok(Some(1_250)));
        assert_eq!(
            logged(&ctx),
            [
                "File system task started",
                "boot_count initialized: 6",
                "boot_count written: 7",
                "time initialized: 1000, 1000 (ms)",
                "time written: 1250, 1250 (ms)",
            ]
        );
    }

    #[test]
    fn test_first_boot_starts_from_zero() {
        let k = SimKernel::new(NAMES);
        let ctx = SharedContext::new(&k, SystemConfig::DEFAULT);
        let mut task = FsTask::start(&ctx, MemStore::<4>::new()).unwrap();
        assert_eq!(task.store.load(BOOT_COUNT), Ok(Some(1)));
    }

    #[test]
    fn test_requests() {
        let k = SimKernel::new(NAMES);
        let ctx = SharedContext::new(&k, SystemConfig::DEFAULT);
        let mut task = FsTask::start(&ctx, MemStore::<4>::new()).unwrap();
        logged(&ctx);

        let key: Key = truncated("volume");
        task.handle(&FsRequest::Store { key: key.clone(), value: 11 }).unwrap();
        task.handle(&FsRequest::Load { key }).unwrap();
        assert_eq!(
            task.handle(&FsRequest::Load { key: truncated("missing") }),
            Err(Error::FsNotFound)
        );
        assert_eq!(logged(&ctx), ["volume written: 11", "volume read: 11"]);
    }

    #[test]
    fn test_service_logs_failures() {
        let k = SimKernel::new(NAMES);
        let ctx = SharedContext::new(&k, SystemConfig::DEFAULT);
        let mut task = FsTask::start(&ctx, MemStore::<4>::new()).unwrap();
        logged(&ctx);

        ctx.fs_queue
            .send(&k, FsRequest::Load { key: truncated("missing") }, 10)
            .unwrap();
        assert!(task.service_once());
        assert_eq!(logged(&ctx).len(), 1);
        assert!(!task.service_once());
    }
}
