// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Inter-task queues
//!
//! Each consumer task owns exactly one bounded FIFO. Producers send with a
//! bounded wait; the consumer receives with a timeout that doubles as its
//! service-loop quantum, so "no message" is the normal idle outcome.
//!
//! Items are moved by value and must have a fixed size, so no
//! dynamic-length payload ever crosses a queue.
//!
//! A send that cannot find room before its deadline is counted. The drop
//! counter is what `get-status` reports for each queue.

use core::sync::atomic::{AtomicU32, Ordering};

use cn_common::time::Deadline;
use cn_common::{Error, Result};
use heapless::Deque;

use crate::port::Kernel;
use crate::sync::BoundedMutex;

/// Bounded multi-producer FIFO with timeouts and drop accounting
pub struct Queue<T, const N: usize> {
    name: &'static str,
    items: BoundedMutex<Deque<T, N>>,
    dropped: AtomicU32,
}

impl<T, const N: usize> Queue<T, N> {
    /// Create an empty queue
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            items: BoundedMutex::new(Deque::new()),
            dropped: AtomicU32::new(0),
        }
    }

    /// Queue name, used in status output
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Capacity in items
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Append `item`, waiting up to `timeout_ms` for room
    ///
    /// # Errors
    /// Returns [`Error::QueueFull`] if the queue had no room before the
    /// deadline; the item is dropped and counted.
    pub fn send(&self, kernel: &dyn Kernel, item: T, timeout_ms: u32) -> Result<()> {
        let deadline = Deadline::new(kernel.ticks(), kernel.ms_to_ticks(timeout_ms));
        let mut item = item;
        loop {
            if let Some(mut q) = self.items.try_lock() {
                match q.push_back(item) {
                    Ok(()) => return Ok(()),
                    Err(back) => item = back,
                }
            }
            if deadline.is_expired(kernel.ticks()) {
                self.dropped.fetch_add(1, Ordering::AcqRel);
                return Err(Error::QueueFull);
            }
            kernel.yield_now();
        }
    }

    /// Take the oldest item, waiting up to `timeout_ms` for one to arrive
    pub fn receive(&self, kernel: &dyn Kernel, timeout_ms: u32) -> Option<T> {
        let deadline = Deadline::new(kernel.ticks(), kernel.ms_to_ticks(timeout_ms));
        loop {
            if let Some(item) = self.try_receive() {
                return Some(item);
            }
            if deadline.is_expired(kernel.ticks()) {
                return None;
            }
            kernel.yield_now();
        }
    }

    /// Take the oldest item if one is queued
    pub fn try_receive(&self) -> Option<T> {
        self.items.try_lock().and_then(|mut q| q.pop_front())
    }

    /// Number of queued items (0 if the queue is momentarily locked)
    pub fn len(&self) -> usize {
        self.items.try_lock().map_or(0, |q| q.len())
    }

    /// Whether no item is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items lost to full-queue sends since start
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Acquire)
    }
}
