// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Cellnode kernel services
//!
//! The pieces every firmware task leans on, layered over a small RTOS port:
//!
//! - **Port**: the [`Kernel`] trait (ticks, task identity, delays) and a
//!   deterministic [`SimKernel`] for host tests
//! - **Sync**: [`BoundedMutex`], a binary lock with bounded acquisition
//! - **Queue**: per-consumer bounded FIFOs with drop accounting
//! - **Heap**: best-fit allocator over independent arenas
//! - **Registry / Watchdog**: task heartbeats and stall detection
//! - **Timer**: software timers and the timer-service loop
//!
//! # Usage
//!
//! ```rust,ignore
//! use cn_kernel::{HeapId, HeapRegion, HeapSet, TaskRegistry};
//!
//! static mut APP_HEAP: HeapRegion<8192> = HeapRegion::new();
//!
//! let heaps = HeapSet::new(&kernel, 100);
//! heaps.init(HeapId::APP, unsafe { &mut APP_HEAP.0 })?;
//! let registry = TaskRegistry::new(&kernel, 100);
//! registry.configure(30_000)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod heap;
pub mod port;
pub mod queue;
pub mod registry;
pub mod sim;
pub mod sync;
pub mod timer;
pub mod watchdog;

pub use heap::{HeapBuffer, HeapId, HeapRegion, HeapSet, HeapStats, SystemHeap};
pub use port::Kernel;
pub use queue::Queue;
pub use registry::{TaskRecord, TaskRegistry};
pub use sim::SimKernel;
pub use sync::{BoundedGuard, BoundedMutex};
pub use timer::{SoftTimer, TimerHandler, TimerService};
pub use watchdog::Watchdog;

/// Kernel services version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
