// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Application bring-up
//!
//! Order matters: the heaps come first because the modem channel and the
//! MQTT session allocate from them, then the registry and the logger. The
//! registry and logger are const-built inside the [`SharedContext`], so
//! bring-up only has heap regions left to hand over.
//!
//! The application task then starts the modem and heartbeats. Task
//! creation belongs to the RTOS port:
//!
//! ```rust,ignore
//! let ctx = install(&CONTEXT, SharedContext::new(&KERNEL, SystemConfig::DEFAULT))?;
//! bring_up(ctx, &mut APP_HEAP.0, &mut MODEM_HEAP.0);
//!
//! let app = AppTask::start(ctx, &MODEM)?;
//! app.check(spawn("CLI", cli_main));
//! app.check(spawn("Blinky", blinky_main));
//! app.run()
//! ```

use cn_common::{log_error, log_info, log_print, Result};
use cn_kernel::HeapId;

use crate::context::SharedContext;
use crate::modem::ModemControl;

/// Hand the heap regions to the allocator
///
/// Failures are printed as `Error: 0x%04x` and do not stop the remaining
/// steps; the first one is returned.
///
/// # Errors
/// The first heap initialization error.
pub fn bring_up(ctx: &SharedContext<'_>, app_heap: &'static mut [u8], modem_heap: &'static mut [u8]) -> Result<()> {
    let mut first = Ok(());
    for (id, region) in [(HeapId::APP, app_heap), (HeapId::MODEM_TX, modem_heap)] {
        if let Err(e) = ctx.heaps.init(id, region) {
            log_print!(ctx.logger, "Error: 0x{:04x}\r\n", e.code());
            if first.is_ok() {
                first = Err(e);
            }
        }
    }
    first
}

/// Application task
pub struct AppTask<'a> {
    ctx: &'a SharedContext<'a>,
}

impl<'a> AppTask<'a> {
    /// Register with the watchdog and run the modem start script
    ///
    /// # Errors
    /// Registration errors. A failing modem start is logged only.
    pub fn start(ctx: &'a SharedContext<'a>, modem: &dyn ModemControl) -> Result<Self> {
        ctx.registry.configure(ctx.config.watchdog.task_timeout_ms)?;
        log_info!(ctx.logger, "Application task started");
        let task = Self { ctx };
        task.check(modem.start());
        Ok(task)
    }

    /// Log a failed initialization step as `Error: 0x%04x`
    pub fn check<T>(&self, result: Result<T>) -> Option<T> {
        result
            .map_err(|e| log_error!(self.ctx.logger, "Error: 0x{:04x}", e.code()))
            .ok()
    }

    /// Heartbeat, then sleep one kick period
    pub fn service_once(&self) {
        let _ = self.ctx.registry.update();
        self.ctx.kernel.delay_ms(self.ctx.config.watchdog.scan_period_ms);
    }

    /// Heartbeat forever
    pub fn run(&self) -> ! {
        loop {
            self.service_once();
        }
    }
}
