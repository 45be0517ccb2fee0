// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Modem channel
//!
//! One [`ModemChannel`] serializes every use of the cellular modem: AT
//! commands from the shells, the start and stop scripts, and the socket
//! traffic of the messaging session. The driver and the open-socket table
//! live together behind a single bounded lock.
//!
//! The channel is exposed to the rest of the application through three
//! traits so tasks do not carry the driver type:
//!
//! - [`ModemControl`]: command channel, scripts and status (shells, blink task)
//! - [`NetworkLink`]: socket open, close, send and receive (messaging session)
//! - [`NetworkClock`]: network time of day (log task)

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use cn_common::config::ModemConfig;
use cn_common::constants::ADDRESS_TABLE_ENTRY_CNT;
use cn_common::time::{WallClock, MS_PER_DAY};
use cn_common::{log_debug, log_print, types::truncated, Error, Result};
use cn_hal::{AtResponse, HalError, ModemInterface, SocketFd, SocketTimeouts, Transport};
use cn_kernel::{BoundedGuard, BoundedMutex, HeapId};
use heapless::{String, Vec};

use crate::context::SharedContext;
use crate::logger::NetworkClock;

/// Host name kept in the socket table
pub type HostName = String<64>;

/// Socket traffic towards a remote server
pub trait NetworkLink: Sync {
    /// Open a socket and connect it to `host:port`
    fn open(&self, transport: Transport, host: &str, port: u16) -> Result<SocketFd>;

    /// Close a socket
    fn close(&self, fd: SocketFd) -> Result<()>;

    /// Send `data`, returning the number of bytes accepted
    fn send(&self, fd: SocketFd, data: &[u8]) -> Result<usize>;

    /// Receive into `buffer`, returning the number of bytes read
    fn recv(&self, fd: SocketFd, buffer: &mut [u8]) -> Result<usize>;
}

/// Command side of the modem
pub trait ModemControl: NetworkLink + NetworkClock {
    /// Run one AT command and return its reply
    fn at_command(&self, command: &str) -> Result<AtResponse>;

    /// Run the start-up script
    fn start(&self) -> Result<()>;

    /// Run the shut-down script
    fn stop(&self) -> Result<()>;

    /// Whether the modem is attached to the network
    fn is_registered(&self) -> bool;

    /// Print version, identity, network time, registration and open sockets
    fn status(&self) -> Result<()>;
}

/// One entry of the open-socket table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSocket {
    /// Socket descriptor
    pub fd: SocketFd,
    /// Remote host it is connected to
    pub host: HostName,
}

struct ModemState<M> {
    driver: M,
    sockets: Vec<OpenSocket, ADDRESS_TABLE_ENTRY_CNT>,
}

/// Lock-protected modem driver plus socket table
pub struct ModemChannel<'a, M> {
    ctx: &'a SharedContext<'a>,
    config: ModemConfig,
    state: BoundedMutex<ModemState<M>>,
    offset_ms: AtomicU32,
    offset_valid: AtomicBool,
}

impl<'a, M: ModemInterface + Send> ModemChannel<'a, M> {
    /// Wrap `driver`; the driver is initialized here
    ///
    /// # Errors
    /// [`Error::ModemInit`] if the driver fails to come up.
    pub fn new(ctx: &'a SharedContext<'a>, mut driver: M) -> Result<Self> {
        driver.init().map_err(|_| Error::ModemInit)?;
        Ok(Self {
            ctx,
            config: ctx.config.modem,
            state: BoundedMutex::new(ModemState {
                driver,
                sockets: Vec::new(),
            }),
            offset_ms: AtomicU32::new(0),
            offset_valid: AtomicBool::new(false),
        })
    }

    /// Snapshot of the open-socket table
    ///
    /// # Errors
    /// [`Error::ModemNotInit`] if the channel lock was not obtained.
    pub fn sockets(&self) -> Result<Vec<OpenSocket, ADDRESS_TABLE_ENTRY_CNT>> {
        Ok(self.lock()?.sockets.clone())
    }

    /// Query `AT+CCLK?` and cache the offset between network time and uptime
    ///
    /// The query goes straight to the driver without logging, since the
    /// log task itself asks for the time.
    ///
    /// # Errors
    /// - [`Error::ModemNotInit`] if the channel lock was not obtained
    /// - [`Error::ModemNotRegistered`] if the modem is not attached
    /// - [`Error::ModemEventProcessing`] if the reply has no time in it
    pub fn network_time(&self) -> Result<WallClock> {
        let mut state = self.lock()?;
        if !state.driver.is_registered() {
            return Err(Error::ModemNotRegistered);
        }
        let uptime = self.ctx.kernel.uptime_ms();
        let mut reply = AtResponse::new();
        state.driver.at_command("AT+CCLK?", &mut reply)?;
        drop(state);

        let wall = parse_clock(&reply).ok_or(Error::ModemEventProcessing)?;
        let offset = (wall.as_ms() + MS_PER_DAY - uptime % MS_PER_DAY) % MS_PER_DAY;
        self.offset_ms.store(offset, Ordering::Release);
        self.offset_valid.store(true, Ordering::Release);
        Ok(wall)
    }

    /// Access the driver directly (tests and board bring-up)
    ///
    /// # Errors
    /// [`Error::ModemNotInit`] if the channel lock was not obtained.
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut M) -> R) -> Result<R> {
        let mut state = self.lock()?;
        Ok(f(&mut state.driver))
    }

    fn run_script(&self, script: &[&str]) -> Result<()> {
        for (i, cmd) in script.iter().enumerate() {
            if i > 0 {
                self.ctx.kernel.delay_ms(self.config.script_delay_ms);
            }
            // a failing line does not stop the script
            let _ = self.at_command(cmd);
        }
        Ok(())
    }

    fn lock(&self) -> Result<BoundedGuard<'_, ModemState<M>>> {
        self.state
            .lock_within(self.ctx.kernel, self.config.lock_timeout_ms)
            .ok_or(Error::ModemNotInit)
    }
}

impl<M: ModemInterface + Send> NetworkLink for ModemChannel<'_, M> {
    fn open(&self, transport: Transport, host: &str, port: u16) -> Result<SocketFd> {
        let timeouts = SocketTimeouts {
            recv_ms: self.config.recv_timeout_ms,
            send_ms: self.config.send_timeout_ms,
        };
        let mut state = self.lock()?;
        if state.sockets.is_full() {
            return Err(Error::ModemSocketTableFull);
        }
        let fd = state.driver.connect(transport, host, port, timeouts)?;
        let entry = OpenSocket {
            fd,
            host: truncated(host),
        };
        // room was checked above
        let _ = state.sockets.push(entry);
        Ok(fd)
    }

    fn close(&self, fd: SocketFd) -> Result<()> {
        let mut state = self.lock()?;
        state.driver.disconnect(fd)?;
        state.sockets.retain(|s| s.fd != fd);
        Ok(())
    }

    fn send(&self, fd: SocketFd, data: &[u8]) -> Result<usize> {
        let mut staged = self
            .ctx
            .heaps
            .alloc_buffer(HeapId::MODEM_TX, data.len())
            .ok_or(Error::ModemGeneral)?;
        staged.as_mut_slice().copy_from_slice(data);
        let mut state = self.lock()?;
        Ok(state.driver.send(fd, staged.as_slice())?)
    }

    fn recv(&self, fd: SocketFd, buffer: &mut [u8]) -> Result<usize> {
        let mut attempt = 0;
        loop {
            let result = self.lock()?.driver.receive(fd, buffer);
            match result {
                Err(HalError::WouldBlock) if attempt < self.config.receive_retries => {
                    attempt += 1;
                    self.ctx.kernel.delay_ms(self.config.receive_retry_delay_ms);
                }
                other => return Ok(other?),
            }
        }
    }
}

impl<M: ModemInterface + Send> NetworkClock for ModemChannel<'_, M> {
    fn wall_offset_ms(&self) -> Option<u32> {
        if !self.is_registered() {
            return None;
        }
        if !self.offset_valid.load(Ordering::Acquire) {
            self.network_time().ok()?;
        }
        Some(self.offset_ms.load(Ordering::Acquire))
    }
}

impl<M: ModemInterface + Send> ModemControl for ModemChannel<'_, M> {
    fn at_command(&self, command: &str) -> Result<AtResponse> {
        let log = &self.ctx.logger;
        let mut reply = AtResponse::new();
        let result = self.lock()?.driver.at_command(command, &mut reply);
        log_debug!(log, "-> {}", command);
        log_debug!(log, "<- {}", reply);
        result?;
        Ok(reply)
    }

    fn start(&self) -> Result<()> {
        self.run_script(self.config.start_script)
    }

    fn stop(&self) -> Result<()> {
        self.run_script(self.config.stop_script)?;
        self.offset_valid.store(false, Ordering::Release);
        Ok(())
    }

    fn is_registered(&self) -> bool {
        self.lock().is_ok_and(|mut s| s.driver.is_registered())
    }

    fn status(&self) -> Result<()> {
        let log = &self.ctx.logger;
        let version = self.at_command("AT+CGMR")?;
        log_print!(log, "Version: {}\r\n", first_line(&version));
        let imei = self.at_command("AT+CGSN")?;
        log_print!(log, "IMEI: {}\r\n", first_line(&imei));

        let registered = self.is_registered();
        if registered {
            if let Ok(now) = self.network_time() {
                log_print!(log, "Network Time: {}\r\n", now);
            }
        }
        log_print!(
            log,
            "Modem state: {}\r\n",
            if registered { "registered" } else { "unregistered" }
        );
        if registered {
            log_print!(log, "Open sockets:\r\n");
            for s in &self.sockets()? {
                log_print!(log, "\tSocket: {}\tServer: {}\r\n", s.fd, s.host);
            }
        }
        Ok(())
    }
}

/// Time of day in a `+CCLK: "yy/MM/dd,hh:mm:ss+zz"` reply
#[must_use]
pub fn parse_clock(reply: &str) -> Option<WallClock> {
    let (_, time) = reply.split_once(',')?;
    WallClock::parse_hms(time)
}

fn first_line(reply: &str) -> &str {
    reply.lines().next().unwrap_or("").trim()
}
