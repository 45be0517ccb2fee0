// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! MQTT session
//!
//! The wire protocol belongs to an external client library, reached through
//! the [`MqttClient`] trait. This module owns the session around it: the
//! broker socket, the network buffer, the subscription and the keep-alive
//! timer.
//!
//! # Session life cycle
//!
//! ```text
//! subscribe:   buffer (heap 0) -> TLS socket -> CONNECT -> SUBSCRIBE -> process -> timer on
//! unsubscribe: timer off -> UNSUBSCRIBE -> process -> DISCONNECT -> close socket -> wipe buffer
//! ```
//!
//! `send` publishes on the open session, or opens a temporary one around a
//! single publish when none is active.
//!
//! # Security
//!
//! - The network buffer is zeroized before it goes back to the heap
//! - Client credentials stay inside the client library and are never logged

use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};

use cn_common::config::MqttConfig;
use cn_common::constants::LONG_MSG_MAX;
use cn_common::{log_debug, log_error, log_info, log_print, types::truncated, Error, Result, ShortText};
use cn_hal::{SocketFd, Transport};
use cn_kernel::{BoundedGuard, BoundedMutex, HeapBuffer, HeapId, SoftTimer, TimerHandler};
use zeroize::Zeroize;

use crate::context::SharedContext;
use crate::modem::NetworkLink;

/// Topic name
pub type Topic = ShortText;

/// Packet handed back by the client's process loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttEvent<'e> {
    /// Incoming publish
    Publish {
        /// Topic name
        topic: &'e str,
        /// Payload bytes
        payload: &'e [u8],
    },
    /// Publish acknowledged
    PubAck {
        /// Packet identifier
        packet_id: u16,
    },
    /// Subscription answered
    SubAck {
        /// Whether the broker granted it
        granted: bool,
    },
    /// Unsubscribe acknowledged
    UnsubAck,
    /// Ping answered
    PingResp,
}

/// Transport context passed to every client call
pub struct Network<'n> {
    /// Socket layer
    pub link: &'n dyn NetworkLink,
    /// Broker socket
    pub fd: SocketFd,
    /// Packet buffer
    pub buffer: &'n mut [u8],
}

impl Network<'_> {
    /// Send on the broker socket
    ///
    /// # Errors
    /// Socket errors.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        self.link.send(self.fd, data)
    }

    /// Receive from the broker socket
    ///
    /// # Errors
    /// Socket errors, including [`Error::ModemWouldBlock`] once retries run out.
    pub fn recv(&self, buffer: &mut [u8]) -> Result<usize> {
        self.link.recv(self.fd, buffer)
    }
}

/// MQTT protocol client
pub trait MqttClient: Send {
    /// Send CONNECT and wait for CONNACK
    fn connect(&mut self, net: &mut Network<'_>, client_id: &str, keep_alive_secs: u16, timeout_ms: u32) -> Result<()>;

    /// Subscribe to `topic`
    fn subscribe(&mut self, net: &mut Network<'_>, topic: &str) -> Result<()>;

    /// Unsubscribe from `topic`
    fn unsubscribe(&mut self, net: &mut Network<'_>, topic: &str) -> Result<()>;

    /// Publish `payload` on `topic`
    fn publish(&mut self, net: &mut Network<'_>, topic: &str, payload: &[u8]) -> Result<()>;

    /// Send PINGREQ
    fn ping(&mut self, net: &mut Network<'_>) -> Result<()>;

    /// Receive and dispatch packets for up to `timeout_ms`
    fn process(
        &mut self,
        net: &mut Network<'_>,
        timeout_ms: u32,
        on_event: &mut dyn FnMut(MqttEvent<'_>),
    ) -> Result<()>;

    /// Send DISCONNECT
    fn disconnect(&mut self, net: &mut Network<'_>) -> Result<()>;
}

/// Session operations used by the shells and the blink task
pub trait MqttControl: Sync {
    /// Open the session and subscribe to `topic` (or the current topic)
    fn subscribe(&self, topic: Option<&str>) -> Result<()>;

    /// Close the session
    fn unsubscribe(&self) -> Result<()>;

    /// Publish `message` on `topic` (or the current topic)
    fn send(&self, topic: Option<&str>, message: &str) -> Result<()>;

    /// Print the session state
    fn status(&self) -> Result<()>;

    /// Whether a subscription is active
    fn is_subscribed(&self) -> bool;
}

/// Request for the messaging task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttRequest {
    /// Open the session
    Subscribe(Option<Topic>),
    /// Close the session
    Unsubscribe,
    /// Publish a message
    Send {
        /// Topic, or the current one
        topic: Option<Topic>,
        /// Message text
        message: ShortText,
    },
    /// Print the session state
    Status,
}

struct SessionState<'a, C> {
    client: C,
    socket: Option<SocketFd>,
    topic: Topic,
    seq: u32,
    buffer: Option<HeapBuffer<'a>>,
}

/// MQTT session over the modem's sockets
pub struct MqttSession<'a, C> {
    ctx: &'a SharedContext<'a>,
    link: &'a dyn NetworkLink,
    config: MqttConfig,
    keep_alive: SoftTimer,
    subscribed: AtomicBool,
    state: BoundedMutex<SessionState<'a, C>>,
}

impl<'a, C: MqttClient> MqttSession<'a, C> {
    /// Idle session using `client` on top of `link`
    pub fn new(ctx: &'a SharedContext<'a>, link: &'a dyn NetworkLink, client: C) -> Self {
        let config = ctx.config.mqtt;
        Self {
            ctx,
            link,
            config,
            keep_alive: SoftTimer::new("MQTT", config.keep_alive_period_ms(), true),
            subscribed: AtomicBool::new(false),
            state: BoundedMutex::new(SessionState {
                client,
                socket: None,
                topic: truncated(config.default_topic),
                seq: 0,
                buffer: None,
            }),
        }
    }

    /// Keep-alive timer, to be registered with the timer service
    pub fn keep_alive(&self) -> &SoftTimer {
        &self.keep_alive
    }

    /// Current topic
    pub fn topic(&self) -> Option<Topic> {
        self.state.try_lock().map(|s| s.topic.clone())
    }

    fn lock(&self) -> Result<BoundedGuard<'_, SessionState<'a, C>>> {
        self.state
            .lock_within(self.ctx.kernel, self.config.lock_timeout_ms)
            .ok_or(Error::MqttIllegalState)
    }

    fn open(&self, st: &mut SessionState<'a, C>) -> Result<()> {
        if st.buffer.is_none() {
            st.buffer = Some(
                self.ctx
                    .heaps
                    .alloc_buffer(HeapId::APP, LONG_MSG_MAX)
                    .ok_or(Error::MqttNoMemory)?,
            );
        }
        if self.is_subscribed() {
            return Ok(());
        }
        // a socket whose close failed earlier still holds a modem slot
        if let Some(stale) = st.socket.take() {
            if self.link.close(stale).is_err() {
                log_error!(self.ctx.logger, "Disconnect failure");
            }
        }

        let fd = self
            .link
            .open(Transport::Tls, self.config.endpoint, self.config.port)
            .map_err(|_| Error::MqttServerRefused)?;
        st.socket = Some(fd);

        let result = self.handshake(st, fd);
        match result {
            Ok(()) => self.subscribed.store(true, Ordering::Release),
            Err(_) => {
                let _ = self.link.close(fd);
                st.socket = None;
            }
        }
        result
    }

    fn handshake(&self, st: &mut SessionState<'a, C>, fd: SocketFd) -> Result<()> {
        let log = &self.ctx.logger;
        let SessionState {
            client,
            topic,
            buffer,
            ..
        } = st;
        let buffer = buffer.as_mut().ok_or(Error::MqttIllegalState)?;
        let mut net = Network {
            link: self.link,
            fd,
            buffer: buffer.as_mut_slice(),
        };

        client.connect(
            &mut net,
            self.config.client_id,
            self.config.keep_alive_secs,
            self.config.timeout_ms << 1,
        )?;
        log_debug!(log, "MQTT client: {}", self.config.client_id);
        log_info!(log, "MQTT connection established with {}.", self.config.endpoint);

        client.subscribe(&mut net, topic.as_str())?;
        log_info!(log, "Subscribed topic: {}", topic);
        let topic = &*topic;
        client.process(&mut net, self.config.timeout_ms, &mut |ev| self.on_event(topic, ev))
    }

    fn close(&self, st: &mut SessionState<'a, C>) -> Result<()> {
        let log = &self.ctx.logger;
        let mut result = Ok(());
        if self.is_subscribed() {
            if let Some(fd) = st.socket {
                result = self.teardown(st, fd);
                if let Err(e) = result {
                    log_error!(log, "MQTT transaction failed: {}", e);
                }
                // on failure the socket is kept and closed again by the next open
                match self.link.close(fd) {
                    Ok(()) => st.socket = None,
                    Err(_) => log_error!(log, "Disconnect failure"),
                }
            }
            self.subscribed.store(false, Ordering::Release);
        }
        if let Some(mut buffer) = st.buffer.take() {
            buffer.as_mut_slice().zeroize();
        }
        result
    }

    fn teardown(&self, st: &mut SessionState<'a, C>, fd: SocketFd) -> Result<()> {
        let log = &self.ctx.logger;
        let SessionState {
            client,
            topic,
            buffer,
            ..
        } = st;
        let buffer = buffer.as_mut().ok_or(Error::MqttIllegalState)?;
        let mut net = Network {
            link: self.link,
            fd,
            buffer: buffer.as_mut_slice(),
        };

        let unsubscribed = client.unsubscribe(&mut net, topic.as_str());
        log_info!(log, "Unsubscribed topic: {}", topic);
        unsubscribed?;
        let topic = &*topic;
        client.process(&mut net, self.config.timeout_ms, &mut |ev| self.on_event(topic, ev))?;
        client.disconnect(&mut net)?;
        log_info!(log, "Disconnect from {}.", self.config.endpoint);
        Ok(())
    }

    fn publish(&self, st: &mut SessionState<'a, C>, message: &str) -> Result<()> {
        let log = &self.ctx.logger;
        let fd = st.socket.ok_or(Error::MqttIllegalState)?;
        let mut payload = ShortText::new();
        // an over-long message is cut at the buffer size
        let _ = write!(payload, "\"{}: {}\"", message, st.seq);
        st.seq = st.seq.wrapping_add(1);

        let SessionState {
            client,
            topic,
            buffer,
            ..
        } = st;
        let buffer = buffer.as_mut().ok_or(Error::MqttIllegalState)?;
        let mut net = Network {
            link: self.link,
            fd,
            buffer: buffer.as_mut_slice(),
        };
        let published = client.publish(&mut net, topic.as_str(), payload.as_bytes());
        log_info!(log, "Publish message: {}", payload);
        published?;
        let topic = &*topic;
        client.process(&mut net, self.config.timeout_ms, &mut |ev| self.on_event(topic, ev))
    }

    fn on_event(&self, subscribed: &str, event: MqttEvent<'_>) {
        let log = &self.ctx.logger;
        match event {
            MqttEvent::Publish { topic, payload } => {
                if contains_ignore_case(topic, subscribed) {
                    log_info!(log, "Subscribed topic: {}", topic);
                    log_info!(log, "Data: {}", core::str::from_utf8(payload).unwrap_or("<binary>"));
                } else {
                    log_debug!(log, "Topic: {}", topic);
                }
            }
            MqttEvent::PubAck { packet_id } => {
                log_debug!(log, "PUBACK received for packet Id {}.", packet_id);
            }
            MqttEvent::SubAck { granted } => {
                if !granted {
                    log_error!(log, "SUBACK failure");
                }
            }
            MqttEvent::UnsubAck => log_debug!(log, "Unsubscribed from the topic {}.", subscribed),
            MqttEvent::PingResp => log_debug!(log, "PINGRESP received"),
        }
    }
}

impl<C: MqttClient> MqttControl for MqttSession<'_, C> {
    fn subscribe(&self, topic: Option<&str>) -> Result<()> {
        let mut st = self.lock()?;
        if let Some(t) = topic {
            st.topic = truncated(t);
        }
        let result = self.open(&mut st);
        match result {
            Ok(()) => {
                if !self.keep_alive.is_running() {
                    self.keep_alive.start(self.ctx.kernel)?;
                }
            }
            Err(e) => {
                log_error!(self.ctx.logger, "MQTT transaction failed: {}", e);
                let _ = self.close(&mut st);
            }
        }
        result
    }

    fn unsubscribe(&self) -> Result<()> {
        let mut st = self.lock()?;
        // stopping an idle timer is not an error here
        let _ = self.keep_alive.stop();
        self.close(&mut st)
    }

    fn send(&self, topic: Option<&str>, message: &str) -> Result<()> {
        let mut st = self.lock()?;
        if self.keep_alive.is_running() {
            self.keep_alive.reset(self.ctx.kernel)?;
        }
        if let Some(t) = topic {
            st.topic = truncated(t);
        }

        let temporary = st.buffer.is_none();
        let mut result = if temporary { self.open(&mut st) } else { Ok(()) };
        if result.is_ok() {
            result = self.publish(&mut st, message);
        }
        if temporary {
            let closed = self.close(&mut st);
            if result.is_ok() {
                result = closed;
            }
        }
        if let Err(e) = result {
            log_error!(self.ctx.logger, "MQTT transaction failed: {}", e);
        }
        result
    }

    fn status(&self) -> Result<()> {
        let log = &self.ctx.logger;
        if self.is_subscribed() {
            let topic = self.lock()?.topic.clone();
            log_print!(log, "MQTT is subscribed.\r\n");
            log_print!(log, "MQTT connection established with {}.\r\n", self.config.endpoint);
            log_print!(log, "Subscribed topic: {}\r\n", topic);
        } else {
            log_print!(log, "MQTT is not subscribed.\r\n");
        }
        Ok(())
    }

    fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }
}

impl<C: MqttClient> TimerHandler for MqttSession<'_, C> {
    fn on_expiry(&self, _timer: &SoftTimer) {
        if self.is_subscribed() {
            if let Some(mut st) = self.state.try_lock() {
                let SessionState {
                    client,
                    socket,
                    topic,
                    buffer,
                    ..
                } = &mut *st;
                if let (Some(fd), Some(buffer)) = (*socket, buffer.as_mut()) {
                    let mut net = Network {
                        link: self.link,
                        fd,
                        buffer: buffer.as_mut_slice(),
                    };
                    let topic = &*topic;
                    if client.ping(&mut net).is_ok() {
                        let _ = client.process(&mut net, self.config.timeout_ms, &mut |ev| {
                            self.on_event(topic, ev);
                        });
                    }
                }
            }
        }
        log_info!(self.ctx.logger, "MQTT Time out");
    }
}

/// Messaging task: serves [`MqttRequest`]s from the messaging queue
pub struct MqttTask<'a> {
    ctx: &'a SharedContext<'a>,
    session: &'a dyn MqttControl,
}

impl<'a> MqttTask<'a> {
    /// Register with the watchdog and announce the task
    ///
    /// # Errors
    /// Registration errors.
    pub fn start(ctx: &'a SharedContext<'a>, session: &'a dyn MqttControl) -> Result<Self> {
        ctx.registry.configure(ctx.config.watchdog.task_timeout_ms)?;
        log_info!(ctx.logger, "MQTT task started");
        Ok(Self { ctx, session })
    }

    /// One loop iteration; returns whether a request was served
    pub fn service_once(&self) -> bool {
        let _ = self.ctx.registry.update();
        let timeout = self.ctx.config.queues.receive_timeout_ms;
        let Some(request) = self.ctx.mqtt_queue.receive(self.ctx.kernel, timeout) else {
            return false;
        };
        // failures are logged by the session
        let _ = match request {
            MqttRequest::Subscribe(topic) => self.session.subscribe(topic.as_deref()),
            MqttRequest::Unsubscribe => self.session.unsubscribe(),
            MqttRequest::Send { topic, message } => self.session.send(topic.as_deref(), &message),
            MqttRequest::Status => self.session.status(),
        };
        true
    }

    /// Serve requests forever
    pub fn run(&self) -> ! {
        loop {
            self.service_once();
        }
    }
}

/// Case-insensitive substring test
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let (h, n) = (haystack.as_bytes(), needle.as_bytes());
    n.is_empty() || h.windows(n.len()).any(|w| w.eq_ignore_ascii_case(n))
}
