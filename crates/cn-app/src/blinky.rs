// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Blink demo
//!
//! Walks the board LEDs one at a time. With MQTT enabled and the modem
//! registered, the first step subscribes to the LED topic and every later
//! step publishes `LED: <index>` on it.

use core::fmt::Write;

use cn_common::{log_debug, log_info, Result, ShortText};
use cn_hal::GpioPin;

use crate::context::SharedContext;
use crate::modem::ModemControl;
use crate::mqtt::MqttControl;

/// Blink task
pub struct Blinky<'a, P> {
    ctx: &'a SharedContext<'a>,
    leds: &'a mut [P],
    modem: &'a dyn ModemControl,
    mqtt: &'a dyn MqttControl,
    index: usize,
    subscribed: bool,
}

impl<'a, P: GpioPin> Blinky<'a, P> {
    /// Register with the watchdog and announce the task
    ///
    /// # Errors
    /// Registration errors.
    pub fn start(
        ctx: &'a SharedContext<'a>,
        leds: &'a mut [P],
        modem: &'a dyn ModemControl,
        mqtt: &'a dyn MqttControl,
    ) -> Result<Self> {
        ctx.registry.configure(ctx.config.watchdog.task_timeout_ms)?;
        log_info!(ctx.logger, "Blinky task started");
        Ok(Self {
            ctx,
            leds,
            modem,
            mqtt,
            index: 0,
            subscribed: false,
        })
    }

    /// LED lit by the next step
    pub fn index(&self) -> usize {
        self.index
    }

    /// Light the current LED for one period, dark for one period, move on
    ///
    /// # Errors
    /// GPIO errors.
    pub fn step(&mut self) -> Result<()> {
        let ctx = self.ctx;
        let _ = ctx.registry.update();
        log_debug!(ctx.logger, "LED #{}", self.index);

        if self.modem.is_registered() {
            self.publish();
        }

        let period = ctx.blinky.period_ms();
        if let Some(led) = self.leds.get_mut(self.index) {
            led.toggle()?;
            ctx.kernel.delay_ms(period);
            led.toggle()?;
            ctx.kernel.delay_ms(period);
        }

        let count = ctx.blinky.count().min(self.leds.len()).max(1);
        self.index = (self.index + 1) % count;
        Ok(())
    }

    fn publish(&mut self) {
        let topic = self.ctx.config.blinky.topic;
        if self.ctx.blinky.mqtt_enabled() {
            if self.subscribed {
                let mut msg = ShortText::new();
                let _ = write!(msg, "LED: {}", self.index);
                // failures are logged by the session
                let _ = self.mqtt.send(Some(topic), &msg);
            } else {
                self.subscribed = self.mqtt.subscribe(Some(topic)).is_ok();
            }
        } else if self.subscribed {
            let _ = self.mqtt.unsubscribe();
            self.subscribed = false;
        }
    }

    /// Blink forever
    pub fn run(mut self) -> ! {
        loop {
            // a pin error skips one step
            let _ = self.step();
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::modem::ModemChannel;
    use cn_common::{Error, SystemConfig};
    use cn_hal::sim::{SimModem, SimPin};
    use cn_kernel::{Kernel, SimKernel};
    use std::string::String;
    use std::sync::Mutex;
    use std::vec::Vec;
    use std::format;

    static NAMES: &[&str] = &["Blinky"];

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl MqttControl for Recorder {
        fn subscribe(&self, topic: Option<&str>) -> Result<()> {
            self.calls.lock().unwrap().push(format!("subscribe {}", topic.unwrap_or("")));
            Ok(())
        }

        fn unsubscribe(&self) -> Result<()> {
            self.calls.lock().unwrap().push(String::from("unsubscribe"));
            Ok(())
        }

        fn send(&self, topic: Option<&str>, message: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("send {} {}", topic.unwrap_or(""), message));
            Ok(())
        }

        fn status(&self) -> Result<()> {
            Err(Error::AppNotSupported)
        }

        fn is_subscribed(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_walks_leds_with_period() {
        let k = SimKernel::new(NAMES);
        let ctx = SharedContext::new(&k, SystemConfig::DEFAULT);
        let modem = ModemChannel::new(&ctx, SimModem::new()).unwrap();
        let mqtt = Recorder::default();
        let mut leds = [SimPin::new(), SimPin::new(), SimPin::new(), SimPin::new()];
        ctx.blinky.set_count(2);

        {
            let mut blinky = Blinky::start(&ctx, &mut leds, &modem, &mqtt).unwrap();
            for _ in 0..3 {
                blinky.step().unwrap();
            }
            assert_eq!(blinky.index(), 1);
        }
        assert_eq!(k.ticks().as_u32(), 6 * 1_000);
        assert_eq!(leds[0].edges(), 4);
        assert_eq!(leds[1].edges(), 2);
        assert_eq!(leds[2].edges(), 0);
        assert!(!leds[0].is_high().unwrap());
        assert!(mqtt.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_mqtt_subscribe_publish_unsubscribe() {
        let k = SimKernel::new(NAMES);
        let ctx = SharedContext::new(&k, SystemConfig::DEFAULT);
        let modem = ModemChannel::new(&ctx, SimModem::new()).unwrap();
        modem.with_driver(|d| d.set_registered(true)).unwrap();
        let mqtt = Recorder::default();
        let mut leds = [SimPin::new(), SimPin::new()];
        ctx.blinky.set_period(100);
        ctx.blinky.set_mqtt_enabled(true);

        let mut blinky = Blinky::start(&ctx, &mut leds, &modem, &mqtt).unwrap();
        blinky.step().unwrap();
        blinky.step().unwrap();
        ctx.blinky.set_mqtt_enabled(false);
        blinky.step().unwrap();
        blinky.step().unwrap();

        assert_eq!(
            *mqtt.calls.lock().unwrap(),
            ["subscribe LED", "send LED LED: 1", "unsubscribe"]
        );
    }
}
