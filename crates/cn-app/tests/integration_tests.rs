// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Integration tests for cn-app
//!
//! Tasks wired together over one `SharedContext` and driven step by step on
//! the deterministic `SimKernel`: console input goes in through a `SimUart`,
//! console output is whatever the log task wrote to its own `SimUart`.

/// Log task, modem channel, console input and command shell for `$k`
macro_rules! console {
    ($k:ident, $ctx:ident, $modem:ident, $input:ident, $log:ident, $cli:ident) => {
        let $k = SimKernel::new(NAMES);
        let $ctx = SharedContext::new(&$k, SystemConfig::DEFAULT);
        let $modem = ModemChannel::new(&$ctx, SimModem::new()).unwrap();
        let $input = BoundedMutex::new(SimUart::new());
        $k.switch_to($k.handle_of("Log").unwrap());
        let mut $log = LogTask::start(&$ctx, SimUart::new(), &NoClock).unwrap();
        $k.switch_to($k.handle_of("CLI").unwrap());
        #[allow(unused_mut)]
        let mut $cli = Cli::start(&$ctx, &$modem, &$input).unwrap();
        $log.drain().unwrap();
    };
}

mod shell_tests {
    use cn_app::{Cli, LogTask, ModemChannel, ModemControl, NoClock, SharedContext, SlmTask};
    use cn_common::log::FilterMode;
    use cn_common::{LogLevel, SystemConfig};
    use cn_hal::sim::{SimModem, SimUart};
    use cn_kernel::{BoundedMutex, SimKernel};

    static NAMES: &[&str] = &["Log", "CLI", "SLM"];

    fn typed(
        k: &SimKernel,
        cli: &mut Cli<'_, SimUart>,
        input: &BoundedMutex<SimUart>,
        log: &mut LogTask<'_, SimUart>,
        text: &str,
    ) {
        input.try_lock().unwrap().push_input(text.as_bytes());
        k.switch_to(k.handle_of("CLI").unwrap());
        for _ in 0..text.len() {
            assert!(cli.service_once());
            log.drain().unwrap();
        }
    }

    fn output<'u>(log: &'u LogTask<'_, SimUart>) -> &'u str {
        log.uart().output_str()
    }

    #[test]
    fn test_startup_banners_and_prompt() {
        console!(k, ctx, modem, input, log, cli);
        assert_eq!(
            output(&log),
            "[Log         ] <+0:00:00.000>: Log task started\r\n\
             [CLI         ] <+0:00:00.000>: CLI task started\r\n\
             nRF91 -> "
        );
    }

    #[test]
    fn test_get_level() {
        console!(k, ctx, modem, input, log, cli);
        typed(&k, &mut cli, &input, &mut log, "get-level\r");
        assert!(output(&log).ends_with("nRF91 -> get-level\r\nLog level: 2\r\nnRF91 -> "));
        assert_eq!(ctx.logger.level(), LogLevel::Info);
    }

    #[test]
    fn test_set_level() {
        console!(k, ctx, modem, input, log, cli);
        typed(&k, &mut cli, &input, &mut log, "set-level 9\r");
        assert!(output(&log).contains("No valid arguments"));
        typed(&k, &mut cli, &input, &mut log, "set-level 3\r");
        assert_eq!(ctx.logger.level(), LogLevel::Debug);
        typed(&k, &mut cli, &input, &mut log, "get-level\r");
        assert!(output(&log).contains("Received: get-level"));
        assert!(output(&log).ends_with("Log level: 3\r\nnRF91 -> "));
    }

    #[test]
    fn test_level_is_muted_while_typing() {
        console!(k, ctx, modem, input, log, cli);
        typed(&k, &mut cli, &input, &mut log, "get-");
        assert_eq!(ctx.logger.level(), LogLevel::None);
        typed(&k, &mut cli, &input, &mut log, "level\r");
        assert_eq!(ctx.logger.level(), LogLevel::Info);
    }

    #[test]
    fn test_set_led() {
        console!(k, ctx, modem, input, log, cli);
        typed(&k, &mut cli, &input, &mut log, "set-led fast 2\r");
        assert!(output(&log).contains("No valid arguments"));
        assert_eq!(ctx.blinky.period_ms(), 1_000);

        typed(&k, &mut cli, &input, &mut log, "set-led 200 2\r");
        assert_eq!(ctx.blinky.period_ms(), 200);
        assert_eq!(ctx.blinky.count(), 2);

        typed(&k, &mut cli, &input, &mut log, "set-led 20 9\r");
        assert_eq!(ctx.blinky.period_ms(), 200);
        assert_eq!(ctx.blinky.count(), 2);
    }

    #[test]
    fn test_unknown_command() {
        console!(k, ctx, modem, input, log, cli);
        typed(&k, &mut cli, &input, &mut log, "reboot now\r");
        assert!(output(&log).contains("Error: Not Supported!"));
    }

    #[test]
    fn test_help_lists_commands() {
        console!(k, ctx, modem, input, log, cli);
        typed(&k, &mut cli, &input, &mut log, "help\r");
        // the log queue holds ten entries and nothing drains it mid-command
        assert!(output(&log).contains(" * help\r\n\tPrint list of commands\r\n"));
        assert!(output(&log).contains(" * set-led\r\n"));
    }

    #[test]
    fn test_show_hide_and_clear_tasks() {
        console!(k, ctx, modem, input, log, cli);
        let cli_handle = k.handle_of("CLI").unwrap();

        typed(&k, &mut cli, &input, &mut log, "show-tasks CLI\r");
        assert_eq!(log.filter().mode(), FilterMode::Show);
        assert_eq!(log.filter().tasks(), &[cli_handle]);

        typed(&k, &mut cli, &input, &mut log, "hide-tasks Nobody\r");
        assert!(output(&log).contains("Invalid task: Nobody\r\n"));
        assert_eq!(log.filter().mode(), FilterMode::Show);

        typed(&k, &mut cli, &input, &mut log, "hide-tasks Log\r");
        assert_eq!(log.filter().mode(), FilterMode::Hide);

        typed(&k, &mut cli, &input, &mut log, "clear-tasks\r");
        assert_eq!(log.filter().mode(), FilterMode::All);
        assert!(log.filter().tasks().is_empty());
    }

    #[test]
    fn test_task_list_is_capped() {
        console!(k, ctx, modem, input, log, cli);
        typed(&k, &mut cli, &input, &mut log, "show-tasks Log CLI Log CLI\r");
        assert!(output(&log).contains("No valid arguments"));
        assert_eq!(log.filter().mode(), FilterMode::All);
    }

    #[test]
    fn test_raw_at_command() {
        console!(k, ctx, modem, input, log, cli);
        modem
            .with_driver(|d| d.set_reply("AT+CGMR", "mfw_nrf9160_1.3.4"))
            .unwrap();
        typed(&k, &mut cli, &input, &mut log, "at+cgmr\r");
        assert!(!output(&log).contains("Error: Not Supported!"));
        typed(&k, &mut cli, &input, &mut log, "AT+CGMR\r");
        assert!(output(&log).contains("Modem command: AT+CGMR"));
        assert!(output(&log).contains("Modem response: mfw_nrf9160_1.3.4"));
    }

    #[test]
    fn test_get_status_starts_with_task_report() {
        console!(k, ctx, modem, input, log, cli);
        typed(&k, &mut cli, &input, &mut log, "get-status\r");
        assert!(output(&log).contains("Task report:\r\n"));
    }

    #[test]
    fn test_modem_command_hands_console_over() {
        console!(k, ctx, modem, input, log, cli);
        k.switch_to(k.handle_of("SLM").unwrap());
        let mut slm = SlmTask::start(&ctx, &modem, &input).unwrap();
        log.drain().unwrap();

        typed(&k, &mut cli, &input, &mut log, "modem status\r");
        assert!(!ctx.cli_active());
        assert!(!output(&log).ends_with("nRF91 -> "));

        k.switch_to(k.handle_of("SLM").unwrap());
        assert!(slm.service_once());
        assert!(ctx.cli_active());
        log.drain().unwrap();
        assert!(output(&log).contains("Modem state: unregistered\r\n"));

        k.switch_to(k.handle_of("CLI").unwrap());
        assert!(!cli.service_once());
        log.drain().unwrap();
        assert!(output(&log).ends_with("nRF91 -> "));
    }

    #[test]
    fn test_interactive_modem_shell() {
        console!(k, ctx, modem, input, log, cli);
        k.switch_to(k.handle_of("SLM").unwrap());
        let mut slm = SlmTask::start(&ctx, &modem, &input).unwrap();

        typed(&k, &mut cli, &input, &mut log, "modem\r");
        assert!(!ctx.cli_active());

        input.try_lock().unwrap().push_input(b"start\rexit\r");
        k.switch_to(k.handle_of("SLM").unwrap());
        assert!(slm.service_once());
        assert!(ctx.cli_active());
        assert!(modem.is_registered());
    }
}

mod messaging_tests {
    use cn_app::mqtt::{MqttEvent, Network};
    use cn_app::{
        MqttClient, MqttControl, MqttSession, MqttTask, ModemChannel, ModemControl, SharedContext, SlmRequest,
        SlmTask,
    };
    use cn_common::types::truncated;
    use cn_common::{Result, SystemConfig};
    use cn_hal::sim::{SimModem, SimUart};
    use cn_hal::Transport;
    use cn_kernel::{BoundedMutex, HeapId, HeapRegion, SimKernel, TimerService};

    static NAMES: &[&str] = &["SLM", "MQTT", "Timer"];

    /// Client that accepts everything and counts pings
    #[derive(Default)]
    struct NullClient {
        pings: u32,
    }

    impl MqttClient for NullClient {
        fn connect(&mut self, _net: &mut Network<'_>, _id: &str, _keep_alive: u16, _timeout: u32) -> Result<()> {
            Ok(())
        }

        fn subscribe(&mut self, _net: &mut Network<'_>, _topic: &str) -> Result<()> {
            Ok(())
        }

        fn unsubscribe(&mut self, _net: &mut Network<'_>, _topic: &str) -> Result<()> {
            Ok(())
        }

        fn publish(&mut self, net: &mut Network<'_>, _topic: &str, payload: &[u8]) -> Result<()> {
            net.send(payload).map(|_| ())
        }

        fn ping(&mut self, _net: &mut Network<'_>) -> Result<()> {
            self.pings += 1;
            Ok(())
        }

        fn process(
            &mut self,
            _net: &mut Network<'_>,
            _timeout_ms: u32,
            _on_event: &mut dyn FnMut(MqttEvent<'_>),
        ) -> Result<()> {
            Ok(())
        }

        fn disconnect(&mut self, _net: &mut Network<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn context(k: &SimKernel) -> SharedContext<'_> {
        let ctx = SharedContext::new(k, SystemConfig::DEFAULT);
        let app = &mut Box::leak(Box::new(HeapRegion::<8192>::new())).0;
        let tx = &mut Box::leak(Box::new(HeapRegion::<0x1A00>::new())).0;
        cn_app::bring_up(&ctx, app, tx).unwrap();
        ctx
    }

    #[test]
    fn test_modem_shell_to_broker() {
        let k = SimKernel::new(NAMES);
        let ctx = context(&k);
        let modem = ModemChannel::new(&ctx, SimModem::new()).unwrap();
        modem.start().unwrap();
        let session = MqttSession::new(&ctx, &modem, NullClient::default());
        let input = BoundedMutex::new(SimUart::new());

        k.switch_to(k.handle_of("SLM").unwrap());
        let mut slm = SlmTask::start(&ctx, &modem, &input).unwrap();
        k.switch_to(k.handle_of("MQTT").unwrap());
        let mqtt = MqttTask::start(&ctx, &session).unwrap();

        ctx.slm_queue
            .send(&k, SlmRequest { line: Some(truncated("mqtt subscribe LED")) }, 10)
            .unwrap();
        assert!(slm.service_once());
        assert!(mqtt.service_once());
        assert!(session.is_subscribed());

        let connect = modem
            .with_driver(|d| d.last_connect().map(|c| (c.transport, c.host.clone(), c.port)))
            .unwrap()
            .unwrap();
        assert_eq!(connect.0, Transport::Tls);
        assert_eq!(connect.1.as_str(), ctx.config.mqtt.endpoint);
        assert_eq!(connect.2, 8883);

        ctx.slm_queue
            .send(&k, SlmRequest { line: Some(truncated("mqtt send hi")) }, 10)
            .unwrap();
        assert!(slm.service_once());
        assert!(mqtt.service_once());
        assert_eq!(modem.with_driver(|d| d.sent().to_vec()).unwrap(), b"\"hi: 0\"");

        ctx.slm_queue
            .send(&k, SlmRequest { line: Some(truncated("mqtt unsubscribe")) }, 10)
            .unwrap();
        assert!(slm.service_once());
        assert!(mqtt.service_once());
        assert!(!session.is_subscribed());
        assert!(modem.sockets().unwrap().is_empty());
        assert_eq!(ctx.heaps.stats(HeapId::APP).unwrap().used, 0);
    }

    #[test]
    fn test_keep_alive_through_timer_service() {
        let k = SimKernel::new(NAMES);
        let ctx = context(&k);
        let modem = ModemChannel::new(&ctx, SimModem::new()).unwrap();
        modem.start().unwrap();
        let session = MqttSession::new(&ctx, &modem, NullClient::default());

        let mut timers = TimerService::new(&k, 10);
        timers.register(session.keep_alive(), &session).unwrap();
        assert_eq!(timers.poll_once(), 0);

        session.subscribe(None).unwrap();
        k.advance_ms(ctx.config.mqtt.keep_alive_period_ms() - 1);
        assert_eq!(timers.poll_once(), 0);
        k.advance_ms(1);
        assert_eq!(timers.poll_once(), 1);

        session.unsubscribe().unwrap();
        k.advance_ms(ctx.config.mqtt.keep_alive_period_ms());
        assert_eq!(timers.poll_once(), 0);
    }
}

mod fs_tests {
    use cn_app::{FsTask, KeyValueStore, MemStore, SharedContext};
    use cn_common::SystemConfig;
    use cn_kernel::SimKernel;

    static NAMES: &[&str] = &["FS"];

    #[test]
    fn test_boot_count_survives_restart() {
        let k = SimKernel::new(NAMES);
        let ctx = SharedContext::new(&k, SystemConfig::DEFAULT);

        let store = FsTask::start(&ctx, MemStore::<4>::new()).unwrap().into_store();
        k.advance_ms(500);
        let mut store = FsTask::start(&ctx, store).unwrap().into_store();

        assert_eq!(store.load("boot_count"), Ok(Some(2)));
        assert_eq!(store.load("time"), Ok(Some(500)));
    }
}

mod bring_up_tests {
    use cn_app::{install, AppTask, ModemChannel, SharedContext};
    use cn_common::{Error, SystemConfig};
    use cn_hal::sim::SimModem;
    use cn_kernel::{HeapId, HeapRegion, SimKernel};
    use static_cell::StaticCell;

    static NAMES: &[&str] = &["App"];
    static KERNEL: SimKernel = SimKernel::new(NAMES);
    static CONTEXT: StaticCell<SharedContext<'static>> = StaticCell::new();

    #[test]
    fn test_context_installs_once() {
        let ctx = install(&CONTEXT, SharedContext::new(&KERNEL, SystemConfig::DEFAULT)).unwrap();
        let app = Box::leak(Box::new(HeapRegion::<8192>::new()));
        let tx = Box::leak(Box::new(HeapRegion::<0x1A00>::new()));
        cn_app::bring_up(ctx, &mut app.0, &mut tx.0).unwrap();
        assert!(ctx.heaps.stats(HeapId::MODEM_TX).is_some());

        let second = install(&CONTEXT, SharedContext::new(&KERNEL, SystemConfig::DEFAULT));
        assert_eq!(second.err(), Some(Error::AppAlreadyInit));

        let modem = ModemChannel::new(ctx, SimModem::new()).unwrap();
        let app = AppTask::start(ctx, &modem).unwrap();
        app.service_once();
        assert!(ctx.registry.record(KERNEL.handle_of("App").unwrap()).is_some());
    }
}
