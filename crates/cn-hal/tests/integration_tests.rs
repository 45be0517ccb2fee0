// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Integration tests for cn-hal
//!
//! Board selection, error conversion, trait usability through `dyn`, and the
//! simulation drivers as the application sees them.

mod board_tests {
    use cn_hal::{Board, MAX_LEDS, NUM_LEDS};

    #[test]
    fn test_default_board_is_devkit() {
        if cfg!(feature = "thingy91") {
            assert_eq!(Board::current(), Board::Thingy91);
        } else {
            assert_eq!(Board::current(), Board::Nrf9160Dk);
            assert_eq!(NUM_LEDS, 4);
        }
    }

    #[test]
    fn test_board_properties() {
        assert_eq!(Board::Nrf9160Dk.num_leds(), 4);
        assert_eq!(Board::Thingy91.num_leds(), 3);
        assert_eq!(Board::Nrf9160Dk.mqtt_client_id(), "TestDevice-nRF9160DK");
        assert_eq!(Board::Thingy91.mqtt_client_id(), "TestDevice-Thingy91");
        assert!(Board::Thingy91.num_leds() <= MAX_LEDS);
        assert_eq!(Board::current().console_baud(), 115_200);
    }
}

mod error_tests {
    use cn_common::Error;
    use cn_hal::HalError;

    #[test]
    fn test_display_format() {
        assert_eq!(HalError::WouldBlock.to_string(), "[0x08F5] operation would block");
    }

    #[test]
    fn test_question_mark_converts() {
        fn app_side() -> cn_common::Result<()> {
            Err(HalError::NoSockets)?;
            Ok(())
        }
        assert_eq!(app_side(), Err(Error::ModemSocketTableFull));
    }
}

mod trait_object_tests {
    //! The application holds drivers behind `dyn`; these must stay object safe.

    use cn_hal::sim::{SimModem, SimPin, SimUart};
    use cn_hal::{AtResponse, GpioPin, ModemInterface, SocketTimeouts, Transport, UartInterface};

    #[test]
    fn test_drivers_as_trait_objects() {
        let mut uart = SimUart::new();
        let mut pin = SimPin::new();
        let mut modem = SimModem::new();

        let u: &mut dyn UartInterface = &mut uart;
        u.write(b"ok").unwrap();
        let p: &mut dyn GpioPin = &mut pin;
        p.toggle().unwrap();
        let m: &mut dyn ModemInterface = &mut modem;
        m.init().unwrap();

        assert_eq!(uart.output(), b"ok");
        assert!(pin.is_high().unwrap());
        assert!(modem.is_initialized());
    }

    #[test]
    fn test_modem_start_sequence_registers() {
        let mut modem = SimModem::new();
        let mut resp = AtResponse::new();
        for cmd in cn_common::config::MODEM_START_SCRIPT {
            modem.at_command(cmd, &mut resp).unwrap();
        }
        assert!(modem.is_registered());
        assert_eq!(modem.commands().last(), Some("AT+CFUN?"));

        let fd = modem
            .connect(
                Transport::Tls,
                "broker.example",
                8883,
                SocketTimeouts { recv_ms: 5000, send_ms: 5000 },
            )
            .unwrap();
        let seen = modem.last_connect().unwrap();
        assert_eq!(seen.transport, Transport::Tls);
        assert_eq!(seen.host.as_str(), "broker.example");
        assert_eq!(modem.open_sockets(), &[fd]);
    }

    #[test]
    fn test_refused_connect() {
        let mut modem = SimModem::new();
        modem.set_registered(true);
        modem.set_refuse_connect(true);
        let r = modem.connect(
            Transport::Tcp,
            "host",
            1,
            SocketTimeouts { recv_ms: 1, send_ms: 1 },
        );
        assert_eq!(r, Err(cn_hal::HalError::ConnectionRefused));
        assert!(modem.open_sockets().is_empty());
    }
}
