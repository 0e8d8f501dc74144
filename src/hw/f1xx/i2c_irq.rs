//! Interrupt driven master receiver for the fixed two byte sensor frame.
//!
//! RM0008 26.3.3, reception of exactly 2 bytes:
//! START -> SB: address -> ADDR: clear ADDR, ACK = 0 (POS set) -> BTF: STOP, read DR twice.

use stm32f1xx_hal::pac::I2C1;

use tsensor_relay::bus::{HwError, Reset, TwoWireMaster};
use tsensor_relay::config::SAMPLE_FRAME_LEN;
use tsensor_relay::handshake::Notifier;

use super::sr1_status;

#[derive(defmt::Format, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Start,
    Address,
    Data,
}

/// Timing registers as programmed by the HAL, restored after a software reset.
struct Timing {
    cr2: u32,
    ccr: u32,
    trise: u32,
}

pub struct I2cIrqMaster<PINS> {
    i2c: I2C1,
    _pins: PINS,
    notifier: Notifier<'static>,
    timing: Timing,

    state: State,
    address: u8,
    buf: [u8; SAMPLE_FRAME_LEN],
    remaining: usize,
}

impl<PINS> I2cIrqMaster<PINS> {
    /// `i2c` must already be configured and enabled (see `stm32f1xx_hal::i2c::I2c::release`).
    pub fn new(i2c: I2C1, pins: PINS, notifier: Notifier<'static>) -> Self {
        let timing = Timing {
            cr2: i2c.cr2.read().bits(),
            ccr: i2c.ccr.read().bits(),
            trise: i2c.trise.read().bits(),
        };

        i2c.cr2
            .modify(|_, w| w.itevten().clear_bit().iterren().clear_bit().itbufen().clear_bit());

        Self {
            i2c,
            _pins: pins,
            notifier,
            timing,
            state: State::Idle,
            address: 0,
            buf: [0; SAMPLE_FRAME_LEN],
            remaining: 0,
        }
    }

    /// I2C1_EV
    pub fn on_event(&mut self) {
        let sr1 = self.i2c.sr1.read();

        match self.state {
            State::Start if sr1.sb().bit_is_set() => {
                #[allow(unused_unsafe)]
                self.i2c
                    .dr
                    .write(|w| unsafe { w.dr().bits((self.address << 1) | 1) });
                self.state = State::Address;
            }
            State::Address if sr1.addr().bit_is_set() => {
                // ADDR is cleared by reading SR2, the second byte gets NACK
                let _ = self.i2c.sr2.read();
                self.i2c.cr1.modify(|_, w| w.ack().clear_bit());
                self.state = State::Data;
            }
            State::Data if sr1.btf().bit_is_set() => {
                self.i2c.cr1.modify(|_, w| w.stop().set_bit());
                for b in self.buf.iter_mut() {
                    *b = self.i2c.dr.read().dr().bits();
                    self.remaining -= 1;
                }
                self.finish();
                self.notifier.on_receive(self.remaining, &self.buf);
            }
            State::Data if sr1.rx_ne().bit_is_set() => { /* wait for BTF */ }
            state => {
                defmt::trace!("I2C1: unexpected event in {}, SR1=0x{:X}", state, sr1.bits());
                if sr1.addr().bit_is_set() {
                    let _ = self.i2c.sr2.read();
                }
                if state == State::Idle {
                    self.i2c.cr2.modify(|_, w| w.itevten().clear_bit());
                }
            }
        }
    }

    /// I2C1_ER
    pub fn on_error(&mut self) {
        let sr1 = self.i2c.sr1.read();
        let status = sr1_status(&sr1);

        self.i2c.sr1.modify(|_, w| {
            w.berr()
                .clear_bit()
                .arlo()
                .clear_bit()
                .af()
                .clear_bit()
                .ovr()
                .clear_bit()
                .timeout()
                .clear_bit()
        });

        if self.state == State::Idle {
            defmt::trace!("I2C1: error 0x{:X} while idle", status.bits());
            self.notifier.on_status(status);
            return;
        }

        if !sr1.arlo().bit_is_set() {
            self.i2c.cr1.modify(|_, w| w.stop().set_bit());
        }

        let received = SAMPLE_FRAME_LEN - self.remaining;
        self.finish();
        self.notifier.on_status(status);
        if received > 0 {
            self.notifier.on_receive(self.remaining, &self.buf[..received]);
        }
    }

    fn finish(&mut self) {
        self.i2c
            .cr2
            .modify(|_, w| w.itevten().clear_bit().iterren().clear_bit());
        self.i2c.cr1.modify(|_, w| w.pos().clear_bit());
        self.state = State::Idle;
    }
}

impl<PINS> TwoWireMaster for I2cIrqMaster<PINS> {
    type Error = HwError;

    fn start_receive(&mut self, address: u8) -> nb::Result<(), Self::Error> {
        if self.state != State::Idle || self.i2c.sr2.read().busy().bit_is_set() {
            return Err(nb::Error::WouldBlock);
        }

        self.address = address;
        self.buf = [0; SAMPLE_FRAME_LEN];
        self.remaining = SAMPLE_FRAME_LEN;
        self.state = State::Start;

        self.i2c
            .cr2
            .modify(|_, w| w.itevten().set_bit().iterren().set_bit());
        self.i2c
            .cr1
            .modify(|_, w| w.pos().set_bit().ack().set_bit().start().set_bit());

        Ok(())
    }

    fn abort(&mut self) {
        if self.state != State::Idle {
            defmt::debug!("I2C1: abort in {}", self.state);
            self.i2c.cr1.modify(|_, w| w.stop().set_bit());
            self.finish();
        }
    }
}

impl<PINS> Reset for I2cIrqMaster<PINS> {
    fn reset(&mut self) {
        self.i2c.cr1.write(|w| w.swrst().set_bit());
        self.i2c.cr1.reset();

        #[allow(unused_unsafe)]
        unsafe {
            self.i2c.cr2.write(|w| w.bits(self.timing.cr2));
            self.i2c.ccr.write(|w| w.bits(self.timing.ccr));
            self.i2c.trise.write(|w| w.bits(self.timing.trise));
        }
        self.i2c
            .cr2
            .modify(|_, w| w.itevten().clear_bit().iterren().clear_bit().itbufen().clear_bit());
        self.i2c.cr1.modify(|_, w| w.pe().set_bit());

        self.state = State::Idle;
        defmt::info!("I2C1: peripheral reset");
    }
}
