#![no_main]
#![no_std]

mod hw;

use defmt_rtt as _; // global logger
use panic_probe as _;

use rtic::app;

use embedded_hal::serial::{Read, Write};

use stm32f1xx_hal::afio::AfioExt;
use stm32f1xx_hal::flash::FlashExt;
use stm32f1xx_hal::gpio::{
    Alternate, Floating, GpioExt, Input, OpenDrain, PushPull, PA10, PA9, PB6, PB7,
};
use stm32f1xx_hal::i2c::{I2c, Mode};
use stm32f1xx_hal::pac::USART1;
use stm32f1xx_hal::rcc::RccExt;
use stm32f1xx_hal::serial::{Config, Event, Serial};
use stm32f1xx_hal::time::{Hertz, U32Ext};

use tsensor_relay::acquisition::Duration;
use tsensor_relay::bus::{HwError, Reset, TwoWireMaster};
use tsensor_relay::display;
use tsensor_relay::{config, Acquisition, AcquisitionError, Feed, Handshake, InboundBuffer, SerialRelay};

//-----------------------------------------------------------------------------

static HANDSHAKE: Handshake = Handshake::new();

type SensorBus = hw::I2cIrqMaster<(PB6<Alternate<OpenDrain>>, PB7<Alternate<OpenDrain>>)>;
type Uart = Serial<USART1, (PA9<Alternate<PushPull>>, PA10<Input<Floating>>)>;

//-----------------------------------------------------------------------------

/// Runs the bus driver calls from `idle` under the I2C interrupt ceiling.
struct SharedBus<M>(M);

impl<M: rtic::Mutex<T = SensorBus>> TwoWireMaster for SharedBus<M> {
    type Error = HwError;

    fn start_receive(&mut self, address: u8) -> nb::Result<(), Self::Error> {
        self.0.lock(|bus| bus.start_receive(address))
    }

    fn abort(&mut self) {
        self.0.lock(|bus| bus.abort())
    }
}

impl<M: rtic::Mutex<T = SensorBus>> Reset for SharedBus<M> {
    fn reset(&mut self) {
        self.0.lock(|bus| bus.reset())
    }
}

//-----------------------------------------------------------------------------

#[app(device = stm32f1xx_hal::pac, peripherals = true)]
mod app {
    use systick_monotonic::*;

    use super::*;

    #[shared]
    struct Shared {
        i2c: SensorBus,
        uart: Uart,
        relay: SerialRelay,
    }

    #[local]
    struct Local {
        acquisition: Acquisition<'static>,
        segments: hw::SegmentPort,
        inbound: InboundBuffer<{ config::INBOUND_BUFFER_SIZE }>,
    }

    #[monotonic(binds = SysTick, default = true)]
    type MonoTimer = Systick<{ config::SYSTICK_RATE_HZ }>;

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::info!("Init...");

        let mut flash = ctx.device.FLASH.constrain();
        let rcc = ctx.device.RCC.constrain();

        let mut gpioa = ctx.device.GPIOA.split();
        let mut gpiob = ctx.device.GPIOB.split();

        let mut afio = ctx.device.AFIO.constrain();
        let (_pa15, pb3, pb4) = afio.mapr.disable_jtag(gpioa.pa15, gpiob.pb3, gpiob.pb4);

        let clocks = rcc
            .cfgr
            .use_hse(Hertz::Hz(config::XTAL_FREQ))
            .sysclk(Hertz::Hz(config::SYSCLK_FREQ))
            .pclk1(Hertz::Hz(config::PCLK1_FREQ))
            .freeze(&mut flash.acr);
        defmt::info!("Clocks: {}", defmt::Debug2Format(&clocks));

        //---------------------------------------------------------------------

        let mut uart = Serial::new(
            ctx.device.USART1,
            (
                gpioa.pa9.into_alternate_push_pull(&mut gpioa.crh),
                gpioa.pa10,
            ),
            &mut afio.mapr,
            Config::default().baudrate(config::UART_BAUDRATE.bps()),
            &clocks,
        );
        uart.listen(Event::Rxne);

        defmt::info!("USART1 {} bps", config::UART_BAUDRATE);

        //---------------------------------------------------------------------

        let (i2c1, i2c_pins) = I2c::i2c1(
            ctx.device.I2C1,
            (
                gpiob.pb6.into_alternate_open_drain(&mut gpiob.crl),
                gpiob.pb7.into_alternate_open_drain(&mut gpiob.crl),
            ),
            &mut afio.mapr,
            Mode::Standard {
                frequency: Hertz::kHz(config::I2C_FREQ_KHZ),
            },
            clocks,
        )
        .release();

        let i2c = hw::I2cIrqMaster::new(i2c1, i2c_pins, HANDSHAKE.notifier());

        defmt::info!("I2C sensor port, sensor at 0x{:X}", config::TEMP_SENSOR_ADDRESS);

        //---------------------------------------------------------------------

        let segments = hw::SegmentPort::new([
            // digit 0, a..g
            gpiob.pb0.into_push_pull_output(&mut gpiob.crl).erase(),
            gpiob.pb1.into_push_pull_output(&mut gpiob.crl).erase(),
            pb3.into_push_pull_output(&mut gpiob.crl).erase(),
            pb4.into_push_pull_output(&mut gpiob.crl).erase(),
            gpiob.pb5.into_push_pull_output(&mut gpiob.crl).erase(),
            gpiob.pb8.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb9.into_push_pull_output(&mut gpiob.crh).erase(),
            // digit 1, a..g
            gpiob.pb10.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb11.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb12.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb13.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb14.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb15.into_push_pull_output(&mut gpiob.crh).erase(),
            gpiob.pb2.into_push_pull_output(&mut gpiob.crl).erase(),
        ]);

        defmt::info!("Display");

        //---------------------------------------------------------------------

        let mono = Systick::new(ctx.core.SYST, clocks.sysclk().to_Hz());

        //---------------------------------------------------------------------

        (
            Shared {
                i2c,
                uart,
                relay: SerialRelay::new(),
            },
            Local {
                acquisition: Acquisition::new(&HANDSHAKE, config::TEMP_SENSOR_ADDRESS),
                segments,
                inbound: InboundBuffer::new(),
            },
            init::Monotonics(mono),
        )
    }

    //-------------------------------------------------------------------------

    #[task(binds = I2C1_EV, shared = [i2c], priority = 2)]
    fn i2c1_ev(mut ctx: i2c1_ev::Context) {
        ctx.shared.i2c.lock(|i2c| i2c.on_event());
    }

    #[task(binds = I2C1_ER, shared = [i2c], priority = 2)]
    fn i2c1_er(mut ctx: i2c1_er::Context) {
        ctx.shared.i2c.lock(|i2c| i2c.on_error());
    }

    //-------------------------------------------------------------------------

    #[task(binds = USART1, shared = [uart, relay], local = [inbound], priority = 1)]
    fn usart1(ctx: usart1::Context) {
        let mut uart = ctx.shared.uart;
        let mut relay = ctx.shared.relay;
        let inbound = ctx.local.inbound;

        (&mut uart, &mut relay).lock(|uart, relay| {
            if uart.is_rx_not_empty() {
                match uart.read() {
                    Ok(b) => {
                        if inbound.feed_byte(b) == Feed::Wrapped {
                            defmt::debug!("USART1: inbound wrapped ({} total)", inbound.overruns());
                        }
                    }
                    Err(nb::Error::Other(e)) => {
                        defmt::warn!("USART1: rx error {}", defmt::Debug2Format(&e))
                    }
                    Err(nb::Error::WouldBlock) => {}
                }
            } else if uart.is_tx_empty() {
                if let Some(b) = relay.next_tx() {
                    uart.write(b).ok();
                } else {
                    uart.unlisten(Event::Txe);
                    relay.tx_complete();
                }
            } else {
                defmt::trace!("USART1: spurious interrupt");
            }
        });
    }

    //-------------------------------------------------------------------------

    #[idle(shared = [i2c, uart, relay], local = [acquisition, segments])]
    fn idle(ctx: idle::Context) -> ! {
        let acquisition = ctx.local.acquisition;
        let segments = ctx.local.segments;

        let mut uart = ctx.shared.uart;
        let mut relay = ctx.shared.relay;
        let mut bus = SharedBus(ctx.shared.i2c);

        if let Err(e) = acquisition.probe(&mut bus, monotonics::MonoTimer::now, cortex_m::asm::wfi)
        {
            defmt::panic!("{} (0x{:X})", e, u8::from(e));
        }

        let period = Duration::millis(config::CYCLE_PERIOD_MS);
        let mut next_cycle = monotonics::MonoTimer::now();

        loop {
            match acquisition.cycle(&mut bus, monotonics::MonoTimer::now, cortex_m::asm::wfi) {
                Ok(sample) => {
                    (&mut uart, &mut relay).lock(|uart, relay| match relay.submit(sample) {
                        Ok(first) => {
                            uart.write(first).ok();
                            uart.listen(Event::Txe);
                        }
                        Err(e) => defmt::warn!("{} (0x{:X})", e, u8::from(e)),
                    });

                    display::show::<_, { config::DISPLAY_DIGITS }>(
                        segments,
                        sample
                            .display_value(config::DISPLAY_DIGITS)
                            .unwrap_or(display::OUT_OF_RANGE),
                    );
                }
                Err(AcquisitionError::RetryBudgetExceeded(cause)) => {
                    defmt::error!(
                        "Resetting I2C1 after {} (0x{:X}, {} stray notifications, status history 0x{:X})",
                        cause,
                        u8::from(AcquisitionError::RetryBudgetExceeded(cause)),
                        HANDSHAKE.stray_notifications(),
                        HANDSHAKE.event_status().bits()
                    );
                    bus.reset();
                }
                Err(_) => { /* logged by the acquisition */ }
            }

            next_cycle += period;
            while monotonics::MonoTimer::now() < next_cycle {
                cortex_m::asm::wfi();
            }
        }
    }
}
