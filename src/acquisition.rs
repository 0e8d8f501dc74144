//! Main-context acquisition cycle.
//!
//! Each cycle arms the handshake, asks the bus master for one frame and then
//! polls until the interrupt side reports completion, a bus condition, or the
//! cycle deadline passes. The loop never blocks: between polls it calls a
//! caller supplied `relax` hook (`wfi` on the target).

use crate::bus::TwoWireMaster;
use crate::config;
use crate::error::{AcquisitionError, Cause, SetupError};
use crate::handshake::{Handshake, Observation};
use crate::sample::Sample;

pub type Instant = fugit::TimerInstantU64<{ config::SYSTICK_RATE_HZ }>;
pub type Duration = fugit::TimerDurationU64<{ config::SYSTICK_RATE_HZ }>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HealthState {
    Ok,
    /// Recent failures, still within the retry budget
    Degraded,
    /// Retry budget exhausted
    Failed,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Health {
    pub state: HealthState,
    pub consecutive_failures: u8,
    pub total_failures: u32,
    pub samples: u32,
}

impl Health {
    const fn new() -> Self {
        Self {
            state: HealthState::Ok,
            consecutive_failures: 0,
            total_failures: 0,
            samples: 0,
        }
    }

    fn record_success(&mut self) {
        self.samples = self.samples.wrapping_add(1);
        self.consecutive_failures = 0;
        self.state = HealthState::Ok;
    }

    /// Returns `true` on the failure that exhausts the budget.
    fn record_failure(&mut self, budget: u8) -> bool {
        self.total_failures = self.total_failures.wrapping_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let was_failed = self.state == HealthState::Failed;
        self.state = if self.consecutive_failures >= budget {
            HealthState::Failed
        } else {
            HealthState::Degraded
        };
        !was_failed && self.state == HealthState::Failed
    }
}

enum Phase {
    Idle,
    Armed,
    Polling { deadline: Instant },
    Complete(Result<Sample, Cause>),
}

pub struct Acquisition<'a> {
    handshake: &'a Handshake,
    address: u8,
    timeout: Duration,
    retry_budget: u8,
    health: Health,
}

impl<'a> Acquisition<'a> {
    pub fn new(handshake: &'a Handshake, address: u8) -> Self {
        Self {
            handshake,
            address,
            timeout: Duration::millis(config::ACQUISITION_TIMEOUT_MS),
            retry_budget: config::MAX_CONSECUTIVE_FAILURES,
            health: Health::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_budget(mut self, budget: u8) -> Self {
        self.retry_budget = budget.max(1);
        self
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    /// One-shot read during startup. Health counters are left untouched.
    pub fn probe<B, N, R>(&mut self, bus: &mut B, mut now: N, mut relax: R) -> Result<Sample, SetupError>
    where
        B: TwoWireMaster,
        N: FnMut() -> Instant,
        R: FnMut(),
    {
        match self.attempt(bus, &mut now, &mut relax) {
            Ok(sample) => {
                info!("Sensor at 0x{:X} answered: 0x{:X}", self.address, sample.raw());
                Ok(sample)
            }
            Err(cause) => {
                error!("Sensor at 0x{:X} probe failed: {}", self.address, cause);
                Err(SetupError::SensorProbe(cause.into()))
            }
        }
    }

    /// Run one acquisition cycle and update the health counters.
    pub fn cycle<B, N, R>(&mut self, bus: &mut B, mut now: N, mut relax: R) -> Result<Sample, AcquisitionError>
    where
        B: TwoWireMaster,
        N: FnMut() -> Instant,
        R: FnMut(),
    {
        match self.attempt(bus, &mut now, &mut relax) {
            Ok(sample) => {
                if self.health.state != HealthState::Ok {
                    info!(
                        "Sensor recovered after {} failures",
                        self.health.consecutive_failures
                    );
                }
                self.health.record_success();
                trace!("Sample 0x{:X}", sample.raw());
                Ok(sample)
            }
            Err(cause) => {
                let exhausted = self.health.record_failure(self.retry_budget);
                if exhausted {
                    error!(
                        "Sensor at 0x{:X} not responding: {} consecutive failures, last {} (0x{:X})",
                        self.address,
                        self.health.consecutive_failures,
                        cause,
                        u8::from(AcquisitionError::from(cause))
                    );
                } else {
                    warn!(
                        "Acquisition failed: {} (0x{:X})",
                        cause,
                        u8::from(AcquisitionError::from(cause))
                    );
                }

                if self.health.state == HealthState::Failed {
                    Err(AcquisitionError::RetryBudgetExceeded(cause))
                } else {
                    Err(cause.into())
                }
            }
        }
    }

    fn attempt<B, N, R>(&self, bus: &mut B, now: &mut N, relax: &mut R) -> Result<Sample, Cause>
    where
        B: TwoWireMaster,
        N: FnMut() -> Instant,
        R: FnMut(),
    {
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => {
                    self.handshake.arm();
                    Phase::Armed
                }
                Phase::Armed => match bus.start_receive(self.address) {
                    Ok(()) => Phase::Polling {
                        deadline: now() + self.timeout,
                    },
                    Err(nb::Error::WouldBlock) => Phase::Complete(Err(Cause::BusBusy)),
                    Err(nb::Error::Other(e)) => Phase::Complete(Err(Cause::Bus(e.into()))),
                },
                Phase::Polling { deadline } => match self.handshake.observe() {
                    Observation::Fault { status } => Phase::Complete(Err(Cause::Bus(status))),
                    Observation::Received { remaining: 0, frame } => {
                        Phase::Complete(Ok(Sample::from_frame(&frame)))
                    }
                    Observation::Received { remaining, .. } => {
                        Phase::Complete(Err(Cause::Partial { remaining }))
                    }
                    Observation::Pending if now() >= deadline => {
                        debug!("No answer within {} ms, abort", self.timeout.to_millis());
                        bus.abort();
                        Phase::Complete(Err(Cause::Timeout))
                    }
                    Observation::Pending => {
                        relax();
                        Phase::Polling { deadline }
                    }
                },
                Phase::Complete(result) => {
                    self.handshake.disarm();
                    return result;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::bus::BusStatus;
    use crate::handshake::Notifier;
    use crate::relay::SerialRelay;

    #[derive(Clone)]
    enum Event {
        Receive(usize, Vec<u8>),
        Status(u32),
    }

    /// Fires its whole script from "interrupt context" as soon as a transfer starts.
    struct ScriptedBus<'h> {
        notifier: Notifier<'h>,
        script: Vec<Event>,
        busy: bool,
        started: usize,
        aborted: usize,
    }

    impl<'h> ScriptedBus<'h> {
        fn new(hs: &'h Handshake, script: Vec<Event>) -> Self {
            Self {
                notifier: hs.notifier(),
                script,
                busy: false,
                started: 0,
                aborted: 0,
            }
        }
    }

    impl TwoWireMaster for ScriptedBus<'_> {
        type Error = BusStatus;

        fn start_receive(&mut self, address: u8) -> nb::Result<(), BusStatus> {
            assert_eq!(address, config::TEMP_SENSOR_ADDRESS);
            if self.busy {
                return Err(nb::Error::WouldBlock);
            }
            self.started += 1;
            for event in self.script.iter() {
                match event {
                    Event::Receive(remaining, bytes) => self.notifier.on_receive(*remaining, bytes),
                    Event::Status(bits) => self.notifier.on_status(BusStatus::from_bits(*bits)),
                }
            }
            Ok(())
        }

        fn abort(&mut self) {
            self.aborted += 1;
        }
    }

    struct Clock(Cell<u64>);

    impl Clock {
        fn new() -> Self {
            Self(Cell::new(0))
        }

        fn now(&self) -> Instant {
            Instant::from_ticks(self.0.get())
        }

        fn tick(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn run(hs: &Handshake, script: Vec<Event>) -> Result<Sample, AcquisitionError> {
        let clock = Clock::new();
        let mut bus = ScriptedBus::new(hs, script);
        let mut acq = Acquisition::new(hs, config::TEMP_SENSOR_ADDRESS);
        acq.cycle(&mut bus, || clock.now(), || clock.tick())
    }

    #[test]
    fn complete_frame_is_relayed_unmodified() {
        let hs = Handshake::new();
        let sample = run(&hs, vec![Event::Receive(0, vec![0x01, 0x90])]).unwrap();
        assert_eq!(sample.raw(), 0x0190);
        assert_eq!(sample.raw(), 400);

        let mut relay = SerialRelay::new();
        let mut wire = vec![relay.submit(sample).unwrap()];
        while let Some(b) = relay.next_tx() {
            wire.push(b);
        }
        relay.tx_complete();
        assert_eq!(wire, [0x01, 0x90]);
        assert_eq!(relay.sent_bytes(), 2);
        assert!(!hs.is_armed());
    }

    #[test]
    fn final_zero_remaining_wins() {
        let hs = Handshake::new();
        let script = vec![
            Event::Receive(2, vec![]),
            Event::Receive(1, vec![0x0C]),
            Event::Receive(0, vec![0x0C, 0x80]),
        ];
        assert_eq!(run(&hs, script), Ok(Sample::from_raw(0x0C80)));
    }

    #[test]
    fn partial_frame_is_a_failure() {
        let hs = Handshake::new();
        assert_eq!(
            run(&hs, vec![Event::Receive(1, vec![0x01])]),
            Err(AcquisitionError::Partial { remaining: 1 })
        );
    }

    #[test]
    fn status_before_receive_is_a_failure() {
        let hs = Handshake::new();
        assert_eq!(
            run(&hs, vec![Event::Status(0x01)]),
            Err(AcquisitionError::Bus(BusStatus::BUS))
        );
    }

    #[test]
    fn status_suppresses_concurrent_receive() {
        let hs = Handshake::new();
        let script = vec![Event::Receive(0, vec![0x01, 0x90]), Event::Status(0x04)];
        assert_eq!(
            run(&hs, script),
            Err(AcquisitionError::Bus(BusStatus::ACKNOWLEDGE))
        );
    }

    #[test]
    fn loop_rearms_after_failure() {
        let hs = Handshake::new();
        let clock = Clock::new();
        let mut acq = Acquisition::new(&hs, config::TEMP_SENSOR_ADDRESS);

        let mut bad = ScriptedBus::new(&hs, vec![Event::Status(0x01)]);
        assert!(acq.cycle(&mut bad, || clock.now(), || clock.tick()).is_err());
        assert_eq!(acq.health().state, HealthState::Degraded);

        let mut good = ScriptedBus::new(&hs, vec![Event::Receive(0, vec![0x01, 0x90])]);
        assert_eq!(
            acq.cycle(&mut good, || clock.now(), || clock.tick()),
            Ok(Sample::from_raw(0x0190))
        );
        assert_eq!(acq.health().state, HealthState::Ok);
        assert_eq!(acq.health().total_failures, 1);
        assert_eq!(acq.health().samples, 1);
    }

    #[test]
    fn silent_bus_times_out() {
        let hs = Handshake::new();
        let clock = Clock::new();
        let mut bus = ScriptedBus::new(&hs, vec![]);
        let mut acq = Acquisition::new(&hs, config::TEMP_SENSOR_ADDRESS)
            .with_timeout(Duration::millis(10));

        assert_eq!(
            acq.cycle(&mut bus, || clock.now(), || clock.tick()),
            Err(AcquisitionError::Timeout)
        );
        assert_eq!(bus.aborted, 1);
        assert_eq!(clock.now().ticks(), 10);

        // late answer from the abandoned transfer
        hs.notifier().on_receive(0, &[0x01, 0x90]);
        assert_eq!(hs.stray_notifications(), 1);
    }

    #[test]
    fn busy_bus_fails_without_polling() {
        let hs = Handshake::new();
        let clock = Clock::new();
        let mut bus = ScriptedBus::new(&hs, vec![]);
        bus.busy = true;
        let mut acq = Acquisition::new(&hs, config::TEMP_SENSOR_ADDRESS);
        assert_eq!(
            acq.cycle(&mut bus, || clock.now(), || clock.tick()),
            Err(AcquisitionError::BusBusy)
        );
        assert_eq!(clock.now().ticks(), 0);
    }

    #[test]
    fn answer_arriving_while_polling() {
        let hs = Handshake::new();
        let clock = Clock::new();
        let notifier = hs.notifier();
        let mut bus = ScriptedBus::new(&hs, vec![]);
        let mut acq = Acquisition::new(&hs, config::TEMP_SENSOR_ADDRESS);

        let polls = Cell::new(0);
        let result = acq.cycle(
            &mut bus,
            || clock.now(),
            || {
                polls.set(polls.get() + 1);
                clock.tick();
                if polls.get() == 3 {
                    notifier.on_receive(0, &[0x0C, 0x80]);
                }
            },
        );
        assert_eq!(result, Ok(Sample::from_raw(0x0C80)));
        assert_eq!(polls.get(), 3);
    }

    #[test]
    fn retry_budget_escalates_and_recovers() {
        let hs = Handshake::new();
        let clock = Clock::new();
        let mut acq = Acquisition::new(&hs, config::TEMP_SENSOR_ADDRESS).with_retry_budget(3);
        let mut bad = ScriptedBus::new(&hs, vec![Event::Status(0x04)]);

        for _ in 0..2 {
            assert_eq!(
                acq.cycle(&mut bad, || clock.now(), || clock.tick()),
                Err(AcquisitionError::Bus(BusStatus::ACKNOWLEDGE))
            );
        }
        for _ in 0..2 {
            assert_eq!(
                acq.cycle(&mut bad, || clock.now(), || clock.tick()),
                Err(AcquisitionError::RetryBudgetExceeded(Cause::Bus(
                    BusStatus::ACKNOWLEDGE
                )))
            );
            assert_eq!(acq.health().state, HealthState::Failed);
        }
        assert_eq!(acq.health().consecutive_failures, 4);

        let mut good = ScriptedBus::new(&hs, vec![Event::Receive(0, vec![0x00, 0x80])]);
        assert!(acq.cycle(&mut good, || clock.now(), || clock.tick()).is_ok());
        assert_eq!(acq.health().state, HealthState::Ok);
        assert_eq!(acq.health().consecutive_failures, 0);
        assert_eq!(acq.health().total_failures, 4);
    }

    #[test]
    fn probe_reports_setup_error() {
        let hs = Handshake::new();
        let clock = Clock::new();
        let mut acq = Acquisition::new(&hs, config::TEMP_SENSOR_ADDRESS);
        let mut bus = ScriptedBus::new(&hs, vec![Event::Status(0x04)]);
        assert_eq!(
            acq.probe(&mut bus, || clock.now(), || clock.tick()),
            Err(SetupError::SensorProbe(AcquisitionError::Bus(
                BusStatus::ACKNOWLEDGE
            )))
        );
        assert_eq!(acq.health().total_failures, 0);
    }

    #[test]
    fn classification_is_repeatable() {
        let scripts = [
            vec![Event::Receive(0, vec![0x01, 0x90])],
            vec![Event::Receive(1, vec![0x01])],
            vec![Event::Status(0x02), Event::Receive(0, vec![0x01, 0x90])],
        ];
        for script in scripts.iter() {
            let first = run(&Handshake::new(), script.clone());
            for _ in 0..5 {
                assert_eq!(run(&Handshake::new(), script.clone()), first);
            }
        }
    }
}
