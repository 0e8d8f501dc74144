use core::fmt;

use crate::bus::BusStatus;

/// Why a single acquisition cycle produced no sample.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionError {
    /// The master refused to start, a previous transfer is still on the bus
    BusBusy,
    /// The status callback fired during the cycle
    Bus(BusStatus),
    /// Transfer finished with bytes still outstanding
    Partial { remaining: u32 },
    /// No notification before the cycle deadline
    Timeout,
    /// Too many consecutive failures, carries the failure that crossed the limit
    RetryBudgetExceeded(Cause),
}

/// The non-escalated subset of [`AcquisitionError`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cause {
    BusBusy,
    Bus(BusStatus),
    Partial { remaining: u32 },
    Timeout,
}

impl AcquisitionError {
    pub fn cause(self) -> Cause {
        match self {
            AcquisitionError::BusBusy => Cause::BusBusy,
            AcquisitionError::Bus(s) => Cause::Bus(s),
            AcquisitionError::Partial { remaining } => Cause::Partial { remaining },
            AcquisitionError::Timeout => Cause::Timeout,
            AcquisitionError::RetryBudgetExceeded(c) => c,
        }
    }
}

impl From<Cause> for AcquisitionError {
    fn from(c: Cause) -> Self {
        match c {
            Cause::BusBusy => AcquisitionError::BusBusy,
            Cause::Bus(s) => AcquisitionError::Bus(s),
            Cause::Partial { remaining } => AcquisitionError::Partial { remaining },
            Cause::Timeout => AcquisitionError::Timeout,
        }
    }
}

impl From<AcquisitionError> for u8 {
    fn from(e: AcquisitionError) -> u8 {
        match e {
            AcquisitionError::BusBusy => 0x81,
            AcquisitionError::Bus(s) => s.bits() as u8 | 0xC0,
            AcquisitionError::Partial { .. } => 0x82,
            AcquisitionError::Timeout => 0x83,
            AcquisitionError::RetryBudgetExceeded(_) => 0x8F,
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::BusBusy => f.write_str("bus busy"),
            AcquisitionError::Bus(s) => write!(f, "bus status 0x{:02X}", s.bits()),
            AcquisitionError::Partial { remaining } => {
                write!(f, "partial frame, {} bytes missing", remaining)
            }
            AcquisitionError::Timeout => f.write_str("timeout"),
            AcquisitionError::RetryBudgetExceeded(c) => {
                write!(f, "retry budget exceeded ({})", AcquisitionError::from(*c))
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayError {
    /// Previous frame is still being shifted out
    Busy,
}

impl From<RelayError> for u8 {
    fn from(e: RelayError) -> u8 {
        match e {
            RelayError::Busy => 0x90,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Busy => f.write_str("relay busy"),
        }
    }
}

/// Startup failures. Any of these aborts the firmware.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupError {
    SensorProbe(AcquisitionError),
}

impl From<SetupError> for u8 {
    fn from(e: SetupError) -> u8 {
        match e {
            SetupError::SensorProbe(_) => 0xA0,
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::SensorProbe(e) => write!(f, "sensor probe failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_round_trips_through_escalation() {
        let e = AcquisitionError::RetryBudgetExceeded(Cause::Timeout);
        assert_eq!(e.cause(), Cause::Timeout);
        assert_eq!(AcquisitionError::from(e.cause()), AcquisitionError::Timeout);
    }

    #[test]
    fn display() {
        assert_eq!(
            AcquisitionError::Bus(BusStatus::ACKNOWLEDGE).to_string(),
            "bus status 0x04"
        );
        assert_eq!(
            SetupError::SensorProbe(AcquisitionError::Timeout).to_string(),
            "sensor probe failed: timeout"
        );
        assert_eq!(
            AcquisitionError::RetryBudgetExceeded(Cause::Partial { remaining: 1 }).to_string(),
            "retry budget exceeded (partial frame, 1 bytes missing)"
        );
    }

    #[test]
    fn codes() {
        assert_eq!(u8::from(AcquisitionError::Bus(BusStatus::BUS)), 0xC1);
        assert_eq!(u8::from(AcquisitionError::Timeout), 0x83);
        assert_eq!(u8::from(RelayError::Busy), 0x90);
        assert_eq!(
            u8::from(SetupError::SensorProbe(AcquisitionError::Timeout)),
            0xA0
        );
        assert_eq!(
            u8::from(AcquisitionError::RetryBudgetExceeded(Cause::Timeout)),
            0x8F
        );
    }

    #[test]
    fn bus_code_carries_status_bits() {
        use crate::bus::HwError;

        assert_eq!(u8::from(AcquisitionError::Bus(HwError::Timeout.into())), 0xD0);
        assert_eq!(
            u8::from(AcquisitionError::Bus(BusStatus::ACKNOWLEDGE | BusStatus::BUS)),
            0xC5
        );
    }
}
