//! Two-wire bus seam between the acquisition loop and the board driver.

use core::ops::{BitOr, BitOrAssign};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HwError {
    /// Bus error
    Bus = 1 << 0,
    /// Arbitration loss
    Arbitration = 1 << 1,
    /// No ack received
    Acknowledge = 1 << 2,
    /// Overrun/underrun
    Overrun = 1 << 3,
    /// Timeout
    Timeout = 1 << 4,
}

/// Accumulated bus condition bits, as delivered to the status callback.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusStatus(u32);

impl BusStatus {
    pub const NONE: Self = Self(0);
    pub const BUS: Self = Self(HwError::Bus as u32);
    pub const ARBITRATION: Self = Self(HwError::Arbitration as u32);
    pub const ACKNOWLEDGE: Self = Self(HwError::Acknowledge as u32);
    pub const OVERRUN: Self = Self(HwError::Overrun as u32);
    pub const TIMEOUT: Self = Self(HwError::Timeout as u32);
    pub const UNKNOWN: Self = Self(
        Self::BUS.0 | Self::ARBITRATION.0 | Self::ACKNOWLEDGE.0 | Self::OVERRUN.0 | Self::TIMEOUT.0,
    );

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl From<HwError> for BusStatus {
    fn from(e: HwError) -> Self {
        Self(e as u32)
    }
}

impl BitOr for BusStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BusStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Interrupt-driven bus master that fetches one sample frame per request.
///
/// `start_receive` only kicks the transfer off; the outcome arrives later from
/// interrupt context through [`crate::handshake::Notifier`].
pub trait TwoWireMaster {
    type Error: Into<BusStatus>;

    /// `Err(nb::Error::WouldBlock)` means the bus is still busy with a previous transfer.
    fn start_receive(&mut self, address: u8) -> nb::Result<(), Self::Error>;

    /// Drop the outstanding transfer (if any) and release the bus.
    fn abort(&mut self);
}

pub trait Reset {
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits_accumulate() {
        let mut s = BusStatus::NONE;
        assert!(s.is_empty());
        s |= HwError::Acknowledge.into();
        s |= BusStatus::BUS;
        assert_eq!(s.bits(), 0b101);
        assert!(s.contains(BusStatus::ACKNOWLEDGE));
        assert!(!s.contains(BusStatus::TIMEOUT));
        assert!(BusStatus::UNKNOWN.contains(s));
    }
}
