use stm32f1xx_hal::pac::i2c1::sr1;

use tsensor_relay::bus::{BusStatus, HwError};

/// Error flags of SR1 as status callback bits.
pub fn sr1_status(sr1: &sr1::R) -> BusStatus {
    let mut status = BusStatus::NONE;
    if sr1.berr().bit_is_set() {
        status |= HwError::Bus.into();
    }
    if sr1.arlo().bit_is_set() {
        status |= HwError::Arbitration.into();
    }
    if sr1.af().bit_is_set() {
        status |= HwError::Acknowledge.into();
    }
    if sr1.ovr().bit_is_set() {
        status |= HwError::Overrun.into();
    }
    if sr1.timeout().bit_is_set() {
        status |= HwError::Timeout.into();
    }
    status
}
