use byteorder::{BigEndian, ByteOrder};

use crate::config;

/// Raw temperature code as read from the sensor, MSB first.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample(u16);

impl Sample {
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn from_frame(frame: &[u8; config::SAMPLE_FRAME_LEN]) -> Self {
        Self(BigEndian::read_u16(frame))
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Bytes exactly as they came off the bus.
    pub fn to_frame(self) -> [u8; config::SAMPLE_FRAME_LEN] {
        let mut frame = [0u8; config::SAMPLE_FRAME_LEN];
        BigEndian::write_u16(&mut frame, self.0);
        frame
    }

    /// Two's complement code, 1/128 °C per LSB.
    pub fn celsius(self) -> f32 {
        self.0 as i16 as f32 / config::HOST_SCALE as f32
    }

    /// Whole degrees, `None` below zero or when `digits` are not enough.
    pub fn display_value(self, digits: usize) -> Option<u32> {
        let whole = (self.0 as i16 as i32) / config::HOST_SCALE;
        u32::try_from(whole)
            .ok()
            .filter(|v| (*v as u64) < 10u64.pow(digits as u32))
    }
}

impl From<Sample> for u16 {
    fn from(s: Sample) -> u16 {
        s.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_big_endian() {
        let s = Sample::from_frame(&[0x01, 0x90]);
        assert_eq!(s.raw(), 0x0190);
        assert_eq!(s.raw(), 400);
        assert_eq!(s.to_frame(), [0x01, 0x90]);
    }

    #[test]
    fn celsius_scale() {
        assert_eq!(Sample::from_raw(0x0C80).celsius(), 25.0);
        assert_eq!(Sample::from_raw(0x0190).celsius(), 3.125);
        // -1 °C
        assert_eq!(Sample::from_raw(0xFF80).celsius(), -1.0);
    }

    #[test]
    fn display_value_range() {
        assert_eq!(Sample::from_raw(0x0C80).display_value(2), Some(25));
        assert_eq!(Sample::from_raw(0x0000).display_value(2), Some(0));
        // -1 °C
        assert_eq!(Sample::from_raw(0xFF80).display_value(2), None);
        // 150 °C
        assert_eq!(Sample::from_raw(150 * 128).display_value(2), None);
        assert_eq!(Sample::from_raw(150 * 128).display_value(3), Some(150));
    }

    #[test]
    fn out_of_range_reading_shows_dashes() {
        use crate::display::{encode, OUT_OF_RANGE, SEG_DASH};

        let dashes = (SEG_DASH as u32) << 8 | SEG_DASH as u32;
        // -5 °C
        let cold = Sample::from_raw((-5i16 * 128) as u16);
        assert_eq!(encode::<2>(cold.display_value(2).unwrap_or(OUT_OF_RANGE)), dashes);

        let hot = Sample::from_raw(100 * 128);
        assert_eq!(encode::<2>(hot.display_value(2).unwrap_or(OUT_OF_RANGE)), dashes);
    }
}
