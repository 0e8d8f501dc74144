//! Seven-segment encoder.
//!
//! One byte per digit, least significant digit in the lowest byte.
//! Bit 0 is segment `a`, bit 6 is segment `g`, bit 7 the decimal point.

pub const SEG_BLANK: u8 = 0x00;
pub const SEG_DASH: u8 = 0x40;
pub const SEG_DP: u8 = 0x80;

/// Renders as dashes on any display width.
pub const OUT_OF_RANGE: u32 = u32::MAX;

/// Glyphs for 0..=F.
pub const SEGMENTS: [u8; 16] = [
    0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, //
    0x7F, 0x6F, 0x77, 0x7C, 0x39, 0x5E, 0x79, 0x71,
];

/// Output register of the display.
pub trait SegmentSink {
    fn write(&mut self, pattern: u32);
}

/// Decimal rendering, leading zeros blanked. Values that do not fit are shown as dashes.
pub fn encode<const DIGITS: usize>(value: u32) -> u32 {
    let mut pattern = 0u32;

    if DIGITS == 0 {
        return pattern;
    }

    let fits = 10u64.pow(DIGITS as u32) > value as u64;
    let mut rest = value;
    for digit in 0..DIGITS.min(4) {
        let glyph = if !fits {
            SEG_DASH
        } else if digit > 0 && rest == 0 {
            SEG_BLANK
        } else {
            SEGMENTS[(rest % 10) as usize]
        };
        pattern |= (glyph as u32) << (8 * digit);
        rest /= 10;
    }
    pattern
}

/// Encode and push `value` in one register store.
pub fn show<S: SegmentSink, const DIGITS: usize>(sink: &mut S, value: u32) -> u32 {
    let pattern = encode::<DIGITS>(value);
    sink.write(pattern);
    pattern
}
