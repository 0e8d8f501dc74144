use stm32f1xx_hal::gpio::{ErasedPin, Output, PushPull};
use stm32f1xx_hal::pac::GPIOB;

use tsensor_relay::display::SegmentSink;

pub const SEGMENTS_PER_DIGIT: usize = 7;
pub const DIGITS: usize = 2;

/// GPIOB line of every segment, `[digit][a..g]`. Decimal point is not wired.
const LINES: [[u8; SEGMENTS_PER_DIGIT]; DIGITS] = [
    [0, 1, 3, 4, 5, 8, 9],
    [10, 11, 12, 13, 14, 15, 2],
];

const fn all_lines() -> u32 {
    let mut mask = 0;
    let mut d = 0;
    while d < DIGITS {
        let mut s = 0;
        while s < SEGMENTS_PER_DIGIT {
            mask |= 1 << LINES[d][s];
            s += 1;
        }
        d += 1;
    }
    mask
}

const ALL_LINES: u32 = all_lines();

/// Two common-cathode digits driven straight from GPIOB.
pub struct SegmentPort {
    _pins: [ErasedPin<Output<PushPull>>; DIGITS * SEGMENTS_PER_DIGIT],
}

impl SegmentPort {
    /// Pins in `LINES` order, already switched to push-pull outputs.
    pub fn new(pins: [ErasedPin<Output<PushPull>>; DIGITS * SEGMENTS_PER_DIGIT]) -> Self {
        let mut port = Self { _pins: pins };
        port.write(0);
        port
    }

    fn bsrr_word(pattern: u32) -> u32 {
        let mut set = 0u32;
        for (digit, lines) in LINES.iter().enumerate() {
            let glyph = (pattern >> (8 * digit)) as u8;
            for (seg, line) in lines.iter().enumerate() {
                if glyph & (1 << seg) != 0 {
                    set |= 1 << line;
                }
            }
        }
        ((ALL_LINES & !set) << 16) | set
    }
}

impl SegmentSink for SegmentPort {
    fn write(&mut self, pattern: u32) {
        let word = Self::bsrr_word(pattern);
        // all 14 lines change in one store, the pins themselves are owned by `self`
        let gpiob = unsafe { &*GPIOB::ptr() };
        gpiob.bsrr.write(|w| unsafe { w.bits(word) });
    }
}
