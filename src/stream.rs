//! Host side of the serial stream: every two bytes form one big-endian sample.

use crate::config;
use crate::sample::Sample;

/// The host divides the raw code by this to get degrees Celsius.
pub const SCALE: i32 = config::HOST_SCALE;

#[derive(Default)]
pub struct SampleDecoder {
    high: Option<u8>,
}

impl SampleDecoder {
    pub const fn new() -> Self {
        Self { high: None }
    }

    pub fn push(&mut self, byte: u8) -> Option<Sample> {
        match self.high.take() {
            None => {
                self.high = Some(byte);
                None
            }
            Some(high) => Some(Sample::from_frame(&[high, byte])),
        }
    }

    pub fn decode<'a>(&'a mut self, bytes: &'a [u8]) -> impl Iterator<Item = Sample> + 'a {
        bytes.iter().filter_map(move |b| self.push(*b))
    }

    /// Forget a half received window, e.g. after the port was reopened.
    pub fn resync(&mut self) {
        self.high = None;
    }

    pub fn is_aligned(&self) -> bool {
        self.high.is_none()
    }
}
