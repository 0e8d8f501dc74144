use crate::config::SAMPLE_FRAME_LEN;
use crate::error::RelayError;
use crate::sample::Sample;

pub enum RelayState {
    Idle,
    Tx { offset: usize },
}

/// Outbound half of the serial link: one raw sample frame at a time, no framing.
///
/// The loop calls [`SerialRelay::submit`] and loads the returned byte into the
/// transmitter; the transmit-empty interrupt pulls the rest with
/// [`SerialRelay::next_tx`] and reports the flush with [`SerialRelay::tx_complete`].
pub struct SerialRelay {
    frame: [u8; SAMPLE_FRAME_LEN],
    state: RelayState,

    sent_bytes: u32,
    frames_sent: u32,
    dropped: u32,
}

impl Default for SerialRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialRelay {
    pub const fn new() -> Self {
        Self {
            frame: [0; SAMPLE_FRAME_LEN],
            state: RelayState::Idle,
            sent_bytes: 0,
            frames_sent: 0,
            dropped: 0,
        }
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, RelayState::Idle)
    }

    /// Latch `sample` and return the first byte to put on the wire.
    pub fn submit(&mut self, sample: Sample) -> Result<u8, RelayError> {
        match self.state {
            RelayState::Tx { .. } => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("Relay busy, sample 0x{:X} dropped", sample.raw());
                Err(RelayError::Busy)
            }
            RelayState::Idle => {
                self.frame = sample.to_frame();
                self.state = RelayState::Tx { offset: 1 };
                Ok(self.frame[0])
            }
        }
    }

    pub fn next_tx(&mut self) -> Option<u8> {
        match &mut self.state {
            RelayState::Idle => None,
            RelayState::Tx { offset } => {
                if *offset < SAMPLE_FRAME_LEN {
                    let b = self.frame[*offset];
                    *offset += 1;
                    Some(b)
                } else {
                    None
                }
            }
        }
    }

    /// Send-complete notification. Only updates the counters.
    pub fn tx_complete(&mut self) {
        if let RelayState::Tx { offset } = self.state {
            self.sent_bytes = self.sent_bytes.wrapping_add(offset as u32);
            self.frames_sent = self.frames_sent.wrapping_add(1);
            trace!("Relay: {} bytes flushed", offset);
        }
        self.state = RelayState::Idle;
    }

    pub fn sent_bytes(&self) -> u32 {
        self.sent_bytes
    }

    pub fn frames_sent(&self) -> u32 {
        self.frames_sent
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}
