//! Single-slot mailbox between the bus interrupts and the acquisition loop.
//!
//! Each mailbox (receive and status) is one atomic word holding the armed
//! gate, the edge flag and the payload, so a notification is checked against
//! the gate and published in a single read-modify-write, and the loop reads
//! flag and payload with a single load. A later notification in the same cycle
//! replaces the whole word, never half of it. Notifications are accepted only
//! while a cycle is armed; anything arriving outside of a cycle belongs to an
//! abandoned transfer and is counted as stray.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::bus::BusStatus;
use crate::config::SAMPLE_FRAME_LEN;

const ARMED: u32 = 1 << 31;
const UPDATED: u32 = 1 << 30;
const PAYLOAD: u32 = UPDATED - 1;

const REMAINING_SHIFT: u32 = 16;
const REMAINING_MAX: u32 = PAYLOAD >> REMAINING_SHIFT;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Observation {
    /// Nothing reported since the last `arm`.
    Pending,
    /// The receive callback fired; `remaining == 0` means the frame is complete.
    Received {
        remaining: u32,
        frame: [u8; SAMPLE_FRAME_LEN],
    },
    /// The status callback fired at least once since the last `arm`.
    Fault { status: BusStatus },
}

pub struct Handshake {
    /// `ARMED | UPDATED | remaining << 16 | frame`
    recv: AtomicU32,
    /// `ARMED | UPDATED | status bits`
    event: AtomicU32,

    status_history: AtomicU32,
    stray: AtomicU32,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    pub const fn new() -> Self {
        Self {
            recv: AtomicU32::new(0),
            event: AtomicU32::new(0),
            status_history: AtomicU32::new(0),
            stray: AtomicU32::new(0),
        }
    }

    /// Interrupt-side handle.
    pub fn notifier(&self) -> Notifier<'_> {
        Notifier { handshake: self }
    }

    /// Clear both edge flags and start accepting notifications.
    ///
    /// Must be called before the bus request is issued.
    pub fn arm(&self) {
        self.event.store(ARMED, Ordering::Release);
        self.recv.store(ARMED, Ordering::Release);
    }

    /// Stop accepting notifications for the current cycle.
    pub fn disarm(&self) {
        self.recv.fetch_and(!ARMED, Ordering::AcqRel);
        self.event.fetch_and(!ARMED, Ordering::AcqRel);
    }

    pub fn is_armed(&self) -> bool {
        self.recv.load(Ordering::Acquire) & ARMED != 0
    }

    /// A status notification takes precedence over a receive seen in the same poll.
    pub fn observe(&self) -> Observation {
        let event = self.event.load(Ordering::Acquire);
        let recv = self.recv.load(Ordering::Acquire);

        if event & UPDATED != 0 {
            Observation::Fault {
                status: BusStatus::from_bits(event & PAYLOAD),
            }
        } else if recv & UPDATED != 0 {
            Observation::Received {
                remaining: (recv & PAYLOAD) >> REMAINING_SHIFT,
                frame: (recv as u16).to_be_bytes(),
            }
        } else {
            Observation::Pending
        }
    }

    /// Status bits seen since boot.
    pub fn event_status(&self) -> BusStatus {
        BusStatus::from_bits(self.status_history.load(Ordering::Relaxed))
    }

    pub fn stray_notifications(&self) -> u32 {
        self.stray.load(Ordering::Relaxed)
    }
}

/// Narrow update interface handed to the bus interrupt handlers.
#[derive(Clone, Copy)]
pub struct Notifier<'a> {
    handshake: &'a Handshake,
}

impl<'a> Notifier<'a> {
    /// Receive callback: `remaining` bytes of the request are still outstanding,
    /// `received` holds what has arrived so far.
    pub fn on_receive(&self, remaining: usize, received: &[u8]) {
        let mut frame = [0u8; SAMPLE_FRAME_LEN];
        let n = received.len().min(SAMPLE_FRAME_LEN);
        frame[..n].copy_from_slice(&received[..n]);

        let remaining = remaining.min(REMAINING_MAX as usize) as u32;
        let word = ARMED
            | UPDATED
            | (remaining << REMAINING_SHIFT)
            | u16::from_be_bytes(frame) as u32;

        self.publish(&self.handshake.recv, |_| word);
    }

    /// Status callback: ORs `status` into the cycle status.
    pub fn on_status(&self, status: BusStatus) {
        let hs = self.handshake;
        hs.status_history.fetch_or(status.bits(), Ordering::Relaxed);

        let bits = status.bits() & PAYLOAD;
        self.publish(&hs.event, |w| w | UPDATED | bits);
    }

    /// Replace `word` with `update(word)` if the cycle is armed, in one step.
    fn publish(&self, word: &AtomicU32, update: impl Fn(u32) -> u32) {
        let accepted = word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                (w & ARMED != 0).then(|| update(w))
            })
            .is_ok();
        if !accepted {
            self.handshake.stray.fetch_add(1, Ordering::Relaxed);
        }
    }
}
