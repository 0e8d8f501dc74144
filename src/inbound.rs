//! Host → board bytes. No command protocol is defined for this channel yet;
//! the buffer only has to stay in bounds.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feed {
    Stored,
    /// Capacity reached: cursor, command pointer and counter went back to zero
    Wrapped,
}

/// Fixed receive buffer. A zero capacity is rejected at compile time:
///
/// ```compile_fail
/// let _ = tsensor_relay::InboundBuffer::<0>::new();
/// ```
pub struct InboundBuffer<const SIZE: usize> {
    buffer: [u8; SIZE],
    cursor: usize,
    command: usize,
    received: usize,
    overruns: u32,
}

impl<const SIZE: usize> Default for InboundBuffer<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> InboundBuffer<SIZE> {
    const NON_EMPTY: () = assert!(SIZE > 0, "InboundBuffer needs a non-zero capacity");

    pub const fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self {
            buffer: [0; SIZE],
            cursor: 0,
            command: 0,
            received: 0,
            overruns: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        SIZE
    }

    /// Called from the receive interrupt, one byte at a time.
    pub fn feed_byte(&mut self, byte: u8) -> Feed {
        self.buffer[self.cursor] = byte;
        self.cursor += 1;
        self.received += 1;

        if self.cursor >= SIZE {
            warn!("Inbound buffer full, {} unread bytes dropped", self.cursor - self.command);
            self.reset();
            self.overruns = self.overruns.wrapping_add(1);
            Feed::Wrapped
        } else {
            Feed::Stored
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.command = 0;
        self.received = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes received since the last wrap.
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Bytes between the command pointer and the cursor.
    pub fn pending(&self) -> &[u8] {
        &self.buffer[self.command..self.cursor]
    }

    /// Advance the command pointer past `n` pending bytes.
    pub fn consume(&mut self, n: usize) {
        self.command = (self.command + n).min(self.cursor);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.cursor]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_after_exactly_capacity_writes() {
        let mut buf = InboundBuffer::<500>::new();
        for i in 0..499 {
            assert_eq!(buf.feed_byte(i as u8), Feed::Stored);
        }
        assert_eq!(buf.cursor(), 499);
        assert_eq!(buf.received(), 499);

        assert_eq!(buf.feed_byte(0xEE), Feed::Wrapped);
        assert_eq!(buf.cursor(), 0);
        assert_eq!(buf.received(), 0);
        assert_eq!(buf.overruns(), 1);

        assert_eq!(buf.feed_byte(0x42), Feed::Stored);
        assert_eq!(buf.as_slice(), [0x42]);
        assert_eq!(buf.cursor(), 1);
        assert_eq!(buf.received(), 1);
    }

    #[test]
    fn never_writes_past_capacity() {
        let mut buf = InboundBuffer::<8>::new();
        let mut wraps = 0;
        for i in 0..100u32 {
            if buf.feed_byte(i as u8) == Feed::Wrapped {
                wraps += 1;
            }
            assert!(buf.cursor() < buf.capacity());
        }
        assert_eq!(wraps, 100 / 8);
        assert_eq!(buf.overruns(), 12);
        assert_eq!(buf.received(), 100 % 8);
    }

    #[test]
    fn single_byte_buffer_wraps_on_every_byte() {
        let mut buf = InboundBuffer::<1>::new();
        assert_eq!(buf.feed_byte(0x01), Feed::Wrapped);
        assert_eq!(buf.feed_byte(0x02), Feed::Wrapped);
        assert_eq!(buf.overruns(), 2);
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn command_pointer_tracks_consumption() {
        let mut buf = InboundBuffer::<4>::new();
        buf.feed_byte(b'a');
        buf.feed_byte(b'b');
        assert_eq!(buf.pending(), b"ab");

        buf.consume(1);
        assert_eq!(buf.pending(), b"b");
        buf.consume(10);
        assert!(buf.pending().is_empty());

        buf.feed_byte(b'c');
        assert_eq!(buf.pending(), b"c");

        // fourth byte fills the buffer, everything unread is gone
        assert_eq!(buf.feed_byte(b'd'), Feed::Wrapped);
        assert!(buf.pending().is_empty());
    }
}
