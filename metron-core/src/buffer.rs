//! Destination buffer management
//!
//! Owns the destination of a buffered acquisition and the primary/secondary
//! handoff that makes gapless continuous capture possible: while the
//! primary buffer fills, the caller may queue exactly one secondary; the
//! instant the primary is full it is handed back and the secondary becomes
//! the new primary without missing a trigger.
//!
//! Buffers are exclusively borrowed caller memory. Samples are written
//! straight into them - never copied - and ownership travels back to the
//! caller by value, so reclaiming a buffer mid-flight is a compile error
//! rather than a runtime hazard.

use crate::error::Error;

/// A buffer handed back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub struct Completion<'buf> {
    /// The caller-supplied destination buffer
    pub buffer: &'buf mut [i16],
    /// Number of valid samples written, starting at index 0
    pub count: usize,
    /// Whether the hardware overran the sample latch while this buffer
    /// was filling
    pub overflowed: bool,
}

/// Fill state of one buffered acquisition.
#[derive(Debug)]
pub struct BufferManager<'buf> {
    primary: &'buf mut [i16],
    filled: usize,
    secondary: Option<&'buf mut [i16]>,
    overflowed: bool,
}

impl<'buf> BufferManager<'buf> {
    /// Start filling `primary` from index 0.
    pub fn new(primary: &'buf mut [i16]) -> Self {
        Self {
            primary,
            filled: 0,
            secondary: None,
            overflowed: false,
        }
    }

    /// Queue the buffer that takes over when the primary fills.
    pub fn queue_secondary(&mut self, buffer: &'buf mut [i16]) -> Result<(), Error> {
        if self.secondary.is_some() {
            return Err(Error::AlreadyQueued);
        }
        self.secondary = Some(buffer);
        Ok(())
    }

    /// Whether a secondary buffer is waiting.
    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Samples written so far.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Whether the primary has reached its length.
    pub fn is_full(&self) -> bool {
        self.filled == self.primary.len()
    }

    /// Record a latch overrun; surfaces on the next completion.
    pub fn note_overflow(&mut self) {
        self.overflowed = true;
    }

    /// Write one sample at the fill cursor.
    ///
    /// Returns `true` when this write just filled the primary. Never
    /// writes past the end; a push against a full buffer is a sequencing
    /// bug upstream and is ignored.
    pub fn push(&mut self, value: i16) -> bool {
        debug_assert!(self.filled < self.primary.len());
        if self.filled < self.primary.len() {
            self.primary[self.filled] = value;
            self.filled += 1;
        }
        self.is_full()
    }

    /// Hand the full primary back and promote the secondary, if any.
    ///
    /// The returned manager (when present) continues the session with a
    /// reset fill cursor and a clean overflow flag.
    pub fn rotate(self) -> (Completion<'buf>, Option<BufferManager<'buf>>) {
        let done = Completion {
            buffer: self.primary,
            count: self.filled,
            overflowed: self.overflowed,
        };
        (done, self.secondary.map(BufferManager::new))
    }

    /// End the session early: hand back the partially-filled primary and
    /// the untouched secondary.
    pub fn dissolve(self) -> (Completion<'buf>, Option<&'buf mut [i16]>) {
        let done = Completion {
            buffer: self.primary,
            count: self.filled,
            overflowed: self.overflowed,
        };
        (done, self.secondary)
    }
}
