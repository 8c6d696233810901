//! Engine events and the bounded delivery queue
//!
//! Completion, single-sample, and limit conditions become typed events.
//! The interrupt-side engine pushes them into a bounded queue; the
//! foreground drains it with [`poll_event`](crate::driver::Adc::poll_event)
//! in occurrence order. Nothing runs user code in interrupt context, so a
//! slow consumer can never stall channel advancement - at worst it loses
//! `Sample`/`Limit` notifications, which the engine counts.

use heapless::Deque;
use metron_hal::ChannelId;

use crate::limits::LimitBound;

/// Depth of the event queue.
///
/// Sized so a caller that drains between requests can never lose a
/// buffer-carrying `Done`: one session produces at most two of those.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// A condition reported by the engine.
#[derive(Debug, PartialEq, Eq)]
pub enum Event<'buf> {
    /// A destination buffer is ready for the caller: either full, or
    /// partial after an abort. Ownership of the buffer returns with the
    /// event.
    Done {
        /// The caller-supplied buffer
        buffer: &'buf mut [i16],
        /// Number of valid samples, starting at index 0
        count: usize,
        /// Whether the hardware overran the latch while this buffer filled
        overflowed: bool,
    },
    /// Result of an event-driven single conversion.
    Sample {
        /// Raw conversion value
        value: i16,
    },
    /// A channel's value crossed one of its limit thresholds.
    Limit {
        /// The watched channel
        channel: ChannelId,
        /// Which bound was crossed
        bound: LimitBound,
    },
}

/// Bounded FIFO between the interrupt-side engine and the foreground.
#[derive(Debug, Default)]
pub struct EventQueue<'buf> {
    queue: Deque<Event<'buf>, EVENT_QUEUE_DEPTH>,
    dropped: u32,
}

impl<'buf> EventQueue<'buf> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            queue: Deque::new(),
            dropped: 0,
        }
    }

    /// Append an event.
    ///
    /// When the queue is saturated, `Sample`/`Limit` events are dropped
    /// and counted. A `Done` must never be lost - it carries buffer
    /// ownership - so it evicts the oldest queued event instead.
    pub fn push(&mut self, event: Event<'buf>) {
        if let Err(event) = self.queue.push_back(event) {
            self.dropped = self.dropped.saturating_add(1);
            if matches!(event, Event::Done { .. }) {
                self.queue.pop_front();
                let _ = self.queue.push_back(event);
            }
        }
    }

    /// Remove and return the oldest event.
    pub fn pop(&mut self) -> Option<Event<'buf>> {
        self.queue.pop_front()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no event is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Events lost to saturation so far.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}
