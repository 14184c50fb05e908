//! The bounded accumulation buffer between two poll-loop flushes.

use crate::event::Event;

/// An ordered, size-bounded accumulation of [`Event`]s awaiting dispatch.
///
/// The batch never flushes itself; the poll loop decides when to drain it
/// via [`Batch::take`], based on the flush condition in the delivery
/// engine (full, or an empty poll with a non-empty batch).
#[derive(Debug, Default)]
pub struct Batch {
    events: Vec<Event>,
    limit: usize,
}

impl Batch {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the batch should be flushed given the outcome of the most
    /// recent poll.
    #[must_use]
    pub fn should_flush(&self, last_poll_was_empty: bool) -> bool {
        self.len() >= self.limit || (last_poll_was_empty && !self.is_empty())
    }

    /// Drain and return the buffered events, leaving the batch empty.
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
