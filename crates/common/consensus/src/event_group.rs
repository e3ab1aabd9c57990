use serde::{Deserialize, Serialize};

/// Events found in the inclusive block range `start_block..=end_block`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct EventGroup<T> {
    pub events: Vec<T>,
    pub start_block: u64,
    pub end_block: u64,
}

impl<T> EventGroup<T> {
    pub fn new(events: Vec<T>, start_block: u64, end_block: u64) -> Self {
        Self {
            events,
            start_block,
            end_block,
        }
    }

    pub fn empty(start_block: u64, end_block: u64) -> Self {
        Self::new(Vec::new(), start_block, end_block)
    }

    /// Appends `other`, which must cover the blocks right after this group.
    pub fn extend(&mut self, other: EventGroup<T>) {
        self.events.extend(other.events);
        self.end_block = other.end_block;
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> EventGroup<U> {
        EventGroup {
            events: self.events.into_iter().map(f).collect(),
            start_block: self.start_block,
            end_block: self.end_block,
        }
    }
}
