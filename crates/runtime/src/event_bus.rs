use std::collections::VecDeque;

/// One entry in an ordered session trace.
///
/// Events carry a monotonically increasing sequence number rather than a
/// timestamp so traces stay comparable across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub seq: u64,
    pub kind: &'static str,
    pub message: String,
}

/// Ordered trace buffer. A bounded bus keeps only the newest
/// `capacity` events and counts the ones it evicted.
#[derive(Debug, Default)]
pub struct EventBus {
    next_seq: u64,
    capacity: Option<usize>,
    dropped: u64,
    events: VecDeque<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn emit(&mut self, kind: &'static str, message: impl Into<String>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(capacity) = self.capacity {
            while self.events.len() >= capacity {
                self.events.pop_front();
                self.dropped += 1;
            }
        }
        self.events.push_back(Event {
            seq,
            kind,
            message: message.into(),
        });
        seq
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events evicted by the capacity limit so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Events of a single kind, in emission order.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Takes the buffered events. Sequence numbers keep counting.
    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}
