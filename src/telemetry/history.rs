use super::TelemetrySnapshot;

/// Maximum number of snapshots retained by the history.
pub const HISTORY_CAPACITY: usize = 1000;

/// Bounded, arrival-ordered buffer of telemetry snapshots.
///
/// Backed by a fixed-capacity ring: once full, each append overwrites the
/// oldest slot in place.
#[derive(Clone, Debug)]
pub struct TelemetryHistory {
    slots: Vec<TelemetrySnapshot>,
    capacity: usize,
    /// Slot the next append writes to
    next: usize,
}

impl Default for TelemetryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    /// Append a snapshot, evicting the oldest one when the buffer is full.
    pub fn append(&mut self, snapshot: TelemetrySnapshot) {
        if self.slots.len() < self.capacity {
            self.slots.push(snapshot);
        } else {
            self.slots[self.next] = snapshot;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// Up to `n` of the latest snapshots, most recent first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &TelemetrySnapshot> + '_ {
        let count = n.min(self.slots.len());
        (0..count).map(move |i| {
            let index = (self.next + self.capacity - 1 - i) % self.capacity;
            &self.slots[index]
        })
    }

    pub fn latest(&self) -> Option<&TelemetrySnapshot> {
        self.recent(1).next()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.next = 0;
    }
}
