use std::collections::BTreeSet;

/// Beat ordinals already handed to the click sink.
///
/// Once the set grows past `capacity` it keeps only the `retain` most recent
/// ordinals.
#[derive(Debug, Clone)]
pub struct ScheduledBeatSet {
    beats: BTreeSet<i64>,
    capacity: usize,
    retain: usize,
}

impl ScheduledBeatSet {
    pub fn new(capacity: usize, retain: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            beats: BTreeSet::new(),
            capacity,
            retain: retain.clamp(1, capacity),
        }
    }

    #[inline]
    pub fn contains(&self, beat: i64) -> bool {
        self.beats.contains(&beat)
    }

    /// Returns `false` if the beat was already present.
    pub fn insert(&mut self, beat: i64) -> bool {
        let inserted = self.beats.insert(beat);
        if self.beats.len() > self.capacity {
            self.prune();
        }
        inserted
    }

    fn prune(&mut self) {
        if let Some(&cut) = self.beats.iter().rev().nth(self.retain - 1) {
            self.beats = self.beats.split_off(&cut);
        }
    }

    pub fn clear(&mut self) {
        self.beats.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.beats.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn latest(&self) -> Option<i64> {
        self.beats.last().copied()
    }
}
