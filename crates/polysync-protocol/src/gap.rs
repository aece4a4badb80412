use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A missing contiguous range `[from_seq, to_seq]` of the event log, pending refetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventGap {
    pub from_seq: u64,
    pub to_seq: u64,
    pub detected_at: DateTime<Utc>,
    pub retry_count: u32,
    pub next_retry_at: DateTime<Utc>,
    pub max_retries: u32,
    pub deadline_at: DateTime<Utc>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl EventGap {
    /// True when `[from, to]` overlaps this gap or touches one of its ends.
    pub fn touches(&self, from: u64, to: u64) -> bool {
        self.to_seq.saturating_add(1) >= from && to.saturating_add(1) >= self.from_seq
    }

    pub fn absorb(&mut self, from: u64, to: u64) {
        self.from_seq = self.from_seq.min(from);
        self.to_seq = self.to_seq.max(to);
    }

    pub fn contains(&self, seq: u64) -> bool {
        (self.from_seq..=self.to_seq).contains(&seq)
    }

    pub fn range(&self) -> SeqRange {
        SeqRange::new(self.from_seq, self.to_seq)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_retry_at
    }
}

/// Closed range of sequence numbers, always normalised so `from <= to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeqRange {
    pub from: u64,
    pub to: u64,
}

impl SeqRange {
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            from: a.min(b),
            to: a.max(b),
        }
    }
}

impl std::fmt::Display for SeqRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}...{}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap(from: u64, to: u64) -> EventGap {
        let now = DateTime::from_timestamp(0, 0).unwrap();
        EventGap {
            from_seq: from,
            to_seq: to,
            detected_at: now,
            retry_count: 0,
            next_retry_at: now,
            max_retries: 5,
            deadline_at: now,
            last_error: None,
        }
    }

    #[test]
    fn adjacent_and_overlapping_ranges_touch() {
        let g = gap(3, 5);
        assert!(g.touches(6, 8));
        assert!(g.touches(0, 2));
        assert!(g.touches(4, 4));
        assert!(!g.touches(7, 9));
        assert!(!g.touches(0, 1));
    }

    #[test]
    fn seq_range_normalises_order() {
        assert_eq!(SeqRange::new(5, 0), SeqRange { from: 0, to: 5 });
        assert_eq!(SeqRange::new(0, 5).to_string(), "0...5");
    }
}
