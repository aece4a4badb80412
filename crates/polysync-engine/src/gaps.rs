//! Missing-range bookkeeping with exponential backoff.

use chrono::{DateTime, Utc};
use polysync_core::Phase;
use polysync_protocol::{EventGap, SeqRange};
use tracing::{debug, info};

use crate::engine::GameEngine;

/// What a [`GameEngine::tick`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GapTick {
    /// Ranges whose retry came due and should be refetched now.
    pub due: Vec<SeqRange>,
    /// True when a gap ran out of retries or time and the engine went read-only.
    pub escalated: bool,
    pub phase: Option<Phase>,
}

impl GameEngine {
    /// Records `[from, to]` as missing, merging it with every gap it overlaps or touches.
    pub fn register_gap(&mut self, from: u64, to: u64, now: DateTime<Utc>) -> SeqRange {
        let range = SeqRange::new(from, to);

        let mut merged: Option<EventGap> = None;
        let mut kept = Vec::with_capacity(self.state.event_gaps.len() + 1);
        for gap in std::mem::take(&mut self.state.event_gaps) {
            if !gap.touches(range.from, range.to) {
                kept.push(gap);
                continue;
            }
            match merged.as_mut() {
                Some(m) => {
                    m.absorb(gap.from_seq, gap.to_seq);
                    m.retry_count = m.retry_count.max(gap.retry_count);
                    m.deadline_at = m.deadline_at.min(gap.deadline_at);
                    m.next_retry_at = m.next_retry_at.min(gap.next_retry_at);
                }
                None => merged = Some(gap),
            }
        }

        let gap = match merged {
            Some(mut gap) => {
                gap.absorb(range.from, range.to);
                gap
            }
            None => EventGap {
                from_seq: range.from,
                to_seq: range.to,
                detected_at: now,
                retry_count: 0,
                next_retry_at: self.config.gaps.first_retry_at(now),
                max_retries: self.config.gaps.max_retries,
                deadline_at: self.config.gaps.deadline_from(now),
                last_error: None,
            },
        };
        let registered = gap.range();
        kept.push(gap);
        kept.sort_by_key(|g| g.from_seq);
        self.state.event_gaps = kept;

        debug!(range = %registered, open = self.state.event_gaps.len(), "gap registered");
        self.state.begin_repair(now);
        registered
    }

    /// Advances gap retries. Escalates to `ReadOnly` once any due gap is out of retries or past
    /// its deadline.
    pub fn tick(&mut self, now: DateTime<Utc>) -> GapTick {
        let mut report = GapTick::default();
        if self.state.event_gaps.is_empty() {
            return report;
        }

        let gap_config = self.config.gaps.clone();
        for gap in self.state.event_gaps.iter_mut() {
            if !gap.is_due(now) {
                continue;
            }
            gap.retry_count = gap.retry_count.saturating_add(1);
            if gap.retry_count >= gap.max_retries || now >= gap.deadline_at {
                gap.last_error = Some(format!(
                    "unresolved after {} retries",
                    gap.retry_count
                ));
                report.escalated = true;
                break;
            }
            gap.next_retry_at = gap_config.next_retry_at(now, gap.retry_count);
            report.due.push(gap.range());
        }

        self.state.repair_context.retry_count = self
            .state
            .event_gaps
            .iter()
            .map(|g| g.retry_count)
            .max()
            .unwrap_or(0);

        if report.escalated {
            self.state.begin_read_only(now);
            info!(
                gaps = self.state.event_gaps.len(),
                phase = ?self.state.phase,
                "gap repair exhausted, engine is read-only"
            );
        } else if !self.state.phase.is_terminal() {
            self.state.phase = Phase::Repair;
        }

        report.phase = Some(self.state.phase);
        report
    }

    pub fn open_gaps(&self) -> &[EventGap] {
        &self.state.event_gaps
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use polysync_core::{GameState, PieceCatalog};
    use polysync_protocol::{ClientId, GameId, PlayerId};

    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn engine() -> GameEngine {
        let catalog = Arc::new(PieceCatalog::standard());
        let state = GameState::new(
            GameId::new("G"),
            [PlayerId::Blue, PlayerId::Yellow],
            ClientId::new("Blue"),
            &catalog,
        );
        GameEngine::local(state, catalog)
    }

    #[test]
    fn new_gap_uses_configured_schedule() {
        let mut engine = engine();
        engine.register_gap(3, 5, t0());
        let gap = &engine.open_gaps()[0];
        assert_eq!((gap.from_seq, gap.to_seq), (3, 5));
        assert_eq!(gap.retry_count, 0);
        assert_eq!(gap.max_retries, 5);
        assert_eq!(gap.next_retry_at, t0() + Duration::seconds(1));
        assert_eq!(gap.deadline_at, t0() + Duration::seconds(31));
        assert_eq!(engine.phase(), Phase::Repair);
    }

    #[test]
    fn adjacent_and_overlapping_ranges_merge() {
        let mut engine = engine();
        engine.register_gap(3, 5, t0());
        engine.register_gap(6, 7, t0());
        engine.register_gap(1, 2, t0());
        assert_eq!(engine.open_gaps().len(), 1);
        assert_eq!(engine.open_gaps()[0].range(), SeqRange::new(1, 7));

        engine.register_gap(10, 12, t0());
        assert_eq!(engine.open_gaps().len(), 2);
    }

    #[test]
    fn bridging_range_coalesces_neighbours() {
        let mut engine = engine();
        engine.register_gap(1, 2, t0());
        engine.register_gap(6, 8, t0());
        let range = engine.register_gap(3, 5, t0());
        assert_eq!(range, SeqRange::new(1, 8));
        assert_eq!(engine.open_gaps().len(), 1);

        engine.register_gap(10, 10, t0());
        engine.register_gap(12, 12, t0());
        engine.register_gap(14, 15, t0());
        assert_eq!(engine.register_gap(11, 13, t0()), SeqRange::new(10, 15));
        assert_eq!(engine.open_gaps().len(), 2);
    }

    #[test]
    fn tick_without_gaps_changes_nothing() {
        let mut engine = engine();
        let report = engine.tick(t0());
        assert_eq!(report, GapTick::default());
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn tick_backs_off_exponentially() {
        let mut engine = engine();
        engine.register_gap(0, 2, t0());

        assert!(engine.tick(t0()).due.is_empty());

        let mut now = t0() + Duration::seconds(1);
        let mut delays = Vec::new();
        for _ in 0..3 {
            let report = engine.tick(now);
            assert_eq!(report.due, vec![SeqRange::new(0, 2)]);
            let next = engine.open_gaps()[0].next_retry_at;
            delays.push((next - now).num_seconds());
            now = next;
        }
        assert_eq!(delays, vec![2, 4, 8]);
        assert_eq!(engine.state().repair_context.retry_count, 3);
        assert_eq!(engine.phase(), Phase::Repair);
    }

    #[test]
    fn exhausted_retries_escalate_to_read_only() {
        let mut engine = engine();
        engine.register_gap(0, 5, t0());
        let mut escalated = false;
        for step in 1..=40 {
            let report = engine.tick(t0() + Duration::seconds(step));
            if report.escalated {
                escalated = true;
                break;
            }
        }
        assert!(escalated);
        assert_eq!(engine.phase(), Phase::ReadOnly);
        assert!(engine.open_gaps()[0].last_error.is_some());
    }

    #[test]
    fn deadline_escalates_even_with_retries_left() {
        let mut engine = engine();
        engine.register_gap(0, 5, t0());
        let report = engine.tick(t0() + Duration::seconds(31));
        assert!(report.escalated);
        assert_eq!(report.phase, Some(Phase::ReadOnly));
    }
}
