//! Fixed-latency delay queue.
//!
//! Raw measurements enter tagged with the tick at which they become
//! observable and leave oldest first, at most one per tick.  Entries are
//! pushed with non-decreasing due ticks, so the queue is FIFO without any
//! sorting.

use std::collections::VecDeque;

use odosim_types::Measurement;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// How the front entry is matched against the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Release only when `due_tick == now`.  A front entry whose tick has
    /// already passed can never match again and is discarded.
    #[default]
    Exact,
    /// Release the front entry once `due_tick <= now`.
    CatchUp,
}

/// A raw measurement waiting for its due tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedEntry {
    pub due_tick: u64,
    pub measurement: Measurement,
}

#[derive(Debug, Clone, Default)]
pub struct DelayQueue {
    entries: VecDeque<DelayedEntry>,
    dropped: u64,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due_tick: u64, measurement: Measurement) {
        debug_assert!(
            self.entries.back().is_none_or(|e| e.due_tick <= due_tick),
            "due ticks must be non-decreasing"
        );
        trace!(due_tick, seq = measurement.header.seq, "enqueued measurement");
        self.entries.push_back(DelayedEntry {
            due_tick,
            measurement,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Due tick of the oldest pending entry.
    pub fn front_due(&self) -> Option<u64> {
        self.entries.front().map(|e| e.due_tick)
    }

    /// Entries discarded so far as stale under [`ReleasePolicy::Exact`].
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Release at most one entry for tick `now`.
    pub fn pop_due(&mut self, now: u64, policy: ReleasePolicy) -> Option<Measurement> {
        if policy == ReleasePolicy::Exact {
            while let Some(front) = self.entries.front() {
                if front.due_tick >= now {
                    break;
                }
                warn!(
                    due_tick = front.due_tick,
                    now,
                    seq = front.measurement.header.seq,
                    "dropping stale measurement"
                );
                self.entries.pop_front();
                self.dropped += 1;
            }
        }

        let due = self.entries.front()?.due_tick;
        let ready = match policy {
            ReleasePolicy::Exact => due == now,
            ReleasePolicy::CatchUp => due <= now,
        };
        if !ready {
            return None;
        }
        self.entries.pop_front().map(|e| e.measurement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(seq: u64) -> Measurement {
        let mut m = Measurement::default();
        m.header.seq = seq;
        m
    }

    #[test]
    fn empty_queue_releases_nothing() {
        let mut q = DelayQueue::new();
        assert!(q.pop_due(0, ReleasePolicy::Exact).is_none());
        assert!(q.pop_due(0, ReleasePolicy::CatchUp).is_none());
    }

    #[test]
    fn entry_waits_until_due() {
        let mut q = DelayQueue::new();
        q.push(3, tagged(0));
        for t in 0..3 {
            assert!(q.pop_due(t, ReleasePolicy::Exact).is_none(), "released early at {t}");
        }
        assert_eq!(q.pop_due(3, ReleasePolicy::Exact).map(|m| m.header.seq), Some(0));
        assert!(q.is_empty());
    }

    #[test]
    fn one_release_per_tick_oldest_first() {
        let mut q = DelayQueue::new();
        for seq in 0..3 {
            q.push(2, tagged(seq));
        }
        let released: Vec<_> = (0..6)
            .filter_map(|t| q.pop_due(t, ReleasePolicy::CatchUp))
            .map(|m| m.header.seq)
            .collect();
        assert_eq!(released, vec![0, 1, 2]);
    }

    #[test]
    fn catch_up_drains_backlog_across_ticks() {
        let mut q = DelayQueue::new();
        q.push(0, tagged(0));
        q.push(1, tagged(1));
        // Tick source stalled until tick 5.
        assert_eq!(q.pop_due(5, ReleasePolicy::CatchUp).map(|m| m.header.seq), Some(0));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_due(6, ReleasePolicy::CatchUp).map(|m| m.header.seq), Some(1));
    }

    #[test]
    fn exact_drops_stale_front_and_releases_match() {
        let mut q = DelayQueue::new();
        q.push(1, tagged(0));
        q.push(2, tagged(1));
        q.push(4, tagged(2));
        assert!(q.pop_due(3, ReleasePolicy::Exact).is_none());
        assert_eq!(q.dropped(), 2);
        assert_eq!(q.front_due(), Some(4));
        assert_eq!(q.pop_due(4, ReleasePolicy::Exact).map(|m| m.header.seq), Some(2));
    }

    #[test]
    fn exact_same_due_tick_keeps_only_first() {
        let mut q = DelayQueue::new();
        q.push(2, tagged(0));
        q.push(2, tagged(1));
        assert_eq!(q.pop_due(2, ReleasePolicy::Exact).map(|m| m.header.seq), Some(0));
        assert!(q.pop_due(3, ReleasePolicy::Exact).is_none());
        assert_eq!(q.dropped(), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn release_policy_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ReleasePolicy,
        }
        let w: Wrapper = serde_json::from_str(r#"{"policy":"catch_up"}"#).unwrap();
        assert_eq!(w.policy, ReleasePolicy::CatchUp);
        assert_eq!(ReleasePolicy::default(), ReleasePolicy::Exact);
    }
}
