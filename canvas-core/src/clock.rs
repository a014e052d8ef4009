//! Per-participant counter map used to establish a partial order of events
//! across concurrent room members, plus a deterministic total-order sort
//! for display and replay.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Result of comparing two vector clocks. `Concurrent` covers both the
/// "genuinely concurrent" and "identical" cases, matching the three-valued
/// `{-1, 0, +1}` contract in the spec: `0` is returned for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    Before,
    After,
    Concurrent,
}

impl CausalOrder {
    /// Maps to the spec's `{-1, 0, +1}` compare() contract.
    pub fn as_i8(self) -> i8 {
        match self {
            CausalOrder::Before => -1,
            CausalOrder::After => 1,
            CausalOrder::Concurrent => 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorClock(BTreeMap<UserId, u64>);

impl VectorClock {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, user_id: &str) -> u64 {
        self.0.get(user_id).copied().unwrap_or(0)
    }

    /// Raises `clock[user_id]` by one and returns the updated clock as a
    /// frozen snapshot (a clone), for stamping onto an appended operation.
    pub fn increment(&mut self, user_id: &str) -> VectorClock {
        let counter = self.0.entry(user_id.to_string()).or_insert(0);
        *counter += 1;
        self.clone()
    }

    /// Component-wise max merge: `clock[k] = max(clock[k], remote[k])`.
    pub fn merge(&mut self, remote: &VectorClock) {
        for (user, &count) in remote.0.iter() {
            let entry = self.0.entry(user.clone()).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
    }

    /// `A happens-before B` iff every component of A is <= B's and at least
    /// one is strictly less. Returns `Before`/`After` for that relation in
    /// either direction, `Concurrent` otherwise (including equality).
    pub fn compare(a: &VectorClock, b: &VectorClock) -> CausalOrder {
        let mut a_le_b = true;
        let mut b_le_a = true;
        let mut strictly_less_somewhere = false;
        let mut strictly_greater_somewhere = false;

        for user in a.0.keys().chain(b.0.keys()) {
            let av = a.get(user);
            let bv = b.get(user);
            if av > bv {
                a_le_b = false;
                strictly_greater_somewhere = true;
            }
            if bv > av {
                b_le_a = false;
                strictly_less_somewhere = true;
            }
        }

        if a_le_b && strictly_less_somewhere && !strictly_greater_somewhere {
            CausalOrder::Before
        } else if b_le_a && strictly_greater_somewhere && !strictly_less_somewhere {
            CausalOrder::After
        } else {
            CausalOrder::Concurrent
        }
    }

    /// True if every component of `self` is >= the matching component of
    /// `other` (self dominates, i.e. has observed everything other has).
    pub fn dominates(&self, other: &VectorClock) -> bool {
        other.0.iter().all(|(user, &count)| self.get(user) >= count)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Stable sort of items by causal order on a projected vector clock, with a
/// `u64` timestamp as the deterministic tiebreaker for concurrent events.
/// `Vec::sort_by` is used (not `sort_unstable_by`) so equal-priority items
/// keep their relative append order.
pub fn sort_by_causal_order<T>(
    items: &mut [T],
    clock_of: impl Fn(&T) -> &VectorClock,
    timestamp_of: impl Fn(&T) -> u64,
) {
    items.sort_by(|a, b| {
        match VectorClock::compare(clock_of(a), clock_of(b)) {
            CausalOrder::Before => std::cmp::Ordering::Less,
            CausalOrder::After => std::cmp::Ordering::Greater,
            CausalOrder::Concurrent => timestamp_of(a).cmp(&timestamp_of(b)),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_is_monotone() {
        let mut clock = VectorClock::new();
        let snap1 = clock.increment("a");
        assert_eq!(snap1.get("a"), 1);
        let snap2 = clock.increment("a");
        assert_eq!(snap2.get("a"), 2);
    }

    #[test]
    fn irreflexive() {
        let mut clock = VectorClock::new();
        clock.increment("a");
        clock.increment("b");
        assert_eq!(VectorClock::compare(&clock, &clock), CausalOrder::Concurrent);
    }

    #[test]
    fn antisymmetric() {
        let mut a = VectorClock::new();
        a.increment("u");
        let mut b = a.clone();
        b.increment("u");

        assert_eq!(VectorClock::compare(&a, &b), CausalOrder::Before);
        assert_eq!(VectorClock::compare(&b, &a), CausalOrder::After);
    }

    #[test]
    fn concurrent_when_neither_dominates() {
        let mut a = VectorClock::new();
        a.increment("a");
        let mut b = VectorClock::new();
        b.increment("b");

        assert_eq!(VectorClock::compare(&a, &b), CausalOrder::Concurrent);
        assert_eq!(VectorClock::compare(&b, &a), CausalOrder::Concurrent);
    }

    #[test]
    fn merge_takes_componentwise_max() {
        let mut a = VectorClock::new();
        a.increment("a");
        a.increment("a");
        let mut b = VectorClock::new();
        b.increment("a");
        b.increment("b");

        a.merge(&b);
        assert_eq!(a.get("a"), 2);
        assert_eq!(a.get("b"), 1);
    }

    #[test]
    fn dominates_reflects_merge() {
        let mut a = VectorClock::new();
        a.increment("a");
        let b = a.clone();
        a.increment("a");
        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
    }

    #[test]
    fn sort_is_stable_and_repeatable() {
        #[derive(Clone)]
        struct Item {
            clock: VectorClock,
            ts: u64,
            label: &'static str,
        }

        let mut c1 = VectorClock::new();
        c1.increment("a");
        let mut c2 = VectorClock::new();
        c2.increment("b");

        let mut items = vec![
            Item { clock: c2.clone(), ts: 100, label: "second-concurrent" },
            Item { clock: c1.clone(), ts: 50, label: "first-concurrent" },
        ];

        sort_by_causal_order(&mut items, |i| &i.clock, |i| i.ts);
        let labels: Vec<_> = items.iter().map(|i| i.label).collect();
        assert_eq!(labels, vec!["first-concurrent", "second-concurrent"]);

        let mut items2 = items.clone();
        sort_by_causal_order(&mut items2, |i| &i.clock, |i| i.ts);
        let labels2: Vec<_> = items2.iter().map(|i| i.label).collect();
        assert_eq!(labels, labels2);
    }
}
