//! Duplicate prevention for scanned payloads.
//!
//! Two independent rules guard the record list:
//! - a short cooldown swallows the burst of identical reads a camera produces
//!   while the same badge stays in view;
//! - the `SeenSet` rejects any payload that already has a live record.
//!
//! The set is always derivable from the stored records, so deleting a record
//! (or clearing all of them) makes its payload scannable again.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::AttendanceRecord;

pub const DEFAULT_COOLDOWN_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Decision {
    Accept,
    SuppressCooldown,
    RejectDuplicate,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "Accept",
            Decision::SuppressCooldown => "SuppressCooldown",
            Decision::RejectDuplicate => "RejectDuplicate",
        }
    }
}

/// Raw payloads that currently have a live record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    payloads: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AttendanceRecord>,
    {
        records
            .into_iter()
            .map(|record| record.raw_qr_data.clone())
            .collect()
    }

    pub fn contains(&self, payload: &str) -> bool {
        self.payloads.contains(payload)
    }

    pub fn insert(&mut self, payload: impl Into<String>) -> bool {
        self.payloads.insert(payload.into())
    }

    pub fn remove(&mut self, payload: &str) -> bool {
        self.payloads.remove(payload)
    }

    pub fn clear(&mut self) {
        self.payloads.clear();
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl FromIterator<String> for SeenSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            payloads: iter.into_iter().collect(),
        }
    }
}

/// Convert a millisecond setting into a cooldown window, capped so it can never
/// overflow `chrono::Duration`.
pub fn cooldown_from_ms(cooldown_ms: u64) -> Duration {
    Duration::milliseconds(cooldown_ms.min(u64::from(u32::MAX)) as i64)
}

/// Classify one decoded payload.
///
/// The cooldown rule is checked first so a badge held in front of the camera
/// stays silent instead of flashing a duplicate error on every frame.
pub fn decide(
    payload: &str,
    now: DateTime<Utc>,
    last_payload: Option<&str>,
    last_accepted_at: Option<DateTime<Utc>>,
    seen: &SeenSet,
    cooldown: Duration,
) -> Decision {
    if let (Some(last), Some(accepted_at)) = (last_payload, last_accepted_at) {
        if last == payload && now.signed_duration_since(accepted_at) < cooldown {
            return Decision::SuppressCooldown;
        }
    }

    if seen.contains(payload) {
        return Decision::RejectDuplicate;
    }

    Decision::Accept
}

/// Last payload that passed the policy and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownMarker {
    pub payload: String,
    pub at: DateTime<Utc>,
}

/// Policy inputs owned by one scanning session.
#[derive(Debug, Clone)]
pub struct DedupState {
    seen: SeenSet,
    last: Option<CooldownMarker>,
    cooldown: Duration,
}

impl DedupState {
    pub fn new(seen: SeenSet, cooldown_ms: u64) -> Self {
        Self {
            seen,
            last: None,
            cooldown: cooldown_from_ms(cooldown_ms),
        }
    }

    pub fn decide(&self, payload: &str, now: DateTime<Utc>) -> Decision {
        decide(
            payload,
            now,
            self.last.as_ref().map(|marker| marker.payload.as_str()),
            self.last.as_ref().map(|marker| marker.at),
            &self.seen,
            self.cooldown,
        )
    }

    /// Record an accepted payload that produced a live record.
    pub fn accept(&mut self, payload: &str, now: DateTime<Utc>) {
        self.seen.insert(payload);
        self.mark(payload, now);
    }

    /// Start the cooldown for a payload without blocking it permanently.
    /// Used when the payload passed the policy but could not be parsed.
    pub fn mark(&mut self, payload: &str, now: DateTime<Utc>) {
        self.last = Some(CooldownMarker {
            payload: payload.to_string(),
            at: now,
        });
    }

    /// Drop a deleted record's payload from the blocked set.
    pub fn forget(&mut self, payload: &str) {
        self.seen.remove(payload);
        if self
            .last
            .as_ref()
            .is_some_and(|marker| marker.payload == payload)
        {
            self.last = None;
        }
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.last = None;
    }

    /// Replace the blocked set, e.g. after reloading records from the store.
    pub fn rebuild(&mut self, seen: SeenSet) {
        self.seen = seen;
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn last(&self) -> Option<&CooldownMarker> {
        self.last.as_ref()
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    const PAYLOAD: &str = "SMITH, John, USA";

    #[test]
    fn fresh_payload_is_accepted() {
        let decision = decide(PAYLOAD, at(0), None, None, &SeenSet::new(), cooldown_from_ms(2_000));
        assert_eq!(decision, Decision::Accept);
    }

    #[test]
    fn repeat_inside_cooldown_is_suppressed() {
        let mut state = DedupState::new(SeenSet::new(), 2_000);
        assert_eq!(state.decide(PAYLOAD, at(0)), Decision::Accept);
        state.accept(PAYLOAD, at(0));

        assert_eq!(state.decide(PAYLOAD, at(500)), Decision::SuppressCooldown);
    }

    #[test]
    fn same_instant_repeat_is_suppressed() {
        let mut state = DedupState::new(SeenSet::new(), 2_000);
        assert_eq!(state.decide(PAYLOAD, at(0)), Decision::Accept);
        state.accept(PAYLOAD, at(0));
        assert_eq!(state.decide(PAYLOAD, at(0)), Decision::SuppressCooldown);
        assert_eq!(state.decide(PAYLOAD, at(0)), Decision::SuppressCooldown);
    }

    #[test]
    fn repeat_after_cooldown_is_a_duplicate() {
        let mut state = DedupState::new(SeenSet::new(), 2_000);
        state.accept(PAYLOAD, at(0));

        assert_eq!(state.decide(PAYLOAD, at(2_000)), Decision::RejectDuplicate);
        assert_eq!(state.decide(PAYLOAD, at(10_000)), Decision::RejectDuplicate);
    }

    #[test]
    fn cooldown_only_applies_to_the_last_payload() {
        let mut state = DedupState::new(SeenSet::new(), 2_000);
        state.accept(PAYLOAD, at(0));
        state.accept("Jane Roe, Canada", at(100));

        assert_eq!(state.decide(PAYLOAD, at(200)), Decision::RejectDuplicate);
        assert_eq!(
            state.decide("Jane Roe, Canada", at(200)),
            Decision::SuppressCooldown
        );
    }

    #[test]
    fn forgetting_a_payload_makes_it_acceptable_again() {
        let mut state = DedupState::new(SeenSet::new(), 2_000);
        state.accept(PAYLOAD, at(0));
        state.forget(PAYLOAD);

        assert!(state.seen().is_empty());
        assert!(state.last().is_none());
        assert_eq!(state.decide(PAYLOAD, at(100)), Decision::Accept);
    }

    #[test]
    fn marked_but_unrecorded_payload_is_not_blocked_after_cooldown() {
        let mut state = DedupState::new(SeenSet::new(), 2_000);
        state.mark("garbage", at(0));

        assert_eq!(state.decide("garbage", at(1_000)), Decision::SuppressCooldown);
        assert_eq!(state.decide("garbage", at(3_000)), Decision::Accept);
        assert!(!state.seen().contains("garbage"));
    }

    #[test]
    fn clear_unblocks_everything() {
        let seen: SeenSet = ["a".to_string(), "b".to_string()].into_iter().collect();
        let mut state = DedupState::new(seen, 2_000);
        assert_eq!(state.decide("a", at(0)), Decision::RejectDuplicate);

        state.clear();
        assert_eq!(state.decide("a", at(0)), Decision::Accept);
        assert_eq!(state.decide("b", at(0)), Decision::Accept);
    }

    #[test]
    fn zero_cooldown_never_suppresses() {
        let mut state = DedupState::new(SeenSet::new(), 0);
        state.accept(PAYLOAD, at(0));
        assert_eq!(state.decide(PAYLOAD, at(0)), Decision::RejectDuplicate);
    }
}
