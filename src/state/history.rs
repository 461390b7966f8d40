//! Persisted transition history.
//!
//! Every committed transition produces one immutable [`TransitionRecord`].
//! [`HistoryQuery`] filters rows the way a host would query its history
//! table, and [`TransitionHistory`] views one owner's rows as a path.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// One committed transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: Uuid,
    pub owner_type: String,
    pub owner_id: String,
    pub event: String,
    pub from_state: String,
    pub to_state: String,
    /// Caller-supplied key/value bag.
    #[serde(default)]
    pub metadata: BTreeMap<String, JsonValue>,
    pub actor_id: Option<String>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Chainable filter over transition rows. Every filter narrows the result.
///
/// # Example
///
/// ```rust
/// use concernkit::state::HistoryQuery;
/// use chrono::TimeDelta;
///
/// let query = HistoryQuery::new()
///     .for_owner("Article", "42")
///     .event("publish")
///     .recent(TimeDelta::days(7));
/// let rows: Vec<concernkit::state::TransitionRecord> = Vec::new();
/// assert!(query.apply(&rows).is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryQuery {
    owner: Option<(String, String)>,
    event: Option<String>,
    from_state: Option<String>,
    to_state: Option<String>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_owner(mut self, owner_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        self.owner = Some((owner_type.into(), owner_id.into()));
        self
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn from_state(mut self, state: impl Into<String>) -> Self {
        self.from_state = Some(state.into());
        self
    }

    pub fn to_state(mut self, state: impl Into<String>) -> Self {
        self.to_state = Some(state.into());
        self
    }

    /// Rows from the last `window`, measured from now.
    pub fn recent(self, window: TimeDelta) -> Self {
        self.recent_at(window, Utc::now())
    }

    pub fn recent_at(mut self, window: TimeDelta, now: DateTime<Utc>) -> Self {
        let since = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.since = Some(self.since.map_or(since, |existing| existing.max(since)));
        self
    }

    /// Rows with `start <= occurred_at <= end`.
    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.since = Some(self.since.map_or(start, |existing| existing.max(start)));
        self.until = Some(self.until.map_or(end, |existing| existing.min(end)));
        self
    }

    pub fn matches(&self, row: &TransitionRecord) -> bool {
        if let Some((owner_type, owner_id)) = &self.owner {
            if &row.owner_type != owner_type || &row.owner_id != owner_id {
                return false;
            }
        }
        if self.event.as_ref().is_some_and(|e| e != &row.event) {
            return false;
        }
        if self.from_state.as_ref().is_some_and(|s| s != &row.from_state) {
            return false;
        }
        if self.to_state.as_ref().is_some_and(|s| s != &row.to_state) {
            return false;
        }
        if self.since.is_some_and(|since| row.occurred_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| row.occurred_at > until) {
            return false;
        }
        true
    }

    /// Matching rows ordered by `occurred_at`, oldest first.
    pub fn apply<'a, I>(&self, rows: I) -> Vec<&'a TransitionRecord>
    where
        I: IntoIterator<Item = &'a TransitionRecord>,
    {
        let mut matched: Vec<&TransitionRecord> =
            rows.into_iter().filter(|row| self.matches(row)).collect();
        matched.sort_by_key(|row| row.occurred_at);
        matched
    }
}

/// Ordered transitions of a single owner.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionHistory {
    transitions: Vec<TransitionRecord>,
}

impl TransitionHistory {
    pub fn new(mut transitions: Vec<TransitionRecord>) -> Self {
        transitions.sort_by_key(|row| row.occurred_at);
        Self { transitions }
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.transitions.last()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// States traversed: the first source state, then every target.
    pub fn path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(first) = self.transitions.first() {
            path.push(first.from_state.as_str());
        }
        path.extend(self.transitions.iter().map(|t| t.to_state.as_str()));
        path
    }

    /// Time between the first and last transition.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.first()?, self.transitions.last()?);
        last.occurred_at
            .signed_duration_since(first.occurred_at)
            .to_std()
            .ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn row(event: &str, from: &str, to: &str, at: DateTime<Utc>) -> TransitionRecord {
        TransitionRecord {
            id: Uuid::new_v4(),
            owner_type: "Article".into(),
            owner_id: "1".into(),
            event: event.into(),
            from_state: from.into(),
            to_state: to.into(),
            metadata: BTreeMap::new(),
            actor_id: None,
            reason: None,
            occurred_at: at,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn filters_compose() {
        let mut other_owner = row("publish", "draft", "published", at(3));
        other_owner.owner_id = "2".into();
        let rows = vec![
            row("archive", "published", "archived", at(5)),
            row("publish", "draft", "published", at(1)),
            other_owner,
        ];

        let published = HistoryQuery::new()
            .for_owner("Article", "1")
            .to_state("published")
            .apply(&rows);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event, "publish");

        let all_for_owner = HistoryQuery::new().for_owner("Article", "1").apply(&rows);
        assert_eq!(all_for_owner[0].occurred_at, at(1));
        assert_eq!(all_for_owner[1].occurred_at, at(5));
    }

    #[test]
    fn time_windows_are_inclusive() {
        let rows = vec![
            row("publish", "draft", "published", at(1)),
            row("archive", "published", "archived", at(5)),
        ];

        assert_eq!(HistoryQuery::new().between(at(1), at(4)).apply(&rows).len(), 1);
        assert_eq!(
            HistoryQuery::new()
                .recent_at(TimeDelta::hours(1), at(6))
                .apply(&rows)
                .len(),
            1
        );
        assert_eq!(
            HistoryQuery::new()
                .recent_at(TimeDelta::hours(10), at(6))
                .from_state("draft")
                .apply(&rows)
                .len(),
            1
        );
    }

    #[test]
    fn path_and_duration() {
        let history = TransitionHistory::new(vec![
            row("archive", "published", "archived", at(5)),
            row("publish", "draft", "published", at(1)),
        ]);

        assert_eq!(history.path(), vec!["draft", "published", "archived"]);
        assert_eq!(history.duration(), Some(Duration::from_secs(4 * 3600)));
        assert!(TransitionHistory::default().duration().is_none());
        assert!(TransitionHistory::default().path().is_empty());
    }

    #[test]
    fn records_serialize_with_metadata() {
        let mut record = row("publish", "draft", "published", at(1));
        record
            .metadata
            .insert("source".into(), serde_json::json!("editor"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["metadata"]["source"], "editor");
        let back: TransitionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
