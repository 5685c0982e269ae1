use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::delta::{CountsDelta, StateDelta};
use crate::snapshot::{SnapshotGroup, IMAGE_KIND, TEXT_KIND};

/// What the stimulus (if any) should make the pipeline persist.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    /// Record type that should grow. `None` accepts growth of any type.
    pub expected_kind: Option<String>,
    pub image_producing: bool,
}

impl Expectation {
    /// Passive observation without a stimulus.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn text() -> Self {
        Self {
            expected_kind: Some(TEXT_KIND.to_string()),
            image_producing: false,
        }
    }

    pub fn image() -> Self {
        Self {
            expected_kind: Some(IMAGE_KIND.to_string()),
            image_producing: true,
        }
    }

    fn expected_kind_increased(&self, counts: &CountsDelta) -> bool {
        match &self.expected_kind {
            Some(kind) => counts.get(kind) > 0,
            None => counts.any_kind_increased(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Category {
    Healthy,
    /// An artifact was written but no record was created.
    PersistenceGap,
    /// A record was created, but not under the expected type.
    MisclassifiedRecord,
    /// Nothing observable happened before the timeout.
    NoActivity,
    /// The evidence could not support a verdict; `partial_groups` lists the
    /// groups that were untrustworthy.
    #[serde(rename_all = "camelCase")]
    Indeterminate { partial_groups: Vec<SnapshotGroup> },
    Pending,
    StimulusFailed { reason: String },
    Cancelled,
}

impl Category {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Category::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Healthy => "healthy",
            Category::PersistenceGap => "persistence-gap",
            Category::MisclassifiedRecord => "misclassified-record",
            Category::NoActivity => "no-activity",
            Category::Indeterminate { .. } => "indeterminate",
            Category::Pending => "pending",
            Category::StimulusFailed { .. } => "stimulus-failed",
            Category::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub category: Category,
    /// Cumulative delta against the baseline. Absent when no poll ran.
    pub evidence: Option<StateDelta>,
    pub elapsed: Duration,
}

/// Maps a cumulative delta to a verdict. First matching rule wins:
///
/// 1. files grew, no record at all → `PersistenceGap`
/// 2. image stimulus, records grew but not images → `MisclassifiedRecord`
/// 3. records grew under the expected type → `Healthy`
/// 4. timed out with no change → `NoActivity`
///
/// A rule that needs a field from an untrusted group is skipped. Before the
/// timeout an unmatched delta is `Pending`; at or after it, `Indeterminate`.
pub fn classify(
    delta: &StateDelta,
    expectation: &Expectation,
    elapsed: Duration,
    timeout: Duration,
) -> DiagnosisResult {
    DiagnosisResult {
        category: decide(delta, expectation, elapsed >= timeout),
        evidence: Some(delta.clone()),
        elapsed,
    }
}

fn decide(delta: &StateDelta, expectation: &Expectation, timed_out: bool) -> Category {
    let counts = delta.counts_delta.as_ref();
    let files = delta.image_file_delta;

    if let (Some(counts), Some(files)) = (counts, files) {
        if files > 0 && counts.get(IMAGE_KIND) == 0 && counts.total == 0 {
            return Category::PersistenceGap;
        }
    }

    if let Some(counts) = counts {
        if expectation.image_producing && counts.total > 0 && counts.get(IMAGE_KIND) == 0 {
            return Category::MisclassifiedRecord;
        }
        if counts.total > 0 && expectation.expected_kind_increased(counts) {
            return Category::Healthy;
        }
    }

    if !timed_out {
        return Category::Pending;
    }

    match (counts, files) {
        (Some(counts), Some(0)) if counts.total == 0 => Category::NoActivity,
        _ => Category::Indeterminate {
            partial_groups: delta.excluded.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::delta::compute;
    use crate::snapshot::{RecordCounts, StateSnapshot};
    use chrono::{Duration as ChronoDuration, Utc};

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn snapshot(pairs: &[(&str, u64)], total: u64, files: u64) -> StateSnapshot {
        let mut snapshot = StateSnapshot::empty(Utc::now());
        snapshot.record_counts = RecordCounts::from_parts(
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            total,
        );
        snapshot.image_file_count = files;
        snapshot
    }

    fn later(mut snapshot: StateSnapshot) -> StateSnapshot {
        snapshot.timestamp = snapshot.timestamp + ChronoDuration::seconds(1);
        snapshot
    }

    #[test]
    fn healthy_text_path() {
        let before = snapshot(&[("text", 5), ("image", 2)], 7, 10);
        let after = later(snapshot(&[("text", 6), ("image", 2)], 8, 10));

        let result = classify(
            &compute(&before, &after),
            &Expectation::text(),
            Duration::from_secs(1),
            TIMEOUT,
        );
        assert_eq!(result.category, Category::Healthy);
        assert_eq!(result.elapsed, Duration::from_secs(1));
    }

    #[test]
    fn persistence_gap_when_file_written_without_record() {
        let before = snapshot(&[("text", 5), ("image", 2)], 7, 10);
        let after = later(snapshot(&[("text", 5), ("image", 2)], 7, 11));

        let result = classify(
            &compute(&before, &after),
            &Expectation::image(),
            Duration::from_secs(2),
            TIMEOUT,
        );
        assert_eq!(result.category, Category::PersistenceGap);
    }

    #[test]
    fn no_activity_at_timeout() {
        let before = snapshot(&[("text", 5), ("image", 2)], 7, 10);
        let after = before.clone();

        let result = classify(&compute(&before, &after), &Expectation::text(), TIMEOUT, TIMEOUT);
        assert_eq!(result.category, Category::NoActivity);
    }

    #[test]
    fn misclassified_image_record() {
        let before = snapshot(&[("text", 5), ("image", 2)], 7, 10);
        let after = later(snapshot(&[("text", 6), ("image", 2)], 8, 11));

        let result = classify(
            &compute(&before, &after),
            &Expectation::image(),
            Duration::from_secs(3),
            TIMEOUT,
        );
        assert_eq!(result.category, Category::MisclassifiedRecord);
    }

    #[test]
    fn unchanged_state_is_never_healthy() {
        let before = snapshot(&[("text", 5), ("image", 2)], 7, 10);
        let delta = compute(&before, &before);

        for expectation in [Expectation::any(), Expectation::text(), Expectation::image()] {
            for secs in [0, 1, 29, 30, 31] {
                let result = classify(&delta, &expectation, Duration::from_secs(secs), TIMEOUT);
                assert_ne!(result.category, Category::Healthy);
            }
        }
    }

    #[test]
    fn pending_resolves_once_timed_out() {
        let before = snapshot(&[("text", 5), ("image", 2)], 7, 10);
        let candidates = vec![
            before.clone(),
            later(snapshot(&[("text", 5), ("html", 1), ("image", 2)], 8, 10)),
            later(snapshot(&[("text", 4), ("image", 2)], 6, 10)),
            later(snapshot(&[("text", 5), ("image", 2)], 7, 9)),
        ];

        for after in candidates {
            let delta = compute(&before, &after);
            let early = classify(&delta, &Expectation::text(), Duration::from_secs(1), TIMEOUT);
            assert_eq!(early.category, Category::Pending);

            let late = classify(&delta, &Expectation::text(), TIMEOUT, TIMEOUT);
            assert!(
                matches!(
                    late.category,
                    Category::NoActivity | Category::Indeterminate { .. }
                ),
                "unexpected {:?}",
                late.category
            );
        }
    }

    #[test]
    fn untrusted_records_never_blame_persistence() {
        let before = snapshot(&[("text", 5), ("image", 2)], 7, 10);
        for files in [9, 10, 11, 15] {
            let mut after = later(snapshot(&[("text", 6)], 8, files));
            after.partial.records = true;
            let delta = compute(&before, &after);

            for secs in [1, 30] {
                let result =
                    classify(&delta, &Expectation::image(), Duration::from_secs(secs), TIMEOUT);
                assert!(!matches!(
                    result.category,
                    Category::PersistenceGap | Category::MisclassifiedRecord | Category::Healthy
                ));
            }
        }
    }

    #[test]
    fn every_rule_skipped_is_indeterminate() {
        let before = snapshot(&[("text", 5)], 5, 10);
        let mut after = before.clone();
        after.partial.records = true;
        after.partial.files = true;

        let delta = compute(&before, &after);
        let early = classify(&delta, &Expectation::text(), Duration::from_secs(1), TIMEOUT);
        assert_eq!(early.category, Category::Pending);

        let late = classify(&delta, &Expectation::text(), TIMEOUT, TIMEOUT);
        assert_eq!(
            late.category,
            Category::Indeterminate {
                partial_groups: vec![SnapshotGroup::Records, SnapshotGroup::Files],
            }
        );
    }

    #[test]
    fn untrusted_files_block_no_activity() {
        let before = snapshot(&[("text", 5)], 5, 10);
        let mut after = before.clone();
        after.partial.files = true;

        let result = classify(&compute(&before, &after), &Expectation::text(), TIMEOUT, TIMEOUT);
        assert_eq!(
            result.category,
            Category::Indeterminate {
                partial_groups: vec![SnapshotGroup::Files],
            }
        );
    }

    #[test]
    fn passive_watch_accepts_any_type() {
        let before = snapshot(&[("text", 5)], 5, 0);
        let after = later(snapshot(&[("text", 5), ("files", 1)], 6, 0));

        let result = classify(
            &compute(&before, &after),
            &Expectation::any(),
            Duration::from_secs(1),
            TIMEOUT,
        );
        assert_eq!(result.category, Category::Healthy);
    }

    #[test]
    fn healthy_still_wins_after_timeout() {
        let before = snapshot(&[("image", 2)], 2, 10);
        let after = later(snapshot(&[("image", 3)], 3, 11));

        let result = classify(
            &compute(&before, &after),
            &Expectation::image(),
            Duration::from_secs(45),
            TIMEOUT,
        );
        assert_eq!(result.category, Category::Healthy);
    }
}
