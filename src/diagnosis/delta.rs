//! Differences between two snapshots.
//!
//! `new_records` is drawn from the bounded `latest_records` window of the
//! later snapshot, so it undercounts when more records arrive between the two
//! readings than the window holds. The monitored store also writes creation
//! times at one-second resolution, so a record created within the same second
//! as the earlier snapshot is not reported as new. Both are accepted
//! approximations: `new_records` is evidence for the reader, and no verdict
//! depends on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::{RecordSummary, SnapshotGroup, StateSnapshot};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountsDelta {
    pub by_kind: BTreeMap<String, i64>,
    pub total: i64,
}

impl CountsDelta {
    pub fn get(&self, kind: &str) -> i64 {
        self.by_kind.get(kind).copied().unwrap_or(0)
    }

    pub fn any_kind_increased(&self) -> bool {
        self.by_kind.values().any(|delta| *delta > 0)
    }

    pub fn is_zero(&self) -> bool {
        self.total == 0 && self.by_kind.values().all(|delta| *delta == 0)
    }
}

/// Change observed between two snapshots. A field is `None` when its group was
/// untrustworthy in either snapshot; such fields never read as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StateDelta {
    pub counts_delta: Option<CountsDelta>,
    pub image_file_delta: Option<i64>,
    pub clipboard_kind_changed: Option<bool>,
    pub new_records: Vec<RecordSummary>,
    pub excluded: Vec<SnapshotGroup>,
}

impl StateDelta {
    /// True when every trusted numeric field is zero and nothing new appeared.
    pub fn is_zero(&self) -> bool {
        self.counts_delta.as_ref().map_or(true, CountsDelta::is_zero)
            && self.image_file_delta.map_or(true, |delta| delta == 0)
            && self.new_records.is_empty()
    }
}

fn signed_diff(before: u64, after: u64) -> i64 {
    let before = i64::try_from(before).unwrap_or(i64::MAX);
    let after = i64::try_from(after).unwrap_or(i64::MAX);
    after.saturating_sub(before)
}

/// Computes `after - before`. Pure and total over any pair of snapshots.
pub fn compute(before: &StateSnapshot, after: &StateSnapshot) -> StateDelta {
    let excluded: Vec<SnapshotGroup> = SnapshotGroup::ALL
        .into_iter()
        .filter(|group| before.partial.is_partial(*group) || after.partial.is_partial(*group))
        .collect();
    let trusted = |group: SnapshotGroup| !excluded.contains(&group);

    let (counts_delta, new_records) = if trusted(SnapshotGroup::Records) {
        let before_counts = &before.record_counts;
        let after_counts = &after.record_counts;

        let by_kind = before_counts
            .by_kind
            .keys()
            .chain(after_counts.by_kind.keys())
            .map(|kind| {
                (
                    kind.clone(),
                    signed_diff(before_counts.get(kind), after_counts.get(kind)),
                )
            })
            .collect();

        let new_records = after
            .latest_records
            .iter()
            .filter(|record| record.created_at > before.timestamp)
            .cloned()
            .collect();

        (
            Some(CountsDelta {
                by_kind,
                total: signed_diff(before_counts.total, after_counts.total),
            }),
            new_records,
        )
    } else {
        (None, Vec::new())
    };

    let image_file_delta = trusted(SnapshotGroup::Files)
        .then(|| signed_diff(before.image_file_count, after.image_file_count));

    let clipboard_kind_changed = trusted(SnapshotGroup::Clipboard)
        .then(|| before.clipboard_kind != after.clipboard_kind);

    StateDelta {
        counts_delta,
        image_file_delta,
        clipboard_kind_changed,
        new_records,
        excluded,
    }
}
