//! Point-in-time readings of the monitored clipboard pipeline.
//!
//! A `StateSnapshot` is assembled from three independently read groups
//! (clipboard, records, files). Each group carries its own trust flag so a
//! failed read can be told apart from a genuine zero.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record-type label the monitored application uses for image entries.
pub const IMAGE_KIND: &str = "image";
/// Record-type label for plain-text entries.
pub const TEXT_KIND: &str = "text";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ClipboardKind {
    Text,
    Image,
    Other,
    Unknown,
}

impl Default for ClipboardKind {
    fn default() -> Self {
        ClipboardKind::Unknown
    }
}

impl ClipboardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipboardKind::Text => "text",
            ClipboardKind::Image => "image",
            ClipboardKind::Other => "other",
            ClipboardKind::Unknown => "unknown",
        }
    }
}

/// Independently read portions of a snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotGroup {
    Clipboard,
    Records,
    Files,
}

impl SnapshotGroup {
    pub const ALL: [SnapshotGroup; 3] = [
        SnapshotGroup::Clipboard,
        SnapshotGroup::Records,
        SnapshotGroup::Files,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotGroup::Clipboard => "clipboard",
            SnapshotGroup::Records => "records",
            SnapshotGroup::Files => "files",
        }
    }
}

impl fmt::Display for SnapshotGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `true` marks a group whose reading on this tick cannot be trusted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartialGroups {
    pub clipboard: bool,
    pub records: bool,
    pub files: bool,
}

impl PartialGroups {
    pub fn is_partial(&self, group: SnapshotGroup) -> bool {
        match group {
            SnapshotGroup::Clipboard => self.clipboard,
            SnapshotGroup::Records => self.records,
            SnapshotGroup::Files => self.files,
        }
    }

    pub fn mark(&mut self, group: SnapshotGroup) {
        match group {
            SnapshotGroup::Clipboard => self.clipboard = true,
            SnapshotGroup::Records => self.records = true,
            SnapshotGroup::Files => self.files = true,
        }
    }

    pub fn any(&self) -> bool {
        self.clipboard || self.records || self.files
    }
}

/// Per-type record counts. `total` may exceed the sum of `by_kind` when the
/// store contains types the reader did not break out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordCounts {
    pub by_kind: BTreeMap<String, u64>,
    pub total: u64,
}

impl RecordCounts {
    /// Builds counts from grouped rows, raising `total` to the row sum if the
    /// reported total is smaller (rows inserted between the two queries).
    pub fn from_parts(by_kind: BTreeMap<String, u64>, total: u64) -> Self {
        let named: u64 = by_kind.values().sum();
        Self {
            by_kind,
            total: total.max(named),
        }
    }

    pub fn get(&self, kind: &str) -> u64 {
        self.by_kind.get(kind).copied().unwrap_or(0)
    }
}

/// Lightweight view of one persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub id: String,
    pub kind: String,
    pub truncated_value: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: DateTime<Utc>,
    /// For image records, whether the file named by the record still exists.
    pub artifact_present: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub clipboard_kind: ClipboardKind,
    pub record_counts: RecordCounts,
    pub image_file_count: u64,
    /// Most recent first, bounded by the reader's window.
    pub latest_records: Vec<RecordSummary>,
    pub partial: PartialGroups,
}

impl StateSnapshot {
    /// Snapshot with every group read successfully and empty.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            clipboard_kind: ClipboardKind::Unknown,
            record_counts: RecordCounts::default(),
            image_file_count: 0,
            latest_records: Vec::new(),
            partial: PartialGroups::default(),
        }
    }

    /// Image records among `latest_records` whose file is missing.
    pub fn missing_artifacts(&self) -> impl Iterator<Item = &RecordSummary> {
        self.latest_records
            .iter()
            .filter(|record| record.artifact_present == Some(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_total_never_below_named_sum() {
        let mut by_kind = BTreeMap::new();
        by_kind.insert("text".to_string(), 4);
        by_kind.insert("image".to_string(), 3);

        let counts = RecordCounts::from_parts(by_kind.clone(), 5);
        assert_eq!(counts.total, 7);

        let counts = RecordCounts::from_parts(by_kind, 9);
        assert_eq!(counts.total, 9);
        assert_eq!(counts.get("html"), 0);
    }

    #[test]
    fn partial_groups_mark_and_query() {
        let mut partial = PartialGroups::default();
        assert!(!partial.any());

        partial.mark(SnapshotGroup::Files);
        assert!(partial.is_partial(SnapshotGroup::Files));
        assert!(!partial.is_partial(SnapshotGroup::Records));
        assert!(partial.any());
    }

    #[test]
    fn missing_artifacts_only_reports_confirmed_absences() {
        let now = Utc::now();
        let record = |id: &str, present: Option<bool>| RecordSummary {
            id: id.to_string(),
            kind: IMAGE_KIND.to_string(),
            truncated_value: String::new(),
            width: None,
            height: None,
            created_at: now,
            artifact_present: present,
        };

        let mut snapshot = StateSnapshot::empty(now);
        snapshot.latest_records = vec![
            record("a", Some(true)),
            record("b", Some(false)),
            record("c", None),
        ];

        let missing: Vec<_> = snapshot.missing_artifacts().map(|r| r.id.as_str()).collect();
        assert_eq!(missing, vec!["b"]);
    }
}
