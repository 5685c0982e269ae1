use anyhow::Result;
use chrono::Utc;

use super::types::{
    ClipboardKind, PartialGroups, RecordCounts, RecordSummary, SnapshotGroup, StateSnapshot,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Produces a fresh snapshot of the monitored system on every call.
///
/// Implementations must not fail: a group that cannot be read degrades to a
/// zero value and is flagged in `StateSnapshot::partial`.
pub trait SnapshotSource {
    fn capture(&mut self) -> StateSnapshot;
}

impl<F> SnapshotSource for F
where
    F: FnMut() -> StateSnapshot,
{
    fn capture(&mut self) -> StateSnapshot {
        self()
    }
}

/// Reports the content type currently held by the system clipboard.
pub trait ClipboardProbe {
    fn probe(&mut self) -> Result<ClipboardKind>;
}

/// Aggregates read from the record store in one pass.
#[derive(Debug, Clone, Default)]
pub struct RecordReading {
    pub counts: RecordCounts,
    pub latest: Vec<RecordSummary>,
}

/// Reads per-type record counts and the most recent records.
pub trait RecordCounter {
    fn read(&mut self) -> Result<RecordReading>;
}

/// Counts persisted image artifacts.
pub trait ArtifactCounter {
    fn count(&mut self) -> Result<u64>;
}

/// Combines the three group readers into one `SnapshotSource`.
pub struct CompositeSource<C, R, F> {
    clipboard: C,
    records: R,
    files: F,
}

impl<C, R, F> CompositeSource<C, R, F>
where
    C: ClipboardProbe,
    R: RecordCounter,
    F: ArtifactCounter,
{
    pub fn new(clipboard: C, records: R, files: F) -> Self {
        Self {
            clipboard,
            records,
            files,
        }
    }
}

impl<C, R, F> SnapshotSource for CompositeSource<C, R, F>
where
    C: ClipboardProbe,
    R: RecordCounter,
    F: ArtifactCounter,
{
    fn capture(&mut self) -> StateSnapshot {
        let timestamp = Utc::now();
        let mut partial = PartialGroups::default();

        let clipboard_kind = match self.clipboard.probe() {
            Ok(kind) => kind,
            Err(err) => {
                log_warn!("{} read failed: {err:#}", SnapshotGroup::Clipboard);
                partial.mark(SnapshotGroup::Clipboard);
                ClipboardKind::Unknown
            }
        };

        let reading = match self.records.read() {
            Ok(reading) => reading,
            Err(err) => {
                log_warn!("{} read failed: {err:#}", SnapshotGroup::Records);
                partial.mark(SnapshotGroup::Records);
                RecordReading::default()
            }
        };

        let image_file_count = match self.files.count() {
            Ok(count) => count,
            Err(err) => {
                log_warn!("{} read failed: {err:#}", SnapshotGroup::Files);
                partial.mark(SnapshotGroup::Files);
                0
            }
        };

        log_debug!(
            "snapshot: clipboard={} records={} files={} partial={:?}",
            clipboard_kind.as_str(),
            reading.counts.total,
            image_file_count,
            partial
        );

        StateSnapshot {
            timestamp,
            clipboard_kind,
            record_counts: reading.counts,
            image_file_count,
            latest_records: reading.latest,
            partial,
        }
    }
}
