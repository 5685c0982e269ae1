pub mod source;
pub mod types;

pub use source::{
    ArtifactCounter, ClipboardProbe, CompositeSource, RecordCounter, RecordReading, SnapshotSource,
};
pub use types::{
    ClipboardKind, PartialGroups, RecordCounts, RecordSummary, SnapshotGroup, StateSnapshot,
    IMAGE_KIND, TEXT_KIND,
};
