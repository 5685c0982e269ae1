//! Concrete readers for the monitored clipboard manager on macOS.

pub mod app_presence;
pub mod artifacts;
pub mod clipboard;

pub use app_presence::{AppPresence, AppPresenceProbe};
pub use artifacts::ImageDirectory;
pub use clipboard::OsaScriptClipboard;

use crate::snapshot::CompositeSource;
use crate::store::RecordStore;

/// The source wired up by the CLI: clipboard via `osascript`, records from the
/// history database, images from the image directory.
pub type SystemSource = CompositeSource<OsaScriptClipboard, RecordStore, ImageDirectory>;
