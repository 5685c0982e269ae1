//! Actions that push content through the system clipboard so the monitored
//! pipeline has something to ingest.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use crate::diagnosis::Expectation;
use crate::snapshot::{ClipboardKind, ClipboardProbe};
use crate::utils::process::{run_command, run_command_with_input};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub const PROBE_TEXT_PREFIX: &str = "pastewatch-probe";

/// A one-shot trigger for the monitored pipeline. `perform` runs on a
/// blocking worker thread, hence the `Send` bound.
pub trait Stimulus: Send {
    fn describe(&self) -> String;

    /// What the pipeline should persist in response.
    fn expectation(&self) -> Expectation;

    /// Clipboard content type the action leaves behind.
    fn clipboard_kind(&self) -> ClipboardKind;

    fn perform(&mut self) -> Result<()>;
}

/// Copies a text marker via `pbcopy`.
#[derive(Debug, Clone)]
pub struct CopyText {
    content: String,
}

impl CopyText {
    /// `prefix` followed by a fresh UUID. The app deduplicates history on
    /// content, so copying an existing value only re-dates its row.
    pub fn tagged(prefix: &str) -> Self {
        Self {
            content: format!("{prefix}-{}", Uuid::new_v4()),
        }
    }

    /// A marker that cannot collide with earlier clipboard history entries.
    pub fn unique() -> Self {
        Self::tagged(PROBE_TEXT_PREFIX)
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl Stimulus for CopyText {
    fn describe(&self) -> String {
        format!("copy text {:?}", self.content)
    }

    fn expectation(&self) -> Expectation {
        Expectation::text()
    }

    fn clipboard_kind(&self) -> ClipboardKind {
        ClipboardKind::Text
    }

    fn perform(&mut self) -> Result<()> {
        run_command_with_input("pbcopy", &[], &self.content)
    }
}

/// Places a PNG file on the clipboard as `«class PNGf»` data.
#[derive(Debug, Clone)]
pub struct CopyImageFile {
    path: PathBuf,
}

impl CopyImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Stimulus for CopyImageFile {
    fn describe(&self) -> String {
        format!("copy image {}", self.path.display())
    }

    fn expectation(&self) -> Expectation {
        Expectation::image()
    }

    fn clipboard_kind(&self) -> ClipboardKind {
        ClipboardKind::Image
    }

    fn perform(&mut self) -> Result<()> {
        let path = self
            .path
            .canonicalize()
            .with_context(|| format!("image {} not found", self.path.display()))?;
        let path = path
            .to_str()
            .with_context(|| format!("image path {} is not valid UTF-8", path.display()))?;

        let script = format!(
            "set the clipboard to (read file POSIX file {} as «class PNGf»)",
            applescript_string(path)
        );
        run_command("osascript", &["-e", &script]).map(|_| ())
    }
}

/// Quotes `value` as an AppleScript string literal.
fn applescript_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '\\' || ch == '"' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Interactive-free screenshot of the main display straight to the clipboard.
#[derive(Debug, Clone, Default)]
pub struct ScreenCapture;

impl Stimulus for ScreenCapture {
    fn describe(&self) -> String {
        "screenshot to clipboard".to_string()
    }

    fn expectation(&self) -> Expectation {
        Expectation::image()
    }

    fn clipboard_kind(&self) -> ClipboardKind {
        ClipboardKind::Image
    }

    fn perform(&mut self) -> Result<()> {
        run_command("screencapture", &["-c", "-x"]).map(|_| ())
    }
}

/// Fails the wrapped stimulus when the clipboard demonstrably does not hold
/// the content it should have placed there. An unreadable clipboard is not
/// treated as a failure.
pub struct Verified<S, P> {
    inner: S,
    probe: P,
}

impl<S, P> Verified<S, P>
where
    S: Stimulus,
    P: ClipboardProbe,
{
    pub fn new(inner: S, probe: P) -> Self {
        Self { inner, probe }
    }
}

impl<S, P> Stimulus for Verified<S, P>
where
    S: Stimulus,
    P: ClipboardProbe + Send,
{
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn expectation(&self) -> Expectation {
        self.inner.expectation()
    }

    fn clipboard_kind(&self) -> ClipboardKind {
        self.inner.clipboard_kind()
    }

    fn perform(&mut self) -> Result<()> {
        self.inner.perform()?;

        let wanted = self.inner.clipboard_kind();
        match self.probe.probe() {
            Ok(found) if found == wanted => {
                log_debug!("clipboard holds {} after stimulus", found.as_str());
                Ok(())
            }
            Ok(found) => bail!(
                "stimulus did not reach the system clipboard: expected {}, found {}",
                wanted.as_str(),
                found.as_str()
            ),
            Err(err) => {
                log_warn!("could not verify clipboard after stimulus: {err:#}");
                Ok(())
            }
        }
    }
}
