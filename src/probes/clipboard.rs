use anyhow::{bail, Result};

use crate::snapshot::{ClipboardKind, ClipboardProbe};

/// AppleScript that reports the richest type the clipboard can be read as.
/// Text is tried first, matching how the monitored application prioritises.
const CLIPBOARD_TYPE_SCRIPT: &str = r#"try
    get the clipboard as string
    return "text"
on error
    try
        get the clipboard as «class PNGf»
        return "image"
    on error
        try
            get the clipboard as «class TIFF»
            return "tiff"
        on error
            return "other"
        end try
    end try
end try"#;

/// Asks the system clipboard for its content type through `osascript`.
#[derive(Debug, Clone, Default)]
pub struct OsaScriptClipboard;

impl OsaScriptClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl ClipboardProbe for OsaScriptClipboard {
    #[cfg(target_os = "macos")]
    fn probe(&mut self) -> Result<ClipboardKind> {
        let output = crate::utils::process::run_command("osascript", &["-e", CLIPBOARD_TYPE_SCRIPT])?;
        parse_clipboard_type(&output)
    }

    #[cfg(not(target_os = "macos"))]
    fn probe(&mut self) -> Result<ClipboardKind> {
        let _ = CLIPBOARD_TYPE_SCRIPT;
        bail!("clipboard type probing is only available on macOS")
    }
}

pub fn parse_clipboard_type(output: &str) -> Result<ClipboardKind> {
    match output.trim() {
        "text" => Ok(ClipboardKind::Text),
        "image" | "tiff" => Ok(ClipboardKind::Image),
        "other" => Ok(ClipboardKind::Other),
        unexpected => bail!("unexpected clipboard probe output {unexpected:?}"),
    }
}
