//! Rendering of diagnosis results and snapshots for people and scripts.

use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;

use crate::diagnosis::{Category, DiagnosisResult, StateDelta};
use crate::probes::AppPresence;
use crate::snapshot::{RecordSummary, SnapshotGroup, StateSnapshot};

/// Everything known about one finished monitor run.
#[derive(Debug, Clone)]
pub struct DiagnosisReport {
    pub stimulus: Option<String>,
    pub result: DiagnosisResult,
    pub app: Option<AppPresence>,
}

#[derive(Debug, Clone)]
pub struct SnapshotReport {
    pub snapshot: StateSnapshot,
    pub app: Option<AppPresence>,
}

pub trait Reporter {
    fn diagnosis(&mut self, report: &DiagnosisReport) -> Result<()>;
    fn snapshot(&mut self, report: &SnapshotReport) -> Result<()>;
}

/// Static follow-up steps for a verdict. App presence only refines
/// `NoActivity`; it never changes the verdict itself.
pub fn remediation(category: &Category, app: Option<&AppPresence>) -> Vec<&'static str> {
    match category {
        Category::Healthy | Category::Pending | Category::Cancelled => Vec::new(),
        Category::NoActivity => {
            if app.is_some_and(|app| !app.is_running()) {
                vec!["The clipboard manager is not running. Start it and run the check again."]
            } else {
                vec![
                    "Grant the clipboard manager Accessibility permission: System Settings > Privacy & Security > Accessibility, enable it, then restart the app.",
                    "Clipboard listening is shared by all content types, so a missing text record means images are not recorded either.",
                ]
            }
        }
        Category::PersistenceGap => vec![
            "An image file was saved without a history row. Check the app logs for database write errors.",
            "Confirm the database is writable and not locked by another process.",
        ],
        Category::MisclassifiedRecord => vec![
            "The image was recorded under another type. Check the clipboard type priority: image content without text should be stored as an image.",
        ],
        Category::Indeterminate { .. } => vec![
            "Some sources could not be read. Verify the database path and image directory (--db, --images) and rerun with -v for details.",
        ],
        Category::StimulusFailed { .. } => vec![
            "The test content never reached the clipboard. Check that pbcopy, osascript and screencapture work from this terminal and that it has Automation permission.",
        ],
    }
}

pub struct ConsoleReporter<W> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn app_line(&mut self, app: Option<&AppPresence>) -> io::Result<()> {
        let Some(app) = app else {
            return Ok(());
        };
        if app.is_running() {
            let pids: Vec<String> = app.pids.iter().map(u32::to_string).collect();
            writeln!(self.out, "app: {} running (pid {})", app.process_name, pids.join(", "))
        } else {
            writeln!(self.out, "app: {} not running", app.process_name)
        }
    }

    fn evidence(&mut self, delta: &StateDelta) -> io::Result<()> {
        match &delta.counts_delta {
            Some(counts) => {
                let kinds: Vec<String> = counts
                    .by_kind
                    .iter()
                    .filter(|(_, change)| **change != 0)
                    .map(|(kind, change)| format!("{kind} {change:+}"))
                    .collect();
                if kinds.is_empty() {
                    writeln!(self.out, "records: total {:+}", counts.total)?;
                } else {
                    writeln!(
                        self.out,
                        "records: total {:+} ({})",
                        counts.total,
                        kinds.join(", ")
                    )?;
                }
            }
            None => writeln!(self.out, "records: unreadable")?,
        }

        match delta.image_file_delta {
            Some(change) => writeln!(self.out, "image files: {change:+}")?,
            None => writeln!(self.out, "image files: unreadable")?,
        }

        match delta.clipboard_kind_changed {
            Some(true) => writeln!(self.out, "clipboard type: changed")?,
            Some(false) => writeln!(self.out, "clipboard type: unchanged")?,
            None => writeln!(self.out, "clipboard type: unreadable")?,
        }

        if !delta.excluded.is_empty() {
            writeln!(self.out, "excluded: {}", join_groups(&delta.excluded))?;
        }

        if !delta.new_records.is_empty() {
            writeln!(self.out, "new records:")?;
            for record in &delta.new_records {
                self.record_line(record)?;
            }
        }
        Ok(())
    }

    fn record_line(&mut self, record: &RecordSummary) -> io::Result<()> {
        let size = match (record.width, record.height) {
            (Some(width), Some(height)) => format!(" {width}x{height}"),
            _ => String::new(),
        };
        let missing = if record.artifact_present == Some(false) {
            " [file missing]"
        } else {
            ""
        };
        writeln!(
            self.out,
            "  {} [{}]{} {:?}{}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.kind,
            size,
            record.truncated_value,
            missing
        )
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn diagnosis(&mut self, report: &DiagnosisReport) -> Result<()> {
        let result = &report.result;
        writeln!(
            self.out,
            "verdict: {} after {:.1}s",
            result.category.as_str(),
            result.elapsed.as_secs_f64()
        )?;

        match &result.category {
            Category::StimulusFailed { reason } => writeln!(self.out, "reason: {reason}")?,
            Category::Indeterminate { partial_groups } if !partial_groups.is_empty() => {
                writeln!(self.out, "untrusted: {}", join_groups(partial_groups))?
            }
            _ => {}
        }

        if let Some(stimulus) = &report.stimulus {
            writeln!(self.out, "stimulus: {stimulus}")?;
        }
        if let Some(delta) = &result.evidence {
            self.evidence(delta)?;
        }
        self.app_line(report.app.as_ref())?;

        let hints = remediation(&result.category, report.app.as_ref());
        if !hints.is_empty() {
            writeln!(self.out, "next steps:")?;
            for hint in hints {
                writeln!(self.out, "  - {hint}")?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn snapshot(&mut self, report: &SnapshotReport) -> Result<()> {
        let snapshot = &report.snapshot;
        writeln!(self.out, "snapshot at {}", snapshot.timestamp.to_rfc3339())?;
        writeln!(self.out, "clipboard: {}", snapshot.clipboard_kind.as_str())?;

        let kinds: Vec<String> = snapshot
            .record_counts
            .by_kind
            .iter()
            .map(|(kind, count)| format!("{kind} {count}"))
            .collect();
        writeln!(
            self.out,
            "records: {} total ({})",
            snapshot.record_counts.total,
            kinds.join(", ")
        )?;
        writeln!(self.out, "image files: {}", snapshot.image_file_count)?;

        if !snapshot.latest_records.is_empty() {
            writeln!(self.out, "latest records:")?;
            for record in &snapshot.latest_records {
                self.record_line(record)?;
            }
        }

        let missing = snapshot.missing_artifacts().count();
        if missing > 0 {
            writeln!(self.out, "missing image files: {missing}")?;
        }

        let partial: Vec<SnapshotGroup> = SnapshotGroup::ALL
            .into_iter()
            .filter(|group| snapshot.partial.is_partial(*group))
            .collect();
        if !partial.is_empty() {
            writeln!(self.out, "unreadable: {}", join_groups(&partial))?;
        }

        self.app_line(report.app.as_ref())?;
        self.out.flush()?;
        Ok(())
    }
}

fn join_groups(groups: &[SnapshotGroup]) -> String {
    groups
        .iter()
        .map(SnapshotGroup::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonDiagnosis<'a> {
    verdict: &'static str,
    category: &'a Category,
    elapsed_ms: u64,
    stimulus: Option<&'a str>,
    evidence: Option<&'a StateDelta>,
    app: Option<&'a AppPresence>,
    next_steps: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSnapshot<'a> {
    snapshot: &'a StateSnapshot,
    missing_artifacts: Vec<&'a str>,
    app: Option<&'a AppPresence>,
}

/// One JSON document per report, newline terminated.
pub struct JsonReporter<W> {
    out: W,
}

impl JsonReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, value)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn diagnosis(&mut self, report: &DiagnosisReport) -> Result<()> {
        let result = &report.result;
        let document = JsonDiagnosis {
            verdict: result.category.as_str(),
            category: &result.category,
            elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            stimulus: report.stimulus.as_deref(),
            evidence: result.evidence.as_ref(),
            app: report.app.as_ref(),
            next_steps: remediation(&result.category, report.app.as_ref()),
        };
        self.emit(&document)
    }

    fn snapshot(&mut self, report: &SnapshotReport) -> Result<()> {
        let document = JsonSnapshot {
            snapshot: &report.snapshot,
            missing_artifacts: report
                .snapshot
                .missing_artifacts()
                .map(|record| record.id.as_str())
                .collect(),
            app: report.app.as_ref(),
        };
        self.emit(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::CountsDelta;
    use crate::snapshot::{RecordCounts, IMAGE_KIND};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn healthy_report() -> DiagnosisReport {
        let mut by_kind = BTreeMap::new();
        by_kind.insert("image".to_string(), 0);
        by_kind.insert("text".to_string(), 1);

        DiagnosisReport {
            stimulus: Some("copy text \"hello\"".into()),
            result: DiagnosisResult {
                category: Category::Healthy,
                evidence: Some(StateDelta {
                    counts_delta: Some(CountsDelta { by_kind, total: 1 }),
                    image_file_delta: Some(0),
                    clipboard_kind_changed: Some(true),
                    new_records: Vec::new(),
                    excluded: Vec::new(),
                }),
                elapsed: Duration::from_millis(1_500),
            },
            app: Some(AppPresence {
                process_name: "EcoPaste".into(),
                pids: vec![42],
            }),
        }
    }

    fn render(report: &DiagnosisReport) -> String {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.diagnosis(report).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn console_renders_verdict_and_evidence() {
        let text = render(&healthy_report());
        assert!(text.starts_with("verdict: healthy after 1.5s\n"));
        assert!(text.contains("records: total +1 (text +1)"));
        assert!(text.contains("image files: +0"));
        assert!(text.contains("clipboard type: changed"));
        assert!(text.contains("app: EcoPaste running (pid 42)"));
        assert!(!text.contains("next steps"));
    }

    #[test]
    fn console_marks_unreadable_groups() {
        let mut report = healthy_report();
        report.result.category = Category::Indeterminate {
            partial_groups: vec![SnapshotGroup::Records],
        };
        if let Some(delta) = report.result.evidence.as_mut() {
            delta.counts_delta = None;
            delta.excluded = vec![SnapshotGroup::Records];
        }

        let text = render(&report);
        assert!(text.contains("untrusted: records"));
        assert!(text.contains("records: unreadable"));
        assert!(text.contains("next steps:"));
    }

    #[test]
    fn no_activity_hint_depends_on_app_presence() {
        let running = AppPresence {
            process_name: "EcoPaste".into(),
            pids: vec![7],
        };
        let stopped = AppPresence {
            process_name: "EcoPaste".into(),
            pids: Vec::new(),
        };

        let hints = remediation(&Category::NoActivity, Some(&running));
        assert!(hints[0].contains("Accessibility"));

        let hints = remediation(&Category::NoActivity, Some(&stopped));
        assert_eq!(hints.len(), 1);
        assert!(hints[0].contains("not running"));

        assert!(remediation(&Category::Healthy, Some(&stopped)).is_empty());
    }

    #[test]
    fn json_report_uses_milliseconds_and_tagged_category() {
        let mut report = healthy_report();
        report.result.category = Category::StimulusFailed {
            reason: "pbcopy missing".into(),
        };

        let mut reporter = JsonReporter::new(Vec::new());
        reporter.diagnosis(&report).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&reporter.into_inner()).unwrap();

        assert_eq!(value["verdict"], "stimulus-failed");
        assert_eq!(value["category"]["kind"], "stimulusFailed");
        assert_eq!(value["category"]["reason"], "pbcopy missing");
        assert_eq!(value["elapsedMs"], 1500);
        assert_eq!(value["evidence"]["countsDelta"]["total"], 1);
        assert_eq!(value["app"]["pids"][0], 42);
        assert!(value["nextSteps"].as_array().is_some_and(|steps| !steps.is_empty()));
    }

    #[test]
    fn snapshot_lists_missing_files() {
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let mut snapshot = StateSnapshot::empty(timestamp);
        let mut by_kind = BTreeMap::new();
        by_kind.insert(IMAGE_KIND.to_string(), 1);
        snapshot.record_counts = RecordCounts::from_parts(by_kind, 1);
        snapshot.image_file_count = 0;
        snapshot.partial.clipboard = true;
        snapshot.latest_records = vec![RecordSummary {
            id: "rec-1".into(),
            kind: IMAGE_KIND.into(),
            truncated_value: "/images/a.png".into(),
            width: Some(640),
            height: Some(480),
            created_at: timestamp,
            artifact_present: Some(false),
        }];
        let report = SnapshotReport {
            snapshot,
            app: None,
        };

        let mut console = ConsoleReporter::new(Vec::new());
        console.snapshot(&report).unwrap();
        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.contains("records: 1 total (image 1)"));
        assert!(text.contains("[image] 640x480"));
        assert!(text.contains("[file missing]"));
        assert!(text.contains("missing image files: 1"));
        assert!(text.contains("unreadable: clipboard"));

        let mut json = JsonReporter::new(Vec::new());
        json.snapshot(&report).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json.into_inner()).unwrap();
        assert_eq!(value["missingArtifacts"][0], "rec-1");
        assert_eq!(value["snapshot"]["imageFileCount"], 0);
    }
}
