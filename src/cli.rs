use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tokio::{task, time};
use tokio_util::sync::CancellationToken;

use crate::diagnosis::Category;
use crate::monitor::{Monitor, MonitorConfig};
use crate::probes::{AppPresenceProbe, ImageDirectory, OsaScriptClipboard, SystemSource};
use crate::report::{DiagnosisReport, Reporter, SnapshotReport};
use crate::settings::{default_settings_path, ResolvedPaths, Settings, SettingsStore};
use crate::snapshot::{CompositeSource, SnapshotSource};
use crate::stimulus::{CopyImageFile, CopyText, ScreenCapture, Stimulus, Verified};
use crate::store::RecordStore;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const EXIT_OK: u8 = 0;
/// A pipeline failure verdict, or an operational error before a verdict.
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_STIMULUS_FAILED: u8 = 2;
pub const EXIT_INDETERMINATE: u8 = 3;
pub const EXIT_CANCELLED: u8 = 130;

/// Checks whether the clipboard manager records what lands on the clipboard.
#[derive(Parser, Debug)]
#[command(name = "pastewatch", version, about)]
pub struct Cli {
    /// Settings file. Defaults to ~/.config/pastewatch/settings.json.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// History database of the clipboard manager.
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Directory the clipboard manager saves images into.
    #[arg(long, value_name = "DIR", global = true)]
    pub images: Option<PathBuf>,

    /// Give up waiting for the pipeline after this many seconds.
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Poll interval in milliseconds.
    #[arg(long, value_name = "MS", global = true)]
    pub interval: Option<u64>,

    /// Process name of the clipboard manager.
    #[arg(long, value_name = "NAME", global = true)]
    pub app: Option<String>,

    /// Emit JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Copy text and wait for a text record.
    Text {
        /// Text to copy, followed by a unique suffix so every run adds a new
        /// history entry. Defaults to a generated marker.
        #[arg(long)]
        content: Option<String>,
    },
    /// Copy a PNG file and wait for an image record.
    Image { path: PathBuf },
    /// Take a screenshot to the clipboard and wait for an image record.
    Screenshot,
    /// Wait for any new record without touching the clipboard.
    Watch,
    /// Print the current state once.
    Snapshot,
    /// Print the effective settings.
    Config {
        /// Write the effective settings, overrides included, to the settings file.
        #[arg(long)]
        save: bool,
    },
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    fn settings_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(default_settings_path)
    }

    /// Command-line flags take precedence over the settings file.
    pub fn apply_overrides(&self, mut settings: Settings) -> Settings {
        if let Some(db) = &self.db {
            settings.database_path = Some(db.clone());
        }
        if let Some(images) = &self.images {
            settings.images_dir = Some(images.clone());
        }
        if let Some(app) = &self.app {
            settings.app_process_name = app.clone();
        }
        if let Some(timeout) = self.timeout {
            settings.monitor.timeout_secs = timeout;
        }
        if let Some(interval) = self.interval {
            settings.monitor.poll_interval_ms = interval;
        }
        settings
    }
}

pub fn exit_code(category: &Category) -> u8 {
    match category {
        Category::Healthy => EXIT_OK,
        Category::StimulusFailed { .. } => EXIT_STIMULUS_FAILED,
        Category::Indeterminate { .. } => EXIT_INDETERMINATE,
        Category::Cancelled => EXIT_CANCELLED,
        Category::PersistenceGap
        | Category::MisclassifiedRecord
        | Category::NoActivity
        | Category::Pending => EXIT_FAILURE,
    }
}

/// Stimulus for a monitoring command, wrapped so a copy that never reached
/// the clipboard fails fast. `watch` has none.
pub fn build_stimulus(command: &Command) -> Option<Box<dyn Stimulus>> {
    let probe = OsaScriptClipboard::new();
    match command {
        Command::Text { content } => {
            let text = match content {
                Some(content) => CopyText::tagged(content),
                None => CopyText::unique(),
            };
            Some(Box::new(Verified::new(text, probe)))
        }
        Command::Image { path } => Some(Box::new(Verified::new(
            CopyImageFile::new(path.clone()),
            probe,
        ))),
        Command::Screenshot => Some(Box::new(Verified::new(ScreenCapture, probe))),
        Command::Watch | Command::Snapshot | Command::Config { .. } => None,
    }
}

pub fn system_source(paths: &ResolvedPaths, config: &MonitorConfig) -> SystemSource {
    let records = RecordStore::new(
        paths.database.clone(),
        config.latest_records_window(),
        config.value_preview_chars,
    )
    .with_images_dir(paths.images.clone());

    CompositeSource::new(
        OsaScriptClipboard::new(),
        records,
        ImageDirectory::new(paths.images.clone()),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EffectiveSettings<'a> {
    settings_file: Option<&'a PathBuf>,
    settings: &'a Settings,
    resolved: Option<ResolvedPaths>,
}

/// Runs one command and returns the process exit code.
pub async fn dispatch(
    cli: &Cli,
    reporter: &mut dyn Reporter,
    cancel: CancellationToken,
) -> Result<u8> {
    let settings_path = cli.settings_path();
    let mut store = settings_path.clone().map(SettingsStore::new).transpose()?;
    let base = store
        .as_ref()
        .map(|store| store.settings().clone())
        .unwrap_or_default();
    let settings = cli.apply_overrides(base);

    if let Command::Config { save } = &cli.command {
        if *save {
            let Some(store) = store.as_mut() else {
                bail!("no settings file location; pass --config");
            };
            store.update(settings.clone())?;
            log_info!("saved settings to {}", store.path().display());
        }
        let document = EffectiveSettings {
            settings_file: settings_path.as_ref(),
            settings: &settings,
            resolved: settings.resolve_paths().ok(),
        };
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(EXIT_OK);
    }

    let paths = settings.resolve_paths()?;
    log_debug!(
        "database {} images {}",
        paths.database.display(),
        paths.images.display()
    );

    let app = AppPresenceProbe::new(settings.app_process_name.clone()).scan();
    if !app.is_running() {
        log_warn!("{} does not appear to be running", app.process_name);
    }

    let mut source = system_source(&paths, &settings.monitor);

    if cli.command == Command::Snapshot {
        let limit = settings.monitor.timeout();
        let worker = task::spawn_blocking(move || source.capture());
        let snapshot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(EXIT_CANCELLED),
            joined = time::timeout(limit, worker) => match joined {
                Ok(joined) => joined.context("snapshot capture panicked")?,
                Err(_) => bail!("snapshot capture did not finish within {}s", limit.as_secs()),
            },
        };
        reporter.snapshot(&SnapshotReport {
            snapshot,
            app: Some(app),
        })?;
        return Ok(EXIT_OK);
    }

    let monitor = Monitor::new(settings.monitor.clone())?;
    let stimulus = build_stimulus(&cli.command);
    let description = stimulus.as_ref().map(|stimulus| stimulus.describe());

    let result = monitor.run(source, stimulus, &cancel).await;

    let code = exit_code(&result.category);
    reporter.diagnosis(&DiagnosisReport {
        stimulus: description,
        result,
        app: Some(app),
    })?;
    Ok(code)
}
