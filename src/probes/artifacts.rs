use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::ImageFormat;

use crate::snapshot::ArtifactCounter;

const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Counts image files the monitored application has persisted.
#[derive(Debug, Clone)]
pub struct ImageDirectory {
    dir: PathBuf,
}

impl ImageDirectory {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl ArtifactCounter for ImageDirectory {
    /// A directory that does not exist yet holds zero images; the application
    /// creates it with the first saved image.
    fn count(&mut self) -> Result<u64> {
        if !self.dir.exists() {
            log_debug!("image directory {} does not exist yet", self.dir.display());
            return Ok(0);
        }

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?;

        let mut count = 0u64;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to read entry in {}", self.dir.display()))?;
            let path = entry.path();
            if is_image_artifact(&path) {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn is_image_artifact(path: &Path) -> bool {
    path.is_file() && ImageFormat::from_path(path).is_ok()
}
