//! Heart-rate readings from a text file written by a companion app.

use super::{BiometricSource, SourceError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};

/// Reads the first line of a file as the current heart rate.
///
/// Liveness is tied to a named process; an empty name skips the check.
pub struct FileHeartRateSource {
    path: PathBuf,
    process_name: String,
    system: Arc<Mutex<System>>,
}

impl FileHeartRateSource {
    pub fn new(path: impl Into<PathBuf>, process_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            process_name: process_name.into(),
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Accept the first line only when it is a plain decimal number.
pub fn parse_reading(content: &str) -> Option<u32> {
    let line = content.lines().next()?.trim();
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    line.parse().ok()
}

#[async_trait]
impl BiometricSource for FileHeartRateSource {
    async fn is_live(&self) -> Result<bool, SourceError> {
        if self.process_name.trim().is_empty() {
            return Ok(true);
        }

        let system = Arc::clone(&self.system);
        let wanted = self.process_name.to_lowercase();

        // Process enumeration is blocking and can take a while.
        tokio::task::spawn_blocking(move || {
            let mut system = system.lock();
            system.refresh_processes(ProcessesToUpdate::All, true);
            system
                .processes()
                .values()
                .any(|p| p.name().to_string_lossy().to_lowercase() == wanted)
        })
        .await
        .map_err(|e| SourceError::Io(std::io::Error::other(e)))
    }

    async fn read_value(&self) -> Result<Option<u32>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_reading(&content))
    }
}
