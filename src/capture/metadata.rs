use crate::error::{MotionCamError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Counters for the recording side of the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingStats {
    pub outputs_opened: u64,
    pub outputs_finalized: u64,
    pub frames_written: u64,
    pub rotations: u64,
    pub refusals: u64,
    pub write_failures: u64,
    pub finalize_failures: u64,
}

/// Sidecar describing a finished output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub file: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub seed_frames: usize,
    pub total_frames: usize,
    pub stop_reason: String,
}

/// `<output>.json` next to the output itself
pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

pub(crate) async fn save_metadata(metadata: &RecordingMetadata) -> Result<PathBuf> {
    let metadata_json = serde_json::to_string_pretty(metadata).map_err(|e| {
        MotionCamError::component(
            "recording".to_string(),
            format!("Failed to serialize metadata: {}", e),
        )
    })?;

    let metadata_path = sidecar_path(&metadata.file);
    fs::write(&metadata_path, metadata_json).await.map_err(|e| {
        MotionCamError::component(
            "recording".to_string(),
            format!("Failed to write metadata file: {}", e),
        )
    })?;

    debug!("Saved metadata to {}", metadata_path.display());
    Ok(metadata_path)
}
