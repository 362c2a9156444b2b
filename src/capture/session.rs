use super::encode::{VideoEncoder, VideoOutput};
use super::metadata::{save_metadata, RecordingMetadata, RecordingStats};
use super::overlay::TimestampOverlay;
use crate::config::MotionCamConfig;
use crate::events::{EventBus, MotionCamEvent};
use crate::frame::FrameData;
use crate::motion_log::MotionLog;
use crate::storage::{SpaceCheck, StorageGuard};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Output names are the local start time, e.g. `19-10-2026.14-03-59.avi`
pub const FILE_TIME_FORMAT: &str = "%d-%m-%Y.%H-%M-%S";

/// Why an output was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MotionEnded,
    Rotation,
    LowSpace,
    Shutdown,
    WriteFailure,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::MotionEnded => "motion ended",
            StopReason::Rotation => "max frames reached",
            StopReason::LowSpace => "low disk space",
            StopReason::Shutdown => "shutdown",
            StopReason::WriteFailure => "write failure",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    /// Not enough free space; nothing was created
    Refused,
    /// The output could not be created or the seed could not be written
    Failed,
    /// Free space ran out while the seed was split across outputs
    Halted,
    AlreadyOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Written,
    /// The full output was finalized and the frame started a new one
    Rotated,
    /// Free space ran out; the output was finalized without this frame
    Halted,
    /// The write failed; the output was finalized
    Aborted,
    NoSession,
}

/// Fixed parameters of every recording
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub output_dir: PathBuf,
    pub max_saved_frames: usize,
    pub timezone: Tz,
    pub save_metadata: bool,
}

impl SessionSettings {
    pub fn from_config(config: &MotionCamConfig) -> Self {
        Self {
            output_dir: config.recording.path.clone(),
            max_saved_frames: config.recording.max_saved_frames.max(1),
            timezone: config.recording.timezone(),
            save_metadata: config.recording.save_metadata,
        }
    }
}

struct ActiveOutput {
    output: Box<dyn VideoOutput>,
    saved_frame_count: usize,
    seed_frames: usize,
    started_at: DateTime<Utc>,
}

/// Owns at most one open output at a time.
///
/// Opening, every append, every rotation and close consult the storage
/// guard first. An output that reaches `max_saved_frames` stays open until
/// the next frame arrives, so a recording that ends exactly on the cap
/// never leaves an empty file behind. Problems stay inside the session:
/// callers only learn the outcome and decide what the detector should do.
pub struct RecordingSession {
    settings: SessionSettings,
    encoder: Box<dyn VideoEncoder>,
    guard: StorageGuard,
    log: MotionLog,
    overlay: Option<TimestampOverlay>,
    events: EventBus,
    active: Option<ActiveOutput>,
    last_stem: Option<(String, u32)>,
    stats: RecordingStats,
}

impl RecordingSession {
    pub fn new(
        settings: SessionSettings,
        encoder: Box<dyn VideoEncoder>,
        guard: StorageGuard,
        log: MotionLog,
        overlay: Option<TimestampOverlay>,
        events: EventBus,
    ) -> Self {
        Self {
            settings,
            encoder,
            guard,
            log,
            overlay,
            events,
            active: None,
            last_stem: None,
            stats: RecordingStats::default(),
        }
    }

    /// Start a recording seeded with the buffered frames, oldest first
    pub async fn open(&mut self, seed: Vec<FrameData>) -> OpenOutcome {
        if self.active.is_some() {
            warn!("Recording already open, ignoring start");
            return OpenOutcome::AlreadyOpen;
        }

        let check = self.guard.check();
        if !check.permits_write() {
            self.refuse(check).await;
            return OpenOutcome::Refused;
        }

        if let Err(e) = self.open_output(seed.len()).await {
            error!("Failed to start recording: {}", e);
            self.stats.write_failures += 1;
            return OpenOutcome::Failed;
        }

        for frame in &seed {
            if self.is_full() && !self.guard.check().permits_write() {
                self.halt().await;
                return OpenOutcome::Halted;
            }
            if self.write(frame).await == AppendOutcome::Aborted {
                return OpenOutcome::Failed;
            }
        }

        OpenOutcome::Opened
    }

    /// Write one frame to the open recording
    pub async fn append(&mut self, frame: &FrameData) -> AppendOutcome {
        if self.active.is_none() {
            return AppendOutcome::NoSession;
        }

        // also covers the rotation a full output needs before this frame
        if !self.guard.check().permits_write() {
            self.halt().await;
            return AppendOutcome::Halted;
        }

        self.write(frame).await
    }

    /// Finalize the open recording, if any, returning its frame count.
    /// Low space only warns here; finalization always happens.
    pub async fn close(&mut self, reason: StopReason) -> Option<usize> {
        if self.active.is_none() {
            debug!("No open recording to close ({})", reason);
            return None;
        }

        if !self.guard.check().permits_write() {
            warn!(
                "Disk space below {} GB while finalizing recording ({})",
                self.guard.min_free_gb(),
                reason
            );
        }
        self.finish(reason).await
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn saved_frame_count(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.saved_frame_count)
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.output.path())
    }

    pub fn stats(&self) -> RecordingStats {
        self.stats.clone()
    }

    fn is_full(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.saved_frame_count >= self.settings.max_saved_frames)
    }

    async fn halt(&mut self) {
        warn!(
            "Disk space below {} GB, halting recording",
            self.guard.min_free_gb()
        );
        self.log
            .log_line(&format!(
                "HDD space below {}GB. Recording halted.",
                self.guard.min_free_gb()
            ))
            .await;
        self.finish(StopReason::LowSpace).await;
    }

    async fn refuse(&mut self, check: SpaceCheck) {
        self.stats.refusals += 1;
        let free_gb = match check {
            SpaceCheck::Sufficient { free_gb } | SpaceCheck::Insufficient { free_gb } => {
                Some(free_gb)
            }
            SpaceCheck::Unsupported { .. } => None,
        };

        warn!(
            "Disk space below {} GB in {}, recording not started",
            self.guard.min_free_gb(),
            self.guard.path().display()
        );
        self.log
            .log_line(&format!(
                "HDD space below {}GB. Frames not saved.",
                self.guard.min_free_gb()
            ))
            .await;
        self.events
            .publish(MotionCamEvent::RecordingRefused { free_gb });
    }

    async fn open_output(&mut self, seed_frames: usize) -> crate::error::Result<()> {
        let path = self.next_output_path().await;
        let output = self.encoder.create_output(&path).await?;

        self.stats.outputs_opened += 1;
        info!("Started recording to {}", path.display());
        self.log
            .log_line(&format!("Started recording to {}", display_name(&path)))
            .await;
        self.events.publish(MotionCamEvent::RecordingStarted {
            path,
            seed_frames,
        });

        self.active = Some(ActiveOutput {
            output,
            saved_frame_count: 0,
            seed_frames,
            started_at: Utc::now(),
        });
        Ok(())
    }

    async fn write(&mut self, frame: &FrameData) -> AppendOutcome {
        if self.active.is_none() {
            return AppendOutcome::NoSession;
        }

        let rotated = self.is_full();
        if rotated {
            if let Err(e) = self.rotate().await {
                error!("Failed to continue recording after rotation: {}", e);
                self.stats.write_failures += 1;
                return AppendOutcome::Aborted;
            }
        }

        let Some(active) = self.active.as_mut() else {
            return AppendOutcome::NoSession;
        };

        let prepared = match &self.overlay {
            Some(overlay) => overlay.apply(frame).unwrap_or_else(|e| {
                debug!("Writing frame {} without timestamp: {}", frame.id, e);
                frame.clone()
            }),
            None => frame.clone(),
        };

        match active.output.write_frame(&prepared).await {
            Ok(()) => {
                active.saved_frame_count += 1;
                self.stats.frames_written += 1;
                if rotated {
                    AppendOutcome::Rotated
                } else {
                    AppendOutcome::Written
                }
            }
            Err(e) => {
                error!("Failed to write frame {}: {}", frame.id, e);
                self.stats.write_failures += 1;
                self.finish(StopReason::WriteFailure).await;
                AppendOutcome::Aborted
            }
        }
    }

    /// Replace the full output with a fresh one
    async fn rotate(&mut self) -> crate::error::Result<()> {
        self.stats.rotations += 1;
        self.finish(StopReason::Rotation).await;
        self.open_output(0).await
    }

    async fn finish(&mut self, reason: StopReason) -> Option<usize> {
        let active = self.active.take()?;
        let path = active.output.path().to_path_buf();
        let frames = active.saved_frame_count;

        if let Err(e) = active.output.finalize().await {
            error!("Failed to finalize {}: {}", path.display(), e);
            self.stats.finalize_failures += 1;
        }
        self.stats.outputs_finalized += 1;

        info!(
            "Stopped recording ({}), {} frames saved to {}",
            reason,
            frames,
            path.display()
        );
        self.log
            .log_line(&format!(
                "Stopped recording ({}), {} frames saved to {}",
                reason,
                frames,
                display_name(&path)
            ))
            .await;
        self.events.publish(MotionCamEvent::RecordingStopped {
            path: path.clone(),
            frames,
            reason: reason.to_string(),
        });

        if self.settings.save_metadata {
            let metadata = RecordingMetadata {
                file: path,
                started_at: active.started_at,
                ended_at: Utc::now(),
                seed_frames: active.seed_frames,
                total_frames: frames,
                stop_reason: reason.to_string(),
            };
            if let Err(e) = save_metadata(&metadata).await {
                warn!("Failed to save recording metadata: {}", e);
            }
        }

        Some(frames)
    }

    /// Time-derived path, suffixed when a name from the same second is taken
    async fn next_output_path(&mut self) -> PathBuf {
        let stem = Utc::now()
            .with_timezone(&self.settings.timezone)
            .format(FILE_TIME_FORMAT)
            .to_string();

        let mut n = match &self.last_stem {
            Some((last, k)) if *last == stem => k + 1,
            _ => 0,
        };

        loop {
            let name = if n == 0 {
                stem.clone()
            } else {
                format!("{}-{}", stem, n)
            };
            let file = match self.encoder.extension() {
                Some(ext) => format!("{}.{}", name, ext),
                None => name,
            };
            let path = self.settings.output_dir.join(file);

            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                self.last_stem = Some((stem, n));
                return path;
            }
            n += 1;
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
