use crate::analyzer::{DetectorSettings, FrameDiffScorer, MotionDetector, MotionScorer};
use crate::camera::{open_camera, FrameSource};
use crate::capture::{
    build_encoder, RecordingSession, SessionSettings, TimestampOverlay, VideoEncoder,
};
use crate::config::MotionCamConfig;
use crate::error::{MotionCamError, Result};
use crate::events::EventBus;
use crate::motion_log::MotionLog;
use crate::ring_buffer::{RingBuffer, RingBufferBuilder};
use crate::storage::{SpaceProbe, StatvfsProbe, StorageGuard};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owns the whole frame pipeline.
///
/// Ring buffer, detector and recording session are only ever touched from
/// the task driving [`MotionCamOrchestrator::run`], one frame at a time.
pub struct MotionCamOrchestrator {
    pub(super) config: MotionCamConfig,
    pub(super) source: Box<dyn FrameSource>,
    pub(super) scorer: Box<dyn MotionScorer>,
    pub(super) ring_buffer: RingBuffer,
    pub(super) detector: MotionDetector,
    pub(super) session: RecordingSession,
    pub(super) event_bus: EventBus,
    pub(super) cancellation_token: CancellationToken,
    pub(super) frames_processed: u64,
    pub(super) drained: bool,
}

impl MotionCamOrchestrator {
    /// Create an orchestrator wired to the real camera, scorer and writer
    pub async fn new(config: MotionCamConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub fn builder(config: MotionCamConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &MotionCamConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Cancelling this token requests a graceful drain
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    pub fn ring_buffer(&self) -> &RingBuffer {
        &self.ring_buffer
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

/// Assembles an orchestrator; unset collaborators get production defaults
pub struct OrchestratorBuilder {
    config: MotionCamConfig,
    source: Option<Box<dyn FrameSource>>,
    scorer: Option<Box<dyn MotionScorer>>,
    encoder: Option<Box<dyn VideoEncoder>>,
    probe: Option<Arc<dyn SpaceProbe>>,
    event_bus: Option<EventBus>,
    cancellation_token: Option<CancellationToken>,
}

impl OrchestratorBuilder {
    pub fn new(config: MotionCamConfig) -> Self {
        Self {
            config,
            source: None,
            scorer: None,
            encoder: None,
            probe: None,
            event_bus: None,
            cancellation_token: None,
        }
    }

    pub fn source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn scorer(mut self, scorer: Box<dyn MotionScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn encoder(mut self, encoder: Box<dyn VideoEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn space_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub async fn build(self) -> Result<MotionCamOrchestrator> {
        let config = self.config;
        config.validate()?;

        tokio::fs::create_dir_all(&config.recording.path)
            .await
            .map_err(|e| {
                MotionCamError::component(
                    "recording".to_string(),
                    format!(
                        "Failed to create recording directory {}: {}",
                        config.recording.path.display(),
                        e
                    ),
                )
            })?;

        let probe = self.probe.unwrap_or_else(|| Arc::new(StatvfsProbe));
        let guard = StorageGuard::with_probe(&config.recording, probe);
        guard.announce();

        let log = MotionLog::open(config.log.file.as_deref(), config.recording.timezone());
        let overlay = TimestampOverlay::from_config(&config.recording);
        let event_bus = self.event_bus.unwrap_or_default();

        let encoder = match self.encoder {
            Some(encoder) => encoder,
            None => build_encoder(&config)?,
        };

        let session = RecordingSession::new(
            SessionSettings::from_config(&config),
            encoder,
            guard,
            log,
            overlay,
            event_bus.clone(),
        );

        let ring_buffer = RingBufferBuilder::new()
            .capacity(config.detection.max_frames)
            .build()?;
        let detector = MotionDetector::new(DetectorSettings::from_config(&config.detection));
        let scorer = self
            .scorer
            .unwrap_or_else(|| Box::new(FrameDiffScorer::new()));

        let source = match self.source {
            Some(source) => source,
            None => open_camera(&config.camera).await?,
        };

        info!(
            "Recording to {} ({} buffered frames, at most {} frames per file)",
            config.recording.path.display(),
            config.detection.max_frames,
            config.recording.max_saved_frames
        );

        Ok(MotionCamOrchestrator {
            config,
            source,
            scorer,
            ring_buffer,
            detector,
            session,
            event_bus,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            frames_processed: 0,
            drained: false,
        })
    }
}
