use super::{MotionCamOrchestrator, ShutdownReason};
use crate::analyzer::Trigger;
use crate::capture::{AppendOutcome, OpenOutcome, StopReason};
use crate::error::Result;
use crate::events::MotionCamEvent;
use crate::frame::FrameData;
use tracing::{debug, error, info, warn};

impl MotionCamOrchestrator {
    /// Wait for the next frame unless termination is requested first.
    ///
    /// `Ok(None)` means the token was cancelled.
    async fn next_frame_or_cancel(&mut self) -> Result<Option<FrameData>> {
        let token = self.cancellation_token.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => Ok(None),
            frame = self.source.next_frame() => frame.map(Some),
        }
    }

    fn camera_lost(&self, error: &crate::error::MotionCamError) -> ShutdownReason {
        error!("Frame source failed: {}", error);
        self.event_bus.publish(MotionCamEvent::CameraLost {
            error: error.to_string(),
        });
        ShutdownReason::CameraLost(error.to_string())
    }

    /// Fill the ring buffer before any frame is scored
    pub(super) async fn warm_up(&mut self) -> Option<ShutdownReason> {
        let capacity = self.ring_buffer.capacity();
        info!("Filling frame buffer with {} frames", capacity);

        while !self.ring_buffer.is_full() {
            match self.next_frame_or_cancel().await {
                Ok(Some(frame)) => self.ring_buffer.push(frame),
                Ok(None) => return Some(ShutdownReason::Requested),
                Err(e) => return Some(self.camera_lost(&e)),
            }
        }

        debug!("Frame buffer ready");
        None
    }

    /// Process frames until termination is requested or the source fails
    pub(super) async fn run_pipeline(&mut self) -> ShutdownReason {
        if let Some(reason) = self.warm_up().await {
            return reason;
        }

        loop {
            match self.next_frame_or_cancel().await {
                Ok(Some(frame)) => self.process_frame(frame).await,
                Ok(None) => return ShutdownReason::Requested,
                Err(e) => return self.camera_lost(&e),
            }
        }
    }

    /// Score, classify and possibly record one frame, then buffer it
    pub(super) async fn process_frame(&mut self, frame: FrameData) {
        let score = match self.ring_buffer.latest() {
            Some(previous) => match self.scorer.score(previous, &frame) {
                Ok(score) => score,
                Err(e) => {
                    warn!("Scoring frame {} failed, treating as still: {}", frame.id, e);
                    0.0
                }
            },
            None => 0.0,
        };

        match self.detector.process(score) {
            Some(Trigger::Start) => {
                info!("Motion detected at frame {} (score {})", frame.id, score);
                self.event_bus.publish(MotionCamEvent::MotionStarted {
                    frame_id: frame.id,
                    score,
                });

                let seed = self.ring_buffer.snapshot();
                match self.session.open(seed).await {
                    OpenOutcome::Opened => self.record(&frame).await,
                    OpenOutcome::Halted => self.stop_for_space(frame.id),
                    OpenOutcome::Refused | OpenOutcome::Failed | OpenOutcome::AlreadyOpen => {}
                }
            }
            Some(Trigger::Stop) => {
                self.record(&frame).await;
                info!("Motion ended at frame {}", frame.id);
                self.event_bus.publish(MotionCamEvent::MotionStopped {
                    frame_id: frame.id,
                    forced: false,
                });
                self.session.close(StopReason::MotionEnded).await;
            }
            None if self.detector.is_recording() => self.record(&frame).await,
            None => {}
        }

        self.ring_buffer.push(frame);
        self.frames_processed += 1;
    }

    async fn record(&mut self, frame: &FrameData) {
        match self.session.append(frame).await {
            AppendOutcome::Halted => self.stop_for_space(frame.id),
            AppendOutcome::Aborted => {
                debug!("Recording aborted at frame {}, waiting for motion to end", frame.id);
            }
            AppendOutcome::Written | AppendOutcome::Rotated | AppendOutcome::NoSession => {}
        }
    }

    /// Space ran out mid-recording; end the motion event without waiting for stillness
    fn stop_for_space(&mut self, frame_id: u64) {
        if self.detector.force_stop().is_some() {
            self.event_bus.publish(MotionCamEvent::MotionStopped {
                frame_id,
                forced: true,
            });
        }
    }
}
