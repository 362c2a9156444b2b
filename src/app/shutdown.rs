use super::{MotionCamOrchestrator, ShutdownReason};
use crate::capture::StopReason;
use crate::error::Result;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const CAMERA_STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl MotionCamOrchestrator {
    /// Close any open recording and release the camera. Runs at most once.
    pub async fn shutdown(&mut self, reason: ShutdownReason) -> Result<i32> {
        if self.drained {
            warn!("Shutdown already completed");
            return Ok(reason.exit_code());
        }
        self.drained = true;

        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let mut exit_code = reason.exit_code();

        let failures_before = self.session.stats().finalize_failures;
        if let Some(frames) = self.session.close(StopReason::Shutdown).await {
            info!("Closed open recording with {} frames", frames);
        }
        if self.session.stats().finalize_failures > failures_before {
            error!("Open recording could not be finalized cleanly");
            exit_code = 1;
        }

        match timeout(CAMERA_STOP_TIMEOUT, self.source.stop()).await {
            Ok(Ok(())) => info!("Camera stopped"),
            Ok(Err(e)) => {
                error!("Error stopping camera: {}", e);
                exit_code = 1;
            }
            Err(_) => {
                error!("Camera stop timeout");
                exit_code = 1;
            }
        }

        let stats = self.detector.stats();
        info!(
            "Processed {} frames, {} recordings started, {} refused",
            self.frames_processed,
            stats.starts,
            self.session.stats().refusals
        );
        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
