use super::MotionCamOrchestrator;
use crate::error::Result;
use crate::events::{EventBus, MotionCamEvent};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

impl MotionCamOrchestrator {
    /// Run until a termination signal or camera loss, then drain.
    /// Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        self.setup_signal_handlers();
        self.run_until_stopped().await
    }

    /// Run the pipeline against the cancellation token only
    pub async fn run_until_stopped(&mut self) -> Result<i32> {
        info!("motioncam is running");

        let reason = self.run_pipeline().await;
        info!("Shutdown initiated: {:?}", reason);

        let exit_code = self.shutdown(reason).await?;

        info!("motioncam shutdown complete");
        Ok(exit_code)
    }

    /// Cancel the pipeline on SIGINT, and on SIGTERM where available.
    /// Later signals find the token already cancelled and change nothing.
    fn setup_signal_handlers(&self) {
        #[cfg(unix)]
        {
            let token = self.cancellation_token.clone();
            let events = self.event_bus.clone();
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};

                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if sigterm.recv().await.is_some() {
                            info!("Received SIGTERM signal");
                            request_shutdown(&token, &events, "SIGTERM");
                        }
                    }
                    Err(e) => error!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        let token = self.cancellation_token.clone();
        let events = self.event_bus.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                request_shutdown(&token, &events, "SIGINT");
            }
        });
    }
}

fn request_shutdown(token: &CancellationToken, events: &EventBus, signal: &str) {
    if token.is_cancelled() {
        return;
    }
    events.publish(MotionCamEvent::ShutdownRequested {
        timestamp: SystemTime::now(),
        reason: signal.to_string(),
    });
    token.cancel();
}
