use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events that can occur in the recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MotionCamEvent {
    /// Detector crossed into recording
    MotionStarted { frame_id: u64, score: f64 },
    /// Detector returned to idle; `forced` when the stop was synthetic
    MotionStopped { frame_id: u64, forced: bool },
    /// A new output was opened
    RecordingStarted { path: PathBuf, seed_frames: usize },
    /// An output was finalized
    RecordingStopped {
        path: PathBuf,
        frames: usize,
        reason: String,
    },
    /// A start was dropped because there was no room to write
    RecordingRefused { free_gb: Option<u64> },
    /// The frame source failed for good
    CameraLost { error: String },
    /// Termination was requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl MotionCamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            MotionCamEvent::MotionStarted { frame_id, score } => {
                format!("Motion started at frame {} (score {:.0})", frame_id, score)
            }
            MotionCamEvent::MotionStopped { frame_id, forced } => {
                if *forced {
                    format!("Motion stop forced at frame {}", frame_id)
                } else {
                    format!("Motion stopped at frame {}", frame_id)
                }
            }
            MotionCamEvent::RecordingStarted { path, seed_frames } => format!(
                "Recording started: {} ({} buffered frames)",
                path.display(),
                seed_frames
            ),
            MotionCamEvent::RecordingStopped {
                path,
                frames,
                reason,
            } => format!(
                "Recording stopped ({}): {} ({} frames)",
                reason,
                path.display(),
                frames
            ),
            MotionCamEvent::RecordingRefused { free_gb } => match free_gb {
                Some(gb) => format!("Recording refused, {} GB free", gb),
                None => "Recording refused, free space unknown".to_string(),
            },
            MotionCamEvent::CameraLost { error } => format!("Camera lost: {}", error),
            MotionCamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            MotionCamEvent::MotionStarted { .. } => "motion_started",
            MotionCamEvent::MotionStopped { .. } => "motion_stopped",
            MotionCamEvent::RecordingStarted { .. } => "recording_started",
            MotionCamEvent::RecordingStopped { .. } => "recording_stopped",
            MotionCamEvent::RecordingRefused { .. } => "recording_refused",
            MotionCamEvent::CameraLost { .. } => "camera_lost",
            MotionCamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast bus for in-process observers of recorder activity
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MotionCamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<MotionCamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: MotionCamEvent) -> usize {
        match &event {
            MotionCamEvent::CameraLost { error } => warn!("Camera lost: {}", error),
            MotionCamEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason)
            }
            _ => debug!("Event: {}", event.description()),
        }

        // zero when nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(16);
        let mut receiver = bus.subscribe();

        let delivered = bus.publish(MotionCamEvent::MotionStarted {
            frame_id: 12,
            score: 40.0,
        });
        assert_eq!(delivered, 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "motion_started");
        assert!(event.description().contains("frame 12"));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(MotionCamEvent::RecordingRefused { free_gb: Some(0) }), 0);
    }

    #[tokio::test]
    async fn test_clones_share_channel() {
        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();
        let clone = bus.clone();

        clone.publish(MotionCamEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "SIGTERM".to_string(),
        });

        match receiver.recv().await.unwrap() {
            MotionCamEvent::ShutdownRequested { reason, .. } => assert_eq!(reason, "SIGTERM"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_descriptions() {
        let stopped = MotionCamEvent::RecordingStopped {
            path: PathBuf::from("/tmp/a.avi"),
            frames: 5,
            reason: "max frames reached".to_string(),
        };
        assert_eq!(
            stopped.description(),
            "Recording stopped (max frames reached): /tmp/a.avi (5 frames)"
        );

        let forced = MotionCamEvent::MotionStopped {
            frame_id: 3,
            forced: true,
        };
        assert!(forced.description().contains("forced"));
    }
}
