pub mod analyzer;
pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod motion_log;
pub mod ring_buffer;
pub mod storage;

pub use analyzer::{FrameDiffScorer, MotionDetector, MotionScorer, MotionState, Trigger};
pub use app::{MotionCamOrchestrator, OrchestratorBuilder, ShutdownReason};
pub use camera::{open_camera, FrameSource, ScriptedFrameSource, SyntheticCamera};
pub use capture::{
    MemoryVideoEncoder, RecordingSession, StopReason, TimestampOverlay, VideoEncoder, VideoOutput,
};
pub use config::MotionCamConfig;
pub use error::{MotionCamError, Result};
pub use events::{EventBus, MotionCamEvent};
pub use frame::{FrameData, FrameFormat};
pub use motion_log::MotionLog;
pub use ring_buffer::{RingBuffer, RingBufferBuilder};
pub use storage::{SpaceCheck, SpaceProbe, StatvfsProbe, StorageGuard};
