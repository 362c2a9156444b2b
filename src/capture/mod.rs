mod encode;
mod metadata;
mod overlay;
mod session;

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
pub use encode::GstAviEncoder;
pub use encode::{
    build_encoder, ImageSequenceEncoder, MemoryVideoEncoder, RecordedOutput, VideoEncoder,
    VideoOutput,
};
pub use metadata::{sidecar_path, RecordingMetadata, RecordingStats};
pub use overlay::TimestampOverlay;
pub use session::{
    AppendOutcome, OpenOutcome, RecordingSession, SessionSettings, StopReason, FILE_TIME_FORMAT,
};
