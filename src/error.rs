use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionCamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Scoring error: {details}")]
    Scoring { details: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Capture device failures. Any of these ends the process.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open capture device {device}: {details}")]
    DeviceOpen { device: u32, details: String },

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },

    #[error("Capture stream error: {details}")]
    CaptureStream { details: String },

    #[error("Capture device disconnected")]
    Disconnected,
}

/// Output-side failures, scoped to a single recording session.
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to create output {path}: {details}")]
    OutputCreation { path: String, details: String },

    #[error("Failed to write frame {frame_id}: {details}")]
    FrameWrite { frame_id: u64, details: String },

    #[error("Failed to finalize output {path}: {details}")]
    Finalize { path: String, details: String },

    #[error("Encoder not available: {details}")]
    EncoderUnavailable { details: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Free space query failed for {path}: {source}")]
    Query {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage path {path}")]
    InvalidPath { path: String },
}

impl MotionCamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn scoring<S: Into<String>>(details: S) -> Self {
        Self::Scoring {
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MotionCamError>;
