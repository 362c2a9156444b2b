use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionCamConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub recording: RecordingConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Capture device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_device")]
    pub device: u32,

    /// Capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device and written to outputs
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectionConfig {
    /// Pre-trigger buffer size in frames
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Movement score at or above which a frame counts as motion
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Consecutive motion frames required before recording starts
    #[serde(default = "default_threshold_frames")]
    pub threshold_frames: u32,

    /// Consecutive quiet frames required before recording stops.
    /// Falls back to `max_frames` when unset.
    #[serde(default)]
    pub stop_frames: Option<u32>,

    /// Frames that must pass after a stop before another start is allowed
    #[serde(default = "default_cooldown_frames")]
    pub cooldown_frames: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordingConfig {
    /// Directory that receives recordings; also the path checked for free space
    #[serde(default = "default_recording_path")]
    pub path: PathBuf,

    /// Maximum frames written to a single output before rotating
    #[serde(default = "default_max_saved_frames")]
    pub max_saved_frames: usize,

    /// Minimum free space in whole gigabytes required before any write
    #[serde(default = "default_min_free_space_gb")]
    pub min_free_space_gb: u64,

    /// What to do when the platform cannot report free space
    #[serde(default)]
    pub unsupported_space_check: UnsupportedSpacePolicy,

    /// Output writer
    #[serde(default)]
    pub encoder: EncoderKind,

    /// Write a JSON sidecar next to each finished output
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,

    /// Stamp the capture time onto recorded frames
    #[serde(default = "default_timestamp_overlay")]
    pub timestamp_overlay: bool,

    /// Path to TrueType font file for timestamp overlay
    #[serde(default = "default_timestamp_font_path")]
    pub timestamp_font_path: String,

    /// Font size for timestamp overlay
    #[serde(default = "default_timestamp_font_size")]
    pub timestamp_font_size: f32,

    /// Timezone for overlay text, file names and log lines
    #[serde(default = "default_timestamp_timezone")]
    pub timestamp_timezone: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    /// Motion log file; start/stop lines are appended here when writable.
    /// An empty path disables the file.
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedSpacePolicy {
    /// Proceed as if space were available (a warning is logged at startup)
    #[default]
    AssumeAvailable,
    /// Refuse every write
    Refuse,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    /// MJPEG frames muxed into an AVI container
    #[default]
    Avi,
    /// One JPEG per frame inside a directory per recording
    Images,
}

impl DetectionConfig {
    /// Effective quiet-frame count that ends a recording
    pub fn effective_stop_frames(&self) -> u32 {
        self.stop_frames
            .unwrap_or_else(|| self.max_frames.min(u32::MAX as usize) as u32)
    }
}

impl RecordingConfig {
    /// Configured timezone, UTC when the name is not recognised
    pub fn timezone(&self) -> Tz {
        self.timestamp_timezone.parse().unwrap_or(Tz::UTC)
    }
}

impl MotionCamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("motioncam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.device", default_camera_device())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("detection.max_frames", default_max_frames() as i64)?
            .set_default("detection.threshold", default_threshold())?
            .set_default("detection.threshold_frames", default_threshold_frames())?
            .set_default("detection.cooldown_frames", default_cooldown_frames())?
            .set_default(
                "recording.path",
                default_recording_path().to_string_lossy().to_string(),
            )?
            .set_default(
                "recording.max_saved_frames",
                default_max_saved_frames() as i64,
            )?
            .set_default(
                "recording.min_free_space_gb",
                default_min_free_space_gb() as i64,
            )?
            .set_default("recording.unsupported_space_check", "assume_available")?
            .set_default("recording.encoder", "avi")?
            .set_default("recording.save_metadata", default_save_metadata())?
            .set_default("recording.timestamp_overlay", default_timestamp_overlay())?
            .set_default(
                "recording.timestamp_font_path",
                default_timestamp_font_path(),
            )?
            .set_default(
                "recording.timestamp_font_size",
                default_timestamp_font_size() as f64,
            )?
            .set_default(
                "recording.timestamp_timezone",
                default_timestamp_timezone(),
            )?
            .set_default("log.file", "/var/log/motioncam/motion.log")?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // MOTIONCAM_DETECTION__MAX_FRAMES=30 style overrides
            .add_source(
                Environment::with_prefix("MOTIONCAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: MotionCamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.detection.max_frames == 0 {
            return Err(ConfigError::Message(
                "Detection max_frames must be greater than 0".to_string(),
            ));
        }

        if !self.detection.threshold.is_finite() || self.detection.threshold < 0.0 {
            return Err(ConfigError::Message(
                "Detection threshold must be a non-negative number".to_string(),
            ));
        }

        if self.detection.threshold_frames == 0 {
            return Err(ConfigError::Message(
                "Detection threshold_frames must be greater than 0".to_string(),
            ));
        }

        if self.detection.stop_frames == Some(0) {
            return Err(ConfigError::Message(
                "Detection stop_frames must be greater than 0".to_string(),
            ));
        }

        if self.recording.max_saved_frames == 0 {
            return Err(ConfigError::Message(
                "Recording max_saved_frames must be greater than 0".to_string(),
            ));
        }

        if self.recording.timestamp_timezone.parse::<Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "Unknown timestamp_timezone '{}'",
                self.recording.timestamp_timezone
            )));
        }

        if self.recording.timestamp_overlay && self.recording.timestamp_font_size <= 0.0 {
            return Err(ConfigError::Message(
                "Recording timestamp_font_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render this configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for MotionCamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                device: default_camera_device(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
            },
            detection: DetectionConfig {
                max_frames: default_max_frames(),
                threshold: default_threshold(),
                threshold_frames: default_threshold_frames(),
                stop_frames: None,
                cooldown_frames: default_cooldown_frames(),
            },
            recording: RecordingConfig {
                path: default_recording_path(),
                max_saved_frames: default_max_saved_frames(),
                min_free_space_gb: default_min_free_space_gb(),
                unsupported_space_check: UnsupportedSpacePolicy::default(),
                encoder: EncoderKind::default(),
                save_metadata: default_save_metadata(),
                timestamp_overlay: default_timestamp_overlay(),
                timestamp_font_path: default_timestamp_font_path(),
                timestamp_font_size: default_timestamp_font_size(),
                timestamp_timezone: default_timestamp_timezone(),
            },
            log: LogConfig {
                file: default_log_file(),
            },
        }
    }
}

// Default value functions
fn default_camera_device() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}

fn default_max_frames() -> usize {
    15
}
fn default_threshold() -> f64 {
    15.0
}
fn default_threshold_frames() -> u32 {
    1
}
fn default_cooldown_frames() -> u32 {
    0
}

fn default_recording_path() -> PathBuf {
    PathBuf::from("./recordings")
}
fn default_max_saved_frames() -> usize {
    1000
}
fn default_min_free_space_gb() -> u64 {
    1
}
fn default_save_metadata() -> bool {
    false
}
fn default_timestamp_overlay() -> bool {
    true
}
fn default_timestamp_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_timestamp_font_size() -> f32 {
    24.0
}
fn default_timestamp_timezone() -> String {
    "UTC".to_string()
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("/var/log/motioncam/motion.log"))
}
