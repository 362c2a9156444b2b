use crate::config::RecordingConfig;
use crate::error::{MotionCamError, Result};
use crate::frame::{FrameData, FrameFormat};
use crate::motion_log::LINE_TIME_FORMAT;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use image::{DynamicImage, ImageFormat, ImageOutputFormat, Rgb};
use imageproc::drawing::draw_text_mut;
use rusttype::{Font, Scale};
use std::sync::Arc;
use tracing::{info, trace, warn};

/// Top-left corner of the stamp
const TEXT_ORIGIN: (i32, i32) = (10, 10);

/// Burns the capture time into MJPEG frames as white text with a dark shadow
pub struct TimestampOverlay {
    font: Font<'static>,
    scale: Scale,
    timezone: Tz,
}

impl TimestampOverlay {
    /// Load the configured font; `None` when the overlay is off or unusable
    pub fn from_config(config: &RecordingConfig) -> Option<Self> {
        if !config.timestamp_overlay {
            return None;
        }

        match Self::load(config) {
            Ok(overlay) => {
                info!(
                    "Timestamp overlay enabled (font: {}, size: {})",
                    config.timestamp_font_path, config.timestamp_font_size
                );
                Some(overlay)
            }
            Err(e) => {
                warn!("Timestamp overlay disabled: {}", e);
                None
            }
        }
    }

    fn load(config: &RecordingConfig) -> Result<Self> {
        let font_data = std::fs::read(&config.timestamp_font_path).map_err(|e| {
            MotionCamError::component(
                "timestamp_overlay".to_string(),
                format!(
                    "Failed to read font file '{}': {}",
                    config.timestamp_font_path, e
                ),
            )
        })?;

        let font = Font::try_from_vec(font_data).ok_or_else(|| {
            MotionCamError::component(
                "timestamp_overlay".to_string(),
                format!("Failed to parse font file '{}'", config.timestamp_font_path),
            )
        })?;

        Ok(Self {
            font,
            scale: Scale::uniform(config.timestamp_font_size),
            timezone: config.timezone(),
        })
    }

    /// Text stamped onto a frame captured at `timestamp`
    pub fn text_for(&self, timestamp: std::time::SystemTime) -> String {
        DateTime::<Utc>::from(timestamp)
            .with_timezone(&self.timezone)
            .format(LINE_TIME_FORMAT)
            .to_string()
    }

    /// Stamp an MJPEG frame; other formats are returned unchanged
    pub fn apply(&self, frame: &FrameData) -> Result<FrameData> {
        if frame.format != FrameFormat::Mjpeg {
            return Ok(frame.clone());
        }

        let mut img = image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)
            .map_err(|e| {
                MotionCamError::component(
                    "timestamp_overlay".to_string(),
                    format!("Failed to decode JPEG for overlay: {}", e),
                )
            })?
            .to_rgb8();

        let text = self.text_for(frame.timestamp);
        let (x, y) = TEXT_ORIGIN;

        draw_text_mut(&mut img, Rgb([0, 0, 0]), x + 1, y + 1, self.scale, &self.font, &text);
        draw_text_mut(&mut img, Rgb([255, 255, 255]), x, y, self.scale, &self.font, &text);

        let mut output = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut output), ImageOutputFormat::Jpeg(90))
            .map_err(|e| {
                MotionCamError::component(
                    "timestamp_overlay".to_string(),
                    format!("Failed to encode JPEG with overlay: {}", e),
                )
            })?;

        trace!("Stamped frame {} with {}", frame.id, text);
        Ok(frame.with_data(Arc::new(output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionCamConfig;
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    fn recording_config() -> RecordingConfig {
        MotionCamConfig::default().recording
    }

    fn jpeg_frame(id: u64) -> FrameData {
        let img = image::RgbImage::from_pixel(120, 60, Rgb([90, 120, 200]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(90))
            .unwrap();
        FrameData::new(id, SystemTime::now(), bytes, 120, 60, FrameFormat::Mjpeg)
    }

    #[test]
    fn test_disabled_overlay() {
        let mut config = recording_config();
        config.timestamp_overlay = false;
        assert!(TimestampOverlay::from_config(&config).is_none());
    }

    #[test]
    fn test_missing_font_disables_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = recording_config();
        config.timestamp_font_path = dir.path().join("none.ttf").display().to_string();
        assert!(TimestampOverlay::from_config(&config).is_none());
    }

    #[test]
    fn test_invalid_font_disables_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let font_path = dir.path().join("broken.ttf");
        std::fs::write(&font_path, b"not a font").unwrap();

        let mut config = recording_config();
        config.timestamp_font_path = font_path.display().to_string();
        assert!(TimestampOverlay::from_config(&config).is_none());
    }

    #[test]
    fn test_overlay_changes_pixels_when_font_present() {
        let config = recording_config();
        if !Path::new(&config.timestamp_font_path).exists() {
            println!("Font not installed - skipping overlay rendering test");
            return;
        }

        let overlay = TimestampOverlay::from_config(&config).unwrap();
        let frame = jpeg_frame(4);
        let stamped = overlay.apply(&frame).unwrap();

        assert_eq!(stamped.id, 4);
        assert_ne!(stamped.data, frame.data);
        assert!(image::load_from_memory(&stamped.data).is_ok());

        let gray = FrameData::new(5, SystemTime::now(), vec![0u8; 16], 4, 4, FrameFormat::Gray8);
        let untouched = overlay.apply(&gray).unwrap();
        assert!(Arc::ptr_eq(&untouched.data, &gray.data));
    }

    #[test]
    fn test_text_uses_configured_timezone() {
        let config = recording_config();
        if !Path::new(&config.timestamp_font_path).exists() {
            return;
        }

        let mut config = config;
        config.timestamp_timezone = "Asia/Tokyo".to_string();
        let overlay = TimestampOverlay::from_config(&config).unwrap();

        // 1970-01-01 00:00:00 UTC is 09:00 in Tokyo
        let text = overlay.text_for(SystemTime::UNIX_EPOCH + Duration::from_secs(0));
        assert_eq!(text, "09:00:00 01-01-1970");
    }
}
