use crate::error::{MotionCamError, Result};
use crate::frame::{FrameData, FrameFormat};
use image::GrayImage;
use tracing::trace;

/// Scores the amount of movement between two consecutive frames.
///
/// Higher scores mean more movement. Implementations may be stateful.
pub trait MotionScorer: Send {
    fn score(&mut self, previous: &FrameData, current: &FrameData) -> Result<f64>;
}

/// Absolute-difference scorer over grayscale images.
///
/// The sum of positive per-pixel differences (current minus previous) is
/// normalized by a quarter of the frame area and truncated to a whole number.
/// The grayscale conversion of the most recent frame is cached, since every
/// frame is scored once as `current` and then once as `previous`.
#[derive(Default)]
pub struct FrameDiffScorer {
    cached: Option<(u64, GrayImage)>,
}

impl FrameDiffScorer {
    pub fn new() -> Self {
        Self::default()
    }

    fn gray_for(&mut self, frame: &FrameData) -> Result<GrayImage> {
        if let Some((id, gray)) = &self.cached {
            if *id == frame.id {
                return Ok(gray.clone());
            }
        }
        to_gray(frame)
    }
}

impl MotionScorer for FrameDiffScorer {
    fn score(&mut self, previous: &FrameData, current: &FrameData) -> Result<f64> {
        let prev = self.gray_for(previous)?;
        let cur = to_gray(current)?;

        if prev.dimensions() != cur.dimensions() {
            return Err(MotionCamError::scoring(format!(
                "Frame size changed from {:?} to {:?}",
                prev.dimensions(),
                cur.dimensions()
            )));
        }

        let (width, height) = cur.dimensions();
        if width == 0 || height == 0 {
            return Err(MotionCamError::scoring("Frame has no pixels"));
        }

        let delta: u64 = cur
            .as_raw()
            .iter()
            .zip(prev.as_raw().iter())
            .map(|(c, p)| c.saturating_sub(*p) as u64)
            .sum();

        let score = (delta as f64 / ((height as f64 / 2.0) * (width as f64 / 2.0))).trunc();
        trace!("Frame {} scored {} against frame {}", current.id, score, previous.id);

        self.cached = Some((current.id, cur));
        Ok(score)
    }
}

/// Decode any supported frame format into 8-bit luma
pub fn to_gray(frame: &FrameData) -> Result<GrayImage> {
    let (width, height) = (frame.width, frame.height);

    match frame.format {
        FrameFormat::Mjpeg => image::load_from_memory(&frame.data)
            .map(|img| img.to_luma8())
            .map_err(|e| MotionCamError::scoring(format!("Failed to decode frame {}: {}", frame.id, e))),
        FrameFormat::Gray8 => {
            check_size(frame)?;
            GrayImage::from_raw(width, height, frame.data.to_vec())
                .ok_or_else(|| MotionCamError::scoring("Invalid grayscale buffer"))
        }
        FrameFormat::Yuyv => {
            check_size(frame)?;
            // Luma is every other byte in YUYV
            let luma: Vec<u8> = frame.data.iter().step_by(2).copied().collect();
            GrayImage::from_raw(width, height, luma)
                .ok_or_else(|| MotionCamError::scoring("Invalid YUYV buffer"))
        }
        FrameFormat::Rgb24 => {
            check_size(frame)?;
            let luma: Vec<u8> = frame
                .data
                .chunks_exact(3)
                .map(|px| {
                    (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32).round() as u8
                })
                .collect();
            GrayImage::from_raw(width, height, luma)
                .ok_or_else(|| MotionCamError::scoring("Invalid RGB buffer"))
        }
    }
}

fn check_size(frame: &FrameData) -> Result<()> {
    if frame.validate_size() {
        Ok(())
    } else {
        Err(MotionCamError::scoring(format!(
            "Frame {} has {} bytes, expected {:?}",
            frame.id,
            frame.data.len(),
            frame.expected_size()
        )))
    }
}
