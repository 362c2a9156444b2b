use super::source::FrameSource;
use crate::config::CameraConfig;
use crate::error::{CameraError, MotionCamError, Result};
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use image::{GrayImage, Luma};
use std::collections::VecDeque;
use std::io::Cursor;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Paced MJPEG scene with a bright block that sweeps across the frame
/// for a few seconds out of every ten.
pub struct SyntheticCamera {
    config: CameraConfig,
    interval: tokio::time::Interval,
    frame_counter: u64,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        let frame_interval = Duration::from_millis(1000 / config.fps.max(1) as u64);
        Self {
            config,
            interval: tokio::time::interval(frame_interval),
            frame_counter: 0,
        }
    }

    fn render(&self, frame_id: u64) -> Result<Vec<u8>> {
        let (width, height) = self.config.resolution;
        let fps = self.config.fps.max(1) as u64;
        let mut image = GrayImage::from_pixel(width, height, Luma([32]));

        let phase = frame_id % (fps * 10);
        if phase < fps * 3 {
            let size = (width.min(height) / 4).max(1);
            let span = width.saturating_sub(size).max(1) as u64;
            let x = ((phase * 8) % span) as u32;
            let y = height.saturating_sub(size) / 2;
            for py in y..(y + size).min(height) {
                for px in x..(x + size).min(width) {
                    image.put_pixel(px, py, Luma([230]));
                }
            }
        }

        let mut bytes = Vec::new();
        image::DynamicImage::ImageLuma8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Jpeg(80))
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to encode synthetic frame: {}", e),
            })?;
        Ok(bytes)
    }
}

#[async_trait]
impl FrameSource for SyntheticCamera {
    async fn next_frame(&mut self) -> Result<FrameData> {
        self.interval.tick().await;

        let frame_id = self.frame_counter;
        self.frame_counter += 1;

        let data = self.render(frame_id)?;
        trace!("Generated synthetic MJPEG frame {} ({} bytes)", frame_id, data.len());

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            self.config.resolution.0,
            self.config.resolution.1,
            FrameFormat::Mjpeg,
        ))
    }
}

/// What a scripted source does once its frames run out
enum Exhausted {
    Disconnect,
    Pend,
    Cancel(CancellationToken),
}

/// Replays a fixed list of frames, then disconnects or waits forever
pub struct ScriptedFrameSource {
    frames: VecDeque<FrameData>,
    exhausted: Exhausted,
    delivered: u64,
}

impl ScriptedFrameSource {
    pub fn new(frames: Vec<FrameData>) -> Self {
        Self {
            frames: frames.into(),
            exhausted: Exhausted::Disconnect,
            delivered: 0,
        }
    }

    /// `count` small grayscale frames with ids `0..count`
    pub fn gray(count: u64, width: u32, height: u32) -> Self {
        let frames = (0..count)
            .map(|id| {
                FrameData::new(
                    id,
                    SystemTime::now(),
                    vec![(id % 256) as u8; (width * height) as usize],
                    width,
                    height,
                    FrameFormat::Gray8,
                )
            })
            .collect();
        Self::new(frames)
    }

    /// Block on `next_frame` after the last frame instead of failing
    pub fn then_pend(mut self) -> Self {
        self.exhausted = Exhausted::Pend;
        self
    }

    /// Cancel `token` after the last frame, then wait like [`Self::then_pend`]
    pub fn then_cancel(mut self, token: CancellationToken) -> Self {
        self.exhausted = Exhausted::Cancel(token);
        self
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn next_frame(&mut self) -> Result<FrameData> {
        match self.frames.pop_front() {
            Some(frame) => {
                self.delivered += 1;
                Ok(frame)
            }
            None => match &self.exhausted {
                Exhausted::Disconnect => Err(MotionCamError::Camera(CameraError::Disconnected)),
                Exhausted::Pend => std::future::pending().await,
                Exhausted::Cancel(token) => {
                    token.cancel();
                    std::future::pending().await
                }
            },
        }
    }
}
