use crate::{
    analyzer::to_gray,
    config::{EncoderKind, MotionCamConfig},
    error::{MotionCamError, RecordingError, Result},
    frame::{FrameData, FrameFormat},
};
use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
use gstreamer::prelude::*;
#[cfg(all(feature = "video_encoding", target_os = "linux"))]
use gstreamer::Pipeline;
#[cfg(all(feature = "video_encoding", target_os = "linux"))]
use gstreamer_app::AppSrc;

/// Creates one output per recording
#[async_trait]
pub trait VideoEncoder: Send {
    async fn create_output(&mut self, path: &Path) -> Result<Box<dyn VideoOutput>>;

    /// File extension of created outputs; `None` for directory outputs
    fn extension(&self) -> Option<&'static str>;
}

/// An open output accepting frames in order
#[async_trait]
pub trait VideoOutput: Send {
    async fn write_frame(&mut self, frame: &FrameData) -> Result<()>;

    /// Flush and release the output
    async fn finalize(self: Box<Self>) -> Result<()>;

    fn path(&self) -> &Path;
}

/// Pick the writer named in the configuration
pub fn build_encoder(config: &MotionCamConfig) -> Result<Box<dyn VideoEncoder>> {
    match config.recording.encoder {
        EncoderKind::Avi => {
            #[cfg(all(feature = "video_encoding", target_os = "linux"))]
            {
                Ok(Box::new(GstAviEncoder::new(config.camera.fps)?))
            }

            #[cfg(not(all(feature = "video_encoding", target_os = "linux")))]
            {
                tracing::warn!("AVI encoding is not available in this build, writing image sequences instead");
                Ok(Box::new(ImageSequenceEncoder::new()))
            }
        }
        EncoderKind::Images => Ok(Box::new(ImageSequenceEncoder::new())),
    }
}

/// JPEG bytes for a frame; MJPEG passes through untouched
pub(crate) fn jpeg_payload(frame: &FrameData) -> Result<Arc<Vec<u8>>> {
    let image = match frame.format {
        FrameFormat::Mjpeg => return Ok(Arc::clone(&frame.data)),
        FrameFormat::Rgb24 => RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| RecordingError::FrameWrite {
                frame_id: frame.id,
                details: "RGB payload does not match frame size".to_string(),
            })?,
        FrameFormat::Gray8 | FrameFormat::Yuyv => DynamicImage::ImageLuma8(to_gray(frame)?),
    };

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(90))
        .map_err(|e| RecordingError::FrameWrite {
            frame_id: frame.id,
            details: format!("JPEG encoding failed: {}", e),
        })?;
    Ok(Arc::new(bytes))
}

/// MJPEG frames muxed into AVI by GStreamer
#[cfg(all(feature = "video_encoding", target_os = "linux"))]
pub struct GstAviEncoder {
    fps: u32,
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
impl GstAviEncoder {
    pub fn new(fps: u32) -> Result<Self> {
        gstreamer::init().map_err(|e| RecordingError::EncoderUnavailable {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;
        Ok(Self { fps: fps.max(1) })
    }
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
#[async_trait]
impl VideoEncoder for GstAviEncoder {
    async fn create_output(&mut self, path: &Path) -> Result<Box<dyn VideoOutput>> {
        let creation_error = |details: String| RecordingError::OutputCreation {
            path: path.display().to_string(),
            details,
        };

        let pipeline_desc = format!(
            "appsrc name=src format=time is-live=false caps=image/jpeg,framerate={}/1 ! \
             jpegparse ! \
             avimux ! \
             filesink location=\"{}\"",
            self.fps,
            path.to_string_lossy()
        );
        debug!("AVI pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| creation_error(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| creation_error("Failed to downcast to Pipeline".to_string()))?;

        let appsrc = pipeline
            .by_name("src")
            .and_then(|element| element.downcast::<AppSrc>().ok())
            .ok_or_else(|| creation_error("Failed to get appsrc element".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| creation_error(format!("Failed to start pipeline: {}", e)))?;

        Ok(Box::new(GstAviOutput {
            path: path.to_path_buf(),
            pipeline,
            appsrc,
            fps: self.fps as u64,
            frames: 0,
        }))
    }

    fn extension(&self) -> Option<&'static str> {
        Some("avi")
    }
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
struct GstAviOutput {
    path: PathBuf,
    pipeline: Pipeline,
    appsrc: AppSrc,
    fps: u64,
    frames: u64,
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
#[async_trait]
impl VideoOutput for GstAviOutput {
    async fn write_frame(&mut self, frame: &FrameData) -> Result<()> {
        let write_error = |details: String| RecordingError::FrameWrite {
            frame_id: frame.id,
            details,
        };

        let payload = jpeg_payload(frame)?;
        let mut buffer = gstreamer::Buffer::from_mut_slice(payload.to_vec());
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| write_error("Buffer is not writable".to_string()))?;
            let frame_ns = 1_000_000_000 / self.fps;
            buffer_ref.set_pts(gstreamer::ClockTime::from_nseconds(self.frames * frame_ns));
            buffer_ref.set_duration(gstreamer::ClockTime::from_nseconds(frame_ns));
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| write_error(format!("Failed to push buffer: {:?}", e)))?;
        self.frames += 1;

        Ok(())
    }

    async fn finalize(self: Box<Self>) -> Result<()> {
        let path = self.path.display().to_string();
        let finalize_error = |details: String| RecordingError::Finalize {
            path: path.clone(),
            details,
        };

        self.appsrc
            .end_of_stream()
            .map_err(|e| finalize_error(format!("Failed to signal EOS: {:?}", e)))?;

        let pipeline = self.pipeline.clone();
        let outcome = tokio::task::spawn_blocking(move || -> std::result::Result<(), String> {
            let Some(bus) = pipeline.bus() else {
                return Err("Pipeline has no bus".to_string());
            };

            let mut result = Err("Timed out waiting for end of stream".to_string());
            for msg in bus.iter_timed(gstreamer::ClockTime::from_seconds(30)) {
                match msg.view() {
                    gstreamer::MessageView::Eos(..) => {
                        result = Ok(());
                        break;
                    }
                    gstreamer::MessageView::Error(err) => {
                        result = Err(format!(
                            "{} ({})",
                            err.error(),
                            err.debug().map(|d| d.to_string()).unwrap_or_default()
                        ));
                        break;
                    }
                    _ => {}
                }
            }

            let _ = pipeline.set_state(gstreamer::State::Null);
            result
        })
        .await
        .map_err(|e| finalize_error(format!("Finalize task failed: {}", e)))?;

        outcome.map_err(finalize_error)?;
        debug!("AVI {} finalized with {} frames", path, self.frames);
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// One JPEG per frame in a directory per recording
#[derive(Debug, Default)]
pub struct ImageSequenceEncoder;

impl ImageSequenceEncoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VideoEncoder for ImageSequenceEncoder {
    async fn create_output(&mut self, path: &Path) -> Result<Box<dyn VideoOutput>> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| RecordingError::OutputCreation {
                path: path.display().to_string(),
                details: e.to_string(),
            })?;

        Ok(Box::new(ImageSequenceOutput {
            dir: path.to_path_buf(),
            frames: 0,
        }))
    }

    fn extension(&self) -> Option<&'static str> {
        None
    }
}

struct ImageSequenceOutput {
    dir: PathBuf,
    frames: u64,
}

#[async_trait]
impl VideoOutput for ImageSequenceOutput {
    async fn write_frame(&mut self, frame: &FrameData) -> Result<()> {
        let payload = jpeg_payload(frame)?;
        let file_path = self.dir.join(format!("frame_{:06}.jpg", self.frames + 1));

        tokio::fs::write(&file_path, payload.as_slice())
            .await
            .map_err(|e| RecordingError::FrameWrite {
                frame_id: frame.id,
                details: format!("{}: {}", file_path.display(), e),
            })?;

        self.frames += 1;
        Ok(())
    }

    async fn finalize(self: Box<Self>) -> Result<()> {
        debug!("Image sequence {} closed with {} frames", self.dir.display(), self.frames);
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.dir
    }
}

/// An output captured by [`MemoryVideoEncoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOutput {
    pub path: PathBuf,
    pub frame_ids: Vec<u64>,
    pub finalized: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    outputs: Vec<RecordedOutput>,
    frames_written: usize,
    fail_after: Option<usize>,
    fail_create: bool,
}

/// Keeps recordings in memory; used for dry runs and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryVideoEncoder {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryVideoEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every frame write once `frames` frames have been written in total
    pub fn fail_writes_after(self, frames: usize) -> Self {
        self.state.lock().fail_after = Some(frames);
        self
    }

    /// Fail every `create_output` call
    pub fn fail_create(self) -> Self {
        self.state.lock().fail_create = true;
        self
    }

    /// Snapshot of every output created so far
    pub fn outputs(&self) -> Vec<RecordedOutput> {
        self.state.lock().outputs.clone()
    }
}

#[async_trait]
impl VideoEncoder for MemoryVideoEncoder {
    async fn create_output(&mut self, path: &Path) -> Result<Box<dyn VideoOutput>> {
        let mut state = self.state.lock();
        if state.fail_create {
            return Err(MotionCamError::Recording(RecordingError::OutputCreation {
                path: path.display().to_string(),
                details: "output creation disabled".to_string(),
            }));
        }

        state.outputs.push(RecordedOutput {
            path: path.to_path_buf(),
            frame_ids: Vec::new(),
            finalized: false,
        });
        info!("Memory output {} created", path.display());

        Ok(Box::new(MemoryOutput {
            state: Arc::clone(&self.state),
            index: state.outputs.len() - 1,
            path: path.to_path_buf(),
        }))
    }

    fn extension(&self) -> Option<&'static str> {
        Some("avi")
    }
}

struct MemoryOutput {
    state: Arc<Mutex<MemoryState>>,
    index: usize,
    path: PathBuf,
}

#[async_trait]
impl VideoOutput for MemoryOutput {
    async fn write_frame(&mut self, frame: &FrameData) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_after.is_some_and(|limit| state.frames_written >= limit) {
            return Err(MotionCamError::Recording(RecordingError::FrameWrite {
                frame_id: frame.id,
                details: "simulated write failure".to_string(),
            }));
        }

        state.frames_written += 1;
        state.outputs[self.index].frame_ids.push(frame.id);
        Ok(())
    }

    async fn finalize(self: Box<Self>) -> Result<()> {
        self.state.lock().outputs[self.index].finalized = true;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
