use super::source::FrameSource;
use crate::config::CameraConfig;
use crate::error::{CameraError, MotionCamError, Result};
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::{MessageView, Pipeline};
use gstreamer_app::AppSink;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Samples held between the streaming thread and the pipeline task
const SAMPLE_QUEUE_DEPTH: usize = 4;

/// Silence after which the pipeline is restarted once, then given up on
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// V4L2 MJPEG capture through GStreamer.
///
/// The appsink callback runs on a GStreamer streaming thread and hands each
/// sample over a bounded channel with a blocking send, so a slow consumer
/// stalls the device instead of queueing frames without limit.
pub struct CameraInterface {
    config: CameraConfig,
    pipeline: Pipeline,
    receiver: mpsc::Receiver<gstreamer::Sample>,
    frame_counter: u64,
}

impl CameraInterface {
    /// Build the pipeline and start streaming
    pub async fn new(config: CameraConfig) -> Result<Self> {
        info!(
            "Initializing GStreamer camera interface for device {} ({}x{} @ {}fps)",
            config.device, config.resolution.0, config.resolution.1, config.fps
        );

        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let pipeline_desc = Self::build_pipeline_string(&config);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| CameraError::Configuration {
                details: "Pipeline has no appsink named 'sink'".to_string(),
            })?;

        let (tx, receiver) = mpsc::channel(SAMPLE_QUEUE_DEPTH);

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    tx.blocking_send(sample)
                        .map_err(|_| gstreamer::FlowError::Flushing)?;
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::DeviceOpen {
                device: config.device,
                details: format!("Failed to start pipeline: {}", e),
            })?;

        info!("GStreamer pipeline started successfully");

        Ok(Self {
            config,
            pipeline,
            receiver,
            frame_counter: 0,
        })
    }

    /// Build GStreamer pipeline string for MJPEG capture
    fn build_pipeline_string(config: &CameraConfig) -> String {
        let (width, height) = config.resolution;

        format!(
            "v4l2src device=/dev/video{} io-mode=mmap do-timestamp=true ! \
             image/jpeg,width={},height={},framerate={}/1 ! \
             appsink name=sink sync=false max-buffers=2 drop=false qos=false enable-last-sample=false emit-signals=false",
            config.device, width, height, config.fps
        )
    }

    /// Surface an error or end-of-stream posted on the pipeline bus
    fn check_bus(&self) -> Result<()> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };

        while let Some(message) = bus.pop_filtered(&[
            gstreamer::MessageType::Error,
            gstreamer::MessageType::Eos,
        ]) {
            match message.view() {
                MessageView::Error(err) => {
                    error!(
                        "GStreamer error from {:?}: {} ({:?})",
                        err.src().map(|s| s.path_string()),
                        err.error(),
                        err.debug()
                    );
                    return Err(CameraError::CaptureStream {
                        details: err.error().to_string(),
                    }
                    .into());
                }
                MessageView::Eos(..) => {
                    warn!("Camera stream reached end of stream");
                    return Err(CameraError::Disconnected.into());
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn restart(&self) -> Result<()> {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| {
                MotionCamError::from(CameraError::CaptureStream {
                    details: format!("Failed to restart pipeline: {}", e),
                })
            })?;
        Ok(())
    }

    /// Convert a sample into a frame
    fn process_sample(&mut self, sample: gstreamer::Sample) -> Result<FrameData> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
            details: "No buffer in sample".to_string(),
        })?;

        let (width, height) = sample
            .caps()
            .and_then(|caps| caps.structure(0))
            .and_then(|s| Some((s.get::<i32>("width").ok()?, s.get::<i32>("height").ok()?)))
            .map(|(w, h)| (w as u32, h as u32))
            .unwrap_or(self.config.resolution);

        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to map buffer: {}", e),
            })?;

        let frame_id = self.frame_counter;
        self.frame_counter += 1;

        trace!(
            "Captured MJPEG frame {} ({}x{}, {} bytes)",
            frame_id,
            width,
            height,
            map.len()
        );

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            map.as_slice().to_vec(),
            width,
            height,
            FrameFormat::Mjpeg,
        ))
    }

    /// Get camera configuration
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Get current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }
}

#[async_trait]
impl FrameSource for CameraInterface {
    async fn next_frame(&mut self) -> Result<FrameData> {
        let mut restarted = false;

        loop {
            match tokio::time::timeout(FRAME_TIMEOUT, self.receiver.recv()).await {
                Ok(Some(sample)) => match self.process_sample(sample) {
                    Ok(frame) => return Ok(frame),
                    Err(e) => warn!("Dropping unreadable camera sample: {}", e),
                },
                Ok(None) => return Err(CameraError::Disconnected.into()),
                Err(_) => {
                    self.check_bus()?;
                    if restarted {
                        return Err(CameraError::Disconnected.into());
                    }
                    warn!(
                        "No camera frames received for {:?}; restarting pipeline",
                        FRAME_TIMEOUT
                    );
                    self.restart()?;
                    restarted = true;
                }
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        info!("Stopping GStreamer camera capture");
        self.pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to stop pipeline: {}", e),
            })?;
        debug!("Captured {} frames in total", self.frame_counter);
        Ok(())
    }
}

impl Drop for CameraInterface {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}
