use crate::config::CameraConfig;
use crate::error::Result;
use crate::frame::FrameData;
use async_trait::async_trait;
use tracing::info;

/// Delivers frames one at a time, in capture order.
///
/// `next_frame` waits until a frame is available. Any error means the device
/// is gone and no further frames will arrive.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<FrameData>;

    /// Release the device; called once during shutdown
    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Open the capture device named by `config`
#[cfg(all(feature = "camera", target_os = "linux"))]
pub async fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    info!("Opening capture device {}", config.device);
    let camera = super::CameraInterface::new(config.clone()).await?;
    Ok(Box::new(camera))
}

/// Without GStreamer the recorder runs against a synthetic scene
#[cfg(not(all(feature = "camera", target_os = "linux")))]
pub async fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    tracing::warn!("GStreamer camera support is not available in this build, using a synthetic scene");
    info!(
        "Synthetic camera {}x{} @ {}fps",
        config.resolution.0, config.resolution.1, config.fps
    );
    Ok(Box::new(super::SyntheticCamera::new(config.clone())))
}
