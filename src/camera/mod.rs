#[cfg(all(feature = "camera", target_os = "linux"))]
mod interface;
mod mock;
mod source;

#[cfg(all(feature = "camera", target_os = "linux"))]
pub use interface::CameraInterface;
pub use mock::{ScriptedFrameSource, SyntheticCamera};
pub use source::{open_camera, FrameSource};
