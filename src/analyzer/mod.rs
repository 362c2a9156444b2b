mod detector;
mod scorer;

pub use detector::{DetectorSettings, DetectorStats, MotionDetector, MotionState, Trigger};
pub use scorer::{to_gray, FrameDiffScorer, MotionScorer};
