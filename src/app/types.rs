/// Why the pipeline loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Termination was requested (signal or caller)
    Requested,
    /// The frame source failed for good
    CameraLost(String),
}

impl ShutdownReason {
    /// Process exit code when nothing else went wrong during drain
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Requested => 0,
            ShutdownReason::CameraLost(_) => 1,
        }
    }
}
