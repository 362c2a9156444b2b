mod orchestrator;
mod pipeline;
mod runtime;
mod shutdown;
mod types;


pub use orchestrator::{MotionCamOrchestrator, OrchestratorBuilder};
pub use types::ShutdownReason;
