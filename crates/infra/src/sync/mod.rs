//! Sync orchestration

mod orchestrator;
mod session;

pub use orchestrator::SyncOrchestrator;
pub use session::SyncSession;
