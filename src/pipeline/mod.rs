// src/pipeline/mod.rs

pub mod event_bus;
pub mod frame_context;
pub mod metrics;
pub mod orchestrator;
pub mod report;

pub use event_bus::{EventBus, RenderEvent};
pub use frame_context::FrameContext;
pub use metrics::{EvasionSummary, SessionMetrics};
pub use orchestrator::{open_session, SessionOrchestrator};
pub use report::{save_report, SessionReport};
