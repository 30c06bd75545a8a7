pub mod orchestrator;
pub mod record;
pub mod signal;
pub mod surface;
pub mod waiter;

pub use orchestrator::{Orchestrator, OrchestratorConfig, SessionSummary};
pub use record::{EnhanceRecord, FinishReason, RecordSink, SellRecord, SessionRecord};
pub use signal::StopSignal;
pub use surface::{ChatSurface, ReplaySurface, SurfaceError};
pub use waiter::{GoldOutcome, OutcomeWaiter, WaitConfig, WaitOutcome};
