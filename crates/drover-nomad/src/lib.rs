mod error;
pub use error::{NomadError, NomadResult};

mod context;
pub use context::ExecutionContext;

mod cancel;
pub use cancel::{CancelCoordinator, SignalPolicy};

pub mod api;
pub use api::{ExecStreams, HttpApi, LogStream, SchedulerApi};

mod orchestrator;
pub use orchestrator::{AllocPhase, Orchestrator, WaitPolicy, classify, latest_allocation};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
