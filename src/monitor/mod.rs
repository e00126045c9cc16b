pub mod session;
pub mod state;

pub use session::{RunObserver, RunOutcome, SessionConfig, run_session};
pub use state::{ActiveTool, CompletedTool, Phase, RunError, RunState, Stats, ToolGroup};
