pub mod events;
pub mod reader;
pub mod watchdog;

pub use events::{StreamEvent, ToolCategory};
pub use reader::{AgentCommand, ExitReport, StreamItem, StreamReader};
pub use watchdog::IdleWatchdog;
