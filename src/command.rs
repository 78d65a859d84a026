pub mod orchestrator;
pub mod poller;

pub use orchestrator::{CommandError, CommandOrchestrator};
pub use poller::{run_poll_loop, PollPolicy, PollRun};
