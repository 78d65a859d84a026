use crate::command::CommandOrchestrator;
use crate::config::FleetConfig;
use std::sync::Arc;

/// Shared state handed to the inbound transport.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CommandOrchestrator>,
    pub fleet: Arc<FleetConfig>,
}
