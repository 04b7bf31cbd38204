use std::{fmt, sync::Arc};

use linthub_config::Config;
use linthub_core::{JobEventBus, JobOrchestrator, RulesService};

/// Shared state handed to every handler.
///
/// The orchestrator owns the job lifecycle; the rules service and event
/// bus are the same instances the orchestrator uses, exposed here for
/// the configuration endpoints and the log stream.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<JobOrchestrator>,
    pub rules: Arc<RulesService>,
    pub events: Arc<JobEventBus>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        orchestrator: Arc<JobOrchestrator>,
        rules: Arc<RulesService>,
        events: Arc<JobEventBus>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            rules,
            events,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
