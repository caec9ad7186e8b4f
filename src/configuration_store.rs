use std::{collections::HashMap, sync::Arc};

use tokio::sync::watch;

use crate::{
    assignments::{Assignments, ConfirmableAssignment},
    configuration::Configuration,
    triggers::Trigger,
    Error,
};

/// Retrieval state of remote configuration.
#[derive(Debug, Clone)]
pub enum ConfigState {
    Retrieving,
    Retrieved(Arc<Configuration>),
    /// Retrieval failed. Holds the cause, surfaced to presentation requests.
    Failed(Error),
}

/// Source of trigger configuration and sink for assignment confirmations.
pub trait ConfigProvider {
    /// Triggers of the current configuration. Empty until configuration is retrieved.
    fn triggers_by_placement_name(&self) -> Arc<HashMap<String, Trigger>>;

    /// Stream of configuration retrieval states. The receiver observes the current state
    /// immediately.
    fn config_state(&self) -> watch::Receiver<ConfigState>;

    /// Persist `assignment`, making it authoritative.
    fn confirm_assignment(&self, assignment: &ConfirmableAssignment);
}

/// `ConfigurationStore` is an in-memory [`ConfigProvider`] that allows concurrent access for
/// readers and writers.
pub struct ConfigurationStore {
    state: watch::Sender<ConfigState>,
    assignments: Arc<Assignments>,
}

impl ConfigurationStore {
    pub fn new(assignments: Arc<Assignments>) -> Self {
        let (state, _) = watch::channel(ConfigState::Retrieving);
        Self { state, assignments }
    }

    pub fn get_configuration(&self) -> Option<Arc<Configuration>> {
        match &*self.state.borrow() {
            ConfigState::Retrieved(configuration) => Some(configuration.clone()),
            ConfigState::Retrieving | ConfigState::Failed(_) => None,
        }
    }

    /// Set new configuration, returning the previous one.
    pub fn set_configuration(&self, configuration: Configuration) -> Option<Arc<Configuration>> {
        // Constructing new value before touching the channel to minimize lock span.
        let new_value = ConfigState::Retrieved(Arc::new(configuration));

        match self.state.send_replace(new_value) {
            ConfigState::Retrieved(previous) => Some(previous),
            ConfigState::Retrieving | ConfigState::Failed(_) => None,
        }
    }

    /// Mark configuration retrieval as in progress, e.g., when a refresh starts.
    pub fn set_retrieving(&self) {
        self.state.send_replace(ConfigState::Retrieving);
    }

    /// Record a retrieval failure. Pending and future presentation requests fail with `cause`
    /// until configuration is set.
    pub fn set_failed(&self, cause: Error) {
        log::warn!(target: "paywall", "configuration retrieval failed: {cause}");
        self.state.send_replace(ConfigState::Failed(cause));
    }

    pub fn assignments(&self) -> &Arc<Assignments> {
        &self.assignments
    }
}

impl ConfigProvider for ConfigurationStore {
    fn triggers_by_placement_name(&self) -> Arc<HashMap<String, Trigger>> {
        self.get_configuration()
            .map(|configuration| configuration.triggers_by_placement_name())
            .unwrap_or_default()
    }

    fn config_state(&self) -> watch::Receiver<ConfigState> {
        self.state.subscribe()
    }

    fn confirm_assignment(&self, assignment: &ConfirmableAssignment) {
        let confirmed = self.assignments.confirm(assignment);
        log::debug!(target: "paywall",
                    experiment_id:display = assignment.experiment_id,
                    variant_id = assignment.variant_id(),
                    confirmed = confirmed;
                    "confirming assignment");
    }
}
