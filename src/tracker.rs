use serde::Serialize;

use crate::{
    expression::UnmatchedRule,
    presentation::{PresentationStatus, RequestType},
    triggers::Experiment,
};

/// Analytics record emitted by the presentation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum TrackedEvent {
    /// Outcome of a presentation request. Emitted once per request.
    PresentationRequest {
        /// Placement name, absent for explicit paywall requests.
        placement: Option<String>,
        request_type: RequestType,
        status: PresentationStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_reason: Option<&'static str>,
    },
    /// A placement was evaluated against its audience rules. Activates the session.
    TriggerFire {
        placement: String,
        result: TriggerFireResult,
    },
    /// Presentation has been waiting for longer than expected.
    PresentationTimeout {
        placement: Option<String>,
        pending: Vec<PendingCondition>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum TriggerFireResult {
    Paywall { experiment: Experiment },
    Holdout { experiment: Experiment },
    NoRuleMatch { unmatched_rules: Vec<UnmatchedRule> },
}

/// A condition presentation is still waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingCondition {
    SubscriptionStatusUnknown,
    ConfigMissing,
    IdentityMissing,
}

/// Receives analytics records, e.g., to forward them to a data warehouse.
pub trait Tracker {
    fn track(&self, event: TrackedEvent);
}

pub(crate) struct NoopTracker;
impl Tracker for NoopTracker {
    fn track(&self, _event: TrackedEvent) {}
}

impl<T: Fn(TrackedEvent)> Tracker for T {
    fn track(&self, event: TrackedEvent) {
        self(event);
    }
}
