use crate::{presentation::TerminationReason, triggers::Experiment};

/// What would happen if a placement were registered, computed without presenting anything.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationResult {
    /// No trigger is registered for the placement.
    PlacementNotFound,
    /// No audience rule matched.
    NoAudienceMatch,
    /// A paywall would be presented.
    Paywall(Experiment),
    /// The user is in a holdout group.
    Holdout(Experiment),
    /// The user is subscribed, so no paywall would be presented.
    UserIsSubscribed,
    /// A paywall could not be presented, e.g. because configuration is missing.
    PaywallNotAvailable,
}

impl From<TerminationReason> for PresentationResult {
    fn from(reason: TerminationReason) -> Self {
        match reason {
            TerminationReason::PlacementNotFound => PresentationResult::PlacementNotFound,
            TerminationReason::NoRuleMatch => PresentationResult::NoAudienceMatch,
            TerminationReason::Holdout(experiment) => PresentationResult::Holdout(experiment),
            TerminationReason::UserIsSubscribed => PresentationResult::UserIsSubscribed,
            TerminationReason::DebuggerPresented
            | TerminationReason::PaywallAlreadyPresented
            | TerminationReason::NoPaywallView(_)
            | TerminationReason::NoPresenter
            | TerminationReason::SubscriptionStatusTimeout
            | TerminationReason::NoConfig(_)
            | TerminationReason::Unknown(_) => PresentationResult::PaywallNotAvailable,
        }
    }
}
