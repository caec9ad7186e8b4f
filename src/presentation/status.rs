use serde::Serialize;

use crate::{
    presentation::{PaywallSkippedReason, PaywallState},
    triggers::Experiment,
    Error,
};

/// Analytics status of a presentation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationStatus {
    Presentation,
    NoPresentation,
    Timeout,
}

/// Why a presentation request ended without presenting a paywall.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum TerminationReason {
    #[error("trying to present a paywall while the debugger is presented")]
    DebuggerPresented,
    #[error("a paywall is already presented")]
    PaywallAlreadyPresented,
    #[error("the user is subscribed")]
    UserIsSubscribed,
    #[error("the user is in holdout variant {} of experiment {}", .0.variant.id, .0.id)]
    Holdout(Experiment),
    #[error("no audience rule matched")]
    NoRuleMatch,
    #[error("no trigger is registered for the placement")]
    PlacementNotFound,
    #[error("error getting paywall view: {0}")]
    NoPaywallView(#[source] Error),
    #[error("no surface to present the paywall on")]
    NoPresenter,
    #[error("the subscription status failed to change from \"unknown\"")]
    SubscriptionStatusTimeout,
    #[error("configuration is not available: {0}")]
    NoConfig(#[source] Error),
    #[error(transparent)]
    Unknown(Error),
}

impl TerminationReason {
    pub fn status(&self) -> PresentationStatus {
        match self {
            TerminationReason::SubscriptionStatusTimeout
            | TerminationReason::NoConfig(Error::NoConfig) => PresentationStatus::Timeout,
            _ => PresentationStatus::NoPresentation,
        }
    }

    /// Analytics reason string.
    pub fn status_reason(&self) -> &'static str {
        match self {
            TerminationReason::DebuggerPresented => "debugger_presented",
            TerminationReason::PaywallAlreadyPresented => "paywall_already_presented",
            TerminationReason::UserIsSubscribed => "user_is_subscribed",
            TerminationReason::Holdout(_) => "holdout",
            TerminationReason::NoRuleMatch => "no_rule_match",
            TerminationReason::PlacementNotFound => "event_not_found",
            TerminationReason::NoPaywallView(_) => "no_paywall_view_controller",
            TerminationReason::NoPresenter => "no_presenter",
            TerminationReason::SubscriptionStatusTimeout => "subscription_status_timeout",
            TerminationReason::NoConfig(_) => "no_config",
            TerminationReason::Unknown(_) => "unknown",
        }
    }

    /// State published to observers of the request.
    pub fn state(&self) -> PaywallState {
        match self {
            TerminationReason::UserIsSubscribed => {
                PaywallState::Skipped(PaywallSkippedReason::UserIsSubscribed)
            }
            TerminationReason::Holdout(experiment) => {
                PaywallState::Skipped(PaywallSkippedReason::Holdout(experiment.clone()))
            }
            TerminationReason::NoRuleMatch => {
                PaywallState::Skipped(PaywallSkippedReason::NoAudienceMatch)
            }
            TerminationReason::PlacementNotFound => {
                PaywallState::Skipped(PaywallSkippedReason::PlacementNotFound)
            }
            TerminationReason::DebuggerPresented => {
                PaywallState::PresentationError(Error::DebuggerPresented)
            }
            TerminationReason::PaywallAlreadyPresented => {
                PaywallState::PresentationError(Error::PaywallAlreadyPresented)
            }
            TerminationReason::NoPresenter => PaywallState::PresentationError(Error::NoPresenter),
            TerminationReason::SubscriptionStatusTimeout => {
                PaywallState::PresentationError(Error::SubscriptionStatusTimeout)
            }
            TerminationReason::NoPaywallView(error)
            | TerminationReason::NoConfig(error)
            | TerminationReason::Unknown(error) => PaywallState::PresentationError(error.clone()),
        }
    }
}
