use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::Event;

/// Entitlement of the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Not determined yet. Presentation waits until the status is known.
    #[default]
    Unknown,
    Active,
    Inactive,
}

/// What the caller expects from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Present the paywall.
    Presentation,
    /// Only compute what would happen, without presenting anything.
    GetPresentationResult,
}

/// Per-request overrides of presentation behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaywallOverrides {
    /// Present the paywall even if the user is subscribed.
    pub ignore_subscription_status: Option<bool>,
}

/// What a request presents.
#[derive(Debug, Clone)]
pub enum PresentationTarget {
    /// Evaluate the placement's audience rules.
    Placement(Event),
    /// Present a specific paywall, bypassing rule evaluation (debugger).
    PaywallId(String),
}

#[derive(Debug, Clone)]
pub struct PresentationFlags {
    pub is_debugger_launched: bool,
    /// Host-reported "a paywall is already on screen" flag.
    pub is_paywall_presented: bool,
    pub subscription_status: watch::Receiver<SubscriptionStatus>,
    pub request_type: RequestType,
}

/// A single request to present (or evaluate) a paywall.
///
/// ```
/// # use std::collections::HashMap;
/// # use paywall_core::{Event, PresentationRequest, SubscriptionStatus};
/// let (_status, status_rx) = tokio::sync::watch::channel(SubscriptionStatus::Inactive);
/// let request = PresentationRequest::for_placement(Event::new("checkout", HashMap::new()), status_rx)
///     .debugger_launched(false);
/// assert_eq!(request.placement(), Some("checkout"));
/// ```
#[derive(Debug, Clone)]
pub struct PresentationRequest {
    pub target: PresentationTarget,
    pub flags: PresentationFlags,
    pub overrides: PaywallOverrides,
}

impl PresentationRequest {
    pub fn for_placement(
        event: Event,
        subscription_status: watch::Receiver<SubscriptionStatus>,
    ) -> Self {
        PresentationRequest::new(PresentationTarget::Placement(event), subscription_status)
    }

    pub fn for_paywall_id(
        paywall_id: impl Into<String>,
        subscription_status: watch::Receiver<SubscriptionStatus>,
    ) -> Self {
        PresentationRequest::new(
            PresentationTarget::PaywallId(paywall_id.into()),
            subscription_status,
        )
    }

    fn new(
        target: PresentationTarget,
        subscription_status: watch::Receiver<SubscriptionStatus>,
    ) -> Self {
        PresentationRequest {
            target,
            flags: PresentationFlags {
                is_debugger_launched: false,
                is_paywall_presented: false,
                subscription_status,
                request_type: RequestType::Presentation,
            },
            overrides: PaywallOverrides::default(),
        }
    }

    pub fn debugger_launched(mut self, is_debugger_launched: bool) -> Self {
        self.flags.is_debugger_launched = is_debugger_launched;
        self
    }

    pub fn paywall_presented(mut self, is_paywall_presented: bool) -> Self {
        self.flags.is_paywall_presented = is_paywall_presented;
        self
    }

    pub fn request_type(mut self, request_type: RequestType) -> Self {
        self.flags.request_type = request_type;
        self
    }

    pub fn overrides(mut self, overrides: PaywallOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Placement event of the request. `None` for explicit paywall requests.
    pub fn event(&self) -> Option<&Event> {
        match &self.target {
            PresentationTarget::Placement(event) => Some(event),
            PresentationTarget::PaywallId(_) => None,
        }
    }

    pub fn placement(&self) -> Option<&str> {
        self.event().map(Event::name)
    }

    /// Current subscription status, without waiting.
    pub(crate) fn subscription_status(&self) -> SubscriptionStatus {
        *self.flags.subscription_status.borrow()
    }

    /// Whether an active subscription should skip presentation.
    pub(crate) fn is_subscription_check_overridden(&self) -> bool {
        self.flags.is_debugger_launched || self.overrides.ignore_subscription_status == Some(true)
    }
}
