//! The paywall presentation pipeline.
//!
//! A [`PresentationRequest`] runs through an ordered sequence of stages. Each stage either lets
//! the request continue or terminates it with a [`TerminationReason`]. Every request publishes
//! its outcome to a [`PaywallStatePublisher`] and ends with [`PaywallState::Finalized`].
mod gates;
mod guard;
mod pipeline;
mod request;
mod result;
mod state;
mod status;

pub use guard::{PresentationGuard, PresentedToken};
pub(crate) use gates::GateTimeouts;
pub use pipeline::PresentationRecord;
pub(crate) use pipeline::PresentationPipeline;
pub use request::{
    PaywallOverrides, PresentationFlags, PresentationRequest, PresentationTarget, RequestType,
    SubscriptionStatus,
};
pub use result::PresentationResult;
pub use state::{PaywallSkippedReason, PaywallState, PaywallStatePublisher, PaywallStateStream};
pub use status::{PresentationStatus, TerminationReason};
