//! Placement evaluation and paywall presentation.
//!
//! # Overview
//!
//! The crate revolves around a [`Client`] that decides, for each registered placement [`Event`],
//! whether a paywall should be shown. Placements are matched against [`Trigger`]s from the
//! remote [`Configuration`]; the first [`TriggerRule`] whose audience predicate matches picks an
//! [`Experiment`] and the user's [`Variant`] in it.
//!
//! Presentation requests run through a pipeline of stages (debugger and already-presented
//! checks, waiting for subscription status and configuration, rule evaluation, subscription
//! check, paywall view retrieval and presentation). Each request publishes [`PaywallState`]s to
//! a [`PaywallStateStream`], which always ends with [`PaywallState::Finalized`].
//!
//! The host application supplies a [`PaywallViewProvider`] to load and display paywalls, and
//! may provide a [`Tracker`] to receive analytics records of every request.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. Requests that end without a paywall carry a
//! [`TerminationReason`], which maps onto a skipped state or a presentation error.
//!
//! Not presenting a paywall is a normal outcome and should never be fatal to the host. The
//! reasons are nonetheless valuable for debugging.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate with the `paywall`
//! target. Consider integrating a `log`-compatible logger implementation for better visibility
//! into presentation decisions.

#![warn(rustdoc::missing_crate_level_docs)]

mod assignments;
mod client;
mod config;
mod configuration;
mod configuration_store;
mod error;
mod event;
mod expression;
mod identity;
mod presentation;
mod rule_logic;
mod rules;
mod tracker;
mod triggers;
mod value;
mod view;

pub use assignments::{AssignmentStore, Assignments, ConfirmableAssignment};
pub use client::Client;
pub use config::ClientConfig;
pub use configuration::Configuration;
pub use configuration_store::{ConfigProvider, ConfigState, ConfigurationStore};
pub use error::{Error, Result};
pub use event::Event;
pub use expression::{
    CombinedExpressionEvaluator, ExpressionEvaluating, ExpressionLanguage,
    InMemoryOccurrenceStore, OccurrenceStore, TriggerRuleOutcome, UnmatchedRule,
    UnmatchedRuleSource,
};
pub use identity::{IdentityManager, IdentityProvider};
pub use presentation::{
    PaywallOverrides, PaywallSkippedReason, PaywallState, PaywallStatePublisher,
    PaywallStateStream, PresentationFlags, PresentationGuard, PresentationRecord,
    PresentationRequest, PresentationResult, PresentationStatus, PresentationTarget,
    PresentedToken, RequestType, SubscriptionStatus, TerminationReason,
};
pub use rule_logic::{RuleEvaluationOutcome, RuleLogic, TriggerResult};
pub use rules::{AudiencePredicate, Condition, Operator, Rule};
pub use tracker::{PendingCondition, TrackedEvent, Tracker, TriggerFireResult};
pub use triggers::{
    Experiment, ExperimentId, Interval, PreloadBehavior, Trigger, TriggerRule,
    TriggerRuleOccurrence, TryParse, Variant, VariantOption, VariantType,
};
pub use value::{Attributes, Value};
pub use view::{PaywallInfo, PaywallView, PaywallViewProvider, PresentationSurface};
