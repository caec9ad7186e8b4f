use std::sync::Arc;

/// Represents a result type for operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur while evaluating placements and presenting
/// paywalls.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Remote configuration could not be retrieved. Holds the cause reported by the
    /// configuration provider.
    #[error("configuration retrieval failed: {0}")]
    ConfigurationFailed(Arc<str>),

    /// Configuration has not been retrieved in time.
    #[error("trying to present paywall without the config")]
    NoConfig,

    /// Subscription status stayed `Unknown` for too long.
    #[error("the subscription status failed to change from \"unknown\"")]
    SubscriptionStatusTimeout,

    /// A placement was registered while the debugger is presented.
    #[error("trying to present a paywall while the debugger is presented")]
    DebuggerPresented,

    /// Another paywall is already on screen.
    #[error("trying to present paywall while another paywall is presented")]
    PaywallAlreadyPresented,

    /// The host did not provide a surface to present the paywall on.
    #[error("no surface to present the paywall on")]
    NoPresenter,

    /// A rule matched but the experiment has neither a confirmed nor an unconfirmed assignment.
    /// This should normally never happen and indicates inconsistent configuration.
    #[error("there isn't a paywall configured to show in this context (experiment: {experiment_id})")]
    AssignmentNotFound {
        /// Experiment of the matched rule.
        experiment_id: String,
    },

    /// A treatment variant was resolved but it has no paywall to show.
    #[error("treatment variant {variant_id} has no paywall id")]
    MissingPaywallId {
        /// Id of the offending variant.
        variant_id: String,
    },

    /// The view provider failed to produce a paywall view.
    #[error("error getting paywall view: {0}")]
    PaywallView(Arc<str>),

    /// An expression runtime failed to evaluate an audience predicate.
    #[error("expression evaluation failed: {0}")]
    Expression(Arc<str>),

    /// No expression runtime is registered for the predicate language.
    #[error("no expression evaluator registered for language {0:?}")]
    UnknownExpressionLanguage(String),

    /// The host failed to present the paywall view.
    #[error("presentation failed: {0}")]
    Presentation(Arc<str>),

    /// Error parsing configuration.
    #[error(transparent)]
    // serde_json::Error is not clonable, so we're wrapping it in an Arc.
    ConfigurationParse(Arc<serde_json::Error>),
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::ConfigurationParse(Arc::new(value))
    }
}

impl Error {
    /// Convenience constructor for view provider failures.
    pub fn paywall_view(message: impl AsRef<str>) -> Self {
        Error::PaywallView(Arc::from(message.as_ref()))
    }

    /// Convenience constructor for expression runtime failures.
    pub fn expression(message: impl AsRef<str>) -> Self {
        Error::Expression(Arc::from(message.as_ref()))
    }

    /// Convenience constructor for presentation failures reported by the host.
    pub fn presentation(message: impl AsRef<str>) -> Self {
        Error::Presentation(Arc::from(message.as_ref()))
    }

    /// Convenience constructor for configuration retrieval failures.
    pub fn configuration_failed(message: impl AsRef<str>) -> Self {
        Error::ConfigurationFailed(Arc::from(message.as_ref()))
    }
}
