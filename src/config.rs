use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    assignments::{AssignmentStore, Assignments},
    configuration_store::{ConfigProvider, ConfigurationStore},
    expression::{
        CombinedExpressionEvaluator, ExpressionEvaluating, ExpressionLanguage,
        InMemoryOccurrenceStore, OccurrenceStore,
    },
    identity::{IdentityManager, IdentityProvider},
    presentation::{GateTimeouts, PresentationGuard, PresentationPipeline},
    tracker::{NoopTracker, Tracker},
    view::PaywallViewProvider,
    Client,
};

/// Configuration for [`Client`].
///
/// Only the paywall view provider is required. Every other collaborator has an in-memory
/// default.
pub struct ClientConfig {
    pub(crate) config: Arc<dyn ConfigProvider + Send + Sync>,
    pub(crate) assignments: Arc<dyn AssignmentStore + Send + Sync>,
    pub(crate) identity: Arc<dyn IdentityProvider + Send + Sync>,
    pub(crate) evaluator: Option<Arc<dyn ExpressionEvaluating + Send + Sync>>,
    pub(crate) languages: Vec<(String, Arc<dyn ExpressionLanguage + Send + Sync>)>,
    pub(crate) occurrences: Arc<dyn OccurrenceStore + Send + Sync>,
    pub(crate) tracker: Arc<dyn Tracker + Send + Sync>,
    pub(crate) views: Arc<dyn PaywallViewProvider + Send + Sync>,
    pub(crate) subscription_status_timeout: Duration,
    pub(crate) config_timeout: Duration,
    pub(crate) wait_to_present_timeout: Duration,
}

impl ClientConfig {
    /// How long presentation waits for the subscription status to become known.
    pub const DEFAULT_SUBSCRIPTION_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

    /// How long presentation waits for configuration that is still being retrieved.
    pub const DEFAULT_CONFIG_TIMEOUT: Duration = Duration::from_secs(1);

    /// After how long a waiting presentation result request reports what it is waiting for.
    pub const DEFAULT_WAIT_TO_PRESENT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a default configuration presenting paywalls with `views`.
    pub fn new(views: impl PaywallViewProvider + Send + Sync + 'static) -> Self {
        let configuration_store = Arc::new(ConfigurationStore::new(Arc::new(Assignments::new())));
        ClientConfig {
            assignments: configuration_store.assignments().clone(),
            config: configuration_store,
            identity: Arc::new(IdentityManager::identified()),
            evaluator: None,
            languages: Vec::new(),
            occurrences: Arc::new(InMemoryOccurrenceStore::new()),
            tracker: Arc::new(NoopTracker),
            views: Arc::new(views),
            subscription_status_timeout: ClientConfig::DEFAULT_SUBSCRIPTION_STATUS_TIMEOUT,
            config_timeout: ClientConfig::DEFAULT_CONFIG_TIMEOUT,
            wait_to_present_timeout: ClientConfig::DEFAULT_WAIT_TO_PRESENT_TIMEOUT,
        }
    }

    /// Use `store` as both the configuration provider and the assignment store.
    pub fn configuration_store(mut self, store: Arc<ConfigurationStore>) -> Self {
        self.assignments = store.assignments().clone();
        self.config = store;
        self
    }

    pub fn config_provider(mut self, config: Arc<dyn ConfigProvider + Send + Sync>) -> Self {
        self.config = config;
        self
    }

    pub fn assignment_store(
        mut self,
        assignments: Arc<dyn AssignmentStore + Send + Sync>,
    ) -> Self {
        self.assignments = assignments;
        self
    }

    pub fn identity_provider(mut self, identity: Arc<dyn IdentityProvider + Send + Sync>) -> Self {
        self.identity = identity;
        self
    }

    pub fn occurrence_store(mut self, occurrences: Arc<dyn OccurrenceStore + Send + Sync>) -> Self {
        self.occurrences = occurrences;
        self
    }

    /// Register a runtime for audience predicates written in `language`.
    ///
    /// Ignored if a custom evaluator is set with [`ClientConfig::expression_evaluator`].
    pub fn expression_language(
        mut self,
        language: impl Into<String>,
        runtime: impl ExpressionLanguage + Send + Sync + 'static,
    ) -> Self {
        self.languages.push((language.into(), Arc::new(runtime)));
        self
    }

    /// Replace the default [`CombinedExpressionEvaluator`].
    pub fn expression_evaluator(
        mut self,
        evaluator: impl ExpressionEvaluating + Send + Sync + 'static,
    ) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Set tracker to receive analytics records of presentation requests.
    ///
    /// ```
    /// # use paywall_core::{ClientConfig, Experiment, PaywallView, PaywallViewProvider, PresentationSurface, Result, TrackedEvent};
    /// # struct Views;
    /// # #[async_trait::async_trait]
    /// # impl PaywallViewProvider for Views {
    /// #     async fn fetch_paywall_view(&self, id: &str, _: &Experiment) -> Result<PaywallView> {
    /// #         Ok(PaywallView::new(id, id))
    /// #     }
    /// #     fn acquire_presentation_surface(&self) -> Option<PresentationSurface> { None }
    /// #     async fn present(&self, _: &PaywallView, _: &PresentationSurface) -> Result<()> { Ok(()) }
    /// # }
    /// let config = ClientConfig::new(Views).tracker(|event: TrackedEvent| {
    ///     println!("{:?}", event);
    /// });
    /// ```
    pub fn tracker(mut self, tracker: impl Tracker + Send + Sync + 'static) -> Self {
        self.tracker = Arc::new(tracker);
        self
    }

    pub fn subscription_status_timeout(mut self, timeout: Duration) -> Self {
        self.subscription_status_timeout = timeout;
        self
    }

    pub fn config_timeout(mut self, timeout: Duration) -> Self {
        self.config_timeout = timeout;
        self
    }

    pub fn wait_to_present_timeout(mut self, timeout: Duration) -> Self {
        self.wait_to_present_timeout = timeout;
        self
    }

    /// Create a new [`Client`] using the specified configuration.
    pub fn to_client(self) -> Client {
        Client::new(self)
    }

    pub(crate) fn into_pipeline(self) -> PresentationPipeline {
        let evaluator: Arc<dyn ExpressionEvaluating + Send + Sync> = match self.evaluator {
            Some(evaluator) => evaluator,
            None => {
                let mut evaluator = CombinedExpressionEvaluator::new(self.occurrences.clone());
                for (language, runtime) in self.languages {
                    evaluator.register_language(language, runtime);
                }
                Arc::new(evaluator)
            }
        };

        PresentationPipeline {
            config: self.config,
            assignments: self.assignments,
            identity: self.identity,
            evaluator,
            occurrences: self.occurrences,
            tracker: self.tracker,
            views: self.views,
            guard: PresentationGuard::new(),
            timeouts: GateTimeouts {
                subscription_status: self.subscription_status_timeout,
                config: self.config_timeout,
                wait_to_present: self.wait_to_present_timeout,
            },
            last_presentation: Mutex::new(None),
        }
    }
}
