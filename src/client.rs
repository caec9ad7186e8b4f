use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::watch;

use crate::{
    assignments::ConfirmableAssignment,
    presentation::{
        PaywallStatePublisher, PaywallStateStream, PresentationPipeline, PresentationRecord,
        PresentationRequest, PresentationResult, RequestType, SubscriptionStatus,
        TerminationReason,
    },
    rule_logic::RuleEvaluationOutcome,
    ClientConfig, Event,
};

/// A client deciding whether placements present paywalls, and presenting them.
///
/// In order to create a client instance, first create [`ClientConfig`]. Clones share the same
/// state.
#[derive(Clone)]
pub struct Client {
    pipeline: Arc<PresentationPipeline>,
    subscription_status: Arc<watch::Sender<SubscriptionStatus>>,
    debugger_launched: Arc<AtomicBool>,
}

impl Client {
    /// Create a new `Client` using the specified configuration.
    pub fn new(config: ClientConfig) -> Self {
        let (subscription_status, _) = watch::channel(SubscriptionStatus::Unknown);
        Client {
            pipeline: Arc::new(config.into_pipeline()),
            subscription_status: Arc::new(subscription_status),
            debugger_launched: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Update the user's subscription status. Requests waiting for a known status resume.
    pub fn set_subscription_status(&self, status: SubscriptionStatus) {
        self.subscription_status.send_replace(status);
    }

    pub fn subscription_status(&self) -> SubscriptionStatus {
        *self.subscription_status.borrow()
    }

    /// Mark the debugger as launched. While launched, placements do not present paywalls and
    /// no assignments are confirmed.
    pub fn set_debugger_launched(&self, launched: bool) {
        self.debugger_launched.store(launched, Ordering::Release);
    }

    /// Create a presentation request for `event` with the client's current flags.
    pub fn placement_request(&self, event: Event) -> PresentationRequest {
        PresentationRequest::for_placement(event, self.subscription_status.subscribe())
            .debugger_launched(self.debugger_launched.load(Ordering::Acquire))
    }

    /// Register a placement, presenting a paywall if its audience rules say so.
    ///
    /// The request runs in the background; the returned stream yields its states and ends
    /// with [`PaywallState::Finalized`](crate::PaywallState::Finalized).
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn present(&self, event: Event) -> PaywallStateStream {
        self.present_request(self.placement_request(event))
    }

    /// Present a specific paywall, bypassing audience rules. Used by the debugger.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn present_paywall(&self, paywall_id: impl Into<String>) -> PaywallStateStream {
        let request =
            PresentationRequest::for_paywall_id(paywall_id, self.subscription_status.subscribe())
                .debugger_launched(self.debugger_launched.load(Ordering::Acquire));
        self.present_request(request)
    }

    /// Run `request` in the background.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn present_request(&self, request: PresentationRequest) -> PaywallStateStream {
        let publisher = Arc::new(PaywallStatePublisher::new());
        let stream = publisher.subscribe();

        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            pipeline.present(request, publisher).await;
        });

        stream
    }

    /// Compute what registering `event` would do, without presenting anything.
    ///
    /// Holdout assignments are confirmed; treatment assignments are not.
    pub async fn get_presentation_result(&self, event: Event) -> PresentationResult {
        let request = self
            .placement_request(event)
            .request_type(RequestType::GetPresentationResult);
        self.pipeline.get_presentation_result(request).await
    }

    /// Evaluate `event` and confirm the resulting assignment, returning it.
    ///
    /// Returns `Ok(None)` if the placement has nothing to confirm.
    pub async fn confirm_assignment(
        &self,
        event: Event,
    ) -> Result<Option<ConfirmableAssignment>, TerminationReason> {
        let request = self
            .placement_request(event)
            .request_type(RequestType::GetPresentationResult);
        self.pipeline.confirm_assignment(&request).await
    }

    /// Evaluate `event` against the current configuration without any side effects.
    pub async fn evaluate_rules(&self, event: Event) -> RuleEvaluationOutcome {
        let request = self.placement_request(event);
        self.pipeline.evaluate(&request).await
    }

    /// The paywall currently presented, if any.
    pub fn last_presentation(&self) -> Option<PresentationRecord> {
        self.pipeline.last_presentation()
    }

    /// Notify the client that the presented paywall was dismissed, allowing the next paywall to
    /// be presented.
    pub fn dismiss(&self) -> Option<PresentationRecord> {
        self.pipeline.dismiss()
    }

    pub fn is_paywall_presented(&self) -> bool {
        self.pipeline.guard.is_presented()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use async_trait::async_trait;
    use tokio::sync::watch;

    use crate::{
        assignments::{AssignmentStore, Assignments, ConfirmableAssignment},
        configuration::Configuration,
        configuration_store::{ConfigProvider, ConfigState, ConfigurationStore},
        expression::UnmatchedRuleSource,
        presentation::{
            PaywallOverrides, PaywallSkippedReason, PaywallState, PresentationResult,
            PresentationStatus, SubscriptionStatus,
        },
        rule_logic::TriggerResult,
        rules::{AudiencePredicate, Condition, Operator, Rule},
        tracker::{TrackedEvent, TriggerFireResult},
        triggers::{
            Experiment, Interval, PreloadBehavior, Trigger, TriggerRule, TriggerRuleOccurrence,
            Variant,
        },
        view::{PaywallView, PaywallViewProvider, PresentationSurface},
        Client, ClientConfig, Error, Event, Result,
    };

    /// Configuration provider counting assignment confirmations.
    struct CountingConfig {
        store: ConfigurationStore,
        confirmations: AtomicUsize,
    }

    impl ConfigProvider for CountingConfig {
        fn triggers_by_placement_name(&self) -> Arc<HashMap<String, Trigger>> {
            self.store.triggers_by_placement_name()
        }

        fn config_state(&self) -> watch::Receiver<ConfigState> {
            self.store.config_state()
        }

        fn confirm_assignment(&self, assignment: &ConfirmableAssignment) {
            self.confirmations.fetch_add(1, Ordering::SeqCst);
            self.store.confirm_assignment(assignment);
        }
    }

    #[derive(Clone, Default)]
    struct TestViews {
        fetched: Arc<Mutex<Vec<String>>>,
        presented: Arc<Mutex<Vec<String>>>,
        no_surface: bool,
        present_error: Option<Error>,
    }

    #[async_trait]
    impl PaywallViewProvider for TestViews {
        async fn fetch_paywall_view(
            &self,
            paywall_id: &str,
            _experiment: &Experiment,
        ) -> Result<PaywallView> {
            self.fetched.lock().unwrap().push(paywall_id.to_owned());
            Ok(PaywallView::new(paywall_id, format!("Paywall {paywall_id}")))
        }

        fn acquire_presentation_surface(&self) -> Option<PresentationSurface> {
            (!self.no_surface).then(|| PresentationSurface::new("main"))
        }

        async fn present(&self, view: &PaywallView, _surface: &PresentationSurface) -> Result<()> {
            if let Some(err) = &self.present_error {
                return Err(err.clone());
            }
            self.presented.lock().unwrap().push(view.paywall_id.clone());
            Ok(())
        }
    }

    struct Harness {
        client: Client,
        config: Arc<CountingConfig>,
        assignments: Arc<Assignments>,
        views: TestViews,
        tracked: Arc<Mutex<Vec<TrackedEvent>>>,
    }

    impl Harness {
        fn new(views: TestViews) -> Harness {
            let _ = env_logger::builder().is_test(true).try_init();

            let assignments = Arc::new(Assignments::new());
            let config = Arc::new(CountingConfig {
                store: ConfigurationStore::new(assignments.clone()),
                confirmations: AtomicUsize::new(0),
            });
            let tracked = Arc::new(Mutex::new(Vec::new()));

            let client = ClientConfig::new(views.clone())
                .config_provider(config.clone())
                .assignment_store(assignments.clone())
                .tracker({
                    let tracked = tracked.clone();
                    move |event: TrackedEvent| tracked.lock().unwrap().push(event)
                })
                .to_client();
            client.set_subscription_status(SubscriptionStatus::Inactive);

            Harness {
                client,
                config,
                assignments,
                views,
                tracked,
            }
        }

        fn with_rules(rules: Vec<TriggerRule>) -> Harness {
            Harness::with_views_and_rules(TestViews::default(), rules)
        }

        fn with_views_and_rules(views: TestViews, rules: Vec<TriggerRule>) -> Harness {
            let harness = Harness::new(views);
            harness
                .config
                .store
                .set_configuration(Configuration::from_triggers([Trigger {
                    placement_name: "checkout".into(),
                    rules,
                }]));
            harness
        }

        fn confirmations(&self) -> usize {
            self.config.confirmations.load(Ordering::SeqCst)
        }

        fn tracked(&self) -> Vec<TrackedEvent> {
            self.tracked.lock().unwrap().clone()
        }
    }

    fn rule(experiment_id: &str, predicate: AudiencePredicate) -> TriggerRule {
        TriggerRule {
            experiment_id: experiment_id.into(),
            experiment_group_id: "group".into(),
            variants: vec![],
            audience_predicate: predicate,
            preload: PreloadBehavior::IfTrue,
            occurrence: None,
        }
    }

    fn checkout(plan: &str) -> Event {
        Event::new(
            "checkout",
            HashMap::from([("plan".to_owned(), plan.into())]),
        )
    }

    #[tokio::test]
    async fn undefined_placement_is_skipped() {
        let harness = Harness::with_rules(vec![]);
        harness
            .config
            .store
            .set_configuration(Configuration::from_triggers(Vec::new()));

        let outcome = harness.client.evaluate_rules(checkout("free")).await;
        assert!(matches!(outcome.trigger_result, TriggerResult::PlacementNotFound));

        let states = harness.client.present(checkout("free")).collect().await;
        assert!(matches!(
            states[..],
            [
                PaywallState::Skipped(PaywallSkippedReason::PlacementNotFound),
                PaywallState::Finalized
            ]
        ));
        assert_eq!(harness.confirmations(), 0);
        assert!(!harness
            .tracked()
            .iter()
            .any(|event| matches!(event, TrackedEvent::TriggerFire { .. })));
    }

    #[tokio::test]
    async fn unmatched_audience_is_skipped() {
        let harness = Harness::with_rules(vec![rule(
            "exp1",
            AudiencePredicate::Conditions(Rule::new(vec![Condition::new(
                "plan",
                Operator::Eq,
                "pro",
            )])),
        )]);

        let states = harness.client.present(checkout("free")).collect().await;
        assert!(matches!(
            states[..],
            [
                PaywallState::Skipped(PaywallSkippedReason::NoAudienceMatch),
                PaywallState::Finalized
            ]
        ));

        let tracked = harness.tracked();
        assert!(tracked.iter().any(|event| matches!(
            event,
            TrackedEvent::TriggerFire {
                result: TriggerFireResult::NoRuleMatch { unmatched_rules },
                ..
            } if unmatched_rules.len() == 1
                && unmatched_rules[0].source == UnmatchedRuleSource::Expression
        )));
        assert!(tracked.contains(&TrackedEvent::PresentationRequest {
            placement: Some("checkout".into()),
            request_type: crate::RequestType::Presentation,
            status: PresentationStatus::NoPresentation,
            status_reason: Some("no_rule_match"),
        }));
    }

    #[tokio::test]
    async fn holdout_is_confirmed_once_and_skipped() {
        let harness = Harness::with_rules(vec![rule("exp1", AudiencePredicate::Always)]);
        harness
            .assignments
            .set_unconfirmed("exp1", Variant::holdout("h1"));

        let states = harness.client.present(checkout("free")).collect().await;

        let [PaywallState::Skipped(PaywallSkippedReason::Holdout(experiment)), PaywallState::Finalized] =
            &states[..]
        else {
            panic!("unexpected states: {states:?}");
        };
        assert_eq!(experiment.id, "exp1");
        assert_eq!(experiment.variant, Variant::holdout("h1"));
        assert_eq!(harness.confirmations(), 1);
        assert!(harness
            .assignments
            .confirmed_assignments()
            .contains_key("exp1"));
        assert!(harness.assignments.unconfirmed_assignments().is_empty());
        assert!(!harness.client.is_paywall_presented());
    }

    #[tokio::test]
    async fn confirmed_treatment_is_presented() {
        let harness = Harness::with_rules(vec![rule("exp2", AudiencePredicate::Always)]);
        harness.assignments.confirm(&ConfirmableAssignment {
            experiment_id: "exp2".into(),
            variant: Variant::treatment("t1", "pw1"),
        });

        let states = harness.client.present(checkout("free")).collect().await;

        let [PaywallState::Presented(info), PaywallState::Finalized] = &states[..] else {
            panic!("unexpected states: {states:?}");
        };
        assert_eq!(info.paywall_id, "pw1");
        assert_eq!(info.experiment.id, "exp2");
        assert_eq!(info.experiment.variant.id, "t1");
        assert_eq!(info.presented_by_placement.as_deref(), Some("checkout"));
        assert_eq!(*harness.views.fetched.lock().unwrap(), vec!["pw1".to_owned()]);
        assert_eq!(*harness.views.presented.lock().unwrap(), vec!["pw1".to_owned()]);
        // already confirmed
        assert_eq!(harness.confirmations(), 0);

        assert!(harness.client.is_paywall_presented());
        let last = harness.client.last_presentation().unwrap();
        assert_eq!(last.info.paywall_id, "pw1");
        assert!(last.publisher.is_finalized());

        assert!(harness.client.dismiss().is_some());
        assert!(!harness.client.is_paywall_presented());
        assert!(harness.client.last_presentation().is_none());
    }

    #[tokio::test]
    async fn unconfirmed_treatment_is_confirmed_when_presented() {
        let harness = Harness::with_rules(vec![rule("exp2", AudiencePredicate::Always)]);
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));

        let states = harness.client.present(checkout("free")).collect().await;

        assert!(matches!(states[0], PaywallState::Presented(_)));
        assert_eq!(harness.confirmations(), 1);
        assert!(harness
            .assignments
            .confirmed_assignments()
            .contains_key("exp2"));
    }

    #[tokio::test]
    async fn treatment_is_not_confirmed_without_surface() {
        let harness = Harness::with_views_and_rules(
            TestViews {
                no_surface: true,
                ..TestViews::default()
            },
            vec![rule("exp2", AudiencePredicate::Always)],
        );
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));

        let states = harness.client.present(checkout("free")).collect().await;

        assert!(matches!(
            states[..],
            [
                PaywallState::PresentationError(Error::NoPresenter),
                PaywallState::Finalized
            ]
        ));
        assert_eq!(harness.confirmations(), 0);
        assert!(harness
            .assignments
            .unconfirmed_assignments()
            .contains_key("exp2"));
        // the guard is released when the request terminates
        assert!(!harness.client.is_paywall_presented());
    }

    #[tokio::test]
    async fn second_paywall_is_not_presented() {
        let harness = Harness::with_rules(vec![rule("exp2", AudiencePredicate::Always)]);
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));

        let first = harness.client.present(checkout("free")).collect().await;
        assert!(matches!(first[0], PaywallState::Presented(_)));

        let second = harness.client.present(checkout("free")).collect().await;
        assert!(matches!(
            second[..],
            [
                PaywallState::PresentationError(Error::PaywallAlreadyPresented),
                PaywallState::Finalized
            ]
        ));
        assert_eq!(harness.views.presented.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_request_does_not_block_other_presentations() {
        let harness = Harness::with_rules(vec![rule("exp1", AudiencePredicate::Always)]);
        harness
            .assignments
            .set_unconfirmed("exp1", Variant::holdout("h1"));
        harness
            .client
            .set_subscription_status(SubscriptionStatus::Unknown);

        let first = harness.client.present(checkout("free"));
        let second = harness.client.present_paywall("pw9");

        // both requests are now parked on the subscription status gate
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert!(!harness.client.is_paywall_presented());

        harness
            .client
            .set_subscription_status(SubscriptionStatus::Inactive);
        let (first, second) = tokio::join!(first.collect(), second.collect());

        assert!(matches!(
            first[..],
            [
                PaywallState::Skipped(PaywallSkippedReason::Holdout(_)),
                PaywallState::Finalized
            ]
        ));
        let [PaywallState::Presented(info), PaywallState::Finalized] = &second[..] else {
            panic!("unexpected states: {second:?}");
        };
        assert_eq!(info.paywall_id, "pw9");
        assert_eq!(*harness.views.presented.lock().unwrap(), vec!["pw9".to_owned()]);
        assert!(harness.client.is_paywall_presented());
        assert!(!harness.tracked().iter().any(|event| matches!(
            event,
            TrackedEvent::PresentationRequest {
                status_reason: Some("paywall_already_presented"),
                ..
            }
        )));
    }

    #[tokio::test]
    async fn host_rejecting_presentation_is_already_presented() {
        let harness = Harness::with_views_and_rules(
            TestViews {
                present_error: Some(Error::PaywallAlreadyPresented),
                ..TestViews::default()
            },
            vec![rule("exp2", AudiencePredicate::Always)],
        );
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));

        let states = harness.client.present(checkout("free")).collect().await;

        assert!(matches!(
            states[..],
            [
                PaywallState::PresentationError(Error::PaywallAlreadyPresented),
                PaywallState::Finalized
            ]
        ));
        assert!(harness.tracked().contains(&TrackedEvent::PresentationRequest {
            placement: Some("checkout".into()),
            request_type: crate::RequestType::Presentation,
            status: PresentationStatus::NoPresentation,
            status_reason: Some("paywall_already_presented"),
        }));
        assert!(!harness.client.is_paywall_presented());
        assert!(harness.client.last_presentation().is_none());
    }

    #[tokio::test]
    async fn failing_presentation_is_unknown_error() {
        let harness = Harness::with_views_and_rules(
            TestViews {
                present_error: Some(Error::presentation("surface detached")),
                ..TestViews::default()
            },
            vec![rule("exp2", AudiencePredicate::Always)],
        );
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));

        let states = harness.client.present(checkout("free")).collect().await;

        assert!(matches!(
            states[..],
            [
                PaywallState::PresentationError(Error::Presentation(_)),
                PaywallState::Finalized
            ]
        ));
        assert!(harness.tracked().contains(&TrackedEvent::PresentationRequest {
            placement: Some("checkout".into()),
            request_type: crate::RequestType::Presentation,
            status: PresentationStatus::NoPresentation,
            status_reason: Some("unknown"),
        }));
        assert!(!harness.client.is_paywall_presented());

        // the guard is free for the next request
        let states = harness.client.present(checkout("free")).collect().await;
        assert!(matches!(
            states[0],
            PaywallState::PresentationError(Error::Presentation(_))
        ));
    }

    #[tokio::test]
    async fn matched_rule_without_assignment_is_no_paywall_view() {
        let harness = Harness::with_rules(vec![rule("exp3", AudiencePredicate::Always)]);

        let states = harness.client.present(checkout("free")).collect().await;

        let [PaywallState::PresentationError(Error::AssignmentNotFound { experiment_id }), PaywallState::Finalized] =
            &states[..]
        else {
            panic!("unexpected states: {states:?}");
        };
        assert_eq!(experiment_id, "exp3");
        assert!(harness.tracked().contains(&TrackedEvent::PresentationRequest {
            placement: Some("checkout".into()),
            request_type: crate::RequestType::Presentation,
            status: PresentationStatus::NoPresentation,
            status_reason: Some("no_paywall_view_controller"),
        }));
        assert!(harness.views.fetched.lock().unwrap().is_empty());
        assert_eq!(harness.confirmations(), 0);
    }

    #[tokio::test]
    async fn subscribed_user_is_skipped_unless_overridden() {
        let harness = Harness::with_rules(vec![rule("exp2", AudiencePredicate::Always)]);
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));
        harness
            .client
            .set_subscription_status(SubscriptionStatus::Active);

        let states = harness.client.present(checkout("free")).collect().await;
        assert!(matches!(
            states[0],
            PaywallState::Skipped(PaywallSkippedReason::UserIsSubscribed)
        ));
        assert!(harness.views.fetched.lock().unwrap().is_empty());
        assert_eq!(harness.confirmations(), 0);

        let request = harness
            .client
            .placement_request(checkout("free"))
            .overrides(PaywallOverrides {
                ignore_subscription_status: Some(true),
            });
        let states = harness.client.present_request(request).collect().await;
        assert!(matches!(states[0], PaywallState::Presented(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_subscription_status_times_out() {
        let harness = Harness::with_rules(vec![rule("exp1", AudiencePredicate::Always)]);
        harness
            .assignments
            .set_unconfirmed("exp1", Variant::holdout("h1"));
        harness
            .client
            .set_subscription_status(SubscriptionStatus::Unknown);

        let states = harness.client.present(checkout("free")).collect().await;

        assert!(matches!(
            states[..],
            [
                PaywallState::PresentationError(Error::SubscriptionStatusTimeout),
                PaywallState::Finalized
            ]
        ));
        // never reached rule evaluation
        assert_eq!(harness.confirmations(), 0);
        assert_eq!(
            harness.tracked(),
            vec![TrackedEvent::PresentationRequest {
                placement: Some("checkout".into()),
                request_type: crate::RequestType::Presentation,
                status: PresentationStatus::Timeout,
                status_reason: Some("subscription_status_timeout"),
            }]
        );
    }

    #[tokio::test]
    async fn failed_configuration_is_a_presentation_error() {
        let harness = Harness::new(TestViews::default());
        harness
            .config
            .store
            .set_failed(Error::configuration_failed("offline"));

        let states = harness.client.present(checkout("free")).collect().await;

        assert!(matches!(
            states[..],
            [
                PaywallState::PresentationError(Error::ConfigurationFailed(_)),
                PaywallState::Finalized
            ]
        ));
    }

    #[tokio::test]
    async fn debugger_blocks_placements_but_presents_paywall_ids() {
        let harness = Harness::with_rules(vec![rule("exp2", AudiencePredicate::Always)]);
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));
        harness.client.set_debugger_launched(true);

        let states = harness.client.present(checkout("free")).collect().await;
        assert!(matches!(
            states[0],
            PaywallState::PresentationError(Error::DebuggerPresented)
        ));

        let states = harness.client.present_paywall("pw9").collect().await;
        let [PaywallState::Presented(info), PaywallState::Finalized] = &states[..] else {
            panic!("unexpected states: {states:?}");
        };
        assert_eq!(info.paywall_id, "pw9");
        assert_eq!(info.experiment, Experiment::present_by_id("pw9"));
        assert_eq!(info.presented_by_placement, None);
        assert_eq!(harness.confirmations(), 0);
    }

    #[tokio::test]
    async fn presentation_result_confirms_holdouts_only() {
        let harness = Harness::with_rules(vec![
            rule(
                "exp1",
                AudiencePredicate::Conditions(Rule::new(vec![Condition::new(
                    "plan",
                    Operator::Eq,
                    "free",
                )])),
            ),
            rule("exp2", AudiencePredicate::Always),
        ]);
        harness
            .assignments
            .set_unconfirmed("exp1", Variant::holdout("h1"));
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));

        let result = harness.client.get_presentation_result(checkout("pro")).await;
        assert!(matches!(result, PresentationResult::Paywall(ref e) if e.id == "exp2"));
        assert_eq!(harness.confirmations(), 0);

        let result = harness.client.get_presentation_result(checkout("free")).await;
        assert!(matches!(result, PresentationResult::Holdout(ref e) if e.id == "exp1"));
        assert_eq!(harness.confirmations(), 1);

        let result = harness
            .client
            .get_presentation_result(Event::new("settings", HashMap::new()))
            .await;
        assert_eq!(result, PresentationResult::PlacementNotFound);

        // nothing was presented
        assert!(harness.views.fetched.lock().unwrap().is_empty());
        assert!(!harness.client.is_paywall_presented());
    }

    #[tokio::test]
    async fn confirm_assignment_confirms_treatment() {
        let harness = Harness::with_rules(vec![rule("exp2", AudiencePredicate::Always)]);
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));

        let assignment = harness
            .client
            .confirm_assignment(checkout("free"))
            .await
            .unwrap();

        assert_eq!(assignment.map(|a| a.variant), Some(Variant::treatment("t1", "pw1")));
        assert_eq!(harness.confirmations(), 1);
        assert!(harness.views.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn occurrence_is_saved_on_presentation() {
        let harness = Harness::with_rules(vec![TriggerRule {
            occurrence: Some(TriggerRuleOccurrence {
                key: "checkout-once".into(),
                max_count: 1,
                interval: Interval::Infinity,
            }),
            ..rule("exp2", AudiencePredicate::Always)
        }]);
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));

        let states = harness.client.present(checkout("free")).collect().await;
        assert!(matches!(states[0], PaywallState::Presented(_)));
        harness.client.dismiss();

        let states = harness.client.present(checkout("free")).collect().await;
        assert!(matches!(
            states[0],
            PaywallState::Skipped(PaywallSkippedReason::NoAudienceMatch)
        ));
    }

    #[tokio::test]
    async fn late_subscriber_observes_finalized_once() {
        let harness = Harness::with_rules(vec![rule("exp2", AudiencePredicate::Always)]);
        harness
            .assignments
            .set_unconfirmed("exp2", Variant::treatment("t1", "pw1"));

        let states = harness.client.present(checkout("free")).collect().await;
        assert_eq!(
            states
                .iter()
                .filter(|state| matches!(state, PaywallState::Finalized))
                .count(),
            1
        );

        let last = harness.client.last_presentation().unwrap();
        let late = last.publisher.subscribe().collect().await;
        assert!(matches!(late[..], [PaywallState::Finalized]));
    }
}
