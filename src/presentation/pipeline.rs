use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::{
    assignments::{AssignmentStore, ConfirmableAssignment},
    configuration_store::ConfigProvider,
    expression::{ExpressionEvaluating, OccurrenceStore},
    identity::IdentityProvider,
    presentation::{
        gates::{self, GateTimeouts},
        PaywallState, PaywallStatePublisher, PresentationGuard, PresentationRequest,
        PresentationResult, PresentationStatus, PresentationTarget, PresentedToken,
        SubscriptionStatus, TerminationReason,
    },
    rule_logic::{RuleEvaluationOutcome, RuleLogic, TriggerResult},
    tracker::{TrackedEvent, Tracker, TriggerFireResult},
    triggers::{Experiment, TriggerRuleOccurrence},
    view::{PaywallInfo, PaywallViewProvider},
    Error,
};

/// A successfully presented paywall, kept until it is dismissed.
#[derive(Clone)]
pub struct PresentationRecord {
    pub request: PresentationRequest,
    pub publisher: Arc<PaywallStatePublisher>,
    pub info: PaywallInfo,
}

pub(crate) struct LastPresentation {
    record: PresentationRecord,
    // Holds the presentation guard until dismissal.
    _token: PresentedToken,
}

/// A paywall candidate that passed rule evaluation.
struct Candidate {
    experiment: Experiment,
    confirmable_assignment: Option<ConfirmableAssignment>,
    unsaved_occurrence: Option<TriggerRuleOccurrence>,
}

struct Presented {
    info: PaywallInfo,
    token: PresentedToken,
}

/// Publishes [`PaywallState::Finalized`] when dropped, so that a request finalizes even if its
/// task is cancelled.
struct FinalizeOnDrop<'a>(&'a PaywallStatePublisher);

impl Drop for FinalizeOnDrop<'_> {
    fn drop(&mut self) {
        self.0.finalize();
    }
}

pub(crate) struct PresentationPipeline {
    pub(crate) config: Arc<dyn ConfigProvider + Send + Sync>,
    pub(crate) assignments: Arc<dyn AssignmentStore + Send + Sync>,
    pub(crate) identity: Arc<dyn IdentityProvider + Send + Sync>,
    pub(crate) evaluator: Arc<dyn ExpressionEvaluating + Send + Sync>,
    pub(crate) occurrences: Arc<dyn OccurrenceStore + Send + Sync>,
    pub(crate) tracker: Arc<dyn Tracker + Send + Sync>,
    pub(crate) views: Arc<dyn PaywallViewProvider + Send + Sync>,
    pub(crate) guard: PresentationGuard,
    pub(crate) timeouts: GateTimeouts,
    pub(crate) last_presentation: Mutex<Option<LastPresentation>>,
}

impl PresentationPipeline {
    /// Run a presentation request to completion, publishing its states to `publisher`.
    pub(crate) async fn present(
        &self,
        request: PresentationRequest,
        publisher: Arc<PaywallStatePublisher>,
    ) {
        let _finalize = FinalizeOnDrop(&*publisher);

        match self.run_presentation(&request, &publisher).await {
            Ok(Presented { info, token }) => {
                *self.lock_last_presentation() = Some(LastPresentation {
                    record: PresentationRecord {
                        request,
                        publisher: publisher.clone(),
                        info,
                    },
                    _token: token,
                });
            }
            Err(reason) => self.terminate(&request, Some(&*publisher), reason),
        }
    }

    async fn run_presentation(
        &self,
        request: &PresentationRequest,
        publisher: &PaywallStatePublisher,
    ) -> Result<Presented, TerminationReason> {
        log::debug!(target: "paywall",
                    placement:? = request.placement(),
                    request_type:serde = request.flags.request_type,
                    debugger_launched = request.flags.is_debugger_launched;
                    "presentation requested");

        self.check_debugger(request)?;
        self.check_paywall_presented(request)?;

        gates::wait_for_subscription_status_and_config(
            request,
            self.config.config_state(),
            self.identity.has_identity(),
            self.timeouts,
        )
        .await?;

        let outcome = self.evaluate(request).await;
        let candidate = self.handle_trigger_result(request, outcome)?;
        self.check_user_subscription(request)?;

        let experiment = &candidate.experiment;
        let paywall_id = experiment.variant.paywall_id.as_deref().ok_or_else(|| {
            TerminationReason::NoPaywallView(Error::MissingPaywallId {
                variant_id: experiment.variant.id.clone(),
            })
        })?;
        let view = self
            .views
            .fetch_paywall_view(paywall_id, experiment)
            .await
            .map_err(TerminationReason::NoPaywallView)?;

        let surface = self
            .views
            .acquire_presentation_surface()
            .ok_or(TerminationReason::NoPresenter)?;

        // Requests still waiting in a gate must not count as presented.
        let token = self
            .guard
            .try_acquire()
            .ok_or(TerminationReason::PaywallAlreadyPresented)?;

        self.activate_session(
            request,
            TriggerFireResult::Paywall {
                experiment: experiment.clone(),
            },
        );

        // Confirm only now: display is imminent and nothing can suppress it anymore.
        if let Some(assignment) = &candidate.confirmable_assignment {
            self.confirm(request, assignment);
        }

        match self.views.present(&view, &surface).await {
            Ok(()) => {}
            Err(Error::PaywallAlreadyPresented) => {
                return Err(TerminationReason::PaywallAlreadyPresented)
            }
            Err(err) => return Err(TerminationReason::Unknown(err)),
        }

        if let Some(occurrence) = &candidate.unsaved_occurrence {
            self.occurrences.save(occurrence, Utc::now());
        }

        self.tracker.track(TrackedEvent::PresentationRequest {
            placement: request.placement().map(str::to_owned),
            request_type: request.flags.request_type,
            status: PresentationStatus::Presentation,
            status_reason: None,
        });

        let info = PaywallInfo {
            paywall_id: view.paywall_id,
            name: view.name,
            experiment: candidate.experiment,
            presented_by_placement: request.placement().map(str::to_owned),
            presented_at: Utc::now(),
        };
        log::info!(target: "paywall",
                   placement:? = request.placement(),
                   paywall_id = info.paywall_id.as_str();
                   "paywall presented");
        publisher.publish(PaywallState::Presented(info.clone()));

        Ok(Presented { info, token })
    }

    /// Compute the outcome of a request without presenting anything.
    ///
    /// Holdout assignments are confirmed, treatment assignments never are.
    pub(crate) async fn get_presentation_result(
        &self,
        request: PresentationRequest,
    ) -> PresentationResult {
        match self.run_presentation_result(&request).await {
            Ok(experiment) => PresentationResult::Paywall(experiment),
            Err(reason) => {
                self.terminate(&request, None, reason.clone());
                reason.into()
            }
        }
    }

    async fn run_presentation_result(
        &self,
        request: &PresentationRequest,
    ) -> Result<Experiment, TerminationReason> {
        gates::wait_to_present(
            request,
            self.config.config_state(),
            self.identity.has_identity(),
            self.timeouts,
            &*self.tracker,
        )
        .await?;

        self.check_debugger(request)?;

        let outcome = self.evaluate(request).await;
        let candidate = self.handle_trigger_result(request, outcome)?;
        self.check_user_subscription(request)?;

        Ok(candidate.experiment)
    }

    /// Evaluate the request and confirm the resulting assignment, if any.
    pub(crate) async fn confirm_assignment(
        &self,
        request: &PresentationRequest,
    ) -> Result<Option<ConfirmableAssignment>, TerminationReason> {
        gates::wait_for_subscription_status_and_config(
            request,
            self.config.config_state(),
            self.identity.has_identity(),
            self.timeouts,
        )
        .await?;

        let outcome = self.evaluate(request).await;
        if let Some(assignment) = &outcome.confirmable_assignment {
            self.confirm(request, assignment);
        }
        Ok(outcome.confirmable_assignment)
    }

    /// Evaluate audience rules for the request. Explicit paywall requests bypass the rules.
    pub(crate) async fn evaluate(&self, request: &PresentationRequest) -> RuleEvaluationOutcome {
        match &request.target {
            PresentationTarget::Placement(event) => {
                let triggers = self.config.triggers_by_placement_name();
                RuleLogic::new(&*self.assignments, &*self.evaluator)
                    .evaluate_rules(event, &triggers)
                    .await
            }
            PresentationTarget::PaywallId(paywall_id) => RuleEvaluationOutcome {
                trigger_result: TriggerResult::Paywall(Experiment::present_by_id(paywall_id)),
                confirmable_assignment: None,
                unsaved_occurrence: None,
            },
        }
    }

    pub(crate) fn last_presentation(&self) -> Option<PresentationRecord> {
        self.lock_last_presentation()
            .as_ref()
            .map(|last| last.record.clone())
    }

    /// Forget the last presentation, releasing the presentation guard.
    pub(crate) fn dismiss(&self) -> Option<PresentationRecord> {
        self.lock_last_presentation()
            .take()
            .map(|last| last.record)
    }

    fn check_debugger(&self, request: &PresentationRequest) -> Result<(), TerminationReason> {
        match request.target {
            PresentationTarget::Placement(_) if request.flags.is_debugger_launched => {
                Err(TerminationReason::DebuggerPresented)
            }
            _ => Ok(()),
        }
    }

    fn check_paywall_presented(
        &self,
        request: &PresentationRequest,
    ) -> Result<(), TerminationReason> {
        if request.flags.is_paywall_presented || self.guard.is_presented() {
            return Err(TerminationReason::PaywallAlreadyPresented);
        }
        Ok(())
    }

    fn handle_trigger_result(
        &self,
        request: &PresentationRequest,
        outcome: RuleEvaluationOutcome,
    ) -> Result<Candidate, TerminationReason> {
        match outcome.trigger_result {
            TriggerResult::Paywall(experiment) => Ok(Candidate {
                experiment,
                confirmable_assignment: outcome.confirmable_assignment,
                unsaved_occurrence: outcome.unsaved_occurrence,
            }),
            TriggerResult::Holdout(experiment) => {
                if let Some(assignment) = &outcome.confirmable_assignment {
                    self.confirm(request, assignment);
                }
                if let Some(occurrence) = &outcome.unsaved_occurrence {
                    self.occurrences.save(occurrence, Utc::now());
                }
                self.activate_session(
                    request,
                    TriggerFireResult::Holdout {
                        experiment: experiment.clone(),
                    },
                );
                Err(TerminationReason::Holdout(experiment))
            }
            TriggerResult::NoAudienceMatch(unmatched_rules) => {
                self.activate_session(request, TriggerFireResult::NoRuleMatch { unmatched_rules });
                Err(TerminationReason::NoRuleMatch)
            }
            TriggerResult::PlacementNotFound => Err(TerminationReason::PlacementNotFound),
            TriggerResult::Error(err) => {
                log::error!(target: "paywall",
                            placement:? = request.placement();
                            "error getting paywall view: {err}");
                Err(TerminationReason::NoPaywallView(err))
            }
        }
    }

    fn check_user_subscription(
        &self,
        request: &PresentationRequest,
    ) -> Result<(), TerminationReason> {
        if request.subscription_status() == SubscriptionStatus::Active
            && !request.is_subscription_check_overridden()
        {
            return Err(TerminationReason::UserIsSubscribed);
        }
        Ok(())
    }

    /// Confirm `assignment` unless the request comes from the debugger.
    fn confirm(&self, request: &PresentationRequest, assignment: &ConfirmableAssignment) {
        if request.flags.is_debugger_launched {
            log::debug!(target: "paywall",
                        experiment_id:display = assignment.experiment_id;
                        "not confirming assignment of a debugger request");
            return;
        }
        self.config.confirm_assignment(assignment);
    }

    fn activate_session(&self, request: &PresentationRequest, result: TriggerFireResult) {
        if let Some(placement) = request.placement() {
            self.tracker.track(TrackedEvent::TriggerFire {
                placement: placement.to_owned(),
                result,
            });
        }
    }

    fn terminate(
        &self,
        request: &PresentationRequest,
        publisher: Option<&PaywallStatePublisher>,
        reason: TerminationReason,
    ) {
        log::info!(target: "paywall",
                   placement:? = request.placement(),
                   status_reason = reason.status_reason();
                   "paywall not presented: {reason}");

        self.tracker.track(TrackedEvent::PresentationRequest {
            placement: request.placement().map(str::to_owned),
            request_type: request.flags.request_type,
            status: reason.status(),
            status_reason: Some(reason.status_reason()),
        });

        if let Some(publisher) = publisher {
            publisher.publish(reason.state());
        }
    }

    fn lock_last_presentation(&self) -> MutexGuard<'_, Option<LastPresentation>> {
        self.last_presentation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
