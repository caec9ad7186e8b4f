//! Matching placement events against trigger rules and resolving experiment variants.
use std::collections::HashMap;

use crate::{
    assignments::{AssignmentStore, ConfirmableAssignment},
    expression::{ExpressionEvaluating, TriggerRuleOutcome, UnmatchedRule},
    triggers::{Experiment, Trigger, TriggerRule, TriggerRuleOccurrence, VariantType},
    Error, Event,
};

/// Result of evaluating a placement against its trigger.
#[derive(Debug, Clone)]
pub enum TriggerResult {
    /// A treatment variant applies; a paywall should be shown.
    Paywall(Experiment),
    /// The user is in a holdout group.
    Holdout(Experiment),
    /// No rule matched. Holds one entry per rule of the trigger, in rule order.
    NoAudienceMatch(Vec<UnmatchedRule>),
    /// No trigger is registered for the placement.
    PlacementNotFound,
    /// Evaluation failed; e.g., a matched rule has no assignment.
    Error(Error),
}

#[derive(Debug, Clone)]
pub struct RuleEvaluationOutcome {
    pub trigger_result: TriggerResult,
    /// Assignment to persist if the request proceeds.
    pub confirmable_assignment: Option<ConfirmableAssignment>,
    /// Occurrence to save if the request proceeds.
    pub unsaved_occurrence: Option<TriggerRuleOccurrence>,
}

impl RuleEvaluationOutcome {
    fn from_result(trigger_result: TriggerResult) -> Self {
        RuleEvaluationOutcome {
            trigger_result,
            confirmable_assignment: None,
            unsaved_occurrence: None,
        }
    }
}

pub struct RuleLogic<'a> {
    assignments: &'a (dyn AssignmentStore + Send + Sync),
    evaluator: &'a (dyn ExpressionEvaluating + Send + Sync),
}

impl<'a> RuleLogic<'a> {
    pub fn new(
        assignments: &'a (dyn AssignmentStore + Send + Sync),
        evaluator: &'a (dyn ExpressionEvaluating + Send + Sync),
    ) -> Self {
        RuleLogic {
            assignments,
            evaluator,
        }
    }

    /// Evaluate `event` against the trigger registered for its name.
    ///
    /// Rules are evaluated in order and the first match wins. Evaluation has no side effects:
    /// the returned assignment and occurrence are only intents for the caller to act on.
    pub async fn evaluate_rules(
        &self,
        event: &Event,
        triggers: &HashMap<String, Trigger>,
    ) -> RuleEvaluationOutcome {
        let Some(trigger) = triggers.get(event.name()) else {
            return RuleEvaluationOutcome::from_result(TriggerResult::PlacementNotFound);
        };

        let (rule, unsaved_occurrence) = match self.find_matching_rule(event, trigger).await {
            Ok(matched) => matched,
            Err(unmatched_rules) => {
                return RuleEvaluationOutcome::from_result(TriggerResult::NoAudienceMatch(
                    unmatched_rules,
                ));
            }
        };

        let confirmed = self.assignments.confirmed_assignments();
        let (variant, is_unconfirmed) = match confirmed.get(&rule.experiment_id) {
            Some(variant) => (variant.clone(), false),
            None => match self
                .assignments
                .unconfirmed_assignments()
                .remove(&rule.experiment_id)
            {
                Some(variant) => (variant, true),
                None => {
                    log::warn!(target: "paywall",
                               placement = event.name(),
                               experiment_id:display = rule.experiment_id;
                               "matched rule has no assignment");
                    return RuleEvaluationOutcome::from_result(TriggerResult::Error(
                        Error::AssignmentNotFound {
                            experiment_id: rule.experiment_id,
                        },
                    ));
                }
            },
        };

        let experiment = Experiment {
            id: rule.experiment_id,
            group_id: rule.experiment_group_id,
            variant,
        };

        let confirm = ConfirmableAssignment {
            experiment_id: experiment.id.clone(),
            variant: experiment.variant.clone(),
        };

        match experiment.variant.variant_type {
            // Nothing downstream can turn a holdout into a shown paywall, so it is always
            // confirmable.
            VariantType::Holdout => RuleEvaluationOutcome {
                trigger_result: TriggerResult::Holdout(experiment),
                confirmable_assignment: Some(confirm),
                unsaved_occurrence,
            },
            VariantType::Treatment => RuleEvaluationOutcome {
                trigger_result: TriggerResult::Paywall(experiment),
                confirmable_assignment: is_unconfirmed.then_some(confirm),
                unsaved_occurrence,
            },
        }
    }

    async fn find_matching_rule(
        &self,
        event: &Event,
        trigger: &Trigger,
    ) -> Result<(TriggerRule, Option<TriggerRuleOccurrence>), Vec<UnmatchedRule>> {
        let mut unmatched_rules = Vec::with_capacity(trigger.rules.len());

        for rule in &trigger.rules {
            match self.evaluator.evaluate_expression(rule, event).await {
                TriggerRuleOutcome::Match {
                    rule,
                    unsaved_occurrence,
                } => return Ok((rule, unsaved_occurrence)),
                TriggerRuleOutcome::NoMatch(unmatched) => unmatched_rules.push(unmatched),
            }
        }

        Err(unmatched_rules)
    }
}
