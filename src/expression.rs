//! Pluggable evaluation of audience predicates, including occurrence limiting.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    rules::AudiencePredicate,
    triggers::{ExperimentId, Interval, TriggerRule, TriggerRuleOccurrence},
    Error, Event, Result,
};

/// Why a rule did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnmatchedRuleSource {
    /// The predicate evaluated to false.
    Expression,
    /// The predicate could not be evaluated.
    ExpressionError,
    /// The predicate matched but the rule's occurrence limit has been reached.
    Occurrence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedRule {
    pub source: UnmatchedRuleSource,
    pub experiment_id: ExperimentId,
}

/// Result of evaluating a single rule against an event.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerRuleOutcome {
    Match {
        rule: TriggerRule,
        /// Occurrence that should be saved if the request proceeds.
        unsaved_occurrence: Option<TriggerRuleOccurrence>,
    },
    NoMatch(UnmatchedRule),
}

impl TriggerRuleOutcome {
    pub fn no_match(source: UnmatchedRuleSource, experiment_id: impl Into<ExperimentId>) -> Self {
        TriggerRuleOutcome::NoMatch(UnmatchedRule {
            source,
            experiment_id: experiment_id.into(),
        })
    }
}

/// Evaluates the audience predicate of a rule against an event.
#[async_trait]
pub trait ExpressionEvaluating {
    async fn evaluate_expression(&self, rule: &TriggerRule, event: &Event) -> TriggerRuleOutcome;
}

/// A runtime for a named predicate language (e.g., CEL or JavaScript).
#[async_trait]
pub trait ExpressionLanguage {
    async fn evaluate(&self, expression: &str, event: &Event) -> Result<bool>;
}

/// Persisted record of rule occurrences, used for frequency capping.
pub trait OccurrenceStore {
    /// Count saved occurrences of `occurrence.key` within its interval, as of `now`.
    fn count(&self, occurrence: &TriggerRuleOccurrence, now: DateTime<Utc>) -> usize;

    fn save(&self, occurrence: &TriggerRuleOccurrence, at: DateTime<Utc>);
}

/// An in-memory [`OccurrenceStore`].
#[derive(Default)]
pub struct InMemoryOccurrenceStore {
    occurrences: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl InMemoryOccurrenceStore {
    pub fn new() -> Self {
        InMemoryOccurrenceStore::default()
    }
}

impl OccurrenceStore for InMemoryOccurrenceStore {
    fn count(&self, occurrence: &TriggerRuleOccurrence, now: DateTime<Utc>) -> usize {
        let occurrences = match self.occurrences.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(timestamps) = occurrences.get(&occurrence.key) else {
            return 0;
        };
        match occurrence.interval {
            Interval::Infinity => timestamps.len(),
            Interval::Minutes { minutes } => {
                let since = now - Duration::minutes(minutes.into());
                timestamps.iter().filter(|&&t| t >= since).count()
            }
        }
    }

    fn save(&self, occurrence: &TriggerRuleOccurrence, at: DateTime<Utc>) {
        let mut occurrences = match self.occurrences.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };
        occurrences
            .entry(occurrence.key.clone())
            .or_default()
            .push(at);
    }
}

/// Default [`ExpressionEvaluating`] implementation.
///
/// Built-in conditions are evaluated in-process, expressions are dispatched to the runtime
/// registered for their language. A matching predicate is then checked against the rule's
/// occurrence limit.
pub struct CombinedExpressionEvaluator {
    languages: HashMap<String, Arc<dyn ExpressionLanguage + Send + Sync>>,
    occurrences: Arc<dyn OccurrenceStore + Send + Sync>,
}

impl CombinedExpressionEvaluator {
    pub fn new(occurrences: Arc<dyn OccurrenceStore + Send + Sync>) -> Self {
        CombinedExpressionEvaluator {
            languages: HashMap::new(),
            occurrences,
        }
    }

    /// Register a runtime for predicates of `language`, replacing any previous one.
    pub fn with_language(
        mut self,
        language: impl Into<String>,
        runtime: impl ExpressionLanguage + Send + Sync + 'static,
    ) -> Self {
        self.register_language(language.into(), Arc::new(runtime));
        self
    }

    pub(crate) fn register_language(
        &mut self,
        language: String,
        runtime: Arc<dyn ExpressionLanguage + Send + Sync>,
    ) {
        self.languages.insert(language, runtime);
    }

    async fn eval_predicate(&self, predicate: &AudiencePredicate, event: &Event) -> Result<bool> {
        match predicate {
            AudiencePredicate::Always => Ok(true),
            AudiencePredicate::Conditions(rule) => Ok(rule.eval(event.attributes())),
            AudiencePredicate::Expression {
                language,
                expression,
            } => {
                let runtime = self
                    .languages
                    .get(language)
                    .ok_or_else(|| Error::UnknownExpressionLanguage(language.clone()))?;
                runtime.evaluate(expression, event).await
            }
        }
    }

    fn try_to_match_occurrence(&self, rule: &TriggerRule, event: &Event) -> TriggerRuleOutcome {
        let Some(occurrence) = &rule.occurrence else {
            log::debug!(target: "paywall",
                        experiment_id:display = rule.experiment_id;
                        "no occurrence parameter found for trigger rule");
            return TriggerRuleOutcome::Match {
                rule: rule.clone(),
                unsaved_occurrence: None,
            };
        };

        let count = self.occurrences.count(occurrence, event.timestamp()) + 1;
        if count <= occurrence.max_count as usize {
            TriggerRuleOutcome::Match {
                rule: rule.clone(),
                unsaved_occurrence: Some(occurrence.clone()),
            }
        } else {
            TriggerRuleOutcome::no_match(UnmatchedRuleSource::Occurrence, &rule.experiment_id)
        }
    }
}

#[async_trait]
impl ExpressionEvaluating for CombinedExpressionEvaluator {
    async fn evaluate_expression(&self, rule: &TriggerRule, event: &Event) -> TriggerRuleOutcome {
        match self.eval_predicate(&rule.audience_predicate, event).await {
            Ok(true) => self.try_to_match_occurrence(rule, event),
            Ok(false) => {
                TriggerRuleOutcome::no_match(UnmatchedRuleSource::Expression, &rule.experiment_id)
            }
            Err(err) => {
                log::warn!(target: "paywall",
                           placement = event.name(),
                           experiment_id:display = rule.experiment_id;
                           "audience predicate evaluation failed: {err}");
                TriggerRuleOutcome::no_match(
                    UnmatchedRuleSource::ExpressionError,
                    &rule.experiment_id,
                )
            }
        }
    }
}
