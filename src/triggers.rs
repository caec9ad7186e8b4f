use serde::{Deserialize, Serialize};

use crate::rules::AudiencePredicate;

/// Identifier of an experiment.
pub type ExperimentId = String;

/// Configuration mapping a placement name to an ordered list of audience rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub placement_name: String,
    pub rules: Vec<TriggerRule>,
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}
impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// A single audience rule: a predicate gating which experiment applies to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRule {
    pub experiment_id: ExperimentId,
    pub experiment_group_id: String,
    pub variants: Vec<VariantOption>,
    #[serde(default)]
    pub audience_predicate: AudiencePredicate,
    #[serde(default)]
    pub preload: PreloadBehavior,
    #[serde(default)]
    pub occurrence: Option<TriggerRuleOccurrence>,
}

/// Whether the paywall of a rule should be preloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreloadBehavior {
    /// Preload only if the audience predicate evaluates to true.
    #[default]
    IfTrue,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariantType {
    /// The user is shown a paywall.
    Treatment,
    /// The user is deliberately withheld from seeing a paywall.
    Holdout,
}

/// A bucket of an experiment as configured, including its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOption {
    pub id: String,
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    #[serde(default)]
    pub percentage: u32,
    #[serde(default)]
    pub paywall_id: Option<String>,
}

impl VariantOption {
    pub fn to_variant(&self) -> Variant {
        Variant {
            id: self.id.clone(),
            variant_type: self.variant_type,
            paywall_id: self.paywall_id.clone(),
        }
    }
}

/// The bucket an experiment assigned to the current user.
///
/// Treatment variants carry a paywall identifier; holdout variants never do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paywall_id: Option<String>,
}

impl Variant {
    pub fn treatment(id: impl Into<String>, paywall_id: impl Into<String>) -> Variant {
        Variant {
            id: id.into(),
            variant_type: VariantType::Treatment,
            paywall_id: Some(paywall_id.into()),
        }
    }

    pub fn holdout(id: impl Into<String>) -> Variant {
        Variant {
            id: id.into(),
            variant_type: VariantType::Holdout,
            paywall_id: None,
        }
    }
}

/// An experiment paired with the variant applicable to the current user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: ExperimentId,
    pub group_id: String,
    pub variant: Variant,
}

impl Experiment {
    /// Experiment used when a paywall is requested explicitly by id (debugger), bypassing rule
    /// evaluation.
    pub fn present_by_id(paywall_id: impl Into<String>) -> Experiment {
        let paywall_id = paywall_id.into();
        Experiment {
            id: paywall_id.clone(),
            group_id: String::new(),
            variant: Variant {
                id: String::new(),
                variant_type: VariantType::Treatment,
                paywall_id: Some(paywall_id),
            },
        }
    }
}

/// Frequency cap attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRuleOccurrence {
    pub key: String,
    pub max_count: u32,
    pub interval: Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interval {
    Infinity,
    Minutes { minutes: u32 },
}
