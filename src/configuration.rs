use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    triggers::{Trigger, TryParse},
    Result,
};

/// Remote configuration relevant to placement evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Timestamp when configuration was fetched by the host.
    pub fetched_at: DateTime<Utc>,
    triggers: Arc<HashMap<String, Trigger>>,
}

/// Wire format of the configuration document.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigurationResponse {
    #[serde(default)]
    triggers: Vec<TryParse<Trigger>>,
}

impl Configuration {
    /// Create configuration from already parsed triggers. A later trigger for the same
    /// placement replaces an earlier one.
    pub fn from_triggers(triggers: impl IntoIterator<Item = Trigger>) -> Configuration {
        Configuration {
            fetched_at: Utc::now(),
            triggers: Arc::new(
                triggers
                    .into_iter()
                    .map(|trigger| (trigger.placement_name.clone(), trigger))
                    .collect(),
            ),
        }
    }

    /// Parse a JSON configuration document.
    ///
    /// Triggers that fail to parse are skipped, so one malformed trigger does not disable
    /// every other placement.
    pub fn from_json(json: &str) -> Result<Configuration> {
        let response: ConfigurationResponse = serde_json::from_str(json)?;

        let triggers = response.triggers.into_iter().filter_map(|trigger| {
            let trigger: Option<Trigger> = trigger.into();
            if trigger.is_none() {
                log::warn!(target: "paywall", "failed to parse trigger, skipping");
            }
            trigger
        });

        Ok(Configuration::from_triggers(triggers))
    }

    pub fn triggers_by_placement_name(&self) -> Arc<HashMap<String, Trigger>> {
        self.triggers.clone()
    }
}
