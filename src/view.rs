//! Boundary to the host's paywall views and presentation surfaces.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{triggers::Experiment, Result};

/// Paywall content, fetched and ready to be presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaywallView {
    pub paywall_id: String,
    pub name: String,
}

impl PaywallView {
    pub fn new(paywall_id: impl Into<String>, name: impl Into<String>) -> Self {
        PaywallView {
            paywall_id: paywall_id.into(),
            name: name.into(),
        }
    }
}

/// A host surface (window, activity, ...) a paywall can be presented on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresentationSurface {
    pub id: String,
}

impl PresentationSurface {
    pub fn new(id: impl Into<String>) -> Self {
        PresentationSurface { id: id.into() }
    }
}

/// Information about a presented paywall.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaywallInfo {
    pub paywall_id: String,
    pub name: String,
    /// Experiment the paywall was shown for.
    pub experiment: Experiment,
    /// Placement that caused the presentation. `None` for explicit paywall requests.
    pub presented_by_placement: Option<String>,
    pub presented_at: DateTime<Utc>,
}

/// Fetches paywall views and presents them on host surfaces.
#[async_trait]
pub trait PaywallViewProvider {
    /// Fetch (or build) the view for `paywall_id`.
    async fn fetch_paywall_view(&self, paywall_id: &str, experiment: &Experiment)
        -> Result<PaywallView>;

    /// Current surface to present on. `None` if the host has nothing to present on.
    fn acquire_presentation_surface(&self) -> Option<PresentationSurface>;

    /// Show `view` on `surface`.
    ///
    /// Returns [`Error::PaywallAlreadyPresented`](crate::Error::PaywallAlreadyPresented) if the
    /// host already shows a paywall on the surface.
    async fn present(&self, view: &PaywallView, surface: &PresentationSurface) -> Result<()>;
}
