//! Stages waiting for the subscription status, configuration and identity to become usable.
use std::time::Duration;

use tokio::{sync::watch, time};

use crate::{
    configuration_store::ConfigState,
    presentation::{PresentationRequest, SubscriptionStatus, TerminationReason},
    tracker::{PendingCondition, TrackedEvent, Tracker},
    Error,
};

/// Timeouts applied by the gates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GateTimeouts {
    pub subscription_status: Duration,
    pub config: Duration,
    pub wait_to_present: Duration,
}

/// Wait for a known subscription status, then for configuration, then for identity.
///
/// Fails with [`TerminationReason::SubscriptionStatusTimeout`] if the status stays unknown, or
/// with [`TerminationReason::NoConfig`] if configuration failed or is still being retrieved
/// after the config timeout.
pub(crate) async fn wait_for_subscription_status_and_config(
    request: &PresentationRequest,
    mut config_state: watch::Receiver<ConfigState>,
    mut has_identity: watch::Receiver<bool>,
    timeouts: GateTimeouts,
) -> Result<(), TerminationReason> {
    let mut subscription_status = request.flags.subscription_status.clone();
    let status_known = time::timeout(
        timeouts.subscription_status,
        subscription_status.wait_for(|status| *status != SubscriptionStatus::Unknown),
    )
    .await
    .map(|status| status.is_ok());
    if !matches!(status_known, Ok(true)) {
        log::info!(target: "paywall",
                   placement:? = request.placement();
                   "subscription status has been \"unknown\" for over {:?}", timeouts.subscription_status);
        return Err(TerminationReason::SubscriptionStatusTimeout);
    }

    let state = config_state.borrow_and_update().clone();
    match state {
        ConfigState::Retrieved(_) => {}
        ConfigState::Failed(cause) => return Err(TerminationReason::NoConfig(cause)),
        ConfigState::Retrieving => {
            log::debug!(target: "paywall",
                        placement:? = request.placement();
                        "waiting for configuration");
            // Elapsed is not an error here; the state is re-read below.
            let _ = time::timeout(
                timeouts.config,
                config_state.wait_for(|state| !matches!(state, ConfigState::Retrieving)),
            )
            .await;

            let state = config_state.borrow().clone();
            match state {
                ConfigState::Retrieved(_) => {}
                ConfigState::Failed(cause) => return Err(TerminationReason::NoConfig(cause)),
                ConfigState::Retrieving => {
                    log::info!(target: "paywall",
                               placement:? = request.placement();
                               "configuration could not be retrieved in time");
                    return Err(TerminationReason::NoConfig(Error::NoConfig));
                }
            }
        }
    }

    if has_identity.wait_for(|identified| *identified).await.is_err() {
        log::debug!(target: "paywall", "identity provider is gone, continuing without identity");
    }

    Ok(())
}

/// Wait, without timing out, for identity, configuration and a known subscription status.
///
/// If the conditions are not met within the `wait_to_present` timeout, a
/// [`TrackedEvent::PresentationTimeout`] listing the pending conditions is tracked, and waiting
/// continues.
pub(crate) async fn wait_to_present(
    request: &PresentationRequest,
    config_state: watch::Receiver<ConfigState>,
    has_identity: watch::Receiver<bool>,
    timeouts: GateTimeouts,
    tracker: &(dyn Tracker + Send + Sync),
) -> Result<(), TerminationReason> {
    let watched = (
        request.flags.subscription_status.clone(),
        config_state.clone(),
        has_identity.clone(),
    );

    let waits = wait_for_all(
        request.flags.subscription_status.clone(),
        config_state,
        has_identity,
    );
    tokio::pin!(waits);

    tokio::select! {
        result = &mut waits => result,
        _ = time::sleep(timeouts.wait_to_present) => {
            let pending = pending_conditions(&watched.0, &watched.1, &watched.2);
            log::info!(target: "paywall",
                       placement:? = request.placement(),
                       pending:serde = pending;
                       "waiting for over {:?} to continue paywall request", timeouts.wait_to_present);
            tracker.track(TrackedEvent::PresentationTimeout {
                placement: request.placement().map(str::to_owned),
                pending,
            });
            waits.await
        }
    }
}

async fn wait_for_all(
    mut subscription_status: watch::Receiver<SubscriptionStatus>,
    mut config_state: watch::Receiver<ConfigState>,
    mut has_identity: watch::Receiver<bool>,
) -> Result<(), TerminationReason> {
    let subscription = async {
        subscription_status
            .wait_for(|status| *status != SubscriptionStatus::Unknown)
            .await
            .is_ok()
    };
    let config = async {
        let resolved = config_state
            .wait_for(|state| !matches!(state, ConfigState::Retrieving))
            .await
            .is_ok();
        if resolved {
            config_state.borrow().clone()
        } else {
            ConfigState::Retrieving
        }
    };
    let identity = async {
        // A dropped identity provider cannot resolve anymore; don't block on it.
        let _ = has_identity.wait_for(|identified| *identified).await;
    };

    let (status_known, state, ()) = tokio::join!(subscription, config, identity);

    if !status_known {
        return Err(TerminationReason::SubscriptionStatusTimeout);
    }
    match state {
        ConfigState::Retrieved(_) => Ok(()),
        ConfigState::Failed(cause) => Err(TerminationReason::NoConfig(cause)),
        ConfigState::Retrieving => Err(TerminationReason::NoConfig(Error::NoConfig)),
    }
}

fn pending_conditions(
    subscription_status: &watch::Receiver<SubscriptionStatus>,
    config_state: &watch::Receiver<ConfigState>,
    has_identity: &watch::Receiver<bool>,
) -> Vec<PendingCondition> {
    let mut pending = Vec::new();
    if *subscription_status.borrow() == SubscriptionStatus::Unknown {
        pending.push(PendingCondition::SubscriptionStatusUnknown);
    }
    if !matches!(*config_state.borrow(), ConfigState::Retrieved(_)) {
        pending.push(PendingCondition::ConfigMissing);
    }
    if !*has_identity.borrow() {
        pending.push(PendingCondition::IdentityMissing);
    }
    pending
}
