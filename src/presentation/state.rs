use std::sync::Mutex;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::{triggers::Experiment, view::PaywallInfo, Error};

/// Observable outcome of a presentation request.
#[derive(Debug, Clone)]
pub enum PaywallState {
    Presented(PaywallInfo),
    Skipped(PaywallSkippedReason),
    PresentationError(Error),
    /// Last state of every request.
    Finalized,
}

/// Why a paywall was intentionally not shown.
#[derive(Debug, Clone, PartialEq)]
pub enum PaywallSkippedReason {
    Holdout(Experiment),
    NoAudienceMatch,
    PlacementNotFound,
    UserIsSubscribed,
}

const STATE_CHANNEL_CAPACITY: usize = 16;

/// Multi-consumer publisher of a request's [`PaywallState`]s.
///
/// States are not replayed: a subscriber only sees states published after it subscribed.
/// [`PaywallState::Finalized`] is the exception; it is delivered exactly once to every
/// subscriber, including ones that subscribe after the request finished.
pub struct PaywallStatePublisher {
    sender: broadcast::Sender<PaywallState>,
    finalized: Mutex<bool>,
}

impl PaywallStatePublisher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        PaywallStatePublisher {
            sender,
            finalized: Mutex::new(false),
        }
    }

    pub fn subscribe(&self) -> PaywallStateStream {
        let finalized = self.lock_finalized();
        PaywallStateStream {
            receiver: (!*finalized).then(|| self.sender.subscribe()),
            done: false,
        }
    }

    /// Publish `state` to current subscribers. States published after finalization are
    /// dropped.
    pub fn publish(&self, state: PaywallState) {
        if matches!(state, PaywallState::Finalized) {
            self.finalize();
            return;
        }

        let finalized = self.lock_finalized();
        if *finalized {
            log::debug!(target: "paywall", "dropping paywall state published after finalization: {state:?}");
            return;
        }
        // Err only means there are no subscribers.
        let _ = self.sender.send(state);
    }

    /// Publish [`PaywallState::Finalized`]. Returns `false` if the publisher was already
    /// finalized.
    pub fn finalize(&self) -> bool {
        let mut finalized = self.lock_finalized();
        if *finalized {
            return false;
        }
        *finalized = true;
        let _ = self.sender.send(PaywallState::Finalized);
        true
    }

    pub fn is_finalized(&self) -> bool {
        *self.lock_finalized()
    }

    fn lock_finalized(&self) -> std::sync::MutexGuard<'_, bool> {
        self.finalized
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PaywallStatePublisher {
    fn default() -> Self {
        PaywallStatePublisher::new()
    }
}

/// Subscription to a [`PaywallStatePublisher`].
pub struct PaywallStateStream {
    /// `None` if subscribed after finalization.
    receiver: Option<broadcast::Receiver<PaywallState>>,
    done: bool,
}

impl PaywallStateStream {
    /// Receive the next state. Returns `None` after [`PaywallState::Finalized`] was received.
    pub async fn recv(&mut self) -> Option<PaywallState> {
        if self.done {
            return None;
        }
        let Some(receiver) = &mut self.receiver else {
            self.done = true;
            return Some(PaywallState::Finalized);
        };

        loop {
            match receiver.recv().await {
                Ok(PaywallState::Finalized) => {
                    self.done = true;
                    return Some(PaywallState::Finalized);
                }
                Ok(state) => return Some(state),
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!(target: "paywall", skipped; "paywall state subscriber lagged behind");
                }
                Err(RecvError::Closed) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }

    /// Receive all remaining states, up to and including [`PaywallState::Finalized`].
    pub async fn collect(mut self) -> Vec<PaywallState> {
        let mut states = Vec::new();
        while let Some(state) = self.recv().await {
            states.push(state);
        }
        states
    }
}
