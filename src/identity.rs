use tokio::sync::watch;

/// Reports whether the user's identity has been established.
pub trait IdentityProvider {
    /// Stream of identity resolution. The receiver observes the current value immediately.
    fn has_identity(&self) -> watch::Receiver<bool>;
}

/// In-memory [`IdentityProvider`] driven by the host.
pub struct IdentityManager {
    identity: watch::Sender<bool>,
}

impl IdentityManager {
    /// Create a manager that waits for [`IdentityManager::set_identified`].
    pub fn new() -> Self {
        IdentityManager::with_identity(false)
    }

    /// Create a manager whose identity is already established.
    pub fn identified() -> Self {
        IdentityManager::with_identity(true)
    }

    fn with_identity(identified: bool) -> Self {
        let (identity, _) = watch::channel(identified);
        IdentityManager { identity }
    }

    pub fn set_identified(&self, identified: bool) {
        self.identity.send_replace(identified);
    }

    pub fn is_identified(&self) -> bool {
        *self.identity.borrow()
    }
}

impl Default for IdentityManager {
    fn default() -> Self {
        IdentityManager::new()
    }
}

impl IdentityProvider for IdentityManager {
    fn has_identity(&self) -> watch::Receiver<bool> {
        self.identity.subscribe()
    }
}
