use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Single-slot guard ensuring at most one paywall is presented at a time.
#[derive(Debug, Clone, Default)]
pub struct PresentationGuard {
    presented: Arc<AtomicBool>,
}

impl PresentationGuard {
    pub fn new() -> Self {
        PresentationGuard::default()
    }

    /// Atomically claim the slot. Returns `None` if another request holds it.
    pub fn try_acquire(&self) -> Option<PresentedToken> {
        self.presented
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PresentedToken {
                presented: self.presented.clone(),
            })
    }

    pub fn is_presented(&self) -> bool {
        self.presented.load(Ordering::Acquire)
    }
}

/// Proof of holding the [`PresentationGuard`] slot. The slot is released on drop.
#[derive(Debug)]
pub struct PresentedToken {
    presented: Arc<AtomicBool>,
}

impl Drop for PresentedToken {
    fn drop(&mut self) {
        self.presented.store(false, Ordering::Release);
    }
}
