//! Confirmed and unconfirmed experiment assignments.
use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::Serialize;

use crate::triggers::{ExperimentId, Variant};

/// A write-intent produced by rule evaluation. Consumed exactly once by assignment
/// confirmation, or discarded for debugger sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmableAssignment {
    pub experiment_id: ExperimentId,
    pub variant: Variant,
}

impl ConfirmableAssignment {
    pub fn variant_id(&self) -> &str {
        &self.variant.id
    }
}

/// Source of the user's experiment assignments.
pub trait AssignmentStore {
    /// Persisted, authoritative assignments.
    fn confirmed_assignments(&self) -> HashMap<ExperimentId, Variant>;

    /// Provisional assignments computed when configuration was fetched.
    fn unconfirmed_assignments(&self) -> HashMap<ExperimentId, Variant>;
}

#[derive(Debug, Default)]
struct AssignmentMaps {
    confirmed: HashMap<ExperimentId, Variant>,
    unconfirmed: HashMap<ExperimentId, Variant>,
}

/// In-memory [`AssignmentStore`] keeping confirmed and unconfirmed assignments disjoint.
#[derive(Debug, Default)]
pub struct Assignments {
    maps: RwLock<AssignmentMaps>,
}

impl Assignments {
    pub fn new() -> Self {
        Assignments::default()
    }

    /// Create a store from existing maps. Entries present in both maps are kept as confirmed
    /// only.
    pub fn from_maps(
        confirmed: HashMap<ExperimentId, Variant>,
        mut unconfirmed: HashMap<ExperimentId, Variant>,
    ) -> Self {
        unconfirmed.retain(|experiment_id, _| !confirmed.contains_key(experiment_id));
        Assignments {
            maps: RwLock::new(AssignmentMaps {
                confirmed,
                unconfirmed,
            }),
        }
    }

    /// Store a provisional assignment for `experiment_id`, unless it is already confirmed.
    pub fn set_unconfirmed(&self, experiment_id: impl Into<ExperimentId>, variant: Variant) {
        let experiment_id = experiment_id.into();
        let mut maps = self.write();
        if !maps.confirmed.contains_key(&experiment_id) {
            maps.unconfirmed.insert(experiment_id, variant);
        }
    }

    /// Move `assignment` into the confirmed map.
    ///
    /// Returns `false` if the same variant was already confirmed, in which case nothing changes.
    pub fn confirm(&self, assignment: &ConfirmableAssignment) -> bool {
        let mut maps = self.write();
        if maps.confirmed.get(&assignment.experiment_id) == Some(&assignment.variant) {
            maps.unconfirmed.remove(&assignment.experiment_id);
            return false;
        }
        maps.unconfirmed.remove(&assignment.experiment_id);
        maps.confirmed
            .insert(assignment.experiment_id.clone(), assignment.variant.clone());
        true
    }

    /// Drop provisional assignments.
    pub fn reset(&self) {
        self.write().unconfirmed.clear();
    }

    // A poisoned lock only means a writer panicked mid-update; the maps are still usable.
    fn read(&self) -> RwLockReadGuard<'_, AssignmentMaps> {
        self.maps.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AssignmentMaps> {
        self.maps
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AssignmentStore for Assignments {
    fn confirmed_assignments(&self) -> HashMap<ExperimentId, Variant> {
        self.read().confirmed.clone()
    }

    fn unconfirmed_assignments(&self) -> HashMap<ExperimentId, Variant> {
        self.read().unconfirmed.clone()
    }
}
