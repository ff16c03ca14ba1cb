//! Explicit ownership scope.
//!
//! The core never asks "whose data is this". Callers resolve the set of
//! reservoirs a user owns once, up front, and pass that set around; every
//! lookup by id goes through it.

use crate::models::Reservoir;
use crate::store::{ReservoirDirectory, StoreResult};

// ---

/// The reservoirs an authenticated user may read and write.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessScope {
    owner_id: i64,
    reservoirs: Vec<Reservoir>,
}

impl AccessScope {
    // ---
    pub fn new(owner_id: i64, reservoirs: Vec<Reservoir>) -> Self {
        // ---
        let reservoirs = reservoirs
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .collect();
        AccessScope {
            owner_id,
            reservoirs,
        }
    }

    /// Resolve the scope of `owner_id` from the directory.
    pub async fn load(directory: &dyn ReservoirDirectory, owner_id: i64) -> StoreResult<Self> {
        let reservoirs = directory.list_for_owner(owner_id).await?;
        Ok(AccessScope::new(owner_id, reservoirs))
    }

    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }

    /// The reservoir, if it exists and belongs to the owner.
    pub fn reservoir(&self, reservoir_id: i64) -> Option<&Reservoir> {
        self.reservoirs.iter().find(|r| r.id == reservoir_id)
    }

    pub fn contains(&self, reservoir_id: i64) -> bool {
        self.reservoir(reservoir_id).is_some()
    }

    pub fn reservoirs(&self) -> &[Reservoir] {
        &self.reservoirs
    }

    pub fn reservoir_ids(&self) -> Vec<i64> {
        self.reservoirs.iter().map(|r| r.id).collect()
    }
}
