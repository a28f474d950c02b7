use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::rep::{SalesRepId, SalesRepresentative};
use crate::errors::StoreError;

/// Read-only view of sales representatives.
///
/// An unknown id is reported as inactive rather than as an error.
#[async_trait]
pub trait RepRegistry: Send + Sync {
    async fn is_active(&self, id: &SalesRepId) -> Result<bool, StoreError>;
    async fn find_rep(&self, id: &SalesRepId) -> Result<Option<SalesRepresentative>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryRepRegistry {
    reps: RwLock<HashMap<SalesRepId, SalesRepresentative>>,
}

impl InMemoryRepRegistry {
    pub fn with_reps(reps: Vec<SalesRepresentative>) -> Self {
        Self { reps: RwLock::new(reps.into_iter().map(|rep| (rep.id.clone(), rep)).collect()) }
    }

    /// Returns `false` when the representative is unknown.
    pub async fn set_active(&self, id: &SalesRepId, active: bool) -> bool {
        match self.reps.write().await.get_mut(id) {
            Some(rep) => {
                rep.active = active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RepRegistry for InMemoryRepRegistry {
    async fn is_active(&self, id: &SalesRepId) -> Result<bool, StoreError> {
        Ok(self.reps.read().await.get(id).map(|rep| rep.active).unwrap_or(false))
    }

    async fn find_rep(&self, id: &SalesRepId) -> Result<Option<SalesRepresentative>, StoreError> {
        Ok(self.reps.read().await.get(id).cloned())
    }
}
