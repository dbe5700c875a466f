//! Per-pathway lineage locks.
//!
//! Publishing and draft edits take the exclusive side; enrollment takes the
//! shared side, so it never pins a version mid-publish.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::domain::foundation::PathwayId;

#[derive(Debug, Default)]
pub struct LineageLocks {
    locks: Mutex<HashMap<PathwayId, Arc<RwLock<()>>>>,
}

impl LineageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries no guard holds any more are dropped on the way in.
    async fn lock_for(&self, pathway_id: PathwayId) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().await;
        locks.retain(|id, lock| *id == pathway_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(pathway_id).or_default())
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn read(&self, pathway_id: PathwayId) -> OwnedRwLockReadGuard<()> {
        self.lock_for(pathway_id).await.read_owned().await
    }

    pub async fn write(&self, pathway_id: PathwayId) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(pathway_id).await.write_owned().await
    }
}
