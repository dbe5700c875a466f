//! In-memory group directory.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, GroupId, UserId};
use crate::ports::GroupDirectory;

#[derive(Debug, Clone, Default)]
pub struct InMemoryGroupDirectory {
    groups: Arc<RwLock<HashMap<GroupId, BTreeSet<UserId>>>>,
}

impl InMemoryGroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_member(&self, group_id: GroupId, user_id: UserId) {
        self.groups.write().await.entry(group_id).or_default().insert(user_id);
    }

    pub async fn remove_member(&self, group_id: GroupId, user_id: &UserId) {
        if let Some(members) = self.groups.write().await.get_mut(&group_id) {
            members.remove(user_id);
        }
    }
}

#[async_trait]
impl GroupDirectory for InMemoryGroupDirectory {
    async fn is_member(&self, group_id: GroupId, user_id: &UserId) -> Result<bool, DomainError> {
        Ok(self
            .groups
            .read()
            .await
            .get(&group_id)
            .is_some_and(|members| members.contains(user_id)))
    }

    async fn members(&self, group_id: GroupId) -> Result<Vec<UserId>, DomainError> {
        Ok(self
            .groups
            .read()
            .await
            .get(&group_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_membership() {
        let directory = InMemoryGroupDirectory::new();
        let group = GroupId::new();
        let (ana, ben) = (UserId::new("ana").unwrap(), UserId::new("ben").unwrap());

        directory.add_member(group, ben.clone()).await;
        directory.add_member(group, ana.clone()).await;

        assert!(directory.is_member(group, &ana).await.unwrap());
        assert_eq!(directory.members(group).await.unwrap(), vec![ana.clone(), ben.clone()]);

        directory.remove_member(group, &ana).await;
        assert!(!directory.is_member(group, &ana).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_group_has_no_members() {
        let directory = InMemoryGroupDirectory::new();
        assert!(directory.members(GroupId::new()).await.unwrap().is_empty());
    }
}
