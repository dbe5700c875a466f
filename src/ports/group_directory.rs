//! GroupDirectory port - group membership resolution.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, GroupId, UserId};

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn is_member(&self, group_id: GroupId, user_id: &UserId) -> Result<bool, DomainError>;

    /// Current members; empty for an unknown group.
    async fn members(&self, group_id: GroupId) -> Result<Vec<UserId>, DomainError>;
}
