//! In-memory badge facts for development and testing.
//!
//! Holds the badges each user currently has. Awarding or revoking here only
//! changes the fact; publishing the matching `badge.*` event is up to the
//! caller.
//!
//! ```ignore
//! let badges = InMemoryBadgeFacts::new();
//! badges.award(&user, first_aid).await;
//! assert!(badges.is_badge_earned(&user, first_aid).await?);
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{BadgeClassId, DomainError, UserId};
use crate::ports::BadgeFactProvider;

#[derive(Debug, Clone, Default)]
pub struct InMemoryBadgeFacts {
    earned: Arc<RwLock<HashMap<UserId, HashSet<BadgeClassId>>>>,
}

impl InMemoryBadgeFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the user already held the badge.
    pub async fn award(&self, user_id: &UserId, badge_class_id: BadgeClassId) -> bool {
        self.earned
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .insert(badge_class_id)
    }

    /// Returns false if the user did not hold the badge.
    pub async fn revoke(&self, user_id: &UserId, badge_class_id: BadgeClassId) -> bool {
        self.earned
            .write()
            .await
            .get_mut(user_id)
            .is_some_and(|badges| badges.remove(&badge_class_id))
    }
}

#[async_trait]
impl BadgeFactProvider for InMemoryBadgeFacts {
    async fn is_badge_earned(&self, user_id: &UserId, badge_class_id: BadgeClassId) -> Result<bool, DomainError> {
        Ok(self
            .earned
            .read()
            .await
            .get(user_id)
            .is_some_and(|badges| badges.contains(&badge_class_id)))
    }

    async fn earned_badges(
        &self,
        user_id: &UserId,
        candidates: &[BadgeClassId],
    ) -> Result<HashSet<BadgeClassId>, DomainError> {
        let earned = self.earned.read().await;
        let Some(held) = earned.get(user_id) else {
            return Ok(HashSet::new());
        };
        Ok(candidates.iter().filter(|b| held.contains(b)).copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn award_and_revoke() {
        let facts = InMemoryBadgeFacts::new();
        let user = UserId::new("learner-1").unwrap();
        let badge = BadgeClassId::new();

        assert!(!facts.is_badge_earned(&user, badge).await.unwrap());
        assert!(facts.award(&user, badge).await);
        assert!(!facts.award(&user, badge).await);
        assert!(facts.is_badge_earned(&user, badge).await.unwrap());

        assert!(facts.revoke(&user, badge).await);
        assert!(!facts.revoke(&user, badge).await);
        assert!(!facts.is_badge_earned(&user, badge).await.unwrap());
    }

    #[tokio::test]
    async fn earned_badges_filters_candidates() {
        let facts = InMemoryBadgeFacts::new();
        let user = UserId::new("learner-1").unwrap();
        let (held, missing) = (BadgeClassId::new(), BadgeClassId::new());
        facts.award(&user, held).await;

        let earned = facts.earned_badges(&user, &[held, missing]).await.unwrap();
        assert_eq!(earned, HashSet::from([held]));

        let stranger = UserId::new("learner-2").unwrap();
        assert!(facts.earned_badges(&stranger, &[held]).await.unwrap().is_empty());
    }
}
