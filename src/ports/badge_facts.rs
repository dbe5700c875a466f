//! BadgeFactProvider port - whether a user holds a badge.
//!
//! Badge issuance and revocation live outside the engine. The engine only
//! asks for the current fact and reacts to awarded/revoked events.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::foundation::{BadgeClassId, DomainError, UserId};

#[async_trait]
pub trait BadgeFactProvider: Send + Sync {
    /// True if the user currently holds an unrevoked badge of this class.
    async fn is_badge_earned(&self, user_id: &UserId, badge_class_id: BadgeClassId) -> Result<bool, DomainError>;

    /// The subset of `candidates` the user holds.
    ///
    /// The default asks one badge at a time; adapters with a bulk lookup
    /// should override it.
    async fn earned_badges(
        &self,
        user_id: &UserId,
        candidates: &[BadgeClassId],
    ) -> Result<HashSet<BadgeClassId>, DomainError> {
        let mut earned = HashSet::new();
        for badge in candidates {
            if self.is_badge_earned(user_id, *badge).await? {
                earned.insert(*badge);
            }
        }
        Ok(earned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_fact_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn BadgeFactProvider) {}
    }
}
