//! ProgressEngine - enrollment and step progression.
//!
//! Every progress-changing call is one unit of work: read the enrollment and
//! its step rows, apply the change in memory, recount, and commit the batch
//! through `ProgressStore::commit`. A stale commit is retried from a fresh
//! read up to `engine.max_update_attempts` times. Events go out only after
//! the commit succeeded.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::domain::foundation::{
    BadgeClassId, DomainError, EventId, GroupId, PathwayId, PathwayVersionId, SerializableDomainEvent, StepId,
    Timestamp, UserId,
};
use crate::domain::pathway::{PathwayError, PathwayVersion};
use crate::domain::progress::{
    completion_counts, derive_elements, GroupProgressSummary, GroupSummaryBuilder, PathwayCompleted,
    PathwayElementProgress, PathwayEnrolled, PathwayProgress, ProgressError, StepCompleted, StepProgress,
    StepProgressKey, StepReopened,
};
use crate::domain::rule::{can_complete, is_unlocked, unsatisfied};
use crate::ports::{
    BadgeFactProvider, CommittedProgress, EventPublisher, GroupDirectory, PathwayRepository, ProgressCommit,
    ProgressStore,
};

use super::lineage::LineageLocks;
use super::workset::Workset;

/// Outcome of `complete_step`.
#[derive(Debug, Clone)]
pub struct StepCompletion {
    pub step: StepProgress,
    pub progress: PathwayProgress,
    /// Dependents unlocked by this completion, in the step's context.
    pub unlocked: Vec<StepId>,
    /// False when the step was already completed and nothing was written.
    pub changed: bool,
    pub pathway_completed: bool,
}

/// A step pulled back to IN_PROGRESS by a reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReopenedStep {
    pub step_id: StepId,
    pub group_id: Option<GroupId>,
    pub missing_badge: BadgeClassId,
}

/// Outcome of a reconcile pass over one enrollment.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub progress: PathwayProgress,
    pub reopened: Vec<ReopenedStep>,
    /// False when the enrollment was already consistent.
    pub changed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Recompute,
    Awarded,
    Revoked(BadgeClassId),
}

struct Enrollment {
    progress: PathwayProgress,
    announced: bool,
    completed: bool,
}

pub struct ProgressEngine {
    pathways: Arc<dyn PathwayRepository>,
    progress: Arc<dyn ProgressStore>,
    badges: Arc<dyn BadgeFactProvider>,
    groups: Arc<dyn GroupDirectory>,
    event_publisher: Arc<dyn EventPublisher>,
    locks: Arc<LineageLocks>,
    config: EngineConfig,
}

impl ProgressEngine {
    pub fn new(
        pathways: Arc<dyn PathwayRepository>,
        progress: Arc<dyn ProgressStore>,
        badges: Arc<dyn BadgeFactProvider>,
        groups: Arc<dyn GroupDirectory>,
        event_publisher: Arc<dyn EventPublisher>,
        locks: Arc<LineageLocks>,
        config: EngineConfig,
    ) -> Self {
        Self {
            pathways,
            progress,
            badges,
            groups,
            event_publisher,
            locks,
            config,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Enrollment
    // ─────────────────────────────────────────────────────────────────────────

    /// Enrolls the user against the pathway's current published version.
    ///
    /// An active enrollment is returned as is. An unenrolled one is
    /// reactivated and re-pinned to the current version; its previous
    /// period is kept in the record's history.
    pub async fn enroll(&self, user_id: &UserId, pathway_id: PathwayId) -> Result<PathwayProgress, ProgressError> {
        let _lineage = self.locks.read(pathway_id).await;

        let pathway = self
            .pathways
            .find_pathway(pathway_id)
            .await?
            .ok_or(PathwayError::NotFound(pathway_id))?;
        if pathway.is_archived() {
            return Err(ProgressError::PathwayArchived(pathway_id));
        }
        let version_id = pathway
            .current_version_id()
            .ok_or(ProgressError::NoPublishedVersion(pathway_id))?;
        let version = self.load_version(version_id).await?;

        let outcome = self
            .with_retry(user_id, pathway_id, || self.try_enroll(user_id, &version))
            .await?;

        if outcome.announced {
            tracing::info!(%user_id, %pathway_id, version = version.version(), "user enrolled");
            let event = PathwayEnrolled {
                event_id: EventId::new(),
                user_id: user_id.clone(),
                pathway_id,
                version_id,
                version: version.version(),
                enrolled_at: outcome.progress.enrolled_at(),
            };
            self.publish(user_id, event).await?;
        }
        if outcome.completed {
            self.announce_completion(&outcome.progress).await?;
        }
        Ok(outcome.progress)
    }

    async fn try_enroll(&self, user_id: &UserId, version: &PathwayVersion) -> Result<Enrollment, ProgressError> {
        let total = version.countable_leaves().len();
        let progress = match self.progress.get_pathway_progress(user_id, version.pathway_id()).await? {
            Some(existing) if existing.is_active() => {
                return Ok(Enrollment {
                    progress: existing,
                    announced: false,
                    completed: false,
                })
            }
            Some(mut inactive) => {
                inactive.re_enroll(version.id(), version.version(), total)?;
                inactive
            }
            None => PathwayProgress::enroll(user_id.clone(), version.pathway_id(), version.id(), version.version(), total),
        };

        let rows = self.progress.list_step_progress(version.id(), user_id).await?;
        let earned = self.earned_badges(user_id, version).await?;
        let mut work = Workset::new(version, user_id, rows);
        work.refresh_unlocks(None, &earned, version.steps().map(|s| s.id()));

        let elements = work.elements(&progress);
        let (commit, completed) = work.into_commit(progress, elements);
        let progress = self.progress.commit(commit).await?.pathway;

        Ok(Enrollment {
            progress,
            announced: true,
            completed,
        })
    }

    /// Marks the enrollment inactive. Step rows are kept.
    pub async fn unenroll(&self, user_id: &UserId, pathway_id: PathwayId) -> Result<PathwayProgress, ProgressError> {
        let progress = self
            .with_retry(user_id, pathway_id, || async move {
                let mut progress = self.active_progress(user_id, pathway_id).await?;
                progress.unenroll()?;
                Ok(self.progress.commit(ProgressCommit::new(progress)).await?.pathway)
            })
            .await?;
        tracing::info!(%user_id, %pathway_id, "user unenrolled");
        Ok(progress)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Step progression
    // ─────────────────────────────────────────────────────────────────────────

    /// NOT_STARTED -> IN_PROGRESS. Starting a started step changes nothing.
    pub async fn start_step(
        &self,
        user_id: &UserId,
        step_id: StepId,
        group_id: Option<GroupId>,
    ) -> Result<StepProgress, ProgressError> {
        let version = self.resolve_step(user_id, step_id, group_id).await?;
        self.with_retry(user_id, version.pathway_id(), || {
            self.try_start(user_id, &version, step_id, group_id)
        })
        .await
    }

    async fn try_start(
        &self,
        user_id: &UserId,
        version: &PathwayVersion,
        step_id: StepId,
        group_id: Option<GroupId>,
    ) -> Result<StepProgress, ProgressError> {
        let progress = self.pinned_progress(user_id, version).await?;
        let step = version.step(step_id)?;
        let rows = self.progress.list_step_progress(version.id(), user_id).await?;
        let earned = self.earned_badges(user_id, version).await?;
        let mut work = Workset::new(version, user_id, rows);

        let facts = work.facts(group_id, &earned);
        if !is_unlocked(step.prerequisite(), &facts) {
            return Err(ProgressError::StepLocked {
                step_id,
                missing: step.prerequisite().map(|r| unsatisfied(r, &facts)).unwrap_or_default(),
            });
        }

        let mut row = work.row_or_new(step_id, group_id);
        let unlocked_changed = row.set_unlocked(true);
        if !row.start()? && !unlocked_changed {
            return Ok(row);
        }
        let key = row.key().clone();
        work.put(row);

        let elements = work.elements(&progress);
        let (commit, _) = work.into_commit(progress, elements);
        let committed = self.progress.commit(commit).await?;
        tracing::debug!(%user_id, %step_id, ?group_id, "step started");
        committed_row(&committed, &key)
    }

    /// Completes a step in the (user, group?) context.
    ///
    /// The step must be unlocked and its requirement must hold. Dependents
    /// whose prerequisite now holds are unlocked and the pathway is
    /// recounted. Completing a completed step is a no-op.
    pub async fn complete_step(
        &self,
        user_id: &UserId,
        step_id: StepId,
        group_id: Option<GroupId>,
    ) -> Result<StepCompletion, ProgressError> {
        let version = self.resolve_step(user_id, step_id, group_id).await?;
        let completion = self
            .with_retry(user_id, version.pathway_id(), || {
                self.try_complete(user_id, &version, step_id, group_id)
            })
            .await?;

        if completion.changed {
            tracing::info!(
                %user_id,
                %step_id,
                ?group_id,
                unlocked = completion.unlocked.len(),
                percentage = %completion.progress.percentage(),
                "step completed"
            );
            let milestone = version.get_step(step_id).is_some_and(|s| s.is_milestone());
            let event = StepCompleted {
                event_id: EventId::new(),
                user_id: user_id.clone(),
                pathway_id: version.pathway_id(),
                version_id: version.id(),
                step_id,
                group_id,
                milestone,
                completed_at: completion.step.completed_at().unwrap_or_else(Timestamp::now),
            };
            self.publish(user_id, event).await?;
        }
        if completion.pathway_completed {
            self.announce_completion(&completion.progress).await?;
        }
        Ok(completion)
    }

    async fn try_complete(
        &self,
        user_id: &UserId,
        version: &PathwayVersion,
        step_id: StepId,
        group_id: Option<GroupId>,
    ) -> Result<StepCompletion, ProgressError> {
        let progress = self.pinned_progress(user_id, version).await?;
        let step = version.step(step_id)?;
        let rows = self.progress.list_step_progress(version.id(), user_id).await?;
        let earned = self.earned_badges(user_id, version).await?;
        let mut work = Workset::new(version, user_id, rows);

        if let Some(done) = work.row(step_id, group_id).filter(|r| r.status().is_completed()) {
            return Ok(StepCompletion {
                step: done.clone(),
                progress,
                unlocked: Vec::new(),
                changed: false,
                pathway_completed: false,
            });
        }

        let facts = work.facts(group_id, &earned);
        if !is_unlocked(step.prerequisite(), &facts) {
            return Err(ProgressError::StepLocked {
                step_id,
                missing: step.prerequisite().map(|r| unsatisfied(r, &facts)).unwrap_or_default(),
            });
        }
        if !can_complete(step.prerequisite(), step.requirement(), &facts, true) {
            return Err(ProgressError::RequirementNotMet {
                step_id,
                missing: step.requirement().map(|r| unsatisfied(r, &facts)).unwrap_or_default(),
            });
        }

        let mut row = work.row_or_new(step_id, group_id);
        row.set_unlocked(true);
        row.complete()?;
        let key = row.key().clone();
        work.put(row);

        let unlocked = work.refresh_unlocks(group_id, &earned, version.prerequisite_dependents(step_id));

        let elements = work.elements(&progress);
        let (commit, pathway_completed) = work.into_commit(progress, elements);
        let committed = self.progress.commit(commit).await?;

        Ok(StepCompletion {
            step: committed_row(&committed, &key)?,
            progress: committed.pathway,
            unlocked,
            changed: true,
            pathway_completed,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reconciliation
    // ─────────────────────────────────────────────────────────────────────────

    /// Re-derives unlock flags, badge-backed completions and counts for one
    /// enrollment. Safe to repeat; a consistent enrollment is not written.
    pub async fn recompute(&self, user_id: &UserId, pathway_id: PathwayId) -> Result<Reconciled, ProgressError> {
        self.reconcile(user_id, pathway_id, Trigger::Recompute).await
    }

    /// Advances the frontier of every active enrollment whose pinned
    /// version depends on the badge.
    pub async fn handle_badge_awarded(
        &self,
        user_id: &UserId,
        badge_class_id: BadgeClassId,
    ) -> Result<Vec<Reconciled>, ProgressError> {
        tracing::debug!(%user_id, %badge_class_id, "badge awarded");
        self.reconcile_badge(user_id, badge_class_id, Trigger::Awarded)
            .await
    }

    /// Reopens completed steps whose requirement relied on the badge, then
    /// re-locks dependents whose prerequisite no longer holds.
    pub async fn handle_badge_revoked(
        &self,
        user_id: &UserId,
        badge_class_id: BadgeClassId,
    ) -> Result<Vec<Reconciled>, ProgressError> {
        tracing::debug!(%user_id, %badge_class_id, "badge revoked");
        self.reconcile_badge(user_id, badge_class_id, Trigger::Revoked(badge_class_id))
            .await
    }

    async fn reconcile_badge(
        &self,
        user_id: &UserId,
        badge_class_id: BadgeClassId,
        trigger: Trigger,
    ) -> Result<Vec<Reconciled>, ProgressError> {
        let mut touched = Vec::new();
        for enrollment in self.progress.list_user_pathways(user_id).await? {
            if !enrollment.is_active() {
                continue;
            }
            let version = self.load_version(enrollment.version_id()).await?;
            if !version.badge_dependencies().contains(&badge_class_id) {
                continue;
            }
            let reconciled = self.reconcile(user_id, enrollment.pathway_id(), trigger).await?;
            if reconciled.changed {
                touched.push(reconciled);
            }
        }
        Ok(touched)
    }

    async fn reconcile(
        &self,
        user_id: &UserId,
        pathway_id: PathwayId,
        trigger: Trigger,
    ) -> Result<Reconciled, ProgressError> {
        let (reconciled, completed) = self
            .with_retry(user_id, pathway_id, || self.try_reconcile(user_id, pathway_id, trigger))
            .await?;

        for reopened in &reconciled.reopened {
            tracing::info!(
                %user_id,
                step_id = %reopened.step_id,
                badge_class_id = %reopened.missing_badge,
                "step reopened"
            );
            let event = StepReopened {
                event_id: EventId::new(),
                user_id: user_id.clone(),
                pathway_id,
                version_id: reconciled.progress.version_id(),
                step_id: reopened.step_id,
                group_id: reopened.group_id,
                revoked_badge_id: reopened.missing_badge,
                reopened_at: Timestamp::now(),
            };
            self.publish(user_id, event).await?;
        }
        if completed {
            self.announce_completion(&reconciled.progress).await?;
        }
        Ok(reconciled)
    }

    async fn try_reconcile(
        &self,
        user_id: &UserId,
        pathway_id: PathwayId,
        trigger: Trigger,
    ) -> Result<(Reconciled, bool), ProgressError> {
        let progress = self.active_progress(user_id, pathway_id).await?;
        let version = self.load_version(progress.version_id()).await?;
        let rows = self.progress.list_step_progress(version.id(), user_id).await?;
        let earned = self.earned_badges(user_id, &version).await?;
        let mut work = Workset::new(&version, user_id, rows);

        let candidates: Vec<StepId> = match trigger {
            Trigger::Recompute => version
                .steps()
                .filter(|s| s.requirement().is_some_and(|r| r.badge_dependencies().next().is_some()))
                .map(|s| s.id())
                .collect(),
            Trigger::Awarded => Vec::new(),
            Trigger::Revoked(badge) => version.steps_requiring_badge(badge),
        };
        let all_steps: Vec<StepId> = version.steps().map(|s| s.id()).collect();

        let mut reopened = Vec::new();
        for group_id in work.contexts() {
            for (step_id, missing_badge) in work.reopen_unsatisfied(group_id, &earned, &candidates)? {
                reopened.push(ReopenedStep {
                    step_id,
                    group_id,
                    missing_badge,
                });
            }
            work.refresh_unlocks(group_id, &earned, all_steps.iter().copied());
        }

        let elements = work.elements(&progress);
        let (done, total) = completion_counts(&elements);
        if !work.is_dirty() && !progress.counts_differ(done, total) {
            let unchanged = Reconciled {
                progress,
                reopened,
                changed: false,
            };
            return Ok((unchanged, false));
        }

        let (commit, completed) = work.into_commit(progress, elements);
        let committed = self.progress.commit(commit).await?;
        Ok((
            Reconciled {
                progress: committed.pathway,
                reopened,
                changed: true,
            },
            completed,
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The enrollment record, active or not.
    pub async fn get_progress(&self, user_id: &UserId, pathway_id: PathwayId) -> Result<PathwayProgress, ProgressError> {
        self.progress
            .get_pathway_progress(user_id, pathway_id)
            .await?
            .ok_or_else(|| not_enrolled(user_id, pathway_id))
    }

    /// Per-step view of the enrollment, in tree pre-order.
    pub async fn get_element_progress(
        &self,
        user_id: &UserId,
        pathway_id: PathwayId,
    ) -> Result<Vec<PathwayElementProgress>, ProgressError> {
        let progress = self.get_progress(user_id, pathway_id).await?;
        let cached = self.progress.get_element_progress(user_id, pathway_id).await?;
        if cached.first().is_some_and(|e| e.version_id == progress.version_id()) {
            return Ok(cached);
        }

        let version = self.load_version(progress.version_id()).await?;
        let rows = self.progress.list_step_progress(version.id(), user_id).await?;
        Ok(derive_elements(&progress, &version, &rows))
    }

    /// Roll-up of the group's members' group-context progress, per pinned
    /// version. Restricted to one pathway when `pathway_id` is given.
    pub async fn group_summary(
        &self,
        group_id: GroupId,
        pathway_id: Option<PathwayId>,
    ) -> Result<GroupProgressSummary, ProgressError> {
        let members = self.groups.members(group_id).await.map_err(collaborator)?;
        let member_count = u32::try_from(members.len()).unwrap_or(u32::MAX);
        let mut builder = GroupSummaryBuilder::new(group_id, pathway_id, member_count);

        let mut versions: HashMap<PathwayVersionId, (PathwayVersion, HashMap<UserId, Vec<StepProgress>>)> =
            HashMap::new();
        for member in &members {
            for enrollment in self.progress.list_user_pathways(member).await? {
                if !enrollment.is_active() || pathway_id.is_some_and(|p| p != enrollment.pathway_id()) {
                    continue;
                }
                let version_id = enrollment.version_id();
                if !versions.contains_key(&version_id) {
                    let version = self.load_version(version_id).await?;
                    let mut by_user: HashMap<UserId, Vec<StepProgress>> = HashMap::new();
                    for row in self.progress.list_group_step_progress(version_id, group_id).await? {
                        by_user.entry(row.key().user_id.clone()).or_default().push(row);
                    }
                    versions.insert(version_id, (version, by_user));
                }
                if let Some((version, by_user)) = versions.get(&version_id) {
                    let rows = by_user.get(member).map(Vec::as_slice).unwrap_or_default();
                    builder.add_member(version, &enrollment, rows);
                }
            }
        }
        Ok(builder.build())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs `attempt` until it does not fail with `StaleProgress`, at most
    /// `max_update_attempts` times.
    async fn with_retry<T, F, Fut>(&self, user_id: &UserId, pathway_id: PathwayId, mut attempt: F) -> Result<T, ProgressError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProgressError>>,
    {
        let attempts = self.config.max_update_attempts.max(1);
        for n in 1..=attempts {
            match attempt().await {
                Err(err) if err.is_stale() => {
                    tracing::debug!(%user_id, %pathway_id, attempt = n, error = %err, "stale progress write, retrying");
                }
                result => return result,
            }
        }
        tracing::warn!(%user_id, %pathway_id, attempts, "progress update kept conflicting");
        Err(ProgressError::ConcurrentUpdate {
            user_id: user_id.clone(),
            pathway_id,
            attempts,
        })
    }

    /// Group membership check plus the version owning the step.
    async fn resolve_step(
        &self,
        user_id: &UserId,
        step_id: StepId,
        group_id: Option<GroupId>,
    ) -> Result<PathwayVersion, ProgressError> {
        if let Some(group_id) = group_id {
            if !self.groups.is_member(group_id, user_id).await.map_err(collaborator)? {
                return Err(ProgressError::NotGroupMember {
                    user_id: user_id.clone(),
                    group_id,
                });
            }
        }
        self.pathways
            .find_version_by_step(step_id)
            .await?
            .ok_or(ProgressError::StepNotFound(step_id))
    }

    async fn active_progress(&self, user_id: &UserId, pathway_id: PathwayId) -> Result<PathwayProgress, ProgressError> {
        self.progress
            .get_pathway_progress(user_id, pathway_id)
            .await?
            .filter(PathwayProgress::is_active)
            .ok_or_else(|| not_enrolled(user_id, pathway_id))
    }

    /// The active enrollment, which must be pinned to `version`.
    async fn pinned_progress(&self, user_id: &UserId, version: &PathwayVersion) -> Result<PathwayProgress, ProgressError> {
        let progress = self.active_progress(user_id, version.pathway_id()).await?;
        if progress.version_id() != version.id() {
            return Err(ProgressError::VersionMismatch {
                pathway_id: version.pathway_id(),
                pinned_version_id: progress.version_id(),
                pinned_version: progress.version(),
                step_version_id: version.id(),
                step_version: version.version(),
            });
        }
        Ok(progress)
    }

    async fn load_version(&self, version_id: PathwayVersionId) -> Result<PathwayVersion, ProgressError> {
        Ok(self
            .pathways
            .find_version(version_id)
            .await?
            .ok_or(PathwayError::VersionNotFound(version_id))?)
    }

    async fn earned_badges(&self, user_id: &UserId, version: &PathwayVersion) -> Result<HashSet<BadgeClassId>, ProgressError> {
        let candidates: Vec<BadgeClassId> = version.badge_dependencies().into_iter().collect();
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        self.badges
            .earned_badges(user_id, &candidates)
            .await
            .map_err(collaborator)
    }

    async fn announce_completion(&self, progress: &PathwayProgress) -> Result<(), ProgressError> {
        tracing::info!(user_id = %progress.user_id(), pathway_id = %progress.pathway_id(), "pathway completed");
        let event = PathwayCompleted {
            event_id: EventId::new(),
            user_id: progress.user_id().clone(),
            pathway_id: progress.pathway_id(),
            version_id: progress.version_id(),
            version: progress.version(),
            completed_at: progress.completed_at().unwrap_or_else(Timestamp::now),
        };
        self.publish(progress.user_id(), event).await
    }

    async fn publish<E>(&self, user_id: &UserId, event: E) -> Result<(), ProgressError>
    where
        E: SerializableDomainEvent,
    {
        let envelope = event
            .to_envelope()
            .map_err(|e| ProgressError::infrastructure(format!("serializing event: {}", e)))?
            .with_user_id(user_id.to_string());
        self.event_publisher.publish(envelope).await.map_err(collaborator)
    }
}

fn not_enrolled(user_id: &UserId, pathway_id: PathwayId) -> ProgressError {
    ProgressError::NotEnrolled {
        user_id: user_id.clone(),
        pathway_id,
    }
}

fn collaborator(err: DomainError) -> ProgressError {
    ProgressError::infrastructure(err.to_string())
}

fn committed_row(committed: &CommittedProgress, key: &StepProgressKey) -> Result<StepProgress, ProgressError> {
    committed
        .steps
        .iter()
        .find(|s| s.key() == key)
        .cloned()
        .ok_or_else(|| ProgressError::infrastructure(format!("commit did not return row {}", key)))
}
