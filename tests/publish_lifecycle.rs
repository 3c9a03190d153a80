//! End-to-end lifecycle tests through the assembled `Lifecycle`.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration;
use folio::adapters::memory::InMemoryEntityRepository;
use folio::application::Lifecycle;
use folio::domain::errors::{DomainError, DomainResult};
use folio::domain::models::{
    AuditAction, AuditEntry, BlockSnapshot, Config, ContentSnapshot, EntityFamily, EntityFilter,
    EntityRecord, FamilyRetention, PageSnapshot, RetentionPolicy, VersionStatus,
};
use folio::domain::ports::{AuditRecorder, Clock, EntityRepository, ManualClock};
use uuid::Uuid;
use folio::services::{GlobalBlockInstance, JobState, RunReport, ScheduledAction};
use serde_json::json;

fn statuses<S>(records: &[folio::domain::models::VersionRecord<S>]) -> Vec<(u32, VersionStatus)> {
    records.iter().map(|r| (r.version, r.status)).collect()
}

// ============================================================================
// Publishing a second version of a global block
// ============================================================================

#[test]
fn test_republish_global_block_archives_previous() {
    let (lifecycle, _clock) = common::lifecycle(Config::default());
    let blocks = &lifecycle.blocks;

    let (block, v1) = blocks
        .create_instance(BlockSnapshot::new("footer", json!({"text": "(c) 2025"})), "alice", true)
        .unwrap();
    blocks.publish(block.id, v1.version, "alice").unwrap();

    let v2 = blocks
        .save_draft(block.id, BlockSnapshot::new("footer", json!({"text": "(c) 2026"})), "bob", Some(v1.version))
        .unwrap();
    let outcome = blocks.publish(block.id, v2.version, "bob").unwrap();
    assert!(outcome.changed);

    let history = blocks.history(block.id).unwrap();
    assert_eq!(
        statuses(&history),
        vec![(1, VersionStatus::Archived), (2, VersionStatus::Published)]
    );
    assert_eq!(history[0].published_by.as_deref(), Some("alice"));
    assert_eq!(history[1].published_by.as_deref(), Some("bob"));
    assert_eq!(history[1].base_version, Some(1));

    assert_eq!(
        blocks.global_instances().unwrap(),
        vec![GlobalBlockInstance {
            entity_id: block.id,
            kind: "footer".to_string(),
            status: "published".to_string(),
            current_version: 2,
            published_version: Some(2),
        }]
    );
}

#[test]
fn test_page_references_published_block() {
    let (lifecycle, _clock) = common::lifecycle(Config::default());

    let (block, _) = lifecycle
        .blocks
        .create_instance(BlockSnapshot::new("hero", json!({})), "alice", true)
        .unwrap();
    let (page, v1) = lifecycle
        .pages
        .create(PageSnapshot::new("Home", "/").with_block(block.id), "alice")
        .unwrap();
    lifecycle.pages.create(PageSnapshot::new("About", "/about"), "alice").unwrap();

    assert!(lifecycle.pages.pages_using_block(block.id).unwrap().is_empty());

    lifecycle.pages.publish(page.id, v1.version, "alice").unwrap();
    let using: Vec<_> = lifecycle
        .pages
        .pages_using_block(block.id)
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(using, vec![page.id]);
}

// ============================================================================
// Unpublish, archive and restore
// ============================================================================

#[test]
fn test_unpublish_archive_restore_cycle() {
    let (lifecycle, _clock) = common::lifecycle(Config::default());
    let content = &lifecycle.content;

    let (entry, v1) = content
        .create(ContentSnapshot::new("Launch", "launch", "We are live"), "alice")
        .unwrap();
    content.publish(entry.id, v1.version, "alice").unwrap();
    assert_eq!(
        content.published_by_slug("launch").unwrap().map(|r| r.version),
        Some(1)
    );

    let outcome = content.unpublish(entry.id, "alice").unwrap();
    assert_eq!(outcome.entity.status, "draft");
    assert_eq!(outcome.entity.published_version, None);
    assert!(content.published_by_slug("launch").unwrap().is_none());

    let repeat = content.unpublish(entry.id, "alice").unwrap();
    assert!(!repeat.changed);

    content.archive(entry.id, "alice").unwrap();
    assert!(matches!(
        content.save_draft(entry.id, ContentSnapshot::new("Launch", "launch", "edit"), "alice", None),
        Err(DomainError::InvalidTransition { .. })
    ));

    let restored = content.restore(entry.id, 1, "alice").unwrap();
    assert_eq!(restored.entity.status, "draft");
    assert_eq!(restored.entity.current_version, 2);
    let draft = restored.version.unwrap();
    assert_eq!(draft.version, 2);
    assert_eq!(draft.snapshot.body, "We are live");

    assert_eq!(
        statuses(&content.history(entry.id).unwrap()),
        vec![(1, VersionStatus::Archived), (2, VersionStatus::Draft)]
    );
}

#[test]
fn test_failed_publish_leaves_entity_untouched() {
    let (lifecycle, _clock) = common::lifecycle(Config::default());
    let content = &lifecycle.content;

    let (entry, v1) = content
        .create(ContentSnapshot::new("Draft", "draft", ""), "carol")
        .unwrap();

    assert!(matches!(
        content.publish(entry.id, v1.version, "carol"),
        Err(DomainError::GuardRejected { .. })
    ));
    assert!(matches!(
        content.publish(entry.id, 9, "alice"),
        Err(DomainError::VersionNotFound { version: 9, .. })
    ));

    let after = content.get(entry.id).unwrap();
    assert_eq!(after, entry);
    assert_eq!(statuses(&content.history(entry.id).unwrap()), vec![(1, VersionStatus::Draft)]);
}

#[test]
fn test_retention_reject_keeps_pointers() {
    let mut config = Config::default();
    config.retention.content = FamilyRetention::new(2, RetentionPolicy::Reject);
    let (lifecycle, _clock) = common::lifecycle(config);
    let content = &lifecycle.content;

    let (entry, _) = content.create(ContentSnapshot::new("A", "a", "1"), "alice").unwrap();
    content
        .save_draft(entry.id, ContentSnapshot::new("A", "a", "2"), "alice", Some(1))
        .unwrap();

    let result = content.save_draft(entry.id, ContentSnapshot::new("A", "a", "3"), "alice", Some(2));
    assert!(matches!(result, Err(DomainError::RetentionExceeded { limit: 2, .. })));
    assert_eq!(content.get(entry.id).unwrap().current_version, 2);
    assert_eq!(content.history(entry.id).unwrap().len(), 2);
}

// ============================================================================
// Audit trail
// ============================================================================

#[test]
fn test_audit_log_records_each_step() {
    let (lifecycle, _clock) = common::lifecycle(Config::default());
    let (entry, v1) = lifecycle
        .content
        .create(ContentSnapshot::new("Post", "post", ""), "alice")
        .unwrap();
    lifecycle.content.publish(entry.id, v1.version, "alice").unwrap();
    lifecycle.content.archive(entry.id, "alice").unwrap();

    let audit = lifecycle.audit_log().unwrap();
    let mut actions: Vec<_> = audit.entity_history(entry.id).into_iter().map(|e| e.action).collect();
    actions.reverse();
    assert_eq!(
        actions,
        vec![AuditAction::EntityCreated, AuditAction::VersionPublished, AuditAction::EntityArchived]
    );
    assert_eq!(audit.stats().total_entries, 3);
}

struct FailingRecorder {
    attempts: AtomicUsize,
}

impl AuditRecorder for FailingRecorder {
    fn record(&self, _entry: AuditEntry) -> Result<(), String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err("audit sink offline".to_string())
    }
}

#[test]
fn test_audit_failure_does_not_fail_operation() {
    let recorder = Arc::new(FailingRecorder {
        attempts: AtomicUsize::new(0),
    });
    let lifecycle = Lifecycle::builder(Config::default())
        .with_clock(Arc::new(ManualClock::fixed()))
        .with_authorizer(common::authorizer())
        .with_audit_recorder(recorder.clone())
        .build()
        .unwrap();
    assert!(lifecycle.audit_log().is_none());

    let (entry, v1) = lifecycle
        .content
        .create(ContentSnapshot::new("Post", "post", ""), "alice")
        .unwrap();
    let outcome = lifecycle.content.publish(entry.id, v1.version, "alice").unwrap();

    assert!(outcome.changed);
    assert_eq!(lifecycle.content.get(entry.id).unwrap().published_version, Some(1));
    assert_eq!(recorder.attempts.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Scheduled publishing
// ============================================================================

#[test]
fn test_scheduled_publish_fires_once_due() {
    let (lifecycle, clock) = common::lifecycle(Config::default());
    let (entry, v1) = lifecycle
        .content
        .create(ContentSnapshot::new("Embargoed", "embargoed", ""), "alice")
        .unwrap();

    let run_at = clock.now() + Duration::hours(1);
    let action = ScheduledAction::Publish { version: v1.version };
    let job_id = lifecycle
        .scheduler
        .schedule(EntityFamily::Content, entry.id, action, run_at, "alice")
        .unwrap();

    assert_eq!(lifecycle.scheduler.run_due(clock.now()), RunReport::default());
    assert_eq!(lifecycle.content.get(entry.id).unwrap().status, "draft");

    clock.advance(Duration::hours(2));
    let report = lifecycle.scheduler.run_due(clock.now());
    assert_eq!(report.applied, 1);
    assert_eq!(lifecycle.content.get(entry.id).unwrap().published_version, Some(1));
    assert_eq!(lifecycle.scheduler.get(job_id).unwrap().state, JobState::Completed);

    // A repeated delivery of the same publish is skipped, not failed.
    lifecycle
        .scheduler
        .schedule(EntityFamily::Content, entry.id, action, run_at, "alice")
        .unwrap();
    let report = lifecycle.scheduler.run_due(clock.now());
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
}

#[test]
fn test_scheduled_publish_by_unauthorized_actor_fails() {
    let (lifecycle, clock) = common::lifecycle(Config::default());
    let (entry, v1) = lifecycle
        .content
        .create(ContentSnapshot::new("Post", "post", ""), "carol")
        .unwrap();

    let job_id = lifecycle
        .scheduler
        .schedule(
            EntityFamily::Content,
            entry.id,
            ScheduledAction::Publish { version: v1.version },
            clock.now(),
            "carol",
        )
        .unwrap();

    let report = lifecycle.scheduler.run_due(clock.now());
    assert_eq!(report.failed, 1);
    assert!(matches!(
        lifecycle.scheduler.get(job_id).unwrap().state,
        JobState::Failed { .. }
    ));
    assert_eq!(lifecycle.content.get(entry.id).unwrap().status, "draft");
}

// ============================================================================
// Entity writes that fail after the ledger moved
// ============================================================================

/// Repository whose next `n` updates fail with a retryable error.
struct FlakyRepository {
    inner: InMemoryEntityRepository,
    failing_updates: AtomicUsize,
}

impl FlakyRepository {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryEntityRepository::new(),
            failing_updates: AtomicUsize::new(0),
        })
    }

    fn fail_next_updates(&self, n: usize) {
        self.failing_updates.store(n, Ordering::SeqCst);
    }
}

impl EntityRepository for FlakyRepository {
    fn insert(&self, entity: &EntityRecord) -> DomainResult<()> {
        self.inner.insert(entity)
    }

    fn get(&self, id: Uuid) -> DomainResult<Option<EntityRecord>> {
        self.inner.get(id)
    }

    fn update(&self, entity: &EntityRecord) -> DomainResult<()> {
        let failing = self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DomainError::RepositoryError("connection reset".to_string()));
        }
        self.inner.update(entity)
    }

    fn list(&self, filter: &EntityFilter) -> DomainResult<Vec<EntityRecord>> {
        self.inner.list(filter)
    }
}

fn flaky_lifecycle() -> (Lifecycle, Arc<FlakyRepository>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::fixed());
    let repository = FlakyRepository::new();
    let lifecycle = Lifecycle::builder(Config::default())
        .with_clock(clock.clone())
        .with_authorizer(common::authorizer())
        .with_repository(repository.clone())
        .build()
        .unwrap();
    (lifecycle, repository, clock)
}

#[test]
fn test_scheduled_publish_retry_repairs_entity() {
    let (lifecycle, repository, clock) = flaky_lifecycle();
    let (entry, v1) = lifecycle
        .content
        .create(ContentSnapshot::new("Embargoed", "embargoed", ""), "alice")
        .unwrap();
    let job_id = lifecycle
        .scheduler
        .schedule(
            EntityFamily::Content,
            entry.id,
            ScheduledAction::Publish { version: v1.version },
            clock.now(),
            "alice",
        )
        .unwrap();

    repository.fail_next_updates(1);
    let first = lifecycle.scheduler.run_due(clock.now());
    assert_eq!(first, RunReport { retrying: 1, ..RunReport::default() });
    assert_eq!(lifecycle.scheduler.get(job_id).unwrap().state, JobState::Pending);
    assert_eq!(lifecycle.content.get(entry.id).unwrap().published_version, None);
    assert_eq!(
        statuses(&lifecycle.content.history(entry.id).unwrap()),
        vec![(1, VersionStatus::Published)]
    );

    let retry = lifecycle.scheduler.run_due(clock.now());
    assert_eq!(retry, RunReport { applied: 1, ..RunReport::default() });
    assert_eq!(lifecycle.scheduler.get(job_id).unwrap().state, JobState::Completed);

    let stored = lifecycle.content.get(entry.id).unwrap();
    assert_eq!(stored.status, "published");
    assert_eq!(stored.published_version, Some(1));
}

#[test]
fn test_publish_retry_after_failed_write() {
    let (lifecycle, repository, _clock) = flaky_lifecycle();
    let content = &lifecycle.content;
    let (entry, v1) = content.create(ContentSnapshot::new("Post", "post", ""), "alice").unwrap();

    repository.fail_next_updates(1);
    let err = content.publish(entry.id, v1.version, "alice").unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(content.get(entry.id).unwrap(), entry);

    let retry = content.publish(entry.id, v1.version, "alice").unwrap();
    assert!(retry.changed);
    assert_eq!(retry.entity.status, "published");
    assert_eq!(retry.entity.published_version, Some(1));
    assert_eq!(content.get(entry.id).unwrap(), retry.entity);

    let repeat = content.publish(entry.id, v1.version, "alice").unwrap();
    assert!(!repeat.changed);

    let audit = lifecycle.audit_log().unwrap();
    let published: Vec<_> = audit
        .entity_history(entry.id)
        .into_iter()
        .filter(|e| e.action == AuditAction::VersionPublished)
        .collect();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].metadata.get("reconciled"), Some(&json!(true)));
}

#[test]
fn test_republish_retry_after_failed_write() {
    let (lifecycle, repository, _clock) = flaky_lifecycle();
    let content = &lifecycle.content;
    let (entry, _) = content.create(ContentSnapshot::new("Post", "post", "1"), "alice").unwrap();
    content.publish(entry.id, 1, "alice").unwrap();
    content
        .save_draft(entry.id, ContentSnapshot::new("Post", "post", "2"), "alice", Some(1))
        .unwrap();

    repository.fail_next_updates(1);
    assert!(content.publish(entry.id, 2, "bob").is_err());
    assert_eq!(content.get(entry.id).unwrap().published_version, Some(1));

    let retry = content.publish(entry.id, 2, "bob").unwrap();
    assert!(retry.changed);
    assert_eq!(retry.entity.published_version, Some(2));
    assert_eq!(
        statuses(&content.history(entry.id).unwrap()),
        vec![(1, VersionStatus::Archived), (2, VersionStatus::Published)]
    );
}

#[test]
fn test_unpublish_retry_after_failed_write() {
    let (lifecycle, repository, _clock) = flaky_lifecycle();
    let content = &lifecycle.content;
    let (entry, v1) = content.create(ContentSnapshot::new("Post", "post", ""), "alice").unwrap();
    content.publish(entry.id, v1.version, "alice").unwrap();

    repository.fail_next_updates(1);
    assert!(content.unpublish(entry.id, "alice").unwrap_err().is_retryable());
    assert_eq!(content.get(entry.id).unwrap().published_version, Some(1));
    assert!(content.published_by_slug("post").unwrap().is_none());

    let retry = content.unpublish(entry.id, "alice").unwrap();
    assert!(retry.changed);
    assert_eq!(retry.entity.status, "draft");
    assert_eq!(retry.entity.published_version, None);
    assert!(!content.unpublish(entry.id, "alice").unwrap().changed);
}

#[test]
fn test_unpublish_after_failed_publish_write_clears_ledger() {
    let (lifecycle, repository, _clock) = flaky_lifecycle();
    let content = &lifecycle.content;
    let (entry, v1) = content.create(ContentSnapshot::new("Post", "post", ""), "alice").unwrap();

    repository.fail_next_updates(1);
    assert!(content.publish(entry.id, v1.version, "alice").is_err());
    assert!(content.published_by_slug("post").unwrap().is_some());

    let outcome = content.unpublish(entry.id, "alice").unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.entity.status, "draft");
    assert_eq!(outcome.version.map(|r| r.version), Some(1));
    assert!(content.published_by_slug("post").unwrap().is_none());
    assert_eq!(
        statuses(&content.history(entry.id).unwrap()),
        vec![(1, VersionStatus::Archived)]
    );
}

#[test]
fn test_restore_retry_after_failed_write() {
    let (lifecycle, repository, _clock) = flaky_lifecycle();
    let content = &lifecycle.content;
    let (entry, v1) = content.create(ContentSnapshot::new("Post", "post", ""), "alice").unwrap();
    content.publish(entry.id, v1.version, "alice").unwrap();
    content.archive(entry.id, "alice").unwrap();

    repository.fail_next_updates(1);
    assert!(content.restore(entry.id, 1, "alice").is_err());
    let stuck = content.get(entry.id).unwrap();
    assert_eq!(stuck.status, "archived");
    assert_eq!(stuck.current_version, 1);

    let restored = content.restore(entry.id, 1, "alice").unwrap();
    assert_eq!(restored.entity.status, "draft");
    assert_eq!(restored.entity.current_version, 3);
    assert_eq!(
        statuses(&content.history(entry.id).unwrap()),
        vec![(1, VersionStatus::Archived), (2, VersionStatus::Draft), (3, VersionStatus::Draft)]
    );
}

#[test]
fn test_failed_draft_write_picked_up_by_next_operation() {
    let (lifecycle, repository, _clock) = flaky_lifecycle();
    let content = &lifecycle.content;
    let (entry, v1) = content.create(ContentSnapshot::new("Post", "post", "1"), "alice").unwrap();

    repository.fail_next_updates(1);
    assert!(content
        .save_draft(entry.id, ContentSnapshot::new("Post", "post", "2"), "alice", Some(1))
        .is_err());
    assert_eq!(content.get(entry.id).unwrap().current_version, 1);

    let outcome = content.publish(entry.id, v1.version, "alice").unwrap();
    assert_eq!(outcome.entity.current_version, 2);
    assert_eq!(content.get(entry.id).unwrap().current_version, 2);
}
