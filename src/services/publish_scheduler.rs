//! Scheduled publish and unpublish.
//!
//! Jobs are fired through the same synchronous coordinator calls a user
//! would make. Delivery is at-least-once: a job that fails with a retryable
//! error stays pending, and a repeat of an operation that already happened
//! is reported as skipped rather than failed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EntityFamily, SchedulerConfig};
use crate::domain::ports::Clock;
use crate::services::publish_coordinator::ScheduledLifecycle;

/// What a job does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduledAction {
    Publish { version: u32 },
    Unpublish,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Completed,
    Failed { reason: String },
    Cancelled,
}

/// A publish or unpublish waiting for its time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub family: EntityFamily,
    pub entity_id: Uuid,
    pub action: ScheduledAction,
    pub run_at: DateTime<Utc>,
    pub actor: String,
    pub state: JobState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduledJob {
    pub fn is_pending(&self) -> bool {
        self.state == JobState::Pending
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.run_at <= now
    }

    fn same_request(&self, other: &ScheduledJob) -> bool {
        self.family == other.family
            && self.entity_id == other.entity_id
            && self.action == other.action
            && self.run_at == other.run_at
    }
}

/// Outcome counts of one `run_due` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Jobs that changed an entity.
    pub applied: usize,
    /// Jobs whose operation had already happened.
    pub skipped: usize,
    /// Jobs left pending after a retryable error.
    pub retrying: usize,
    pub failed: usize,
}

struct SchedulerCore {
    targets: HashMap<EntityFamily, Arc<dyn ScheduledLifecycle>>,
    clock: Arc<dyn Clock>,
    max_jobs: usize,
    jobs: Mutex<Vec<ScheduledJob>>,
}

impl SchedulerCore {
    fn fire(&self, job: &ScheduledJob) -> DomainResult<bool> {
        let target = self
            .targets
            .get(&job.family)
            .ok_or_else(|| DomainError::UnknownEntityType(job.family.to_string()))?;

        match job.action {
            ScheduledAction::Publish { version } => {
                target.publish_scheduled(job.entity_id, version, &job.actor)
            }
            ScheduledAction::Unpublish => target.unpublish_scheduled(job.entity_id, &job.actor),
        }
    }

    fn run_due(&self, now: DateTime<Utc>) -> RunReport {
        let due: Vec<ScheduledJob> = {
            let jobs = self.jobs.lock();
            let mut due: Vec<_> = jobs.iter().filter(|j| j.is_due(now)).cloned().collect();
            due.sort_by_key(|j| j.run_at);
            due
        };

        let mut report = RunReport::default();
        for job in due {
            let result = self.fire(&job);

            let mut jobs = self.jobs.lock();
            let Some(stored) = jobs.iter_mut().find(|j| j.id == job.id) else {
                continue;
            };
            stored.attempts += 1;

            match result {
                Ok(changed) => {
                    stored.state = JobState::Completed;
                    stored.completed_at = Some(now);
                    stored.last_error = None;
                    if changed {
                        report.applied += 1;
                    } else {
                        report.skipped += 1;
                    }
                    info!(job_id = %job.id, entity_id = %job.entity_id, action = ?job.action, changed, "Scheduled job fired");
                }
                Err(e) if e.is_retryable() => {
                    stored.last_error = Some(e.to_string());
                    report.retrying += 1;
                    warn!(job_id = %job.id, error = %e, attempts = stored.attempts, "Scheduled job will retry");
                }
                Err(e) => {
                    stored.state = JobState::Failed {
                        reason: e.to_string(),
                    };
                    stored.last_error = Some(e.to_string());
                    stored.completed_at = Some(now);
                    report.failed += 1;
                    warn!(job_id = %job.id, error = %e, "Scheduled job failed");
                }
            }
        }

        report
    }

    /// Drop finished jobs once the table holds more than `keep` entries.
    fn prune(&self, keep: usize) -> usize {
        let mut jobs = self.jobs.lock();
        if jobs.len() <= keep {
            return 0;
        }
        let before = jobs.len();
        jobs.retain(ScheduledJob::is_pending);
        before - jobs.len()
    }
}

/// Fires scheduled publish/unpublish jobs against registered coordinators.
pub struct PublishScheduler {
    core: Arc<SchedulerCore>,
    tick_interval: Duration,
    running: Arc<AtomicBool>,
    /// Bumped by every `start`; a loop exits once it no longer matches.
    generation: Arc<AtomicU64>,
}

impl PublishScheduler {
    pub fn new(
        targets: Vec<Arc<dyn ScheduledLifecycle>>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        let targets = targets.into_iter().map(|t| (t.family(), t)).collect();
        Self {
            core: Arc::new(SchedulerCore {
                targets,
                clock,
                max_jobs: config.max_jobs,
                jobs: Mutex::new(Vec::new()),
            }),
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue a job. Scheduling the same request twice returns the existing
    /// job's ID.
    pub fn schedule(
        &self,
        family: EntityFamily,
        entity_id: Uuid,
        action: ScheduledAction,
        run_at: DateTime<Utc>,
        actor: &str,
    ) -> DomainResult<Uuid> {
        if !self.core.targets.contains_key(&family) {
            return Err(DomainError::UnknownEntityType(family.to_string()));
        }

        let job = ScheduledJob {
            id: Uuid::new_v4(),
            family,
            entity_id,
            action,
            run_at,
            actor: actor.to_string(),
            state: JobState::Pending,
            attempts: 0,
            last_error: None,
            created_at: self.core.clock.now(),
            completed_at: None,
        };

        let mut jobs = self.core.jobs.lock();
        if let Some(existing) = jobs.iter().find(|j| j.is_pending() && j.same_request(&job)) {
            debug!(job_id = %existing.id, "Job already scheduled");
            return Ok(existing.id);
        }

        let pending = jobs.iter().filter(|j| j.is_pending()).count();
        if pending >= self.core.max_jobs {
            return Err(DomainError::ValidationFailed(format!(
                "Scheduler is full ({} pending jobs)",
                self.core.max_jobs
            )));
        }

        info!(job_id = %job.id, family = %family, entity_id = %entity_id, action = ?action, run_at = %run_at, "Job scheduled");
        let id = job.id;
        jobs.push(job);
        Ok(id)
    }

    /// Cancel a pending job. Returns false if it is unknown or already done.
    pub fn cancel(&self, id: Uuid) -> bool {
        let mut jobs = self.core.jobs.lock();
        match jobs.iter_mut().find(|j| j.id == id && j.is_pending()) {
            Some(job) => {
                job.state = JobState::Cancelled;
                info!(job_id = %id, "Job cancelled");
                true
            }
            None => false,
        }
    }

    /// Pending jobs ordered by run time.
    pub fn pending(&self) -> Vec<ScheduledJob> {
        let mut pending: Vec<_> = self
            .core
            .jobs
            .lock()
            .iter()
            .filter(|j| j.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|j| j.run_at);
        pending
    }

    pub fn get(&self, id: Uuid) -> Option<ScheduledJob> {
        self.core.jobs.lock().iter().find(|j| j.id == id).cloned()
    }

    /// Drop finished jobs from memory. Returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        self.core.prune(0)
    }

    /// Fire every pending job due at `now`.
    pub fn run_due(&self, now: DateTime<Utc>) -> RunReport {
        self.core.run_due(now)
    }

    /// Start the background loop. Returns `None` if it is already running.
    ///
    /// Each tick fires due jobs, then drops finished jobs once more than
    /// `max_jobs` are held.
    pub fn start(&self) -> Option<tokio::task::JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Publish scheduler already running");
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let core = self.core.clone();
        let running = self.running.clone();
        let current = self.generation.clone();
        let tick_interval = self.tick_interval;
        let is_current = move || {
            running.load(Ordering::SeqCst) && current.load(Ordering::SeqCst) == generation
        };

        Some(tokio::spawn(async move {
            info!(tick_ms = tick_interval.as_millis() as u64, generation, "Publish scheduler started");
            while is_current() {
                tokio::time::sleep(tick_interval).await;
                if !is_current() {
                    break;
                }
                let report = core.run_due(core.clock.now());
                if report != RunReport::default() {
                    debug!(?report, "Scheduler tick");
                }
                let pruned = core.prune(core.max_jobs);
                if pruned > 0 {
                    debug!(pruned, "Finished jobs dropped");
                }
            }
            info!(generation, "Publish scheduler stopped");
        }))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
