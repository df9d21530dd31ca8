use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::error::ErrorKind;
use crate::policy::PropagationPolicy;
use crate::target::{Target, VersionId};

/// Lifecycle state of a Job. Terminal status is written exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Stopping,
    Succeeded,
    Failed,
    Aborted,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Aborted | JobStatus::Cancelled
        )
    }
}

/// Aggregated progress counters. Invariants:
/// `started >= succeeded + skipped + failed` and
/// `succeeded + skipped + failed <= total` at all times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: u64,
    pub started: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub retrying: u64,
}

impl Counts {
    pub fn completed(&self) -> u64 {
        self.succeeded + self.skipped + self.failed
    }

    fn is_consistent(&self) -> bool {
        self.started >= self.completed() && self.completed() <= self.total
    }
}

/// One terminal outcome recorded for a target, kept in the Job's bounded
/// ring of recent results.
#[derive(Debug, Clone)]
pub struct TargetOutcomeRecord {
    pub target: String,
    pub summary: String,
    pub at: DateTime<Utc>,
}

/// Immutable header plus mutable progress for one invocation of the
/// Dispatcher against a target list.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: uuid::Uuid,
    pub version_id: VersionId,
    pub policy: PropagationPolicy,
    pub targets_snapshot: Arc<Vec<Target>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub counts: Counts,
    recent: VecDeque<TargetOutcomeRecord>,
    recent_capacity: usize,
}

impl Job {
    pub fn new(
        job_id: uuid::Uuid,
        version_id: VersionId,
        policy: PropagationPolicy,
        targets: Vec<Target>,
    ) -> Self {
        let total = targets.len() as u64;
        Self {
            job_id,
            version_id,
            policy,
            targets_snapshot: Arc::new(targets),
            started_at: None,
            finished_at: None,
            status: JobStatus::Pending,
            counts: Counts {
                total,
                ..Default::default()
            },
            recent: VecDeque::new(),
            recent_capacity: 50,
        }
    }

    pub fn record_started(&mut self) {
        self.counts.started += 1;
    }

    pub fn record_retrying(&mut self) {
        self.counts.retrying += 1;
    }

    pub fn record_succeeded(&mut self, target: &Target) {
        self.counts.succeeded += 1;
        self.push_recent(target, "succeeded".to_string());
    }

    pub fn record_skipped(&mut self, target: &Target, reason: &str) {
        self.counts.skipped += 1;
        self.push_recent(target, format!("skipped: {reason}"));
    }

    pub fn record_failed(&mut self, target: &Target, kind: ErrorKind) {
        self.counts.failed += 1;
        self.push_recent(target, format!("failed: {kind:?}"));
    }

    fn push_recent(&mut self, target: &Target, summary: String) {
        if self.recent.len() >= self.recent_capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(TargetOutcomeRecord {
            target: target.label(),
            summary,
            at: Utc::now(),
        });
    }

    pub fn recent_outcomes(&self) -> impl Iterator<Item = &TargetOutcomeRecord> {
        self.recent.iter()
    }

    /// Whether the circuit breaker should trip right now.
    pub fn breaker_should_trip(&self) -> bool {
        let completed = self.counts.completed();
        if completed < self.policy.min_sample {
            return false;
        }
        let failure_fraction = self.counts.failed as f64 / completed as f64;
        failure_fraction > self.policy.error_threshold_fraction
    }

    pub fn transition_to(&mut self, status: JobStatus) {
        debug_assert!(self.counts.is_consistent(), "job counts invariant violated");
        if status == JobStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if status.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.status = status;
    }
}

/// In-memory, append-only record of all jobs and their aggregated
/// progress, snapshot-readable by the Gateway. Retains at most `capacity`
/// finalized jobs (evicting the oldest-finalized first); in-flight jobs are
/// never evicted.
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<uuid::Uuid, Job>>>,
    finalized_order: Arc<RwLock<VecDeque<uuid::Uuid>>>,
    capacity: usize,
}

impl JobStore {
    pub fn new() -> Self {
        Self::with_capacity(200)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            finalized_order: Arc::new(RwLock::new(VecDeque::new())),
            capacity,
        }
    }

    pub fn insert(&self, job: Job) {
        let mut jobs = self.jobs.write().expect("job store lock poisoned");
        jobs.insert(job.job_id, job);
    }

    /// Apply `f` to the job under a single write-lock acquisition, so a
    /// reader never observes a torn update.
    pub fn update<F>(&self, job_id: uuid::Uuid, f: F)
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().expect("job store lock poisoned");
        if let Some(job) = jobs.get_mut(&job_id) {
            f(job);
            if job.status.is_terminal() {
                drop(jobs);
                let mut order = self.finalized_order.write().expect("lock poisoned");
                order.push_back(job_id);
                self.evict_if_needed(&mut order);
            }
        }
    }

    fn evict_if_needed(&self, order: &mut VecDeque<uuid::Uuid>) {
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                let mut jobs = self.jobs.write().expect("job store lock poisoned");
                jobs.remove(&oldest);
            }
        }
    }

    /// A consistent, immutable snapshot of one job.
    pub fn snapshot(&self, job_id: uuid::Uuid) -> Option<Job> {
        let jobs = self.jobs.read().expect("job store lock poisoned");
        jobs.get(&job_id).cloned()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;

    fn targets(n: usize) -> Vec<Target> {
        (0..n)
            .map(|i| Target::new("host", 5432, format!("db{i}"), "ref"))
            .collect()
    }

    #[test]
    fn invariants_hold_through_a_run() {
        let mut job = Job::new(
            uuid::Uuid::new_v4(),
            VersionId("v1".to_string()),
            PropagationPolicy::default(),
            targets(3),
        );
        job.transition_to(JobStatus::Running);
        for target in job.targets_snapshot.clone().iter() {
            job.record_started();
            job.record_succeeded(target);
            assert!(job.counts.is_consistent());
        }
        job.transition_to(JobStatus::Succeeded);
        assert_eq!(job.counts.succeeded, 3);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn circuit_breaker_trips_above_threshold_after_min_sample() {
        let mut policy = PropagationPolicy::default();
        policy.min_sample = 5;
        policy.error_threshold_fraction = 0.2;
        let mut job = Job::new(
            uuid::Uuid::new_v4(),
            VersionId("v1".to_string()),
            policy,
            targets(10),
        );
        let ts = job.targets_snapshot.clone();
        for target in ts.iter().take(4) {
            job.record_failed(target, ErrorKind::ExecutePermanent);
        }
        assert!(!job.breaker_should_trip(), "below min_sample");

        job.record_succeeded(&ts[4]);
        assert!(job.breaker_should_trip(), "4/5 failed exceeds 0.2");
    }

    #[test]
    fn job_store_snapshot_is_consistent() {
        let store = JobStore::new();
        let job = Job::new(
            uuid::Uuid::new_v4(),
            VersionId("v1".to_string()),
            PropagationPolicy::default(),
            targets(2),
        );
        let id = job.job_id;
        store.insert(job);
        store.update(id, |job| {
            job.transition_to(JobStatus::Running);
            job.record_started();
        });
        let snapshot = store.snapshot(id).expect("job present");
        assert_eq!(snapshot.counts.started, 1);
        assert_eq!(snapshot.status, JobStatus::Running);
    }

    #[test]
    fn job_store_retains_only_capacity_finalized_jobs() {
        let store = JobStore::with_capacity(1);
        for _ in 0..3 {
            let job = Job::new(
                uuid::Uuid::new_v4(),
                VersionId("v1".to_string()),
                PropagationPolicy::default(),
                targets(1),
            );
            let id = job.job_id;
            store.insert(job);
            store.update(id, |job| job.transition_to(JobStatus::Succeeded));
        }
        let jobs = store.jobs.read().unwrap();
        assert_eq!(jobs.len(), 1);
    }
}
