use std::sync::Arc;

use tokio::sync::{mpsc, watch, RwLock};

use propagator_common::metrics::Metrics;
use propagator_common::{
    Catalog, Checksum, GeneratorBundle, Job, JobStore, ProgressBus, ProgressEvent,
    PropagationPolicy, Script,
};

use crate::credentials::CredentialStore;
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;

/// The in-process façade over a propagation run: `submit_job`,
/// `job_snapshot`, `subscribe`, `cancel_job`. The HTTP surface a real
/// deployment exposes would be a thin adapter over this type; this binary
/// wires it directly rather than exposing one over HTTP.
pub struct Engine {
    job_store: Arc<JobStore>,
    credentials: Arc<dyn CredentialStore>,
    metrics: Metrics,
    buses: Arc<RwLock<std::collections::HashMap<uuid::Uuid, Arc<ProgressBus>>>>,
    cancel_senders: Arc<RwLock<std::collections::HashMap<uuid::Uuid, watch::Sender<bool>>>>,
}

impl Engine {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            job_store: Arc::new(JobStore::new()),
            credentials,
            metrics: Metrics,
            buses: Arc::new(RwLock::new(std::collections::HashMap::new())),
            cancel_senders: Arc::new(RwLock::new(std::collections::HashMap::new())),
        }
    }

    /// Validate the generator bundle, resolve the target list, create the
    /// Job, and launch the Dispatcher as a background task bound to it.
    /// Non-blocking: returns as soon as the job is recorded.
    pub async fn submit_job(
        &self,
        bundle: GeneratorBundle,
        policy: PropagationPolicy,
        catalog: &dyn Catalog,
        pattern: &str,
    ) -> Result<uuid::Uuid, EngineError> {
        if !policy.is_valid() {
            return Err(EngineError::InvalidPolicy(policy));
        }

        let targets = catalog
            .list_targets(pattern)
            .map_err(EngineError::Generator)?;

        let job_id = uuid::Uuid::new_v4();
        let job = Job::new(job_id, bundle.version_id.clone(), policy.clone(), targets.clone());
        self.job_store.insert(job);

        let bus = Arc::new(ProgressBus::new(job_id));
        self.buses.write().await.insert(job_id, bus.clone());

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancel_senders.write().await.insert(job_id, cancel_tx);

        let dispatcher = Dispatcher::new(self.metrics);
        let job_store = self.job_store.clone();
        let credentials = self.credentials.clone();
        let script: Arc<Script> = Arc::new(bundle.upgrade.clone());
        let checksum: Checksum = bundle.checksum.clone();
        let version_id = bundle.version_id.clone();

        tokio::spawn(async move {
            dispatcher
                .run(
                    job_store, bus, job_id, version_id, script, checksum, targets, policy,
                    credentials, cancel_rx,
                )
                .await;
        });

        Ok(job_id)
    }

    /// A consistent snapshot of the job's current state.
    pub fn job_snapshot(&self, job_id: uuid::Uuid) -> Result<Job, EngineError> {
        self.job_store
            .snapshot(job_id)
            .ok_or(EngineError::JobNotFound(job_id))
    }

    /// Subscribe to the job's live progress feed.
    pub async fn subscribe(
        &self,
        job_id: uuid::Uuid,
    ) -> Result<mpsc::Receiver<ProgressEvent>, EngineError> {
        let buses = self.buses.read().await;
        let bus = buses.get(&job_id).ok_or(EngineError::JobNotFound(job_id))?;
        let (_, rx) = bus.subscribe().await;
        Ok(rx)
    }

    /// Request cancellation. Returns whether the request was accepted or
    /// the job had already reached a terminal state.
    pub async fn cancel_job(&self, job_id: uuid::Uuid) -> Result<CancelOutcome, EngineError> {
        let job = self
            .job_store
            .snapshot(job_id)
            .ok_or(EngineError::JobNotFound(job_id))?;

        if job.status.is_terminal() {
            return Ok(CancelOutcome::AlreadyTerminal);
        }

        let senders = self.cancel_senders.read().await;
        if let Some(sender) = senders.get(&job_id) {
            let _ = sender.send(true);
            Ok(CancelOutcome::Accepted)
        } else {
            Err(EngineError::JobNotFound(job_id))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Accepted,
    AlreadyTerminal,
}
