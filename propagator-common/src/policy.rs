use std::time::Duration;

/// What to do when a target's ledger already holds `version_id` under a
/// different checksum than the one we are about to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnChecksumMismatch {
    /// Report the target as skipped with a warning. Default, per spec.
    #[default]
    Skip,
    /// Report the target as failed with `ErrorKind::ChecksumMismatch`.
    Fail,
    /// Re-run the script and re-stamp the ledger with the new checksum.
    Reapply,
}

/// All tunables recognized by the engine.
#[derive(Debug, Clone)]
pub struct PropagationPolicy {
    /// Upper bound on in-flight Target Workers for one job. Must be > 0.
    pub max_concurrency: usize,
    /// Retry attempts per target after the first. May be 0.
    pub max_retries: u32,
    /// Retry delay floor.
    pub base_backoff: Duration,
    /// Retry delay cap.
    pub max_backoff: Duration,
    /// Deadline for one full attempt: connect + execute + stamp.
    pub per_target_timeout: Duration,
    /// If `failed / completed > error_threshold_fraction` after
    /// `min_sample` completions, abort the job.
    pub error_threshold_fraction: f64,
    /// Minimum completed targets before the threshold is evaluated.
    pub min_sample: u64,
    /// Execute the script inside a transaction and always roll back; the
    /// ledger is not stamped.
    pub dry_run: bool,
    /// Policy applied when the ledger already holds a different checksum
    /// for the same version.
    pub on_checksum_mismatch: OnChecksumMismatch,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self {
            max_concurrency: 32,
            max_retries: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(30),
            per_target_timeout: Duration::from_secs(20),
            error_threshold_fraction: 0.2,
            min_sample: 20,
            dry_run: false,
            on_checksum_mismatch: OnChecksumMismatch::Skip,
        }
    }
}

impl PropagationPolicy {
    /// A policy is well-formed if concurrency is positive and the error
    /// fraction is a valid proportion.
    pub fn is_valid(&self) -> bool {
        self.max_concurrency > 0
            && (0.0..=1.0).contains(&self.error_threshold_fraction)
            && self.base_backoff <= self.max_backoff
    }
}
