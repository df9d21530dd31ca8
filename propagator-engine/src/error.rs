use thiserror::Error;

/// Errors related to initialization and driving of a propagation job. Note
/// that a *target's* failure never surfaces as an `Err` here: per-target
/// outcomes are always reified as `Outcome::Failed` and recorded on the
/// Job, not propagated as a worker error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("propagation policy is invalid: {0:?}")]
    InvalidPolicy(propagator_common::PropagationPolicy),

    #[error("generator bundle rejected: {0}")]
    Generator(#[from] propagator_common::PropagationError),

    #[error("no job found with id {0}")]
    JobNotFound(uuid::Uuid),

    #[error("job {0} already reached a terminal state")]
    AlreadyTerminal(uuid::Uuid),
}
