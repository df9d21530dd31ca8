use thiserror::Error;

/// The error taxonomy from which `Outcome::Failed` kinds are drawn.
///
/// Workers never propagate these upward as `Err` values past their own
/// boundary; they are always converted into a terminal `Outcome::Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cannot establish or authenticate the session. Retried.
    Connect,
    /// Serialization failure, deadlock, lock timeout, admin shutdown. Retried.
    ExecuteTransient,
    /// Syntax error, permission denied, undefined object, integrity
    /// violation. Not retried.
    ExecutePermanent,
    /// Pooler or server rejected the connection due to capacity. Retried
    /// with an elongated backoff.
    ResourceExhausted,
    /// Ledger shows a different checksum for the same version. Resolved per
    /// `OnChecksumMismatch`.
    ChecksumMismatch,
    /// `per_target_timeout` was exceeded. Retried.
    Timeout,
    /// Cooperative cancellation observed at a suspension point.
    Cancelled,
    /// A bug. Logged, reported as a failure, never retried.
    Internal,
}

impl ErrorKind {
    /// Whether this error classifies as one that should be retried,
    /// ignoring the attempt budget (callers still check `max_retries`).
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Connect
                | ErrorKind::ExecuteTransient
                | ErrorKind::ResourceExhausted
                | ErrorKind::Timeout
        )
    }
}

/// Top-level error type for everything in `propagator-common` that isn't a
/// per-target `Outcome::Failed` (those never escape as `Err`).
#[derive(Error, Debug)]
pub enum PropagationError {
    #[error("connection to target failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("generator bundle is invalid: {0}")]
    InvalidGenerator(String),

    #[error("checksum mismatch: metadata.json claims {expected} but upgrade.sql hashes to {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("credentials for ref {0:?} could not be resolved")]
    CredentialsNotFound(String),

    #[error("catalog lookup failed: {0}")]
    Catalog(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed metadata.json: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Classify a `sqlx::Error` into the `ErrorKind` taxonomy, reading the
/// driver's SQLSTATE code where one is available.
impl From<&sqlx::Error> for ErrorKind {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // Class 08 — Connection Exception.
                Some("08000") | Some("08003") | Some("08006") | Some("08001") | Some("08004")
                | Some("08007") | Some("08P01") => ErrorKind::Connect,
                // Serialization failure / deadlock / lock timeout / admin shutdown.
                Some("40001") | Some("40P01") | Some("55P03") | Some("57P01") | Some("57P02")
                | Some("57P03") => ErrorKind::ExecuteTransient,
                // Too many connections / configuration limit exceeded.
                Some("53300") | Some("53400") => ErrorKind::ResourceExhausted,
                // Syntax error, permission denied, undefined object, integrity
                // violation (class 23).
                Some(code)
                    if code.starts_with("42") || code.starts_with("23") || code == "2BP01" =>
                {
                    ErrorKind::ExecutePermanent
                }
                _ => ErrorKind::ExecutePermanent,
            },
            sqlx::Error::PoolTimedOut => ErrorKind::Timeout,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                ErrorKind::Connect
            }
            _ => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Connect.is_retryable());
        assert!(ErrorKind::ExecuteTransient.is_retryable());
        assert!(ErrorKind::ResourceExhausted.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::ExecutePermanent.is_retryable());
        assert!(!ErrorKind::ChecksumMismatch.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());
    }
}
