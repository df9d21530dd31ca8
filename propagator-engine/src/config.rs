use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

use propagator_common::policy::OnChecksumMismatch;
use propagator_common::PropagationPolicy;

/// Process-wide configuration: where the metrics/health surface binds, and
/// the default `PropagationPolicy` applied to jobs that don't override it.
#[derive(Envconfig, Clone)]
pub struct EngineConfig {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3302")]
    pub port: u16,

    #[envconfig(default = "32")]
    pub max_concurrency: usize,

    #[envconfig(default = "3")]
    pub max_retries: u32,

    #[envconfig(default = "200")]
    pub base_backoff: EnvMsDuration,

    #[envconfig(default = "30000")]
    pub max_backoff: EnvMsDuration,

    #[envconfig(default = "20000")]
    pub per_target_timeout: EnvMsDuration,

    #[envconfig(default = "0.2")]
    pub error_threshold_fraction: f64,

    #[envconfig(default = "20")]
    pub min_sample: u64,

    #[envconfig(default = "false")]
    pub dry_run: bool,

    #[envconfig(default = "skip")]
    pub on_checksum_mismatch: ChecksumMismatchMode,
}

impl EngineConfig {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The default policy every job is submitted with unless the caller
    /// supplies an override.
    pub fn default_policy(&self) -> PropagationPolicy {
        PropagationPolicy {
            max_concurrency: self.max_concurrency,
            max_retries: self.max_retries,
            base_backoff: self.base_backoff.0,
            max_backoff: self.max_backoff.0,
            per_target_timeout: self.per_target_timeout.0,
            error_threshold_fraction: self.error_threshold_fraction,
            min_sample: self.min_sample,
            dry_run: self.dry_run,
            on_checksum_mismatch: self.on_checksum_mismatch.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

/// Envconfig wrapper around `OnChecksumMismatch` so it can be read straight
/// from the environment as `skip` | `fail` | `reapply`.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumMismatchMode(pub OnChecksumMismatch);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseChecksumMismatchModeError(String);

impl FromStr for ChecksumMismatchMode {
    type Err = ParseChecksumMismatchModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(ChecksumMismatchMode(OnChecksumMismatch::Skip)),
            "fail" => Ok(ChecksumMismatchMode(OnChecksumMismatch::Fail)),
            "reapply" => Ok(ChecksumMismatchMode(OnChecksumMismatch::Reapply)),
            other => Err(ParseChecksumMismatchModeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_checksum_mismatch_mode() {
        assert_eq!(
            "fail".parse::<ChecksumMismatchMode>().unwrap().0,
            OnChecksumMismatch::Fail
        );
        assert!("bogus".parse::<ChecksumMismatchMode>().is_err());
    }

    #[test]
    fn default_policy_is_internally_valid() {
        std::env::set_var("BIND_PORT", "3302");
        let config = EngineConfig::init_from_env().expect("defaults should parse");
        assert!(config.default_policy().is_valid());
    }
}
