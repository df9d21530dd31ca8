pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod target_worker;

pub use config::EngineConfig;
pub use credentials::{Credentials, CredentialStore, EnvCredentialStore};
pub use dispatcher::Dispatcher;
pub use engine::{CancelOutcome, Engine};
pub use error::EngineError;
pub use target_worker::{Outcome, SkipReason, TargetWorker};
