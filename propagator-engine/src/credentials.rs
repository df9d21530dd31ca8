use propagator_common::PropagationError;

/// Resolved database credentials. The engine only ever holds these long
/// enough to pass them to the driver; they are never logged.
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Resolves a `Target`'s opaque `credentials_ref` into actual credentials.
/// Credentials are resolved once at job start.
pub trait CredentialStore: Send + Sync {
    fn resolve(&self, credentials_ref: &str) -> Result<Credentials, PropagationError>;
}

/// Development-only default: resolves `credentials_ref` to the environment
/// variable `PROPAGATOR_CRED_<ref>`, formatted `user:password`. Production
/// deployments are expected to supply their own `CredentialStore` backed by
/// a secrets manager.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn resolve(&self, credentials_ref: &str) -> Result<Credentials, PropagationError> {
        let var_name = format!("PROPAGATOR_CRED_{credentials_ref}");
        let raw = std::env::var(&var_name)
            .map_err(|_| PropagationError::CredentialsNotFound(credentials_ref.to_string()))?;

        let (username, password) = raw.split_once(':').ok_or_else(|| {
            PropagationError::CredentialsNotFound(format!(
                "{credentials_ref} (expected user:password in {var_name})"
            ))
        })?;

        Ok(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_environment() {
        std::env::set_var("PROPAGATOR_CRED_test_ref", "alice:hunter2");
        let store = EnvCredentialStore;
        let creds = store.resolve("test_ref").expect("credentials should resolve");
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "hunter2");
        std::env::remove_var("PROPAGATOR_CRED_test_ref");
    }

    #[test]
    fn missing_ref_is_an_error() {
        let store = EnvCredentialStore;
        assert!(store.resolve("definitely_not_set_xyz").is_err());
    }
}
