use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An opaque, globally-unique-per-migration identifier. Primary key in the
/// ledger. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId(pub String);

impl VersionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 16 hex-character fingerprint of the canonicalized script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum(pub String);

impl Checksum {
    /// Canonicalize `sql` (trim trailing whitespace per line, ensure a
    /// single trailing newline) and hash it, truncating the SHA-256 digest
    /// to the first 16 hex characters.
    pub fn compute(sql: &str) -> Self {
        let canonical = canonicalize(sql);
        let digest = Sha256::digest(canonical.as_bytes());
        let hex = format!("{digest:x}");
        Checksum(hex[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn canonicalize(sql: &str) -> String {
    let mut out: String = sql
        .trim_end()
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// The SQL payload: a UTF-8 text buffer executed as a single statement
/// batch. Must be valid for offline execution (no bind parameters).
#[derive(Debug, Clone)]
pub struct Script {
    pub sql: String,
}

impl Script {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn checksum(&self) -> Checksum {
        Checksum::compute(&self.sql)
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }
}

/// An opaque reference the engine hands to a `CredentialStore` without ever
/// inspecting or logging the resolved secret itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsRef(pub String);

/// One physical PostgreSQL database receiving the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials_ref: CredentialsRef,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>, credentials_ref: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            credentials_ref: CredentialsRef(credentials_ref.into()),
        }
    }

    /// Short label for logs and progress events; never includes credentials.
    pub fn label(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_16_hex_chars() {
        let checksum = Checksum::compute("CREATE TABLE t (id int);");
        assert_eq!(checksum.as_str().len(), 16);
        assert!(checksum.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn checksum_ignores_trailing_whitespace_and_newlines() {
        let a = Checksum::compute("CREATE TABLE t (id int);\n");
        let b = Checksum::compute("CREATE TABLE t (id int);   \n\n");
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_is_sensitive_to_content() {
        let a = Checksum::compute("CREATE TABLE t (id int);");
        let b = Checksum::compute("CREATE TABLE t (id bigint);");
        assert_ne!(a, b);
    }

    #[test]
    fn target_label_excludes_credentials() {
        let target = Target::new("db.internal", 5432, "cmp_42", "secret-ref");
        assert_eq!(target.label(), "db.internal:5432/cmp_42");
        assert!(!target.label().contains("secret"));
    }
}
