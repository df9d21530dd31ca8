use std::path::Path;

use serde::Deserialize;

use crate::error::PropagationError;
use crate::target::{Checksum, Script, VersionId};

/// `metadata.json` as produced by the external Generator.
#[derive(Debug, Deserialize)]
struct Metadata {
    version_id: String,
    #[allow(dead_code)]
    revision_id: String,
    checksum: String,
    #[allow(dead_code)]
    description: String,
}

/// A validated directory produced by the external Generator: `upgrade.sql`
/// (required), `downgrade.sql` (optional), and `metadata.json`.
#[derive(Debug, Clone)]
pub struct GeneratorBundle {
    pub version_id: VersionId,
    pub upgrade: Script,
    pub downgrade: Option<Script>,
    pub checksum: Checksum,
}

impl GeneratorBundle {
    /// Load and validate a Generator output directory.
    ///
    /// Validation performed: non-empty SQL, and `metadata.json`'s checksum
    /// matches a recomputation over `upgrade.sql` (otherwise the job is
    /// rejected rather than silently applied with stale metadata).
    pub fn load(dir: &Path) -> Result<Self, PropagationError> {
        let upgrade_path = dir.join("upgrade.sql");
        let upgrade_sql = std::fs::read_to_string(&upgrade_path)?;
        let upgrade = Script::new(upgrade_sql);

        if upgrade.is_empty() {
            return Err(PropagationError::InvalidGenerator(
                "upgrade.sql is empty".to_string(),
            ));
        }

        let downgrade_path = dir.join("downgrade.sql");
        let downgrade = if downgrade_path.exists() {
            let sql = std::fs::read_to_string(&downgrade_path)?;
            if sql.trim().is_empty() {
                None
            } else {
                Some(Script::new(sql))
            }
        } else {
            None
        };

        let metadata_path = dir.join("metadata.json");
        let metadata_raw = std::fs::read_to_string(&metadata_path)?;
        let metadata: Metadata = serde_json::from_str(&metadata_raw)?;

        let computed = upgrade.checksum();
        if computed.as_str() != metadata.checksum {
            return Err(PropagationError::ChecksumMismatch {
                expected: metadata.checksum,
                actual: computed.as_str().to_string(),
            });
        }

        Ok(Self {
            version_id: VersionId(metadata.version_id),
            upgrade,
            downgrade,
            checksum: computed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_bundle(dir: &Path, upgrade_sql: &str, checksum_override: Option<&str>) {
        std::fs::create_dir_all(dir).unwrap();
        let mut upgrade = std::fs::File::create(dir.join("upgrade.sql")).unwrap();
        upgrade.write_all(upgrade_sql.as_bytes()).unwrap();

        let checksum = checksum_override
            .map(str::to_string)
            .unwrap_or_else(|| Script::new(upgrade_sql).checksum().as_str().to_string());

        let metadata = format!(
            r#"{{"version_id":"20260101_000000","revision_id":"r1","checksum":"{checksum}","description":"test"}}"#
        );
        std::fs::write(dir.join("metadata.json"), metadata).unwrap();
    }

    #[test]
    fn loads_a_valid_bundle() {
        let dir = std::env::temp_dir().join(format!("bundle-ok-{}", uuid::Uuid::new_v4()));
        write_bundle(&dir, "CREATE TABLE t (id int);", None);

        let bundle = GeneratorBundle::load(&dir).expect("bundle should load");
        assert_eq!(bundle.version_id.as_str(), "20260101_000000");
        assert!(bundle.downgrade.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let dir = std::env::temp_dir().join(format!("bundle-bad-{}", uuid::Uuid::new_v4()));
        write_bundle(&dir, "CREATE TABLE t (id int);", Some("0000000000000000"));

        let result = GeneratorBundle::load(&dir);
        assert!(matches!(
            result,
            Err(PropagationError::ChecksumMismatch { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_empty_upgrade_script() {
        let dir = std::env::temp_dir().join(format!("bundle-empty-{}", uuid::Uuid::new_v4()));
        write_bundle(&dir, "   \n\n", None);

        let result = GeneratorBundle::load(&dir);
        assert!(matches!(result, Err(PropagationError::InvalidGenerator(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
