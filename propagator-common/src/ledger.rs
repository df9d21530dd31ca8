use sqlx::{Postgres, Transaction};

use crate::target::{Checksum, VersionId};

/// The per-target table recording applied versions, created lazily on
/// first contact.
pub const LEDGER_TABLE: &str = "propagation_ledger";

/// Result of looking a `VersionId` up in a target's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerLookup {
    Absent,
    Present { checksum: Option<Checksum> },
}

/// Create the ledger table if it is absent. Safe against concurrent
/// creation: `CREATE TABLE IF NOT EXISTS` combined with tolerating the
/// driver's duplicate-object error if two targets race to create it.
pub async fn ensure_ledger(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
    let query = format!(
        r#"
CREATE TABLE IF NOT EXISTS "{LEDGER_TABLE}" (
    version_id text PRIMARY KEY,
    applied_at timestamptz NOT NULL DEFAULT now(),
    checksum text
)
"#
    );

    match sqlx::query(&query).execute(&mut **tx).await {
        Ok(_) => Ok(()),
        // duplicate_table: another concurrent `ensure_ledger` won the race.
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("42P07") => Ok(()),
        Err(e) => Err(e),
    }
}

/// Single row lookup for `version_id` in the ledger.
pub async fn is_applied(
    tx: &mut Transaction<'_, Postgres>,
    version_id: &VersionId,
) -> Result<LedgerLookup, sqlx::Error> {
    let query = format!(r#"SELECT checksum FROM "{LEDGER_TABLE}" WHERE version_id = $1"#);

    let row: Option<(Option<String>,)> = sqlx::query_as(&query)
        .bind(version_id.as_str())
        .fetch_optional(&mut **tx)
        .await?;

    Ok(match row {
        None => LedgerLookup::Absent,
        Some((checksum,)) => LedgerLookup::Present {
            checksum: checksum.map(Checksum),
        },
    })
}

/// Insert a row stamping `version_id` as applied. No-op if a row already
/// exists for this version. Always the last statement before commit.
pub async fn stamp(
    tx: &mut Transaction<'_, Postgres>,
    version_id: &VersionId,
    checksum: &Checksum,
) -> Result<(), sqlx::Error> {
    let query = format!(
        r#"
INSERT INTO "{LEDGER_TABLE}" (version_id, checksum)
VALUES ($1, $2)
ON CONFLICT (version_id) DO NOTHING
"#
    );

    sqlx::query(&query)
        .bind(version_id.as_str())
        .bind(checksum.as_str())
        .execute(&mut **tx)
        .await?;

    Ok(())
}
