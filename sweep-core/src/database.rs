//! SQLite-backed audit sink.
//!
//! Every terminal [`TransferOutcome`] becomes one row, every finished
//! [`SweepRun`] a summary row. Recording is best-effort by contract: the
//! coordinator logs insert failures and keeps sweeping.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;
use crate::model::{SweepRun, TransferOutcome};
use crate::traits::AuditSink;

pub struct SqliteAuditSink {
    pool: SqlitePool,
}

impl SqliteAuditSink {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    pub async fn new(db_path: &str) -> Result<Self, DatabaseError> {
        if !Path::new(db_path).exists() {
            std::fs::File::create(db_path).map_err(|e| DatabaseError::ConnectionFailed {
                msg: format!("cannot create {}: {}", db_path, e),
            })?;
            info!("Created new audit database: {}", db_path);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_millis(Self::DEFAULT_TIMEOUT_MS))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode=WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous=NORMAL;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("sqlite://{}", db_path))
            .await
            .map_err(|e| DatabaseError::ConnectionFailed { msg: e.to_string() })?;

        let sink = Self { pool };
        sink.init_schema().await?;
        Ok(sink)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transfer_outcomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                wallet_address TEXT NOT NULL,
                requested TEXT NOT NULL,
                status TEXT NOT NULL,
                reason TEXT,
                tx_id TEXT,
                attempts INTEGER NOT NULL,
                recorded_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed { msg: e.to_string() })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sweep_runs (
                run_id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                total INTEGER NOT NULL,
                succeeded INTEGER NOT NULL,
                skipped INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                unconfirmed INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed { msg: e.to_string() })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_outcomes_run ON transfer_outcomes(run_id);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed { msg: e.to_string() })?;

        Ok(())
    }

    /// Persist the run summary once all pipelines have reported.
    pub async fn record_run(&self, run: &SweepRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO sweep_runs
                (run_id, started_at, finished_at, total, succeeded, skipped, failed, unconfirmed)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.run_id)
        .bind(run.started_at.to_rfc3339())
        .bind(run.finished_at.to_rfc3339())
        .bind(run.outcomes.len() as i64)
        .bind(run.succeeded() as i64)
        .bind(run.skipped() as i64)
        .bind(run.failed() as i64)
        .bind(run.unconfirmed() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Outcome count for a run; used by tooling and tests.
    pub async fn outcome_count(&self, run_id: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM transfer_outcomes WHERE run_id = ?")
                .bind(run_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn record(&self, run_id: &str, outcome: &TransferOutcome) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transfer_outcomes
                (run_id, wallet_address, requested, status, reason, tx_id, attempts, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(&outcome.wallet_address)
        .bind(outcome.requested.to_string())
        .bind(outcome.status.label())
        .bind(outcome.reason())
        .bind(&outcome.tx_id)
        .bind(outcome.attempts as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FailureReason, TransferStatus};
    use chrono::Utc;

    fn outcome(address: &str, status: TransferStatus) -> TransferOutcome {
        TransferOutcome {
            wallet_address: address.into(),
            requested: 5_000_000,
            status,
            tx_id: None,
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn records_outcomes_and_run_summary() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        let sink = SqliteAuditSink::new(db_path.to_str().unwrap()).await.unwrap();

        let outcomes = vec![
            outcome("0xaaa", TransferStatus::Succeeded { tx_id: "0x1".into() }),
            outcome("0xbbb", TransferStatus::Failed(FailureReason::Unconfirmed)),
        ];
        for o in &outcomes {
            sink.record("run-1", o).await.unwrap();
        }
        assert_eq!(sink.outcome_count("run-1").await.unwrap(), 2);

        let run = SweepRun {
            run_id: "run-1".into(),
            outcomes,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        sink.record_run(&run).await.unwrap();
        // Re-recording the same run id replaces the summary row.
        sink.record_run(&run).await.unwrap();
    }
}
