use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{preview, AnalysisStore, AnalysisSummary, StoredAnalysis};
use crate::analysis::{AnalysisRequest, AnalysisResult, MentalModel, StageRecord};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::stages::{StageId, StageStatus};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const PREVIEW_CHARS: usize = 80;

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create a private in-memory database.
    ///
    /// The pool holds exactly one connection that never expires, since every
    /// SQLite in-memory connection is a separate database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl AnalysisStore for SqliteStorage {
    async fn save_analysis(
        &self,
        request: &AnalysisRequest,
        result: &AnalysisResult,
    ) -> StorageResult<String> {
        let id = Uuid::new_v4().to_string();
        let prior_context = request
            .prior_context
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let result_json = serde_json::to_string(result)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO analyses (id, thesis_text, prior_context, core_claim, mental_model, total_signals, fallback_used, result, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.thesis_text)
        .bind(&prior_context)
        .bind(&result.core_claim)
        .bind(result.mental_model.as_str())
        .bind(result.metadata.total_signals as i64)
        .bind(result.metadata.fallback_mode.any())
        .bind(&result_json)
        .bind(result.metadata.completed_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for record in &result.metadata.stages {
            sqlx::query(
                r#"
                INSERT INTO stage_runs (analysis_id, stage, status, latency_ms, error)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(record.stage.as_str())
            .bind(record.status.as_str())
            .bind(record.latency_ms as i64)
            .bind(&record.error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(analysis_id = %id, "Saved analysis");
        Ok(id)
    }

    async fn get_analysis(&self, id: &str) -> StorageResult<Option<StoredAnalysis>> {
        let row: Option<AnalysisRow> = sqlx::query_as(
            r#"
            SELECT id, thesis_text, prior_context, result, created_at
            FROM analyses
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredAnalysis::try_from).transpose()
    }

    async fn list_analyses(&self, limit: u32) -> StorageResult<Vec<AnalysisSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT id, thesis_text, core_claim, mental_model, total_signals, fallback_used, created_at
            FROM analyses
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_stage_runs(&self, id: &str) -> StorageResult<Vec<StageRecord>> {
        let rows: Vec<StageRunRow> = sqlx::query_as(
            r#"
            SELECT stage, status, latency_ms, error
            FROM stage_runs
            WHERE analysis_id = ?
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut records: Vec<StageRecord> = rows.into_iter().filter_map(|r| r.into_record()).collect();
        records.sort_by_key(|r| StageId::ALL.iter().position(|s| *s == r.stage));
        Ok(records)
    }

    async fn delete_analysis(&self, id: &str) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM stage_runs WHERE analysis_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM analyses WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::AnalysisNotFound {
                analysis_id: id.to_string(),
            });
        }

        tx.commit().await?;
        Ok(())
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct AnalysisRow {
    id: String,
    thesis_text: String,
    prior_context: Option<String>,
    result: String,
    created_at: String,
}

impl TryFrom<AnalysisRow> for StoredAnalysis {
    type Error = StorageError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let result: AnalysisResult = serde_json::from_str(&row.result)?;
        Ok(Self {
            id: row.id,
            thesis_text: row.thesis_text,
            prior_context: row.prior_context.and_then(|s| serde_json::from_str(&s).ok()),
            result,
            created_at: parse_timestamp(&row.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    thesis_text: String,
    core_claim: String,
    mental_model: String,
    total_signals: i64,
    fallback_used: bool,
    created_at: String,
}

impl From<SummaryRow> for AnalysisSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            thesis_preview: preview(&row.thesis_text, PREVIEW_CHARS),
            core_claim: row.core_claim,
            mental_model: row.mental_model.parse().unwrap_or(MentalModel::Growth),
            total_signals: row.total_signals.max(0) as usize,
            fallback_used: row.fallback_used,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct StageRunRow {
    stage: String,
    status: String,
    latency_ms: i64,
    error: Option<String>,
}

impl StageRunRow {
    fn into_record(self) -> Option<StageRecord> {
        let stage = match self.stage.parse::<StageId>() {
            Ok(stage) => stage,
            Err(e) => {
                warn!(error = %e, "Skipping stage run with unknown stage");
                return None;
            }
        };
        let status = self.status.parse::<StageStatus>().ok()?;
        Some(StageRecord {
            stage,
            status,
            latency_ms: self.latency_ms.max(0) as u64,
            error: self.error,
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
