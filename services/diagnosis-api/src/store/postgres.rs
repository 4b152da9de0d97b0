//! Postgres-backed implementation of the diagnosis store.
//!
//! # Data model
//! One table, `diagnoses`, created by the embedded migrations. `seq` is a
//! `BIGSERIAL` used only to order rows that share a `predicted_date`.
//!
//! # Error surface
//! Database failures are logged here with the operation name and surfaced as
//! an opaque [`StoreError::Unexpected`] naming only that operation. Driver
//! messages never leave this module.
//!
//! # Concurrency model
//! - `sqlx::PgPool` is shared across handlers; pool sizing bounds concurrency.
//! - `upsert_latest_for_client` runs in one transaction under a per-client
//!   transaction-scoped advisory lock, so two first writes for the same client
//!   cannot both insert.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!("./migrations")`.
//! - Database URLs may contain credentials; never log `PostgresConfig::url`.
use super::{DiagnosisStore, StoreError, StoreResult, UpsertOutcome, record_change};
use crate::config::PostgresConfig;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diagnosis_common::{
    ClientId, CreateDiagnosisRequest, Diagnosis, DiagnosisId, UpdateDiagnosisRequest,
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, client_id, diagnosis_name, predicted_date, justification, \
     challenged_diagnosis, challenged_justification, created_at, updated_at";

/// Durable diagnosis store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use diagnosis_api::config::PostgresConfig;
/// use diagnosis_api::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

/// Row shape for the `diagnoses` table.
#[derive(Debug, Clone, FromRow)]
struct DbDiagnosis {
    id: String,
    client_id: Uuid,
    diagnosis_name: String,
    predicted_date: DateTime<Utc>,
    justification: String,
    challenged_diagnosis: Option<String>,
    challenged_justification: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbDiagnosis> for Diagnosis {
    type Error = StoreError;

    fn try_from(row: DbDiagnosis) -> StoreResult<Self> {
        let id = DiagnosisId::from_str(&row.id).map_err(|err| {
            tracing::error!(error = %err, "stored diagnosis id is malformed");
            StoreError::Unexpected(anyhow!("failed to decode diagnosis"))
        })?;
        Ok(Diagnosis {
            id,
            client_id: ClientId::from_uuid(row.client_id),
            diagnosis_name: row.diagnosis_name,
            predicted_date: row.predicted_date,
            justification: row.justification,
            challenged_diagnosis: row.challenged_diagnosis,
            challenged_justification: row.challenged_justification,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Log the driver error and return an opaque error naming `op` only.
fn db_error(op: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| {
        tracing::error!(error = %err, operation = op, "diagnosis storage error");
        StoreError::Unexpected(anyhow!("failed to {op}"))
    }
}

impl PostgresStore {
    /// Connect, size the pool, and apply migrations.
    ///
    /// # Errors
    /// - Invalid URL, unreachable database, or failed migrations.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, true).await
    }

    /// Connect without running migrations. Used by tests that manage the schema.
    #[cfg(any(test, feature = "pg-tests"))]
    pub async fn connect_without_migrations(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, false).await
    }

    async fn connect_internal(pg: &PostgresConfig, run_migrations: bool) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&pg.url)
            .map_err(|err| StoreError::Unexpected(anyhow!("invalid postgres url: {err}")))?;
        let connect = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options);
        let pool = match tokio::time::timeout(Duration::from_millis(pg.connect_timeout_ms), connect)
            .await
        {
            Ok(result) => result
                .map_err(|err| StoreError::Unexpected(anyhow!("connect postgres pool: {err}")))?,
            Err(_) => {
                return Err(StoreError::Unexpected(anyhow!(
                    "connect postgres pool: timed out"
                )));
            }
        };

        if run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|err| StoreError::Unexpected(anyhow!("run migrations: {err}")))?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn refresh_total(&self) {
        if let Ok(total) = self.count().await {
            metrics::gauge!("diagnosis_records_total").set(total as f64);
        }
    }
}

async fn insert_row(
    tx: &mut Transaction<'_, Postgres>,
    diagnosis: &Diagnosis,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO diagnoses (id, client_id, diagnosis_name, predicted_date, justification,
               challenged_diagnosis, challenged_justification, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
    )
    .bind(diagnosis.id.as_str())
    .bind(diagnosis.client_id.as_uuid())
    .bind(&diagnosis.diagnosis_name)
    .bind(diagnosis.predicted_date)
    .bind(&diagnosis.justification)
    .bind(&diagnosis.challenged_diagnosis)
    .bind(&diagnosis.challenged_justification)
    .bind(diagnosis.created_at)
    .bind(diagnosis.updated_at)
    .execute(&mut **tx)
    .await
    .map(|_| ())
}

async fn write_row(
    tx: &mut Transaction<'_, Postgres>,
    diagnosis: &Diagnosis,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE diagnoses SET diagnosis_name = $1, justification = $2,
               challenged_diagnosis = $3, challenged_justification = $4, updated_at = $5
           WHERE id = $6"#,
    )
    .bind(&diagnosis.diagnosis_name)
    .bind(&diagnosis.justification)
    .bind(&diagnosis.challenged_diagnosis)
    .bind(&diagnosis.challenged_justification)
    .bind(diagnosis.updated_at)
    .bind(diagnosis.id.as_str())
    .execute(&mut **tx)
    .await
    .map(|_| ())
}

#[async_trait]
impl DiagnosisStore for PostgresStore {
    async fn find_latest_by_client(&self, client_id: &ClientId) -> StoreResult<Diagnosis> {
        let row = sqlx::query_as::<_, DbDiagnosis>(&format!(
            "SELECT {SELECT_COLUMNS} FROM diagnoses WHERE client_id = $1 \
             ORDER BY predicted_date DESC, seq DESC LIMIT 1"
        ))
        .bind(client_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find latest diagnosis"))?;
        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::NotFound("diagnosis".into())),
        }
    }

    async fn find_by_id(&self, id: &DiagnosisId) -> StoreResult<Diagnosis> {
        let row = sqlx::query_as::<_, DbDiagnosis>(&format!(
            "SELECT {SELECT_COLUMNS} FROM diagnoses WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find diagnosis"))?;
        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::NotFound("diagnosis".into())),
        }
    }

    async fn create(
        &self,
        client_id: &ClientId,
        request: CreateDiagnosisRequest,
    ) -> StoreResult<Diagnosis> {
        let diagnosis = Diagnosis::new(*client_id, request, Utc::now());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("create diagnosis"))?;
        insert_row(&mut tx, &diagnosis)
            .await
            .map_err(db_error("create diagnosis"))?;
        tx.commit().await.map_err(db_error("create diagnosis"))?;
        record_change("created", None);
        self.refresh_total().await;
        Ok(diagnosis)
    }

    async fn update(
        &self,
        id: &DiagnosisId,
        patch: UpdateDiagnosisRequest,
    ) -> StoreResult<Diagnosis> {
        if patch.is_empty() {
            return Err(StoreError::EmptyPatch);
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("update diagnosis"))?;
        let current = sqlx::query_as::<_, DbDiagnosis>(&format!(
            "SELECT {SELECT_COLUMNS} FROM diagnoses WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("update diagnosis"))?;
        let mut updated: Diagnosis = match current {
            Some(row) => row.try_into()?,
            None => return Err(StoreError::NotFound("diagnosis".into())),
        };
        updated.apply_update(&patch, Utc::now());
        write_row(&mut tx, &updated)
            .await
            .map_err(db_error("update diagnosis"))?;
        tx.commit().await.map_err(db_error("update diagnosis"))?;
        record_change("updated", None);
        Ok(updated)
    }

    async fn upsert_latest_for_client(
        &self,
        client_id: &ClientId,
        request: CreateDiagnosisRequest,
    ) -> StoreResult<(Diagnosis, UpsertOutcome)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("upsert diagnosis"))?;
        // Serializes upserts for one client until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(client_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_error("upsert diagnosis"))?;
        let latest = sqlx::query_as::<_, DbDiagnosis>(&format!(
            "SELECT {SELECT_COLUMNS} FROM diagnoses WHERE client_id = $1 \
             ORDER BY predicted_date DESC, seq DESC LIMIT 1 FOR UPDATE"
        ))
        .bind(client_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("upsert diagnosis"))?;

        let now = Utc::now();
        let (diagnosis, outcome) = match latest {
            Some(row) => {
                let mut current: Diagnosis = row.try_into()?;
                current.apply_update(&UpdateDiagnosisRequest::from(request), now);
                write_row(&mut tx, &current)
                    .await
                    .map_err(db_error("upsert diagnosis"))?;
                (current, UpsertOutcome::Updated)
            }
            None => {
                let created = Diagnosis::new(*client_id, request, now);
                insert_row(&mut tx, &created)
                    .await
                    .map_err(db_error("upsert diagnosis"))?;
                (created, UpsertOutcome::Created)
            }
        };
        tx.commit().await.map_err(db_error("upsert diagnosis"))?;

        match outcome {
            UpsertOutcome::Created => {
                record_change("created", None);
                self.refresh_total().await;
            }
            UpsertOutcome::Updated => record_change("updated", None),
        }
        Ok((diagnosis, outcome))
    }

    async fn list_by_client(
        &self,
        client_id: &ClientId,
        skip: u64,
        take: u64,
    ) -> StoreResult<Vec<Diagnosis>> {
        let rows = sqlx::query_as::<_, DbDiagnosis>(&format!(
            "SELECT {SELECT_COLUMNS} FROM diagnoses WHERE client_id = $1 \
             ORDER BY predicted_date DESC, seq DESC OFFSET $2 LIMIT $3"
        ))
        .bind(client_id.as_uuid())
        .bind(i64::try_from(skip).unwrap_or(i64::MAX))
        .bind(i64::try_from(take).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list diagnoses"))?;
        rows.into_iter().map(Diagnosis::try_from).collect()
    }

    async fn exists(&self, id: &str) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM diagnoses WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("check diagnosis existence"))
    }

    async fn delete(&self, id: &DiagnosisId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM diagnoses WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error("delete diagnosis"))?;
        let removed = result.rows_affected() > 0;
        if removed {
            record_change("deleted", None);
            self.refresh_total().await;
        }
        Ok(removed)
    }

    async fn count(&self) -> StoreResult<u64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM diagnoses")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count diagnoses"))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("check database health"))?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
