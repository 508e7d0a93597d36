//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{
    FailureKind, JobFilter, JobStatus, JobStore, JobStoreError, NewJob, Parameters,
    StatusTransition, TransformationJob, TransformationType,
};

const SELECT_COLUMNS: &str = "id, transformation_type, parameters, input_ref, status, output_ref, error_message, failure_kind, created_at, started_at, completed_at, processing_time_ms, updated_at";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transformations (
                id TEXT PRIMARY KEY,
                transformation_type TEXT NOT NULL,
                parameters TEXT NOT NULL,
                input_ref TEXT NOT NULL,
                status TEXT NOT NULL,
                output_ref TEXT,
                error_message TEXT,
                failure_kind TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                processing_time_ms INTEGER,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_transformations_status ON transformations(status);
            CREATE INDEX IF NOT EXISTS idx_transformations_created_at ON transformations(created_at);
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobStoreError> {
        self.conn
            .lock()
            .map_err(|_| JobStoreError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(transformation_type) = filter.transformation_type {
            conditions.push("transformation_type = ?");
            params.push(Box::new(transformation_type.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn insert(conn: &Connection, job: &TransformationJob) -> Result<(), JobStoreError> {
        let parameters_json = serde_json::to_string(&job.parameters).map_err(db_err)?;

        conn.execute(
            &format!(
                "INSERT INTO transformations ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                SELECT_COLUMNS
            ),
            params![
                job.id,
                job.transformation_type.as_str(),
                parameters_json,
                job.input_ref,
                job.status.as_str(),
                job.output_ref,
                job.error_message,
                job.failure_kind.map(|k| k.as_str()),
                format_ts(job.created_at),
                job.started_at.map(format_ts),
                job.completed_at.map(format_ts),
                job.processing_time_ms.map(|ms| ms as i64),
                format_ts(job.updated_at),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                JobStoreError::AlreadyExists(job.id.clone())
            }
            other => db_err(other),
        })?;

        Ok(())
    }

    fn write_status(conn: &Connection, job: &TransformationJob) -> Result<(), JobStoreError> {
        conn.execute(
            "UPDATE transformations SET status = ?, output_ref = ?, error_message = ?, failure_kind = ?, started_at = ?, completed_at = ?, processing_time_ms = ?, updated_at = ? WHERE id = ?",
            params![
                job.status.as_str(),
                job.output_ref,
                job.error_message,
                job.failure_kind.map(|k| k.as_str()),
                job.started_at.map(format_ts),
                job.completed_at.map(format_ts),
                job.processing_time_ms.map(|ms| ms as i64),
                format_ts(job.updated_at),
                job.id,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<TransformationJob>, JobStoreError> {
        conn.query_row(
            &format!("SELECT {} FROM transformations WHERE id = ?", SELECT_COLUMNS),
            params![id],
            Self::row_to_job,
        )
        .optional()
        .map_err(db_err)
    }

    /// Check and apply a transition against the current row.
    fn transition(
        conn: &Connection,
        id: &str,
        transition: StatusTransition,
    ) -> Result<TransformationJob, JobStoreError> {
        let mut job = Self::fetch(conn, id)?.ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;

        let target = transition.target_status();
        if !job.status.can_transition_to(target) {
            return Err(JobStoreError::InvalidTransition {
                id: id.to_string(),
                from: job.status,
                to: target,
            });
        }

        job.apply(transition, Utc::now());
        Self::write_status(conn, &job)?;
        Ok(job)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<TransformationJob> {
        let id: String = row.get(0)?;
        let type_str: String = row.get(1)?;
        let parameters_json: String = row.get(2)?;
        let input_ref: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let output_ref: Option<String> = row.get(5)?;
        let error_message: Option<String> = row.get(6)?;
        let failure_kind_str: Option<String> = row.get(7)?;
        let created_at: String = row.get(8)?;
        let started_at: Option<String> = row.get(9)?;
        let completed_at: Option<String> = row.get(10)?;
        let processing_time_ms: Option<i64> = row.get(11)?;
        let updated_at: String = row.get(12)?;

        let transformation_type: TransformationType = type_str
            .parse()
            .map_err(|e: super::UnknownTransformationType| conversion_err(1, e.to_string()))?;
        let parameters: Parameters = serde_json::from_str(&parameters_json)
            .map_err(|e| conversion_err(2, e.to_string()))?;
        let status: JobStatus = status_str.parse().map_err(|e| conversion_err(4, e))?;
        let failure_kind = failure_kind_str
            .map(|s| s.parse::<FailureKind>())
            .transpose()
            .map_err(|e| conversion_err(7, e))?;

        Ok(TransformationJob {
            id,
            transformation_type,
            parameters,
            input_ref,
            status,
            output_ref,
            error_message,
            failure_kind,
            created_at: parse_ts(8, &created_at)?,
            started_at: started_at.map(|s| parse_ts(9, &s)).transpose()?,
            completed_at: completed_at.map(|s| parse_ts(10, &s)).transpose()?,
            processing_time_ms: processing_time_ms.map(|ms| ms.max(0) as u64),
            updated_at: parse_ts(12, &updated_at)?,
        })
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: NewJob) -> Result<TransformationJob, JobStoreError> {
        let conn = self.lock()?;
        let job = TransformationJob::from_new(job, Utc::now());
        Self::insert(&conn, &job)?;
        Ok(job)
    }

    fn begin(&self, job: NewJob) -> Result<TransformationJob, JobStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let now = Utc::now();
        let pending = TransformationJob::from_new(job, now);
        Self::insert(&tx, &pending)?;
        let started = Self::transition(
            &tx,
            &pending.id,
            StatusTransition::Processing { started_at: now },
        )?;

        tx.commit().map_err(db_err)?;
        Ok(started)
    }

    fn get(&self, id: &str) -> Result<Option<TransformationJob>, JobStoreError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<TransformationJob>, JobStoreError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM transformations {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_job)
            .map_err(db_err)?;

        let mut jobs = Vec::new();
        for row_result in rows {
            jobs.push(row_result.map_err(db_err)?);
        }

        Ok(jobs)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM transformations {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn update_status(
        &self,
        id: &str,
        transition: StatusTransition,
    ) -> Result<TransformationJob, JobStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let job = Self::transition(&tx, id, transition)?;
        tx.commit().map_err(db_err)?;
        Ok(job)
    }
}

fn db_err(e: impl std::fmt::Display) -> JobStoreError {
    JobStoreError::Database(e.to_string())
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

// Fixed precision keeps lexical order equal to chronological order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e.to_string()))
}
