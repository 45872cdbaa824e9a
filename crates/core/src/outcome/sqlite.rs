use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    CallStatistics, InterestLevel, OutcomeError, OutcomeFilter, OutcomeRecord, OutcomeStatus,
    ResultSink,
};

const OUTCOME_COLUMNS: &str = "id, run_id, lead_id, external_call_id, status, failure_reason, duration_secs, summary, interest_level, meeting_scheduled, next_steps, recorded_at";

/// SQLite-backed result sink
pub struct SqliteResultSink {
    conn: Mutex<Connection>,
}

impl SqliteResultSink {
    /// Create a new SQLite result sink, creating the database file and tables if needed
    pub fn new(path: &Path) -> Result<Self, OutcomeError> {
        let conn = Connection::open(path).map_err(|e| OutcomeError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite result sink (useful for testing)
    pub fn in_memory() -> Result<Self, OutcomeError> {
        let conn =
            Connection::open_in_memory().map_err(|e| OutcomeError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OutcomeError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS call_outcomes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                run_id TEXT NOT NULL,
                lead_id TEXT NOT NULL,
                external_call_id TEXT,
                status TEXT NOT NULL,
                failure_reason TEXT,
                duration_secs REAL NOT NULL,
                summary TEXT NOT NULL,
                interest_level TEXT NOT NULL,
                meeting_scheduled INTEGER NOT NULL,
                next_steps TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_call_outcomes_lead_id ON call_outcomes(lead_id);
            CREATE INDEX IF NOT EXISTS idx_call_outcomes_run_id ON call_outcomes(run_id);
            CREATE INDEX IF NOT EXISTS idx_call_outcomes_status ON call_outcomes(status);
            "#,
        )
        .map_err(|e| OutcomeError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, OutcomeError> {
        self.conn
            .lock()
            .map_err(|_| OutcomeError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &OutcomeFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref lead_id) = filter.lead_id {
            conditions.push("lead_id = ?");
            params.push(Box::new(lead_id.clone()));
        }

        if let Some(ref run_id) = filter.run_id {
            conditions.push("run_id = ?");
            params.push(Box::new(run_id.clone()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn conversion_error(index: usize, message: String) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(OutcomeError::Database(message)),
        )
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<OutcomeRecord> {
        let status_str: String = row.get(4)?;
        let interest_str: String = row.get(8)?;
        let recorded_at_str: String = row.get(11)?;

        let status = status_str
            .parse::<OutcomeStatus>()
            .map_err(|e| Self::conversion_error(4, e))?;
        let interest_level = interest_str
            .parse::<InterestLevel>()
            .map_err(|e| Self::conversion_error(8, e))?;
        let recorded_at = DateTime::parse_from_rfc3339(&recorded_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Self::conversion_error(11, e.to_string()))?;

        Ok(OutcomeRecord {
            id: row.get(0)?,
            run_id: row.get(1)?,
            lead_id: row.get(2)?,
            external_call_id: row.get(3)?,
            status,
            failure_reason: row.get(5)?,
            duration_secs: row.get(6)?,
            summary: row.get(7)?,
            interest_level,
            meeting_scheduled: row.get(9)?,
            next_steps: row.get(10)?,
            recorded_at,
        })
    }
}

impl ResultSink for SqliteResultSink {
    fn append(&self, record: &OutcomeRecord) -> Result<(), OutcomeError> {
        let conn = self.lock()?;

        conn.execute(
            &format!(
                "INSERT INTO call_outcomes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                OUTCOME_COLUMNS
            ),
            params![
                record.id,
                record.run_id,
                record.lead_id,
                record.external_call_id,
                record.status.as_str(),
                record.failure_reason,
                record.duration_secs,
                record.summary,
                record.interest_level.as_str(),
                record.meeting_scheduled,
                record.next_steps,
                record.recorded_at.to_rfc3339(),
            ],
        )
        .map_err(|e| OutcomeError::Database(e.to_string()))?;

        Ok(())
    }

    fn list(&self, filter: &OutcomeFilter) -> Result<Vec<OutcomeRecord>, OutcomeError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM call_outcomes {} ORDER BY seq DESC LIMIT ? OFFSET ?",
            OUTCOME_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| OutcomeError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_record)
            .map_err(|e| OutcomeError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            records.push(row_result.map_err(|e| OutcomeError::Database(e.to_string()))?);
        }

        Ok(records)
    }

    fn latest_failed(&self, since: Option<DateTime<Utc>>) -> Result<Vec<String>, OutcomeError> {
        let conn = self.lock()?;

        // Latest record per lead, by insertion sequence.
        let mut stmt = conn
            .prepare(
                "SELECT lead_id, status, recorded_at FROM call_outcomes \
                 WHERE seq IN (SELECT MAX(seq) FROM call_outcomes GROUP BY lead_id) \
                 ORDER BY seq ASC",
            )
            .map_err(|e| OutcomeError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| OutcomeError::Database(e.to_string()))?;

        let mut lead_ids = Vec::new();
        for row_result in rows {
            let (lead_id, status_str, recorded_at_str) =
                row_result.map_err(|e| OutcomeError::Database(e.to_string()))?;

            let status = status_str
                .parse::<OutcomeStatus>()
                .map_err(OutcomeError::Database)?;
            if !status.is_retryable() {
                continue;
            }

            if let Some(since) = since {
                let recorded_at = DateTime::parse_from_rfc3339(&recorded_at_str)
                    .map_err(|e| OutcomeError::Database(e.to_string()))?
                    .with_timezone(&Utc);
                if recorded_at < since {
                    continue;
                }
            }

            lead_ids.push(lead_id);
        }

        Ok(lead_ids)
    }

    fn statistics(&self) -> Result<CallStatistics, OutcomeError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT COUNT(*), \
                    COALESCE(SUM(status = 'completed'), 0), \
                    COALESCE(SUM(status = 'failed'), 0), \
                    COALESCE(SUM(status = 'timed_out'), 0), \
                    COALESCE(SUM(meeting_scheduled), 0), \
                    COALESCE(SUM(interest_level = 'high'), 0), \
                    COALESCE(AVG(CASE WHEN status = 'completed' THEN duration_secs END), 0.0) \
             FROM call_outcomes",
            [],
            |row| {
                Ok(CallStatistics {
                    total_outcomes: row.get(0)?,
                    completed: row.get(1)?,
                    failed: row.get(2)?,
                    timed_out: row.get(3)?,
                    meetings_scheduled: row.get(4)?,
                    high_interest: row.get(5)?,
                    average_duration_secs: row.get(6)?,
                })
            },
        )
        .map_err(|e| OutcomeError::Database(e.to_string()))
    }
}
