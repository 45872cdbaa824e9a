//! SQLite-backed lead store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{CreateLeadRequest, Lead, LeadError, LeadFilter, LeadStatus, LeadStore};

const LEAD_COLUMNS: &str = "id, contact_number, business_name, contact_name, business_type, company_size, current_challenges, best_call_time, status, created_at, updated_at";

/// SQLite-backed lead store.
pub struct SqliteLeadStore {
    conn: Mutex<Connection>,
}

impl SqliteLeadStore {
    /// Create a new SQLite lead store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, LeadError> {
        let conn = Connection::open(path).map_err(|e| LeadError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite lead store (useful for testing).
    pub fn in_memory() -> Result<Self, LeadError> {
        let conn = Connection::open_in_memory().map_err(|e| LeadError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LeadError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                contact_number TEXT NOT NULL,
                business_name TEXT NOT NULL,
                contact_name TEXT NOT NULL,
                business_type TEXT NOT NULL,
                company_size TEXT NOT NULL,
                current_challenges TEXT,
                best_call_time TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status);
            CREATE INDEX IF NOT EXISTS idx_leads_created_at ON leads(created_at);
            "#,
        )
        .map_err(|e| LeadError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LeadError> {
        self.conn
            .lock()
            .map_err(|_| LeadError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &LeadFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?".to_string());
            params.push(Box::new(status.as_str().to_string()));
        }

        if !filter.business_types.is_empty() {
            let placeholders = vec!["?"; filter.business_types.len()].join(", ");
            conditions.push(format!("business_type IN ({})", placeholders));
            for business_type in &filter.business_types {
                params.push(Box::new(business_type.clone()));
            }
        }

        if !filter.company_sizes.is_empty() {
            let placeholders = vec!["?"; filter.company_sizes.len()].join(", ");
            conditions.push(format!("company_size IN ({})", placeholders));
            for size in &filter.company_sizes {
                params.push(Box::new(size.clone()));
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_lead(row: &rusqlite::Row) -> rusqlite::Result<Lead> {
        let status_str: String = row.get(8)?;
        let created_at_str: String = row.get(9)?;
        let updated_at_str: String = row.get(10)?;

        let status = status_str.parse::<LeadStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                Box::new(LeadError::Database(e)),
            )
        })?;

        Ok(Lead {
            id: row.get(0)?,
            contact_number: row.get(1)?,
            business_name: row.get(2)?,
            contact_name: row.get(3)?,
            business_type: row.get(4)?,
            company_size: row.get(5)?,
            current_challenges: row.get(6)?,
            best_call_time: row.get(7)?,
            status,
            created_at: Self::parse_timestamp(&created_at_str),
            updated_at: Self::parse_timestamp(&updated_at_str),
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Lead>, LeadError> {
        let result = conn.query_row(
            &format!("SELECT {} FROM leads WHERE id = ?", LEAD_COLUMNS),
            params![id],
            Self::row_to_lead,
        );

        match result {
            Ok(lead) => Ok(Some(lead)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(LeadError::Database(e.to_string())),
        }
    }
}

impl LeadStore for SqliteLeadStore {
    fn create(&self, request: CreateLeadRequest) -> Result<Lead, LeadError> {
        if request.business_name.trim().is_empty() {
            return Err(LeadError::Invalid("business_name is required".to_string()));
        }

        let conn = self.lock()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = LeadStatus::Pending;

        conn.execute(
            &format!(
                "INSERT INTO leads ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                LEAD_COLUMNS
            ),
            params![
                id,
                request.contact_number,
                request.business_name,
                request.contact_name,
                request.business_type,
                request.company_size,
                request.current_challenges,
                request.best_call_time,
                status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| LeadError::Database(e.to_string()))?;

        Ok(Lead {
            id,
            contact_number: request.contact_number,
            business_name: request.business_name,
            contact_name: request.contact_name,
            business_type: request.business_type,
            company_size: request.company_size,
            current_challenges: request.current_challenges,
            best_call_time: request.best_call_time,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Lead>, LeadError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, LeadError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        // rowid breaks ties between leads created in the same instant
        let sql = format!(
            "SELECT {} FROM leads {} ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?",
            LEAD_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LeadError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_lead)
            .map_err(|e| LeadError::Database(e.to_string()))?;

        let mut leads = Vec::new();
        for row_result in rows {
            leads.push(row_result.map_err(|e| LeadError::Database(e.to_string()))?);
        }

        Ok(leads)
    }

    fn count(&self, filter: &LeadFilter) -> Result<i64, LeadError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM leads {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| LeadError::Database(e.to_string()))
    }

    fn set_status(&self, id: &str, status: LeadStatus) -> Result<Lead, LeadError> {
        let conn = self.lock()?;

        let current = Self::fetch(&conn, id)?.ok_or_else(|| LeadError::NotFound(id.to_string()))?;

        if !current.status.can_transition_to(status) {
            return Err(LeadError::InvalidTransition {
                lead_id: id.to_string(),
                from: current.status,
                to: status,
            });
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE leads SET status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), now.to_rfc3339(), id],
        )
        .map_err(|e| LeadError::Database(e.to_string()))?;

        Ok(Lead {
            status,
            updated_at: now,
            ..current
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteLeadStore {
        SqliteLeadStore::in_memory().unwrap()
    }

    fn request(name: &str, business_type: &str, size: &str) -> CreateLeadRequest {
        CreateLeadRequest {
            contact_number: "+15551234567".to_string(),
            business_name: name.to_string(),
            contact_name: "Alex".to_string(),
            business_type: business_type.to_string(),
            company_size: size.to_string(),
            current_challenges: Some("Scheduling".to_string()),
            best_call_time: None,
        }
    }

    #[test]
    fn test_create_lead() {
        let store = create_test_store();
        let lead = store.create(request("Acme", "Restaurant", "Small")).unwrap();

        assert!(!lead.id.is_empty());
        assert_eq!(lead.status, LeadStatus::Pending);
        assert_eq!(lead.business_name, "Acme");
    }

    #[test]
    fn test_create_rejects_missing_name() {
        let store = create_test_store();
        let result = store.create(request("  ", "Restaurant", "Small"));
        assert!(matches!(result, Err(LeadError::Invalid(_))));
    }

    #[test]
    fn test_get_lead() {
        let store = create_test_store();
        let created = store.create(request("Acme", "Restaurant", "Small")).unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.current_challenges.as_deref(), Some("Scheduling"));
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let store = create_test_store();
        for name in ["A", "B", "C", "D"] {
            store.create(request(name, "Retail", "Small")).unwrap();
        }

        let names: Vec<String> = store
            .list(&LeadFilter::new())
            .unwrap()
            .into_iter()
            .map(|l| l.business_name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_list_filters_by_type_and_size() {
        let store = create_test_store();
        store.create(request("A", "Restaurant", "Small")).unwrap();
        store.create(request("B", "Healthcare", "Small")).unwrap();
        store.create(request("C", "Restaurant", "Large")).unwrap();

        let filter = LeadFilter::new()
            .with_business_types(vec!["Restaurant".to_string()])
            .with_company_sizes(vec!["Small".to_string(), "Medium".to_string()]);
        let leads = store.list(&filter).unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].business_name, "A");
        assert_eq!(store.count(&filter).unwrap(), 1);
    }

    #[test]
    fn test_list_pending_respects_limit() {
        let store = create_test_store();
        for name in ["A", "B", "C"] {
            store.create(request(name, "Retail", "Small")).unwrap();
        }
        let first = store.list(&LeadFilter::new()).unwrap()[0].id.clone();
        store.set_status(&first, LeadStatus::InProgress).unwrap();

        let pending = store.list_pending(&LeadFilter::new().with_limit(1)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].business_name, "B");
        assert_eq!(
            store
                .count(&LeadFilter::new().with_status(LeadStatus::Pending))
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_set_status_follows_lifecycle() {
        let store = create_test_store();
        let lead = store.create(request("Acme", "Retail", "Small")).unwrap();

        let lead = store.set_status(&lead.id, LeadStatus::InProgress).unwrap();
        assert_eq!(lead.status, LeadStatus::InProgress);
        let lead = store.set_status(&lead.id, LeadStatus::Failed).unwrap();
        let lead = store.set_status(&lead.id, LeadStatus::Pending).unwrap();
        assert_eq!(
            store.get(&lead.id).unwrap().unwrap().status,
            LeadStatus::Pending
        );
    }

    #[test]
    fn test_set_status_rejects_skipping_in_progress() {
        let store = create_test_store();
        let lead = store.create(request("Acme", "Retail", "Small")).unwrap();

        let result = store.set_status(&lead.id, LeadStatus::Completed);
        assert!(matches!(result, Err(LeadError::InvalidTransition { .. })));
    }

    #[test]
    fn test_set_status_not_found() {
        let store = create_test_store();
        let result = store.set_status("missing", LeadStatus::InProgress);
        assert!(matches!(result, Err(LeadError::NotFound(_))));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.db");

        let id = {
            let store = SqliteLeadStore::new(&path).unwrap();
            store.create(request("Acme", "Retail", "Small")).unwrap().id
        };

        let store = SqliteLeadStore::new(&path).unwrap();
        assert!(store.get(&id).unwrap().is_some());
    }
}
