//! SQLite-backed record store.
//!
//! Runtime defaults match the rest of the workspace:
//! - `journal_mode = WAL` so readers do not block the writer
//! - `busy_timeout = 5s` to ride out transient lock contention
//! - `foreign_keys = ON` so items cannot outlive their request

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{
    Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter, types::Type,
};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::schema;
use super::{
    Batch, BatchOp, BatchResults, ItemFilter, LeadAssignment, RecordStore, RequestFilter,
    StoreError,
};
use crate::model::{
    ChecklistItem, ItemId, ItemPatch, NewChecklistItem, NewRequest, Person, Request, RequestId,
    RequestPatch, Role,
};

/// Busy timeout applied to every store connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ITEM_COLUMNS: &str = "item_id, request_id, template, title, description, lead, active, \
     completed_at_us, completed_by_name, completed_by_email, version";

/// Durable store over a single SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, apply runtime pragmas and
    /// migrate the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring or migrating the database
    /// fails.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("open store database {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if configuring or migrating the database fails.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory store")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> anyhow::Result<Self> {
        configure_connection(&conn).context("configure sqlite pragmas")?;
        let version = schema::migrate(&mut conn).context("apply store migrations")?;
        tracing::debug!(schema_version = version, "record store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Current `PRAGMA user_version`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the pragma cannot be read.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        Ok(schema::current_schema_version(&self.conn())?)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Column conversions
// ---------------------------------------------------------------------------

fn parse_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(value)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn micros_to_datetime(idx: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {micros} out of range").into(),
        )
    })
}

fn version_from_sql(idx: usize, version: i64) -> rusqlite::Result<u64> {
    u64::try_from(version)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err)))
}

fn version_to_sql(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|err| StoreError::Backend(Box::new(err)))
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ChecklistItem> {
    let template: String = row.get(2)?;
    let lead: String = row.get(5)?;
    let completed_at = row
        .get::<_, Option<i64>>(7)?
        .map(|us| micros_to_datetime(7, us))
        .transpose()?;
    let completed_by = match (
        row.get::<_, Option<String>>(8)?,
        row.get::<_, Option<String>>(9)?,
    ) {
        (Some(name), Some(email)) => Some(Person { name, email }),
        _ => None,
    };

    Ok(ChecklistItem {
        id: ItemId(row.get(0)?),
        request_id: RequestId(row.get(1)?),
        template: parse_column(2, &template)?,
        title: row.get(3)?,
        description: row.get(4)?,
        lead: parse_column(5, &lead)?,
        active: row.get(6)?,
        completed_at,
        completed_by,
        version: version_from_sql(10, row.get(10)?)?,
    })
}

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<LeadAssignment> {
    let role: String = row.get(0)?;
    Ok(LeadAssignment {
        role: parse_column(0, &role)?,
        person: Person {
            name: row.get(1)?,
            email: row.get(2)?,
        },
    })
}

// ---------------------------------------------------------------------------
// Statements shared by single calls and batches
// ---------------------------------------------------------------------------

fn load_request(conn: &Connection, id: RequestId) -> Result<Request, StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body_json FROM requests WHERE request_id = ?1",
            [id.0],
            |row| row.get(0),
        )
        .optional()?;
    let body = body.ok_or_else(|| StoreError::request_not_found(id))?;
    Ok(serde_json::from_str(&body)?)
}

fn load_item(conn: &Connection, id: ItemId) -> Result<ChecklistItem, StoreError> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM checklist_items WHERE item_id = ?1"),
        [id.0],
        item_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::item_not_found(id))
}

fn insert_item(conn: &Connection, new: NewChecklistItem) -> Result<ChecklistItem, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM requests WHERE request_id = ?1)",
        [new.request_id.0],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(StoreError::request_not_found(new.request_id));
    }

    conn.execute(
        "INSERT INTO checklist_items (request_id, template, title, description, lead, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.request_id.0,
            new.template.as_str(),
            new.title,
            new.description,
            new.lead.as_str(),
            new.active,
        ],
    )?;
    Ok(ChecklistItem::from_new(ItemId(conn.last_insert_rowid()), new))
}

fn write_item(
    conn: &Connection,
    id: ItemId,
    patch: &ItemPatch,
    expected_version: Option<u64>,
) -> Result<ChecklistItem, StoreError> {
    let mut item = load_item(conn, id)?;
    if let Some(expected) = expected_version
        && expected != item.version
    {
        return Err(StoreError::Conflict {
            item: id,
            expected,
            actual: item.version,
        });
    }

    let seen = item.version;
    item.apply(patch);
    let changed = conn.execute(
        "UPDATE checklist_items
         SET active = ?1,
             completed_at_us = ?2,
             completed_by_name = ?3,
             completed_by_email = ?4,
             version = version + 1
         WHERE item_id = ?5 AND version = ?6",
        params![
            item.active,
            item.completed_at.map(|at| at.timestamp_micros()),
            item.completed_by.as_ref().map(|p| p.name.as_str()),
            item.completed_by.as_ref().map(|p| p.email.as_str()),
            id.0,
            version_to_sql(seen)?,
        ],
    )?;

    if changed == 0 {
        let actual = load_item(conn, id)?.version;
        return Err(StoreError::Conflict {
            item: id,
            expected: seen,
            actual,
        });
    }

    item.version = seen + 1;
    Ok(item)
}

impl RecordStore for SqliteStore {
    fn create_request(&self, new: NewRequest) -> Result<Request, StoreError> {
        let now = Utc::now();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO requests (
                request_type, status, employee_name, supervisor_email, body_json,
                created_at_us, updated_at_us
             ) VALUES (?1, 'Active', ?2, ?3, '{}', ?4, ?4)",
            params![
                new.request_type.as_str(),
                new.employee_name,
                new.supervisor.email_key(),
                now.timestamp_micros(),
            ],
        )?;
        let request = Request::from_new(RequestId(tx.last_insert_rowid()), new, now);
        tx.execute(
            "UPDATE requests SET body_json = ?1 WHERE request_id = ?2",
            params![serde_json::to_string(&request)?, request.id.0],
        )?;
        tx.commit()?;
        Ok(request)
    }

    fn update_request(&self, id: RequestId, patch: RequestPatch) -> Result<Request, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut request = load_request(&tx, id)?;
        StoreError::check_status_patch(id, request.status, &patch)?;
        request.apply(patch);
        tx.execute(
            "UPDATE requests
             SET status = ?1, employee_name = ?2, supervisor_email = ?3, body_json = ?4,
                 updated_at_us = ?5
             WHERE request_id = ?6",
            params![
                request.status.as_str(),
                request.employee_name,
                request.supervisor.email_key(),
                serde_json::to_string(&request)?,
                Utc::now().timestamp_micros(),
                id.0,
            ],
        )?;
        tx.commit()?;
        Ok(request)
    }

    fn get_request(&self, id: RequestId) -> Result<Request, StoreError> {
        load_request(&self.conn(), id)
    }

    fn query_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        let mut conditions: Vec<String> = Vec::new();
        let mut param_values: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            param_values.push(status.as_str().to_string());
            conditions.push(format!("status = ?{}", param_values.len()));
        }
        if let Some(request_type) = filter.request_type {
            param_values.push(request_type.as_str().to_string());
            conditions.push(format!("request_type = ?{}", param_values.len()));
        }
        if let Some(email) = &filter.supervisor_email {
            param_values.push(email.trim().to_ascii_lowercase());
            conditions.push(format!("supervisor_email = ?{}", param_values.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let limit_clause = filter
            .limit
            .map_or_else(String::new, |limit| format!(" LIMIT {limit}"));
        let sql = format!(
            "SELECT body_json FROM requests{where_clause} ORDER BY request_id DESC{limit_clause}"
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let bodies = stmt
            .query_map(params_from_iter(param_values.iter()), |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StoreError::from))
            .collect()
    }

    fn get_item(&self, id: ItemId) -> Result<ChecklistItem, StoreError> {
        load_item(&self.conn(), id)
    }

    fn update_item(
        &self,
        id: ItemId,
        patch: ItemPatch,
        expected_version: Option<u64>,
    ) -> Result<ChecklistItem, StoreError> {
        write_item(&self.conn(), id, &patch, expected_version)
    }

    fn query_items(&self, filter: &ItemFilter) -> Result<Vec<ChecklistItem>, StoreError> {
        let mut conditions: Vec<String> = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(request_id) = filter.request_id {
            param_values.push(Box::new(request_id.0));
            conditions.push(format!("request_id = ?{}", param_values.len()));
        }
        if let Some(lead) = filter.lead {
            param_values.push(Box::new(lead.as_str()));
            conditions.push(format!("lead = ?{}", param_values.len()));
        }
        if let Some(template) = filter.template {
            param_values.push(Box::new(template.as_str()));
            conditions.push(format!("template = ?{}", param_values.len()));
        }
        if filter.outstanding_only {
            conditions.push("active = 1 AND completed_at_us IS NULL".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql =
            format!("SELECT {ITEM_COLUMNS} FROM checklist_items{where_clause} ORDER BY item_id");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(param_values.iter()), item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn execute_batch(&self, batch: Batch) -> Result<BatchResults, StoreError> {
        let conn = self.conn();
        let results = batch
            .into_ops()
            .into_iter()
            .map(|op| match op {
                BatchOp::CreateItem(new) => insert_item(&conn, new),
                BatchOp::UpdateItem {
                    id,
                    patch,
                    expected_version,
                } => write_item(&conn, id, &patch, expected_version),
            })
            .collect();
        Ok(results)
    }

    fn list_leads(&self, role: Option<Role>) -> Result<Vec<LeadAssignment>, StoreError> {
        let conn = self.conn();
        let leads = match role {
            Some(role) => {
                let mut stmt = conn.prepare(
                    "SELECT role, name, email FROM lead_assignments
                     WHERE role = ?1 ORDER BY assignment_id",
                )?;
                stmt.query_map([role.as_str()], lead_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT role, name, email FROM lead_assignments ORDER BY assignment_id",
                )?;
                stmt.query_map([], lead_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(leads)
    }

    fn insert_lead(&self, assignment: &LeadAssignment) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO lead_assignments (role, name, email, email_key, created_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                assignment.role.as_str(),
                assignment.person.name,
                assignment.person.email.trim(),
                assignment.person.email_key(),
                Utc::now().timestamp_micros(),
            ],
        )?;
        Ok(())
    }

    fn delete_lead(&self, role: Role, email: &str) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "DELETE FROM lead_assignments WHERE role = ?1 AND email_key = ?2",
            params![role.as_str(), email.trim().to_ascii_lowercase()],
        )?;
        Ok(changed > 0)
    }
}
