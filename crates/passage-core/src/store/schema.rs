//! SQLite schema and migrations for [`super::SqliteStore`].
//!
//! - `requests` keeps indexed columns for filtering plus the full record as
//!   JSON in `body_json`
//! - `checklist_items` stores every item field as a column; `version` is the
//!   optimistic-concurrency stamp
//! - `lead_assignments` maps lead roles to people, unique per
//!   (role, normalized email)

use rusqlite::{Connection, types::Type};

/// Migration v1: requests, checklist items, lead assignments.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS requests (
    request_id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_type TEXT NOT NULL CHECK (request_type IN ('In', 'Out')),
    status TEXT NOT NULL CHECK (status IN ('Active', 'Cancelled', 'Closed')),
    employee_name TEXT NOT NULL,
    supervisor_email TEXT NOT NULL,
    body_json TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS checklist_items (
    item_id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id INTEGER NOT NULL REFERENCES requests(request_id) ON DELETE CASCADE,
    template TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    lead TEXT NOT NULL,
    active INTEGER NOT NULL CHECK (active IN (0, 1)),
    completed_at_us INTEGER,
    completed_by_name TEXT,
    completed_by_email TEXT,
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    CHECK (completed_at_us IS NULL OR active = 1)
);

CREATE TABLE IF NOT EXISTS lead_assignments (
    assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    role TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL CHECK (length(trim(email)) > 0),
    email_key TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    UNIQUE (role, email_key)
);

CREATE INDEX IF NOT EXISTS idx_requests_status
    ON requests(status, request_id DESC);

CREATE INDEX IF NOT EXISTS idx_items_request
    ON checklist_items(request_id, item_id);

CREATE INDEX IF NOT EXISTS idx_items_lead_outstanding
    ON checklist_items(lead, active, completed_at_us);
";

/// Migration v2: one item per template per request.
pub const MIGRATION_V2_SQL: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_items_request_template
    ON checklist_items(request_id, template);
";

/// Indexes expected after all migrations.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_requests_status",
    "idx_items_request",
    "idx_items_lead_outstanding",
    "idx_items_request_template",
];

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[(1, MIGRATION_V1_SQL), (2, MIGRATION_V2_SQL)];

/// Read `PRAGMA user_version` as a `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the value is out of range.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply pending migrations in ascending order, each in its own transaction.
///
/// # Errors
///
/// Returns an error if any migration fails; earlier migrations stay applied.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.commit()?;
        tracing::debug!(version, "applied store migration");
        current = *version;
    }

    Ok(current)
}
