//! SQLite-backed link store.
//!
//! ## Tables
//!
//! - `course_assets` - one row per link, `UNIQUE(course_id, content_id, asset_id)`
//! - `schema_version` - single row tracking the table layout version

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, Row, ToSql};
use tracing::{debug, info};

use super::LinkStore;
use crate::domain::{CourseAssetLink, LinkFilter, LinkPatch, NewLink};
use crate::error::StoreError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

const LINKS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS course_assets (
    id          TEXT PRIMARY KEY,
    course_id   TEXT NOT NULL,
    content_id  TEXT NOT NULL,
    asset_id    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (course_id, content_id, asset_id)
);
CREATE INDEX IF NOT EXISTS idx_course_assets_asset ON course_assets (asset_id);
CREATE INDEX IF NOT EXISTS idx_course_assets_course ON course_assets (course_id);
"#;

const SELECT_COLUMNS: &str = "SELECT id, course_id, content_id, asset_id, created_at FROM course_assets";

/// Link store persisted in a SQLite database
pub struct SqliteLinkStore {
    conn: Mutex<Connection>,
}

impl SqliteLinkStore {
    /// Open or create the link database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening link database at {:?}", path);

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory link database");
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&conn)
    }
}

#[async_trait]
impl LinkStore for SqliteLinkStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find(&self, filter: &LinkFilter) -> Result<Vec<CourseAssetLink>, StoreError> {
        self.with_conn(|conn| {
            let (clause, values) = where_clause(filter);
            let sql = format!("{} WHERE {} ORDER BY created_at, id", SELECT_COLUMNS, clause);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(param_refs(&values).as_slice(), link_from_row)?;

            let mut links = Vec::new();
            for row in rows {
                links.push(row?);
            }
            Ok(links)
        })
    }

    async fn insert(&self, link: NewLink) -> Result<CourseAssetLink, StoreError> {
        let record = CourseAssetLink::from_new(link);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO course_assets (id, course_id, content_id, asset_id, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    record.id,
                    record.course_id,
                    record.content_id,
                    record.asset_id,
                    record.created_at,
                ],
            )
            .map_err(|e| duplicate_or_backend(e, &record.course_id, &record.content_id, &record.asset_id))?;
            Ok(())
        })?;

        debug!(id = %record.id, "Inserted link");
        Ok(record)
    }

    async fn update(&self, filter: &LinkFilter, patch: &LinkPatch) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let (clause, mut values) = where_clause(filter);
            let sql = format!(
                "UPDATE course_assets SET
                   course_id = COALESCE(?, course_id),
                   content_id = COALESCE(?, content_id),
                   asset_id = COALESCE(?, asset_id)
                 WHERE {}",
                clause
            );

            let mut all_values = vec![
                patch.course_id.clone(),
                patch.content_id.clone(),
                patch.asset_id.clone(),
            ];
            all_values.append(&mut values);

            // A constraint failure aborts the whole statement, so nothing changes
            conn.execute(&sql, param_refs(&all_values).as_slice()).map_err(|e| {
                duplicate_or_backend(
                    e,
                    patch.course_id.as_deref().unwrap_or("*"),
                    patch.content_id.as_deref().unwrap_or("*"),
                    patch.asset_id.as_deref().unwrap_or("*"),
                )
            })
        })
    }

    async fn delete(&self, filter: &LinkFilter) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let (clause, values) = where_clause(filter);
            let sql = format!(
                "DELETE FROM course_assets WHERE rowid =
                   (SELECT rowid FROM course_assets WHERE {} ORDER BY created_at, id LIMIT 1)",
                clause
            );
            let removed = conn.execute(&sql, param_refs(&values).as_slice())?;
            Ok(removed > 0)
        })
    }

    async fn delete_many(&self, filter: &LinkFilter) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let (clause, values) = where_clause(filter);
            let sql = format!("DELETE FROM course_assets WHERE {}", clause);
            Ok(conn.execute(&sql, param_refs(&values).as_slice())?)
        })
    }
}

/// Initialize or migrate the database schema
fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let current_version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    if current_version == 0 {
        info!("Creating link schema v{}", SCHEMA_VERSION);
        conn.execute_batch(LINKS_SCHEMA)?;
        conn.execute("DELETE FROM schema_version", [])?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?)", [SCHEMA_VERSION])?;
    } else {
        debug!("Link schema is up to date (v{})", current_version);
    }

    Ok(())
}

fn where_clause(filter: &LinkFilter) -> (String, Vec<Option<String>>) {
    let mut parts = vec!["1=1".to_string()];
    let mut values = Vec::new();

    for (column, value) in [
        ("id", &filter.id),
        ("course_id", &filter.course_id),
        ("content_id", &filter.content_id),
        ("asset_id", &filter.asset_id),
    ] {
        if let Some(value) = value {
            parts.push(format!("{} = ?", column));
            values.push(Some(value.clone()));
        }
    }

    (parts.join(" AND "), values)
}

fn param_refs(values: &[Option<String>]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<CourseAssetLink> {
    Ok(CourseAssetLink {
        id: row.get(0)?,
        course_id: row.get(1)?,
        content_id: row.get(2)?,
        asset_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn duplicate_or_backend(e: rusqlite::Error, course_id: &str, content_id: &str, asset_id: &str) -> StoreError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::Duplicate {
            course_id: course_id.to_string(),
            content_id: content_id.to_string(),
            asset_id: asset_id.to_string(),
        },
        _ => StoreError::from(e),
    }
}
