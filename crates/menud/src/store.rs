//! Corpus persistence.
//!
//! The corpus is append-only from the daemon's point of view: records are
//! inserted on cache misses and read back as per-language slices. Backoffice
//! tooling may prune or merge rows out of band.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use menu_common::{DishRecord, DisplayLanguage};
use rusqlite::{params, Connection};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Read/write seam over the corpus. Mocked in resolver tests.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// All records stored for one display language.
    async fn query_by_language(
        &self,
        language: DisplayLanguage,
    ) -> Result<Vec<DishRecord>, StoreError>;

    async fn insert(&self, record: &DishRecord) -> Result<(), StoreError>;

    /// Best-effort side effect; callers log failures and move on.
    async fn increment_restaurant_explanations(
        &self,
        restaurant_id: i64,
    ) -> Result<(), StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS dishes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    display_language TEXT NOT NULL,
    menu_language TEXT NOT NULL,
    explanation TEXT NOT NULL,
    tags TEXT NOT NULL,
    allergens TEXT NOT NULL,
    cuisine TEXT NOT NULL,
    restaurant_id INTEGER,
    restaurant_name TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dishes_display_language
    ON dishes(display_language);
CREATE TABLE IF NOT EXISTS restaurants (
    id INTEGER PRIMARY KEY,
    name TEXT,
    cuisine TEXT,
    location TEXT,
    scan_count INTEGER NOT NULL DEFAULT 0,
    explanation_count INTEGER NOT NULL DEFAULT 0
);
";

/// SQLite-backed corpus. Statements are short, so a plain mutex around the
/// connection is enough.
pub struct SqliteCorpus {
    conn: Mutex<Connection>,
}

impl SqliteCorpus {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DishRecord> {
        let language: String = row.get("display_language")?;
        let tags_json: String = row.get("tags")?;
        let allergens_json: String = row.get("allergens")?;
        let created_at: DateTime<Utc> = row.get("created_at")?;

        Ok(DishRecord {
            id: Some(row.get("id")?),
            name: row.get("name")?,
            display_language: DisplayLanguage::from_str(&language).unwrap_or(DisplayLanguage::En),
            menu_language: row.get("menu_language")?,
            explanation: row.get("explanation")?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            allergens: serde_json::from_str(&allergens_json).unwrap_or_default(),
            cuisine: row.get("cuisine")?,
            restaurant_id: row.get("restaurant_id")?,
            restaurant_name: row.get("restaurant_name")?,
            created_at,
        })
    }
}

#[async_trait]
impl CorpusStore for SqliteCorpus {
    async fn query_by_language(
        &self,
        language: DisplayLanguage,
    ) -> Result<Vec<DishRecord>, StoreError> {
        let conn = self.conn.lock().expect("corpus lock");
        let mut stmt = conn.prepare(
            "SELECT id, name, display_language, menu_language, explanation,
                    tags, allergens, cuisine, restaurant_id, restaurant_name, created_at
             FROM dishes WHERE display_language = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![language.as_str()], Self::row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    async fn insert(&self, record: &DishRecord) -> Result<(), StoreError> {
        let tags = serde_json::to_string(&record.tags)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let allergens = serde_json::to_string(&record.allergens)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let conn = self.conn.lock().expect("corpus lock");
        conn.execute(
            "INSERT INTO dishes (name, display_language, menu_language, explanation,
                                 tags, allergens, cuisine, restaurant_id, restaurant_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.name,
                record.display_language.as_str(),
                record.menu_language,
                record.explanation,
                tags,
                allergens,
                record.cuisine,
                record.restaurant_id,
                record.restaurant_name,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    async fn increment_restaurant_explanations(
        &self,
        restaurant_id: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("corpus lock");
        conn.execute(
            "INSERT INTO restaurants (id, explanation_count) VALUES (?1, 1)
             ON CONFLICT(id) DO UPDATE SET explanation_count = explanation_count + 1",
            params![restaurant_id],
        )?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().expect("corpus lock");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM dishes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
