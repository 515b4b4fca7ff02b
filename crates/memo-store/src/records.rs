//! Entry records in SQLite

use crate::types::{CacheEntry, EvictionPolicy, NameStats};
use chrono::{DateTime, Utc};
use memo_key::CacheKey;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;

const COLUMNS: &str = "hash, name, path, created_at, used_at, size, use_count, time_s";

/// Create the entries table and its name index if missing
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            hash TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            path TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            used_at INTEGER,
            size INTEGER NOT NULL,
            use_count INTEGER NOT NULL DEFAULT 0,
            time_s REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_entries_name ON entries(name);
        "#,
    )
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(idx: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    let hash: String = row.get(0)?;
    let hash = hash
        .parse::<CacheKey>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let path: String = row.get(2)?;
    let used_at = match row.get::<_, Option<i64>>(4)? {
        Some(micros) => Some(from_micros(4, micros)?),
        None => None,
    };

    Ok(CacheEntry {
        hash,
        name: row.get(1)?,
        path: PathBuf::from(path),
        created_at: from_micros(3, row.get(3)?)?,
        used_at,
        size: row.get::<_, i64>(5)? as u64,
        use_count: row.get::<_, i64>(6)? as u64,
        time_s: row.get(7)?,
    })
}

pub fn exists(conn: &Connection, hash: &CacheKey) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM entries WHERE hash = ?1)",
        params![hash.as_str()],
        |row| row.get(0),
    )
}

pub fn get(conn: &Connection, hash: &CacheKey) -> rusqlite::Result<Option<CacheEntry>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM entries WHERE hash = ?1"),
        params![hash.as_str()],
        entry_from_row,
    )
    .optional()
}

/// Insert a record, replacing any previous record for the same hash
pub fn upsert(conn: &Connection, entry: &CacheEntry) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO entries ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            entry.hash.as_str(),
            entry.name,
            // Lossless: EntryStore::open only accepts UTF-8 cache directories
            entry.path.to_string_lossy().into_owned(),
            to_micros(entry.created_at),
            entry.used_at.map(to_micros),
            entry.size as i64,
            entry.use_count as i64,
            entry.time_s,
        ],
    )?;
    Ok(())
}

/// Record a hit
pub fn touch(conn: &Connection, hash: &CacheKey, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE entries SET use_count = use_count + 1, used_at = ?2 WHERE hash = ?1",
        params![hash.as_str(), to_micros(now)],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, hash: &CacheKey) -> rusqlite::Result<bool> {
    let deleted = conn.execute("DELETE FROM entries WHERE hash = ?1", params![hash.as_str()])?;
    Ok(deleted > 0)
}

/// Total recorded size for `name`, not counting `exclude`
pub fn total_size(conn: &Connection, name: &str, exclude: &CacheKey) -> rusqlite::Result<u64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(size), 0) FROM entries WHERE name = ?1 AND hash != ?2",
        params![name, exclude.as_str()],
        |row| row.get(0),
    )?;
    Ok(total as u64)
}

/// Entries of `name` in the order `policy` evicts them.
/// Ties go to the oldest `created_at`, then to insertion order.
pub fn eviction_order(
    conn: &Connection,
    name: &str,
    exclude: &CacheKey,
    policy: EvictionPolicy,
) -> rusqlite::Result<Vec<CacheEntry>> {
    let order_by = match policy {
        EvictionPolicy::LeastRecentlyUsed => {
            "COALESCE(used_at, created_at) ASC, created_at ASC, rowid ASC"
        }
        EvictionPolicy::LeastFrequentlyUsed => "use_count ASC, created_at ASC, rowid ASC",
    };
    let sql = format!(
        "SELECT {COLUMNS} FROM entries WHERE name = ?1 AND hash != ?2 ORDER BY {order_by}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![name, exclude.as_str()], entry_from_row)?;
    rows.collect()
}

/// All entries, or those of one name, oldest first
pub fn list(conn: &Connection, name: Option<&str>) -> rusqlite::Result<Vec<CacheEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM entries WHERE ?1 IS NULL OR name = ?1 ORDER BY created_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map(params![name], entry_from_row)?;
    rows.collect()
}

pub fn stats(conn: &Connection) -> rusqlite::Result<Vec<NameStats>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT name,
               COUNT(*),
               COALESCE(SUM(size), 0),
               COALESCE(SUM(use_count), 0),
               COALESCE(SUM(use_count * time_s), 0.0)
        FROM entries
        GROUP BY name
        ORDER BY name
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(NameStats {
            name: row.get(0)?,
            entries: row.get::<_, i64>(1)? as usize,
            total_size: row.get::<_, i64>(2)? as u64,
            hits: row.get::<_, i64>(3)? as u64,
            seconds_saved: row.get(4)?,
        })
    })?;
    rows.collect()
}
