// Scanner111 - db/formid.rs
//
// Read-only FormID reference lookup backed by one or more SQLite files.
//
// Schema (fixed, per database): a single table
//   CREATE TABLE <GameTable> (formid TEXT, plugin TEXT, entry TEXT,
//                             PRIMARY KEY(formid, plugin))
// queried with both literals bound, never interpolated.
//
// A process-wide cache stores every answered lookup, negative results
// included, so a hot FormID in a large batch is queried once. The cache is
// unbounded for the batch lifetime and cleared between batches. A SQLite
// error during one lookup degrades to a miss and is NOT cached, so a
// transient failure cannot pin a wrong answer.

use dashmap::DashMap;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::util::constants;

/// Cache key: (normalised upper-case 6-hex suffix, lower-case plugin name).
type CacheKey = (String, String);

// =============================================================================
// Connection pool
// =============================================================================

/// A small blocking pool of read-only connections to one database file.
/// Lookups pop a connection, query, and push it back; acquisition blocks
/// on a condvar when the pool is drained.
struct ConnectionPool {
    connections: Mutex<Vec<Connection>>,
    available: Condvar,
}

impl ConnectionPool {
    fn open(path: &Path, size: usize) -> rusqlite::Result<Self> {
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            connections.push(Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?);
        }
        Ok(Self {
            connections: Mutex::new(connections),
            available: Condvar::new(),
        })
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let mut guard = lock(&self.connections);
        while guard.is_empty() {
            guard = self
                .available
                .wait(guard)
                .unwrap_or_else(|e| e.into_inner());
        }
        let connection = guard.pop().expect("pool guard is non-empty");
        drop(guard);

        let result = f(&connection);

        lock(&self.connections).push(connection);
        self.available.notify_one();
        result
    }
}

fn lock<T>(mutex: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// FormID database
// =============================================================================

struct DatabaseHandle {
    path: PathBuf,
    pool: ConnectionPool,
}

/// All configured FormID databases for one game, with the shared lookup
/// cache. Shared by every orchestrator in the batch.
pub struct FormIdDatabase {
    table: String,
    databases: Vec<DatabaseHandle>,
    cache: DashMap<CacheKey, Option<String>>,
}

impl FormIdDatabase {
    /// Open every existing database file among `paths`. Missing files are
    /// skipped silently (database-missing is not an error); files that fail
    /// to open are skipped with a warning. The pool per database holds
    /// `min(max_concurrent, DB_POOL_CAP)` connections.
    pub fn open(paths: &[PathBuf], table: &str, max_concurrent: usize) -> Self {
        let pool_size = max_concurrent.min(constants::DB_POOL_CAP).max(1);
        let mut databases = Vec::new();

        for path in paths {
            if !path.is_file() {
                continue;
            }
            match ConnectionPool::open(path, pool_size) {
                Ok(pool) => {
                    tracing::debug!(db = %path.display(), pool_size, "FormID database opened");
                    databases.push(DatabaseHandle {
                        path: path.clone(),
                        pool,
                    });
                }
                Err(e) => {
                    tracing::warn!(db = %path.display(), error = %e, "Cannot open FormID database");
                }
            }
        }

        Self {
            table: sanitize_table_name(table),
            databases,
            cache: DashMap::new(),
        }
    }

    /// Whether any configured database file was present and opened.
    pub fn exists(&self) -> bool {
        !self.databases.is_empty()
    }

    /// Resolve a FormID suffix against a plugin. Returns the descriptive
    /// entry text, or None on a miss. Results, including misses, are
    /// cached; a SQLite error counts as a miss and is not cached.
    pub fn lookup(&self, plugin: &str, formid_suffix: &str) -> Option<String> {
        if self.databases.is_empty() || self.table.is_empty() {
            return None;
        }

        let key: CacheKey = (
            formid_suffix.to_ascii_uppercase(),
            plugin.to_ascii_lowercase(),
        );
        if let Some(cached) = self.cache.get(&key) {
            return cached.value().clone();
        }

        let mut degraded = false;
        let mut found: Option<String> = None;

        for handle in &self.databases {
            match self.query_one(handle, &key.0, plugin) {
                Ok(Some(entry)) => {
                    found = Some(entry);
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    degraded = true;
                    tracing::warn!(
                        db = %handle.path.display(),
                        formid = %key.0,
                        plugin,
                        error = %e,
                        "FormID lookup failed; treating as miss"
                    );
                }
            }
        }

        if found.is_none() && degraded {
            // A transient error must not pin a negative answer.
            return None;
        }

        // Entry-API insertion: the first writer wins, concurrent lookups of
        // the same key converge on one stored value.
        self.cache.entry(key).or_insert_with(|| found.clone());
        found
    }

    fn query_one(
        &self,
        handle: &DatabaseHandle,
        formid: &str,
        plugin: &str,
    ) -> rusqlite::Result<Option<String>> {
        handle.pool.with_connection(|conn| {
            let sql = format!(
                "SELECT entry FROM {} WHERE formid = ? AND plugin = ? LIMIT 1",
                self.table
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let mut rows = stmt.query(rusqlite::params![formid, plugin])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                None => Ok(None),
            }
        })
    }

    /// Drop every cached lookup. Called between batches.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached lookups (diagnostics only).
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Table names come from configuration, not user input, but they are still
/// interpolated into SQL; restrict them to identifier characters.
fn sanitize_table_name(table: &str) -> String {
    if !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        table.to_string()
    } else {
        tracing::warn!(table, "Invalid FormID table name; lookups disabled");
        String::new()
    }
}
