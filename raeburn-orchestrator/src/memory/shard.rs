use crate::error::MemoryError;
use crate::memory::entry::MemoryEntry;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Deterministic shard identity derived from the owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShardKey {
    Agent(String),
    Business(String),
    Global,
}

impl ShardKey {
    /// Route an owner id to its shard. With sharding disabled, or without
    /// an owner, everything lands in the global shard.
    pub fn for_agent(agent: Option<&str>, sharding_enabled: bool) -> Self {
        match agent {
            Some(id) if sharding_enabled && !id.is_empty() => Self::Agent(id.to_string()),
            _ => Self::Global,
        }
    }

    pub fn for_business(business: &str) -> Self {
        Self::Business(business.to_string())
    }

    /// File stem of the backing database, e.g. `agent_u1`.
    pub fn file_stem(&self) -> String {
        match self {
            Self::Agent(id) => format!("agent_{}", sanitize(id)),
            Self::Business(id) => format!("business_{}", sanitize(id)),
            Self::Global => "global".to_string(),
        }
    }
}

/// Owner ids become file names; keep them to a safe alphabet.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

pub(crate) const ENTRY_COLUMNS: &str =
    "id, agent, text, tags, importance, created_at, expires_at, source, metadata, blob_ref, deleted";

/// One open shard: a WAL-mode SQLite file with an external-content FTS5
/// index over entry text. All access serializes through the connection
/// mutex; the lock is held only for the duration of the storage call.
pub struct Shard {
    pub name: String,
    conn: Mutex<Connection>,
}

impl Shard {
    pub fn open(path: &Path, name: String) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        ensure_schema(&conn)?;
        Ok(Self {
            name,
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the connection, retrying once when the shard
    /// is locked past its busy timeout before giving up.
    pub fn with_conn<T>(
        &self,
        op: impl Fn(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, MemoryError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        match op(&conn) {
            Err(err) if is_busy(&err) => {
                tracing::warn!(shard = %self.name, "shard busy, retrying once");
                op(&conn).map_err(|err| {
                    if is_busy(&err) {
                        MemoryError::ShardLockTimeout {
                            shard: self.name.clone(),
                        }
                    } else {
                        err.into()
                    }
                })
            }
            other => other.map_err(Into::into),
        }
    }

    /// `PRAGMA integrity_check` on this shard.
    pub fn integrity_ok(&self) -> Result<bool, MemoryError> {
        self.with_conn(|conn| {
            conn.query_row("PRAGMA integrity_check", [], |row| row.get::<_, String>(0))
        })
        .map(|verdict| verdict == "ok")
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::DatabaseBusy
                || code.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

fn ensure_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            agent TEXT NOT NULL,
            text TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            importance REAL NOT NULL DEFAULT 0.5,
            created_at REAL NOT NULL,
            expires_at REAL,
            source TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            blob_ref TEXT,
            deleted INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_entries_created ON entries(created_at);
        CREATE INDEX IF NOT EXISTS idx_entries_expires ON entries(expires_at);
        CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(text, content='entries');
        CREATE TRIGGER IF NOT EXISTS entries_ai AFTER INSERT ON entries BEGIN
            INSERT INTO memory_fts(rowid, text) VALUES (new.rowid, new.text);
        END;
        CREATE TRIGGER IF NOT EXISTS entries_ad AFTER DELETE ON entries BEGIN
            INSERT INTO memory_fts(memory_fts, rowid, text) VALUES ('delete', old.rowid, old.text);
        END;
        CREATE TRIGGER IF NOT EXISTS entries_au AFTER UPDATE OF text ON entries BEGIN
            INSERT INTO memory_fts(memory_fts, rowid, text) VALUES ('delete', old.rowid, old.text);
            INSERT INTO memory_fts(rowid, text) VALUES (new.rowid, new.text);
        END;",
    )
}

/// Map a row selected with [`ENTRY_COLUMNS`] into an entry. Tag and
/// metadata JSON that fails to parse degrades to empty rather than
/// failing the read.
pub(crate) fn row_to_entry(row: &Row<'_>) -> Result<MemoryEntry, rusqlite::Error> {
    let tags_json: String = row.get(3)?;
    let metadata_json: String = row.get(8)?;
    Ok(MemoryEntry {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        text: row.get(2)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        importance: row.get(4)?,
        created_at: row.get(5)?,
        expires_at: row.get(6)?,
        source: row.get(7)?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        blob_ref: row.get(9)?,
        deleted: row.get::<_, i64>(10)? != 0,
    })
}

/// Build a safe FTS5 MATCH expression from free text: alphanumeric tokens,
/// each quoted, joined with OR. `None` when the query has no usable token.
pub(crate) fn fts_match_expr(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}
