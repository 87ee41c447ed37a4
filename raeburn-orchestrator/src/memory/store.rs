//! # Sharded Memory Store
//!
//! Durable per-agent memory over embedded SQLite shards. Each owner maps
//! deterministically to one shard file (`agent_<id>`, `business_<id>`, or
//! `global`); shards are opened lazily, journal in WAL mode, and carry an
//! FTS5 full-text index over entry text.
//!
//! ## Semantics
//!
//! - **Visibility**: an entry is observable iff it is not soft-deleted and
//!   not expired; `include_deleted` widens reads to soft-deleted entries.
//! - **Read-your-writes** within a shard: all access to one shard funnels
//!   through one connection behind a mutex, so a read that starts after a
//!   write completes observes it.
//! - **Relevance**: `get_relevant` re-ranks full-text candidates with
//!   `0.5 * bm25 + 0.3 * recency + 0.2 * importance` and de-duplicates by
//!   `(text, tags)` keeping the most recent entry.
//! - **Blobs**: byte payloads live in side files; the handle travels in
//!   `blob_ref` and the file is removed with the entry (or by the orphan
//!   sweep).
//! - **Lock discipline**: the shard mutex is held only for the duration of
//!   the storage-engine call; no network or blob I/O happens under it.

use crate::error::MemoryError;
use crate::memory::blobs::BlobStore;
use crate::memory::entry::{AddOptions, EntryPatch, MemoryEntry};
use crate::memory::shard::{fts_match_expr, row_to_entry, Shard, ShardKey, ENTRY_COLUMNS};
use rusqlite::params;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const DEFAULT_IMPORTANCE: f64 = 0.5;
const DEFAULT_DECAY_FACTOR: f64 = 0.98;
const RELEVANCE_POOL_FACTOR: usize = 3;

/// Store-wide settings; see `from_env` for the environment mapping.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Root directory; shards live under `<root>/shards`, blobs under
    /// `<root>/blobs`.
    pub root: PathBuf,
    /// When off, every owner shares the global shard.
    pub sharding_enabled: bool,
    /// Strict tag queries require exact tag-set equality instead of any
    /// overlap.
    pub strict_tag_match: bool,
    /// Multiplier applied by `apply_importance_decay`.
    pub decay_factor: f64,
}

impl MemoryConfig {
    pub fn from_env() -> Self {
        let root = std::env::var("RAEBURN_MEMORY_DIR")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("memory"));
        Self::at(root)
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sharding_enabled: true,
            strict_tag_match: false,
            decay_factor: DEFAULT_DECAY_FACTOR,
        }
    }
}

/// Non-query knobs for [`MemoryStore::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub tags: Option<Vec<String>>,
    pub metadata_filter: Option<Map<String, Value>>,
    pub include_deleted: bool,
}

/// Counts reported by [`MemoryStore::run_maintenance`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaintenanceReport {
    pub decayed: usize,
    pub expired_removed: usize,
    pub orphan_blobs_removed: usize,
}

pub struct MemoryStore {
    config: MemoryConfig,
    shards: Mutex<HashMap<String, Arc<Shard>>>,
    blobs: BlobStore,
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

impl MemoryStore {
    /// Open (or create) a store rooted at the configured directory.
    pub fn open(config: MemoryConfig) -> Result<Self, MemoryError> {
        std::fs::create_dir_all(config.root.join("shards"))?;
        let blobs = BlobStore::new(&config.root);
        Ok(Self {
            config,
            shards: Mutex::new(HashMap::new()),
            blobs,
        })
    }

    /// Store at the environment-configured root (`RAEBURN_MEMORY_DIR`).
    pub fn open_default() -> Result<Self, MemoryError> {
        Self::open(MemoryConfig::from_env())
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn blob(&self, handle: &str) -> Result<Vec<u8>, MemoryError> {
        self.blobs.read(handle)
    }

    fn shard(&self, key: &ShardKey) -> Result<Arc<Shard>, MemoryError> {
        let stem = key.file_stem();
        let mut shards = self.shards.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(shard) = shards.get(&stem) {
            return Ok(Arc::clone(shard));
        }
        let path = self.config.root.join("shards").join(format!("{stem}.db"));
        let shard = Arc::new(Shard::open(&path, stem.clone()).map_err(|err| match err {
            MemoryError::Sqlite(e) => MemoryError::Corruption {
                shard: stem.clone(),
                detail: e.to_string(),
            },
            other => other,
        })?);
        shards.insert(stem, Arc::clone(&shard));
        Ok(shard)
    }

    fn shard_for_agent(&self, agent: &str) -> Result<Arc<Shard>, MemoryError> {
        self.shard(&ShardKey::for_agent(
            Some(agent),
            self.config.sharding_enabled,
        ))
    }

    /// Every shard present on disk or already open, for id-addressed and
    /// store-wide operations.
    fn all_shards(&self) -> Result<Vec<Arc<Shard>>, MemoryError> {
        let dir = self.config.root.join("shards");
        if let Ok(read) = std::fs::read_dir(&dir) {
            for file in read.flatten() {
                let name = file.file_name().to_string_lossy().to_string();
                if let Some(stem) = name.strip_suffix(".db") {
                    let already_open = {
                        let shards = self.shards.lock().unwrap_or_else(|e| e.into_inner());
                        shards.contains_key(stem)
                    };
                    if !already_open {
                        let shard = Arc::new(Shard::open(&file.path(), stem.to_string())?);
                        self.shards
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .insert(stem.to_string(), shard);
                    }
                }
            }
        }
        let shards = self.shards.lock().unwrap_or_else(|e| e.into_inner());
        Ok(shards.values().cloned().collect())
    }

    fn find_entry(&self, id: &str) -> Result<(Arc<Shard>, MemoryEntry), MemoryError> {
        for shard in self.all_shards()? {
            let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1");
            let found = shard.with_conn(|conn| {
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query_map(params![id], row_to_entry)?;
                rows.next().transpose()
            })?;
            if let Some(entry) = found {
                return Ok((shard, entry));
            }
        }
        Err(MemoryError::NotFound { id: id.to_string() })
    }

    /// Write one entry; returns its id. Expired entries in the target
    /// shard are purged first.
    pub fn add(&self, agent: &str, text: &str, opts: AddOptions) -> Result<String, MemoryError> {
        let shard = self.shard_for_agent(agent)?;
        self.prune_expired_in(&shard)?;

        let now = now_secs();
        let id = Uuid::new_v4().to_string();
        let importance = opts.importance.unwrap_or(DEFAULT_IMPORTANCE).clamp(0.0, 1.0);
        // A zero (or negative) TTL expires the entry at birth.
        let expires_at = opts.ttl.map(|ttl| if ttl > 0.0 { now + ttl } else { now });
        let blob_ref = match &opts.blob {
            Some(bytes) => Some(self.blobs.write(bytes)?),
            None => None,
        };
        let tags_json = serde_json::to_string(&opts.tags)?;
        let metadata_json = serde_json::to_string(&opts.metadata)?;

        shard.with_conn(|conn| {
            conn.execute(
                "INSERT INTO entries
                 (id, agent, text, tags, importance, created_at, expires_at, source, metadata, blob_ref, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
                params![
                    id,
                    agent,
                    text,
                    tags_json,
                    importance,
                    now,
                    expires_at,
                    opts.source,
                    metadata_json,
                    blob_ref,
                ],
            )
            .map(|_| ())
        })?;
        tracing::debug!(agent, id = %id, "memory entry written");
        Ok(id)
    }

    /// Most-recent-first listing of an agent's live entries.
    pub fn get(
        &self,
        agent: &str,
        limit: usize,
        include_deleted: bool,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let shard = self.shard_for_agent(agent)?;
        let now = now_secs();
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE (?1 OR deleted = 0)
               AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY created_at DESC, rowid DESC LIMIT ?3"
        );
        shard.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![include_deleted, now, limit as i64], row_to_entry)?;
            rows.collect()
        })
    }

    /// Full-text search ordered by BM25 rank (best first), then recency.
    pub fn search(
        &self,
        agent: &str,
        query: &str,
        limit: usize,
        opts: &SearchOptions,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        Ok(self
            .search_ranked(agent, query, limit, opts)?
            .into_iter()
            .map(|(entry, _)| entry)
            .collect())
    }

    /// Search carrying the raw BM25 rank for re-ranking. SQLite's bm25()
    /// is smaller-is-better.
    fn search_ranked(
        &self,
        agent: &str,
        query: &str,
        limit: usize,
        opts: &SearchOptions,
    ) -> Result<Vec<(MemoryEntry, f64)>, MemoryError> {
        let Some(match_expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };
        let shard = self.shard_for_agent(agent)?;
        let now = now_secs();
        let filtered = opts.tags.is_some() || opts.metadata_filter.is_some();
        let fetch = if filtered {
            (limit * 4).max(64)
        } else {
            limit
        };
        let sql = format!(
            "SELECT {cols}, bm25(memory_fts) AS rank
             FROM memory_fts JOIN entries e ON e.rowid = memory_fts.rowid
             WHERE memory_fts MATCH ?1
               AND (?2 OR e.deleted = 0)
               AND (e.expires_at IS NULL OR e.expires_at > ?3)
             ORDER BY rank ASC, e.created_at DESC LIMIT ?4",
            cols = ENTRY_COLUMNS
                .split(", ")
                .map(|c| format!("e.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut ranked: Vec<(MemoryEntry, f64)> = shard.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![match_expr, opts.include_deleted, now, fetch as i64],
                |row| Ok((row_to_entry(row)?, row.get::<_, f64>(11)?)),
            )?;
            rows.collect()
        })?;

        if let Some(tags) = &opts.tags {
            ranked.retain(|(entry, _)| self.tags_admit(entry, tags));
        }
        if let Some(filter) = &opts.metadata_filter {
            ranked.retain(|(entry, _)| {
                filter
                    .iter()
                    .all(|(k, v)| entry.metadata.get(k) == Some(v))
            });
        }
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn tags_admit(&self, entry: &MemoryEntry, wanted: &[String]) -> bool {
        if wanted.is_empty() {
            return true;
        }
        if self.config.strict_tag_match {
            let mut a: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
            let mut b: Vec<&str> = wanted.iter().map(String::as_str).collect();
            a.sort_unstable();
            a.dedup();
            b.sort_unstable();
            b.dedup();
            a == b
        } else {
            wanted.iter().any(|t| entry.tags.contains(t))
        }
    }

    /// Recent live entries carrying the given tag.
    pub fn by_tag(
        &self,
        agent: &str,
        tag: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let shard = self.shard_for_agent(agent)?;
        let now = now_secs();
        let needle = format!("%{}%", serde_json::to_string(tag)?);
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE deleted = 0
               AND (expires_at IS NULL OR expires_at > ?1)
               AND tags LIKE ?2
             ORDER BY created_at DESC, rowid DESC LIMIT ?3"
        );
        let mut entries: Vec<MemoryEntry> = shard.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![now, needle, (limit * 2) as i64], row_to_entry)?;
            rows.collect()
        })?;
        // The LIKE prefilter can over-match; confirm exact membership.
        entries.retain(|e| e.tags.iter().any(|t| t == tag));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Hybrid relevance: BM25 candidates (or plain recency when there is
    /// no query) re-ranked by `0.5 * bm25 + 0.3 * recency + 0.2 *
    /// importance`, de-duplicated by `(text, tags)` keeping the most
    /// recent.
    pub fn get_relevant(
        &self,
        agent: &str,
        query: Option<&str>,
        tags: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let pool = limit.max(1) * RELEVANCE_POOL_FACTOR;
        let opts = SearchOptions {
            tags: tags.map(|t| t.to_vec()),
            ..Default::default()
        };

        let candidates: Vec<(MemoryEntry, Option<f64>)> = match query {
            Some(q) if fts_match_expr(q).is_some() => self
                .search_ranked(agent, q, pool, &opts)?
                .into_iter()
                .map(|(entry, rank)| (entry, Some(rank)))
                .collect(),
            _ => {
                let mut listed = self.get(agent, pool, false)?;
                if let Some(tags) = tags {
                    listed.retain(|e| self.tags_admit(e, tags));
                }
                listed.into_iter().map(|entry| (entry, None)).collect()
            }
        };

        // Dedup by (text, tags), most recent wins.
        let mut by_key: HashMap<(String, Vec<String>), (MemoryEntry, Option<f64>)> = HashMap::new();
        for (entry, rank) in candidates {
            match by_key.entry(entry.dedup_key()) {
                std::collections::hash_map::Entry::Occupied(mut slot) => {
                    if slot.get().0.created_at < entry.created_at {
                        slot.insert((entry, rank));
                    }
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert((entry, rank));
                }
            }
        }

        // bm25 is smaller-is-better and usually negative; flip the sign and
        // normalize into [0, 1] against the best candidate.
        let max_rel = by_key
            .values()
            .filter_map(|(_, rank)| rank.map(|r| -r))
            .fold(0.0_f64, f64::max);
        let now = now_secs();
        let mut scored: Vec<(f64, MemoryEntry)> = by_key
            .into_values()
            .map(|(entry, rank)| {
                let bm25 = match rank {
                    Some(r) if max_rel > 0.0 => ((-r).max(0.0)) / max_rel,
                    _ => 0.0,
                };
                let hours = ((now - entry.created_at) / 3600.0).max(0.0);
                let recency = 1.0 / (1.0 + hours);
                let importance = entry.importance.clamp(0.0, 1.0);
                (0.5 * bm25 + 0.3 * recency + 0.2 * importance, entry)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.1.created_at
                        .partial_cmp(&a.1.created_at)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry)
            .collect())
    }

    /// Patch the given fields of one entry; absent fields are untouched.
    pub fn update(&self, id: &str, patch: EntryPatch) -> Result<(), MemoryError> {
        if patch.is_empty() {
            return Ok(());
        }
        let (shard, _) = self.find_entry(id)?;
        let tags_json = patch.tags.as_ref().map(serde_json::to_string).transpose()?;
        let metadata_json = patch
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        // Same reading as add(): a non-positive TTL expires the entry now.
        let expires_at = patch
            .ttl
            .map(|ttl| if ttl > 0.0 { now_secs() + ttl } else { now_secs() });
        let importance = patch.importance.map(|i| i.clamp(0.0, 1.0));

        shard.with_conn(|conn| {
            conn.execute(
                "UPDATE entries SET
                    text = COALESCE(?1, text),
                    tags = COALESCE(?2, tags),
                    metadata = COALESCE(?3, metadata),
                    importance = COALESCE(?4, importance),
                    expires_at = CASE WHEN ?5 THEN ?6 ELSE expires_at END
                 WHERE id = ?7",
                params![
                    patch.text,
                    tags_json,
                    metadata_json,
                    importance,
                    patch.ttl.is_some(),
                    expires_at,
                    id,
                ],
            )
            .map(|_| ())
        })
    }

    /// Hide an entry from default reads; reversible via `update` of
    /// nothing, visible again only with `include_deleted`.
    pub fn soft_delete(&self, id: &str) -> Result<(), MemoryError> {
        let (shard, _) = self.find_entry(id)?;
        shard.with_conn(|conn| {
            conn.execute("UPDATE entries SET deleted = 1 WHERE id = ?1", params![id])
                .map(|_| ())
        })
    }

    /// Hard-remove an entry and its blob, if any.
    pub fn delete(&self, id: &str) -> Result<(), MemoryError> {
        let (shard, entry) = self.find_entry(id)?;
        shard.with_conn(|conn| {
            conn.execute("DELETE FROM entries WHERE id = ?1", params![id])
                .map(|_| ())
        })?;
        if let Some(blob_ref) = &entry.blob_ref {
            self.blobs.remove(blob_ref);
        }
        Ok(())
    }

    fn prune_expired_in(&self, shard: &Shard) -> Result<usize, MemoryError> {
        let now = now_secs();
        let stale_blobs: Vec<String> = shard.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT blob_ref FROM entries
                 WHERE expires_at IS NOT NULL AND expires_at < ?1 AND blob_ref IS NOT NULL",
            )?;
            let rows = stmt.query_map(params![now], |row| row.get::<_, String>(0))?;
            rows.collect()
        })?;
        let removed = shard.with_conn(|conn| {
            conn.execute(
                "DELETE FROM entries WHERE expires_at IS NOT NULL AND expires_at < ?1",
                params![now],
            )
        })?;
        for blob_ref in &stale_blobs {
            self.blobs.remove(blob_ref);
        }
        Ok(removed)
    }

    /// Remove expired entries from every shard. Idempotent.
    pub fn prune_expired(&self) -> Result<usize, MemoryError> {
        let mut removed = 0;
        for shard in self.all_shards()? {
            removed += self.prune_expired_in(&shard)?;
        }
        Ok(removed)
    }

    /// Remove entries whose importance fell below the threshold.
    pub fn prune_importance(&self, threshold: f64) -> Result<usize, MemoryError> {
        let mut removed = 0;
        for shard in self.all_shards()? {
            let stale_blobs: Vec<String> = shard.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT blob_ref FROM entries WHERE importance < ?1 AND blob_ref IS NOT NULL",
                )?;
                let rows = stmt.query_map(params![threshold], |row| row.get::<_, String>(0))?;
                rows.collect()
            })?;
            removed += shard.with_conn(|conn| {
                conn.execute("DELETE FROM entries WHERE importance < ?1", params![threshold])
            })?;
            for blob_ref in &stale_blobs {
                self.blobs.remove(blob_ref);
            }
        }
        Ok(removed)
    }

    /// Multiply every live entry's importance by the configured decay
    /// factor.
    pub fn apply_importance_decay(&self) -> Result<usize, MemoryError> {
        let factor = self.config.decay_factor;
        let mut touched = 0;
        for shard in self.all_shards()? {
            touched += shard.with_conn(|conn| {
                conn.execute(
                    "UPDATE entries SET importance = importance * ?1 WHERE deleted = 0",
                    params![factor],
                )
            })?;
        }
        Ok(touched)
    }

    /// Delete blob files no entry references anymore.
    pub fn cleanup_orphan_blobs(&self) -> Result<usize, MemoryError> {
        let mut referenced = HashSet::new();
        for shard in self.all_shards()? {
            let refs: Vec<String> = shard.with_conn(|conn| {
                let mut stmt =
                    conn.prepare("SELECT blob_ref FROM entries WHERE blob_ref IS NOT NULL")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect()
            })?;
            referenced.extend(refs);
        }
        self.blobs.remove_unreferenced(&referenced)
    }

    /// Decay importance, sweep expired entries, and collect orphan blobs
    /// in one scheduled-maintenance pass.
    pub fn run_maintenance(&self) -> Result<MaintenanceReport, MemoryError> {
        let decayed = self.apply_importance_decay()?;
        let expired_removed = self.prune_expired()?;
        let orphan_blobs_removed = self.cleanup_orphan_blobs()?;
        Ok(MaintenanceReport {
            decayed,
            expired_removed,
            orphan_blobs_removed,
        })
    }

    /// Every entry in every shard, soft-deleted and expired included; the
    /// migration export.
    pub fn dump_all(&self) -> Result<Vec<MemoryEntry>, MemoryError> {
        let mut all = Vec::new();
        for shard in self.all_shards()? {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY created_at ASC, rowid ASC"
            );
            let entries: Vec<MemoryEntry> = shard.with_conn(|conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], row_to_entry)?;
                rows.collect()
            })?;
            all.extend(entries);
        }
        Ok(all)
    }

    /// Upsert-by-id import of a previous dump.
    pub fn load_dump(&self, items: &[MemoryEntry]) -> Result<usize, MemoryError> {
        let mut loaded = 0;
        for entry in items {
            let shard = self.shard_for_agent(&entry.agent_id)?;
            let tags_json = serde_json::to_string(&entry.tags)?;
            let metadata_json = serde_json::to_string(&entry.metadata)?;
            shard.with_conn(|conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO entries
                     (id, agent, text, tags, importance, created_at, expires_at, source, metadata, blob_ref, deleted)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        entry.id,
                        entry.agent_id,
                        entry.text,
                        tags_json,
                        entry.importance,
                        entry.created_at,
                        entry.expires_at,
                        entry.source,
                        metadata_json,
                        entry.blob_ref,
                        entry.deleted as i64,
                    ],
                )
                .map(|_| ())
            })?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// True when every shard passes the engine's integrity check.
    pub fn integrity_check(&self) -> Result<bool, MemoryError> {
        for shard in self.all_shards()? {
            if !shard.integrity_ok()? {
                tracing::warn!(shard = %shard.name, "integrity check failed");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Export an agent's live entries to a pretty JSON file.
    pub fn snapshot(&self, agent: &str, dest: &std::path::Path) -> Result<usize, MemoryError> {
        let entries = self.get(agent, usize::MAX >> 1, false)?;
        std::fs::write(dest, serde_json::to_vec_pretty(&entries)?)?;
        Ok(entries.len())
    }

    /// Bulk-load entries from a JSONL log: objects with `text`, `tags`,
    /// `importance`, or raw text lines. Returns how many were written.
    pub fn ingest_log(&self, agent: &str, path: &std::path::Path) -> Result<usize, MemoryError> {
        let raw = std::fs::read_to_string(path)?;
        let mut count = 0;
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (text, tags, importance) = match serde_json::from_str::<Value>(line) {
                Ok(obj) => {
                    let text = obj
                        .get("text")
                        .or_else(|| obj.get("message"))
                        .and_then(Value::as_str)
                        .unwrap_or(line)
                        .to_string();
                    let tags = obj
                        .get("tags")
                        .and_then(Value::as_array)
                        .map(|a| {
                            a.iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    let importance = obj.get("importance").and_then(Value::as_f64);
                    (text, tags, importance)
                }
                Err(_) => (line.to_string(), Vec::new(), None),
            };
            self.add(
                agent,
                &text,
                AddOptions {
                    tags,
                    importance,
                    ..Default::default()
                },
            )?;
            count += 1;
        }
        Ok(count)
    }
}
