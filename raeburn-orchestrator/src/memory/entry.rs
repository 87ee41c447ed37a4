use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One record of the memory store. Timestamps are UTC epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub agent_id: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub importance: f64,
    pub created_at: f64,
    #[serde(default)]
    pub expires_at: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub blob_ref: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl MemoryEntry {
    /// Dedup key used by relevance ranking: text plus the exact tag tuple.
    pub fn dedup_key(&self) -> (String, Vec<String>) {
        (self.text.clone(), self.tags.clone())
    }
}

/// Field-wise patch for `MemoryStore::update`; `None` leaves a field
/// untouched. A `ttl` follows the same contract as `add`: positive values
/// restart the expiry window from now, zero or negative expire the entry
/// immediately.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub text: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ttl: Option<f64>,
    pub metadata: Option<Map<String, Value>>,
    pub importance: Option<f64>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.tags.is_none()
            && self.ttl.is_none()
            && self.metadata.is_none()
            && self.importance.is_none()
    }
}

/// Options accepted by `MemoryStore::add`.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub tags: Vec<String>,
    pub importance: Option<f64>,
    pub ttl: Option<f64>,
    pub source: Option<String>,
    pub metadata: Map<String, Value>,
    pub blob: Option<Vec<u8>>,
}
