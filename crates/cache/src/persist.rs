//! Point-in-time cache snapshots.
//!
//! The envelope is written and read opaquely by the host process; entries
//! carry their own `written_at`/`ttl`, and anything already expired by its
//! own ttl is discarded on import rather than restored.

use crate::entry::CacheEntry;
use crate::store::FallbackCache;
use questdeck_core::serialization::time::{duration_as_millis, system_time_as_millis};
use questdeck_core::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// One persisted entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry<T> {
    pub value: T,
    #[serde(with = "system_time_as_millis")]
    pub written_at: SystemTime,
    #[serde(with = "duration_as_millis")]
    pub ttl: Duration,
}

/// The serializable envelope for a dump/restore cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot<T> {
    #[serde(with = "system_time_as_millis")]
    pub timestamp: SystemTime,
    pub entries: Vec<(String, PersistedEntry<T>)>,
}

impl<T> FallbackCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Capture the current contents as a snapshot envelope.
    pub fn export(&self) -> CacheSnapshot<T> {
        let entries = self
            .entries_snapshot()
            .into_iter()
            .map(|(key, entry)| {
                (
                    key,
                    PersistedEntry {
                        value: entry.value,
                        written_at: entry.written_at,
                        ttl: entry.ttl,
                    },
                )
            })
            .collect();
        CacheSnapshot {
            timestamp: SystemTime::now(),
            entries,
        }
    }

    /// Restore entries from a snapshot. Entries already expired relative to
    /// their own ttl are dropped; returns how many were restored.
    pub fn import(&self, snapshot: CacheSnapshot<T>) -> usize {
        let mut restored = 0;
        for (key, persisted) in snapshot.entries {
            let entry =
                CacheEntry::with_written_at(persisted.value, persisted.ttl, persisted.written_at);
            if entry.is_expired() {
                debug!(key = %key, "skipping expired entry during import");
                continue;
            }
            self.restore_entry(&key, entry);
            restored += 1;
        }
        restored
    }

    /// Serialize the snapshot envelope to JSON.
    pub fn export_json(&self) -> Result<String>
    where
        T: Serialize,
    {
        Ok(serde_json::to_string(&self.export())?)
    }

    /// Restore from a JSON envelope; returns how many entries were restored.
    pub fn import_json(&self, json: &str) -> Result<usize>
    where
        T: DeserializeOwned,
    {
        let snapshot: CacheSnapshot<T> = serde_json::from_str(json)?;
        Ok(self.import(snapshot))
    }
}
