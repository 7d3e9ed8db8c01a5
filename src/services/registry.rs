use crate::api::error::AppError;
use crate::models::{FileRecord, TransferRecord};
use crate::services::token;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// In-memory mapping from download identifier to transfer record.
///
/// The map is the single shared mutable resource: structural mutation
/// (insert/remove) is serialized per shard by the map itself, while file
/// content reads never hold a registry lock. One instance lives for the
/// process lifetime; a restart loses all pending transfers by design.
pub struct TransferRegistry {
    transfers: DashMap<String, TransferRecord>,
    retention: chrono::Duration,
}

impl TransferRegistry {
    pub fn new(retention: chrono::Duration) -> Self {
        Self {
            transfers: DashMap::new(),
            retention,
        }
    }

    /// Register an upload batch under a fresh identifier.
    ///
    /// Identifiers come only from the token generator; if one already maps
    /// to a live record the insert retries with a new identifier rather
    /// than overwrite.
    pub fn create(
        &self,
        files: Vec<FileRecord>,
        email: Option<String>,
        message: Option<String>,
    ) -> Result<String, AppError> {
        if files.is_empty() {
            return Err(AppError::BadRequest("No files selected".to_string()));
        }

        let now = Utc::now();
        let record = TransferRecord {
            files,
            email,
            message,
            created_at: now,
            expires_at: now + self.retention,
        };

        loop {
            let id = token::generate_download_id();
            match self.transfers.entry(id.clone()) {
                Entry::Occupied(_) => {
                    tracing::warn!("Download id collision, regenerating");
                    continue;
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                    return Ok(id);
                }
            }
        }
    }

    /// Look up a transfer. An expired record is removed on sight (content
    /// included) and reported as `Gone`; expiry is never extended by reads.
    pub async fn resolve(&self, id: &str) -> Result<TransferRecord, AppError> {
        let record = match self.transfers.get(id) {
            Some(entry) => entry.value().clone(),
            None => {
                return Err(AppError::NotFound("Unknown download link".to_string()));
            }
        };

        if record.is_expired_at(Utc::now()) {
            // remove() guards against a concurrent resolver purging twice
            if let Some((_, expired)) = self.transfers.remove(id) {
                Self::purge_content(&expired).await;
            }
            return Err(AppError::Gone("This transfer has expired".to_string()));
        }

        Ok(record)
    }

    /// Resolve a single file within a transfer by its stored name. Batches
    /// are small, so a linear scan is fine.
    pub async fn resolve_file(&self, id: &str, stored_name: &str) -> Result<FileRecord, AppError> {
        let record = self.resolve(id).await?;
        record
            .files
            .into_iter()
            .find(|f| f.stored_name == stored_name)
            .ok_or_else(|| AppError::NotFound("File not found in transfer".to_string()))
    }

    /// Remove a transfer and its backing content. No-op if absent.
    pub async fn delete(&self, id: &str) {
        if let Some((_, record)) = self.transfers.remove(id) {
            Self::purge_content(&record).await;
        }
    }

    /// Remove every record past its expiry, returning how many were purged.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        // Collect first so no shard lock is held across an await point.
        let expired: Vec<String> = self
            .transfers
            .iter()
            .filter(|entry| entry.value().is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in expired {
            // Re-check under the entry lock; a racing resolve may have won.
            if let Some((_, record)) = self
                .transfers
                .remove_if(&id, |_, record| record.is_expired_at(now))
            {
                tracing::info!("Expiring transfer: {}", id);
                Self::purge_content(&record).await;
                removed += 1;
            }
        }
        removed
    }

    pub fn live_count(&self) -> usize {
        self.transfers.len()
    }

    /// Delete a removed record's stored files. Best-effort: one failure is
    /// logged and does not stop the rest, and the registry entry stays gone
    /// either way.
    async fn purge_content(record: &TransferRecord) {
        for file in &record.files {
            if let Err(e) = tokio::fs::remove_file(&file.storage_path).await {
                tracing::warn!(
                    "Failed to delete stored file {}: {}",
                    file.storage_path.display(),
                    e
                );
            }
        }
    }
}
