use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// A single stored file belonging to a transfer.
///
/// `original_name` is the user-supplied display name (sanitized at upload
/// time); `stored_name` is the generated on-disk name and the addressable
/// name in per-file download URLs. The record exclusively owns the content
/// at `storage_path`.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub original_name: String,
    pub stored_name: String,
    pub storage_path: PathBuf,
    pub size_bytes: u64,
}

/// One upload batch, addressable by its download identifier.
///
/// Files keep upload order. Records are immutable after creation; the
/// registry inserts and removes them whole, and removing a record removes
/// its backing content.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    pub files: Vec<FileRecord>,
    pub email: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Single expiry comparison shared by resolve-time checks and the
    /// background sweep, so both paths agree on what "expired" means.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
