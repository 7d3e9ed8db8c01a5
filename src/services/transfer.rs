use crate::api::error::AppError;
use crate::models::FileRecord;
use crate::services::registry::TransferRegistry;
use crate::services::storage::LocalStorage;
use crate::services::token;
use crate::utils::validation::sanitize_filename;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::path::PathBuf;
use std::sync::Arc;

/// Characters escaped when a stored name is embedded in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// One decoded multipart part, already spooled to a staging file.
#[derive(Debug)]
pub struct UploadPart {
    pub original_name: String,
    pub temp_path: PathBuf,
    pub size_bytes: u64,
}

pub struct UploadReceipt {
    pub download_id: String,
    pub file_count: usize,
}

/// What `GET /download/:id` should render.
pub enum DownloadOutcome {
    SingleFile(FileDescriptor),
    Manifest {
        entries: Vec<ManifestEntry>,
        message: Option<String>,
        expires_at: DateTime<Utc>,
    },
}

pub struct FileDescriptor {
    pub path: PathBuf,
    pub display_name: String,
    pub size_bytes: u64,
}

pub struct ManifestEntry {
    pub download_url: String,
    pub display_name: String,
    pub human_size: String,
}

/// Upload/download orchestration on top of the registry and content store.
pub struct TransferService {
    registry: Arc<TransferRegistry>,
    storage: Arc<LocalStorage>,
}

impl TransferService {
    pub fn new(registry: Arc<TransferRegistry>, storage: Arc<LocalStorage>) -> Self {
        Self { registry, storage }
    }

    /// Commit an upload batch to durable storage and register it.
    ///
    /// Parts arrive as staging files from the multipart decoder. A commit
    /// failure rolls back files already committed for this batch and
    /// discards the remaining staged parts.
    pub async fn handle_upload(
        &self,
        parts: Vec<UploadPart>,
        email: Option<String>,
        message: Option<String>,
    ) -> Result<UploadReceipt, AppError> {
        if parts.is_empty() {
            return Err(AppError::BadRequest("No files selected".to_string()));
        }

        let mut files: Vec<FileRecord> = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let display_name = sanitize_filename(&part.original_name);
            let stored_name = token::generate_stored_name(&display_name);

            match self.storage.commit(&part.temp_path, &stored_name).await {
                Ok(storage_path) => files.push(FileRecord {
                    original_name: display_name,
                    stored_name,
                    storage_path,
                    size_bytes: part.size_bytes,
                }),
                Err(e) => {
                    for committed in &files {
                        let _ = tokio::fs::remove_file(&committed.storage_path).await;
                    }
                    for remaining in &parts[index..] {
                        self.storage.discard(&remaining.temp_path).await;
                    }
                    return Err(AppError::Anyhow(
                        e.context(format!("storing upload {}", part.original_name)),
                    ));
                }
            }
        }

        let file_count = files.len();
        let download_id = self.registry.create(files, email, message)?;
        Ok(UploadReceipt {
            download_id,
            file_count,
        })
    }

    /// Resolve a download link: a single-file transfer streams directly,
    /// anything larger gets a manifest with per-file download URLs.
    pub async fn handle_download(&self, id: &str) -> Result<DownloadOutcome, AppError> {
        let record = self.registry.resolve(id).await?;

        if record.files.len() == 1 {
            let file = record
                .files
                .into_iter()
                .next()
                .ok_or_else(|| AppError::Internal("Empty transfer record".to_string()))?;
            return Ok(DownloadOutcome::SingleFile(FileDescriptor {
                path: file.storage_path,
                display_name: file.original_name,
                size_bytes: file.size_bytes,
            }));
        }

        let entries = record
            .files
            .iter()
            .map(|file| ManifestEntry {
                download_url: format!(
                    "/download-file/{}/{}",
                    id,
                    utf8_percent_encode(&file.stored_name, PATH_SEGMENT)
                ),
                display_name: file.original_name.clone(),
                human_size: format_size(file.size_bytes),
            })
            .collect();

        Ok(DownloadOutcome::Manifest {
            entries,
            message: record.message,
            expires_at: record.expires_at,
        })
    }

    /// Resolve one file of a transfer for streaming.
    pub async fn handle_file_download(
        &self,
        id: &str,
        stored_name: &str,
    ) -> Result<FileDescriptor, AppError> {
        let file = self.registry.resolve_file(id, stored_name).await?;
        Ok(FileDescriptor {
            path: file.storage_path,
            display_name: file.original_name,
            size_bytes: file.size_bytes,
        })
    }
}

/// Human-readable size: base 1024, two decimals with trailing zeros
/// trimmed, unit table capped at GB (a multi-TB file still renders in GB).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    // floor(log1024(bytes)) without float rounding at exact powers of 1024
    let exponent = (bytes.ilog2() / 10) as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);

    let formatted = format!("{:.2}", value);
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", formatted, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(root: &std::path::Path) -> TransferService {
        TransferService::new(
            Arc::new(TransferRegistry::new(chrono::Duration::days(7))),
            Arc::new(LocalStorage::new(root)),
        )
    }

    async fn staged_part(storage: &LocalStorage, name: &str, contents: &[u8]) -> UploadPart {
        let temp_path = storage.staging_path();
        tokio::fs::write(&temp_path, contents).await.unwrap();
        UploadPart {
            original_name: name.to_string(),
            temp_path,
            size_bytes: contents.len() as u64,
        }
    }

    #[test]
    fn test_format_size_table() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(1), "1 Bytes");
        assert_eq!(format_size(512), "512 Bytes");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_048_576), "1 MB");
        assert_eq!(format_size(5_368_709_120), "5 GB");
    }

    #[test]
    fn test_format_size_rounds_to_two_decimals() {
        assert_eq!(format_size(1_234_567), "1.18 MB");
        assert_eq!(format_size(1023), "1023 Bytes");
    }

    #[test]
    fn test_format_size_clamps_to_gb() {
        // 2 TiB has no TB entry; it stays in GB with a large magnitude.
        assert_eq!(format_size(2 * 1024u64.pow(4)), "2048 GB");
    }

    #[tokio::test]
    async fn test_upload_commits_and_registers_batch() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.ensure_root().await.unwrap();
        let svc = service(dir.path());

        let parts = vec![
            staged_part(&svc.storage, "one.txt", b"first").await,
            staged_part(&svc.storage, "two.txt", b"second!").await,
        ];
        let receipt = svc
            .handle_upload(parts, None, Some("enjoy".to_string()))
            .await
            .unwrap();
        assert_eq!(receipt.file_count, 2);

        match svc.handle_download(&receipt.download_id).await.unwrap() {
            DownloadOutcome::Manifest {
                entries, message, ..
            } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].display_name, "one.txt");
                assert_eq!(entries[1].display_name, "two.txt");
                assert_eq!(entries[1].human_size, "7 Bytes");
                assert!(
                    entries[0]
                        .download_url
                        .starts_with(&format!("/download-file/{}/", receipt.download_id))
                );
                assert_eq!(message.as_deref(), Some("enjoy"));
            }
            DownloadOutcome::SingleFile(_) => panic!("two files should yield a manifest"),
        }
    }

    #[tokio::test]
    async fn test_single_file_upload_downloads_directly() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.ensure_root().await.unwrap();
        let svc = service(dir.path());

        let parts = vec![staged_part(&svc.storage, "solo.pdf", b"%PDF-1.5").await];
        let receipt = svc.handle_upload(parts, None, None).await.unwrap();

        match svc.handle_download(&receipt.download_id).await.unwrap() {
            DownloadOutcome::SingleFile(desc) => {
                assert_eq!(desc.display_name, "solo.pdf");
                assert_eq!(desc.size_bytes, 8);
                assert_eq!(tokio::fs::read(&desc.path).await.unwrap(), b"%PDF-1.5");
            }
            DownloadOutcome::Manifest { .. } => panic!("one file should download directly"),
        }
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        assert!(matches!(
            svc.handle_upload(vec![], None, None).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back_batch() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.ensure_root().await.unwrap();
        let svc = service(dir.path());

        let good = staged_part(&svc.storage, "good.txt", b"fine").await;
        let bad = UploadPart {
            original_name: "bad.txt".to_string(),
            temp_path: dir.path().join(".staging/never-spooled"),
            size_bytes: 9,
        };

        let err = svc.handle_upload(vec![good, bad], None, None).await;
        match err {
            Err(AppError::Anyhow(e)) => {
                assert!(e.to_string().contains("storing upload bad.txt"));
            }
            other => panic!("commit failure should surface as Anyhow, got {:?}", other.err()),
        }

        // The committed first file must not leak.
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert_eq!(entry.file_name(), ".staging");
        }
    }

    #[tokio::test]
    async fn test_file_download_resolves_stored_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.ensure_root().await.unwrap();
        let svc = service(dir.path());

        let parts = vec![
            staged_part(&svc.storage, "a.txt", b"a").await,
            staged_part(&svc.storage, "b.txt", b"b").await,
        ];
        let receipt = svc.handle_upload(parts, None, None).await.unwrap();

        let stored_name = match svc.handle_download(&receipt.download_id).await.unwrap() {
            DownloadOutcome::Manifest { entries, .. } => entries[0]
                .download_url
                .rsplit('/')
                .next()
                .unwrap()
                .to_string(),
            DownloadOutcome::SingleFile(_) => unreachable!(),
        };

        let desc = svc
            .handle_file_download(&receipt.download_id, &stored_name)
            .await
            .unwrap();
        assert_eq!(desc.display_name, "a.txt");

        assert!(matches!(
            svc.handle_file_download(&receipt.download_id, "nope.txt")
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}
