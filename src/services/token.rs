use base64::Engine;
use chrono::Utc;
use std::path::Path;

/// Generate a URL-safe random identifier for a transfer.
///
/// 24 random bytes encoded as unpadded URL-safe base64 (32 chars, ~2^192
/// values), so independent calls do not collide in practice. The registry
/// still checks on insert and regenerates on the off chance of a hit.
pub fn generate_download_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 24] = rng.r#gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Derive an on-disk name for an uploaded file: millisecond timestamp plus
/// random jitter, keeping the original extension so downloads open with the
/// right application.
pub fn generate_stored_name(original_name: &str) -> String {
    use rand::Rng;
    let jitter: u32 = rand::thread_rng().r#gen();
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();
    format!("{}-{:08x}{}", Utc::now().timestamp_millis(), jitter, ext)
}
