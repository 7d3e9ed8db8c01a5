use std::path::Path;

/// Sanitizes a user-supplied filename for display and download headers.
///
/// Strips any path component, replaces control and reserved characters,
/// and clamps the length. Unlike an upload allowlist this never rejects:
/// the name is only ever used for display and the Content-Disposition
/// header, never as an on-disk path, so an unusable name degrades to
/// "file".
pub fn sanitize_filename(filename: &str) -> String {
    // Keep only the filename component (drop any path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components in uploaded filename: {}", filename);
    }

    // Allow most Unicode but block path separators and reserved characters
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == '/'
                || c == '\\'
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}
