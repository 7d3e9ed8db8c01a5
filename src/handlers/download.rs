use crate::api::error::AppError;
use crate::services::transfer::{DownloadOutcome, FileDescriptor, ManifestEntry};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use tokio_util::io::ReaderStream;

/// `GET /download/:id` — direct stream for a single file, manifest page for
/// a batch, dedicated pages for unknown (404) and expired (410) links.
pub async fn download_transfer(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.transfers.handle_download(&id).await {
        Ok(DownloadOutcome::SingleFile(desc)) => stream_file(desc).await,
        Ok(DownloadOutcome::Manifest {
            entries,
            message,
            expires_at,
        }) => Html(render_manifest(&entries, message.as_deref(), expires_at)).into_response(),
        Err(e) => page_for_error(e),
    }
}

/// `GET /download-file/:id/:stored_name` — streams one file of a transfer.
pub async fn download_single_file(
    State(state): State<crate::AppState>,
    Path((id, stored_name)): Path<(String, String)>,
) -> Response {
    match state.transfers.handle_file_download(&id, &stored_name).await {
        Ok(desc) => stream_file(desc).await,
        Err(e) => page_for_error(e),
    }
}

/// Stream stored content as an attachment. Only the metadata lookup was
/// serialized; the byte stream holds no registry lock, and a client
/// disconnect mid-transfer has no registry side effects.
async fn stream_file(desc: FileDescriptor) -> Response {
    let file = match tokio::fs::File::open(&desc.path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("Failed to open stored file {}: {}", desc.path.display(), e);
            return AppError::Internal("Failed to read stored file".to_string()).into_response();
        }
    };

    let body = Body::from_stream(ReaderStream::new(file));
    let headers = [
        (header::CONTENT_TYPE, content_type_for(&desc.display_name)),
        (header::CONTENT_LENGTH, desc.size_bytes.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", desc.display_name),
        ),
    ];

    (headers, body).into_response()
}

/// Content type from the display name's extension; octet-stream otherwise.
fn content_type_for(filename: &str) -> String {
    let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    let mime = match extension.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "json" => "application/json",
        _ => return mime::APPLICATION_OCTET_STREAM.to_string(),
    };
    mime.to_string()
}

/// NotFound and Gone get distinct rendered pages, never conflated; other
/// errors fall back to the JSON error body.
fn page_for_error(err: AppError) -> Response {
    match err {
        AppError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Html(render_page(
                "Link not found",
                "This download link does not exist. Check the address and try again.",
            )),
        )
            .into_response(),
        AppError::Gone(_) => (
            StatusCode::GONE,
            Html(render_page(
                "Transfer expired",
                "This transfer has expired and its files have been removed.",
            )),
        )
            .into_response(),
        other => other.into_response(),
    }
}

fn render_manifest(
    entries: &[ManifestEntry],
    message: Option<&str>,
    expires_at: DateTime<Utc>,
) -> String {
    let rows: String = entries
        .iter()
        .map(|entry| {
            format!(
                r#"      <li class="file"><a href="{url}" download>{name}</a><span class="size">{size}</span></li>
"#,
                url = entry.download_url,
                name = escape_html(&entry.display_name),
                size = entry.human_size,
            )
        })
        .collect();

    let message_block = message
        .map(|m| format!("    <p class=\"message\">{}</p>\n", escape_html(m)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Your files are ready</title>
  <style>{css}</style>
</head>
<body>
  <main>
    <h1>{count} files shared with you</h1>
{message_block}    <ul class="files">
{rows}    </ul>
    <p class="expiry">Available until {expires}</p>
  </main>
</body>
</html>
"#,
        css = PAGE_CSS,
        count = entries.len(),
        expires = expires_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

fn render_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <style>{css}</style>
</head>
<body>
  <main>
    <h1>{title}</h1>
    <p>{body}</p>
    <p><a href="/">Share something new</a></p>
  </main>
</body>
</html>
"#,
        css = PAGE_CSS,
    )
}

const PAGE_CSS: &str = "body{font-family:sans-serif;background:#f5f6fa;margin:0}\
main{max-width:560px;margin:10vh auto;background:#fff;border-radius:8px;\
padding:2rem;box-shadow:0 2px 12px rgba(0,0,0,.08)}\
ul.files{list-style:none;padding:0}\
li.file{display:flex;justify-content:space-between;padding:.6rem 0;\
border-bottom:1px solid #eee}\
.size{color:#888}.message{white-space:pre-wrap;background:#f0f4ff;\
padding:.8rem;border-radius:6px}.expiry{color:#888;font-size:.85rem}";

fn escape_html(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            other => other.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"hi\" & 'bye'</b>"),
            "&lt;b&gt;&quot;hi&quot; &amp; &#39;bye&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain.txt"), "plain.txt");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("doc.PDF"), "application/pdf");
        assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
        assert_eq!(content_type_for("weird.xyz"), "application/octet-stream");
    }

    #[test]
    fn test_manifest_escapes_display_names() {
        let entries = vec![ManifestEntry {
            download_url: "/download-file/id/1-aa.txt".to_string(),
            display_name: "<script>.txt".to_string(),
            human_size: "1 KB".to_string(),
        }];
        let html = render_manifest(&entries, Some("for you & co"), Utc::now());
        assert!(html.contains("&lt;script&gt;.txt"));
        assert!(html.contains("for you &amp; co"));
        assert!(!html.contains("<script>"));
    }
}
