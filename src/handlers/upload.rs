use crate::api::error::AppError;
use crate::services::transfer::UploadPart;
use axum::extract::{Multipart, State};
use axum::Json;
use futures::TryStreamExt;
use serde::Serialize;
use std::io;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = String, description = "Multipart form with one or more file parts plus optional `email` and `message` fields", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Transfer registered", body = UploadResponse),
        (status = 400, description = "No files selected", body = UploadResponse),
        (status = 500, description = "Storage failure", body = UploadResponse)
    )
)]
pub async fn upload_transfer(
    State(state): State<crate::AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (parts, email, message) = spool_parts(&state, multipart).await?;

    let receipt = state.transfers.handle_upload(parts, email, message).await?;
    tracing::info!(
        "📦 Registered transfer {} ({} file(s))",
        receipt.download_id,
        receipt.file_count
    );

    Ok(Json(UploadResponse {
        success: true,
        download_id: Some(receipt.download_id),
        file_count: Some(receipt.file_count),
        error: None,
    }))
}

/// Decode the multipart body, spooling each file part to a staging file.
/// On any decode or write error the staged files created so far are
/// discarded before the error propagates.
async fn spool_parts(
    state: &crate::AppState,
    mut multipart: Multipart,
) -> Result<(Vec<UploadPart>, Option<String>, Option<String>), AppError> {
    let mut parts: Vec<UploadPart> = Vec::new();
    let mut email = None;
    let mut message = None;

    let result: Result<(), AppError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let field_name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name() {
                // Browsers submit an empty file input as a part with an
                // empty filename; that is not an upload.
                if file_name.is_empty() {
                    continue;
                }
                let original_name = file_name.to_string();
                let temp_path = state.storage.staging_path();

                let body_with_io_error =
                    field.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
                let mut reader = StreamReader::new(body_with_io_error);

                let mut out = tokio::fs::File::create(&temp_path).await?;
                let size_bytes = tokio::io::copy(&mut reader, &mut out).await?;
                out.flush().await?;

                parts.push(UploadPart {
                    original_name,
                    temp_path,
                    size_bytes,
                });
            } else if field_name == "email" {
                email = field.text().await.ok().filter(|s| !s.is_empty());
            } else if field_name == "message" {
                message = field.text().await.ok().filter(|s| !s.is_empty());
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        for part in &parts {
            state.storage.discard(&part.temp_path).await;
        }
        return Err(e);
    }

    Ok((parts, email, message))
}
