use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::debug;

use crate::core::error::AppError;
use crate::modules::storage::FileStore;

/// Map a stored filename's extension to the MIME type it is served with
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

async fn serve_from(store: &FileStore, filename: &str) -> Result<impl IntoResponse, AppError> {
    let bytes = store.read(filename).await?;
    debug!("Serving {} ({} bytes)", filename, bytes.len());

    Ok(([(header::CONTENT_TYPE, content_type_for(filename))], bytes))
}

/// Serve a stored mode image
#[utoipa::path(
    get,
    path = "/images/{filename}",
    tag = "files",
    params(("filename" = String, Path, description = "Stored image filename")),
    responses(
        (status = 200, description = "Image bytes", content_type = "application/octet-stream"),
        (status = 404, description = "File not found")
    )
)]
pub async fn serve_image(
    State(store): State<Arc<FileStore>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    serve_from(&store, &filename).await
}

/// Serve a stored defect PDF
#[utoipa::path(
    get,
    path = "/pdfs/{filename}",
    tag = "files",
    params(("filename" = String, Path, description = "Stored PDF filename")),
    responses(
        (status = 200, description = "PDF bytes", content_type = "application/pdf"),
        (status = 404, description = "File not found")
    )
)]
pub async fn serve_pdf(
    State(store): State<Arc<FileStore>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    serve_from(&store, &filename).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for("abc_map.PNG"), "image/png");
        assert_eq!(content_type_for("abc_map.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("abc_map.jpg"), "image/jpeg");
        assert_eq!(content_type_for("abc_ref.pdf"), "application/pdf");
        assert_eq!(content_type_for("abc_upload"), "application/octet-stream");
    }
}
