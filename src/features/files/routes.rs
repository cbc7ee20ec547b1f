use axum::{routing::get, Router};
use std::sync::Arc;

use crate::features::files::handlers::{serve_image, serve_pdf};
use crate::modules::storage::FileStore;

/// Create routes serving stored images and PDFs
pub fn routes(images: Arc<FileStore>, pdfs: Arc<FileStore>) -> Router {
    let image_routes = Router::new()
        .route("/images/{filename}", get(serve_image))
        .with_state(images);

    let pdf_routes = Router::new()
        .route("/pdfs/{filename}", get(serve_pdf))
        .with_state(pdfs);

    image_routes.merge(pdf_routes)
}
