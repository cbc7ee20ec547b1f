pub mod defects;
pub mod files;

use axum::Router;
use std::sync::Arc;

use crate::core::context::AppContext;

/// All API routes, each feature with its own state
pub fn routes(ctx: &AppContext, max_upload_size: usize) -> Router {
    Router::new()
        .merge(defects::routes(
            Arc::clone(&ctx.defect_service),
            max_upload_size,
        ))
        .merge(files::routes(Arc::clone(&ctx.images), Arc::clone(&ctx.pdfs)))
}
