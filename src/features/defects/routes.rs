use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::features::defects::handlers;
use crate::features::defects::services::DefectService;

/// Create routes for the defects feature
///
/// Upload routes accept bodies up to `max_upload_size` bytes.
pub fn routes(service: Arc<DefectService>, max_upload_size: usize) -> Router {
    Router::new()
        .route(
            "/admin/upload",
            post(handlers::create_defect).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/defect/search", get(handlers::search_defects))
        .route(
            "/defect/{id}",
            get(handlers::get_defect)
                .put(handlers::update_defect)
                .post(handlers::replace_defect_details)
                .delete(handlers::delete_defect)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/defect/mode/{id}",
            put(handlers::update_mode)
                .delete(handlers::delete_mode)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .with_state(service)
}
