//! Fixtures shared by the unit and HTTP tests

use std::sync::Arc;

use axum::body::Bytes;
use axum_test::TestServer;
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::core::config::{DatabaseConfig, StorageConfig};
use crate::core::context::AppContext;
use crate::core::database::{create_pool, run_migrations};
use crate::core::extractor::UploadedFile;
use crate::features::defects::DefectService;
use crate::modules::storage::FileStore;

/// Minimal bytes that start like a PNG
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

pub const TEST_UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

fn database_config(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("catalog.db").display()),
        max_connections: 4,
        min_connections: 1,
        acquire_timeout_secs: 5,
        idle_timeout_secs: 60,
        max_lifetime_secs: 300,
        busy_timeout_secs: 5,
    }
}

/// A migrated SQLite database in a throwaway directory. Keep the `TempDir` alive.
pub async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = create_pool(&database_config(&dir)).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (dir, pool)
}

pub struct TestContext {
    _dir: TempDir,
    pub ctx: AppContext,
    pub pool: SqlitePool,
    pub images: Arc<FileStore>,
    pub pdfs: Arc<FileStore>,
    pub service: Arc<DefectService>,
}

/// Database and both file stores under one temp directory
pub async fn test_context() -> TestContext {
    let (dir, pool) = test_pool().await;
    let storage = StorageConfig {
        images_dir: dir.path().join("images"),
        pdfs_dir: dir.path().join("pdfs"),
    };
    let ctx = AppContext::new(pool, &storage).await.unwrap();

    TestContext {
        pool: ctx.pool.clone(),
        images: Arc::clone(&ctx.images),
        pdfs: Arc::clone(&ctx.pdfs),
        service: Arc::clone(&ctx.defect_service),
        ctx,
        _dir: dir,
    }
}

/// The full API router behind an in-process test server
pub async fn test_server() -> (TestContext, TestServer) {
    let context = test_context().await;
    let router = crate::features::routes(&context.ctx, TEST_UPLOAD_LIMIT);
    let server = TestServer::new(router).unwrap();
    (context, server)
}

pub fn pdf_upload(file_name: &str, data: &'static [u8]) -> UploadedFile {
    UploadedFile {
        file_name: file_name.to_string(),
        content_type: Some("application/pdf".to_string()),
        data: Bytes::from_static(data),
    }
}

pub fn png_upload(file_name: &str) -> UploadedFile {
    UploadedFile {
        file_name: file_name.to_string(),
        content_type: Some("image/png".to_string()),
        data: Bytes::from_static(PNG_BYTES),
    }
}
