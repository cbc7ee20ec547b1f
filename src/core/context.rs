use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::core::config::StorageConfig;
use crate::core::error::Result;
use crate::features::defects::DefectService;
use crate::modules::storage::FileStore;

/// Everything a request handler can reach, built once at startup
#[derive(Clone)]
pub struct AppContext {
    pub pool: SqlitePool,
    pub images: Arc<FileStore>,
    pub pdfs: Arc<FileStore>,
    pub defect_service: Arc<DefectService>,
}

impl AppContext {
    /// Wire stores and services over an already migrated pool and make sure
    /// both upload directories exist
    pub async fn new(pool: SqlitePool, storage: &StorageConfig) -> Result<Self> {
        let images = Arc::new(FileStore::new(&storage.images_dir, "images"));
        let pdfs = Arc::new(FileStore::new(&storage.pdfs_dir, "pdfs"));

        images.ensure_root().await?;
        pdfs.ensure_root().await?;
        info!(
            "File stores ready: images={}, pdfs={}",
            images.root().display(),
            pdfs.root().display()
        );

        let defect_service = Arc::new(DefectService::new(
            pool.clone(),
            Arc::clone(&images),
            Arc::clone(&pdfs),
        ));

        Ok(Self {
            pool,
            images,
            pdfs,
            defect_service,
        })
    }
}
