pub mod catalog_store;
pub mod defect_service;

pub use catalog_store::{CatalogStore, ModeChanges};
pub use defect_service::DefectService;
