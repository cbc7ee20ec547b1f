//! Storage module for uploaded files
//!
//! Provides a directory-backed file store used for mode images and
//! defect reference PDFs.

mod local_store;

pub use local_store::FileStore;
