//! Infrastructure backing the features
//!
//! Currently the local file store for uploaded images and PDFs.

pub mod storage;
