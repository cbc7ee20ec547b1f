/// Extensions accepted for mode images
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extensions accepted for defect reference documents
pub const ALLOWED_PDF_EXTENSIONS: &[&str] = &["pdf"];

// =============================================================================
// PUBLIC URL PREFIXES
// =============================================================================

pub const IMAGES_URL_PREFIX: &str = "/images";

pub const PDFS_URL_PREFIX: &str = "/pdfs";
