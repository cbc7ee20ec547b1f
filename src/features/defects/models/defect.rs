use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for a catalogued wafer defect
#[derive(Debug, Clone, FromRow)]
pub struct Defect {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database model for a sub-classification of a defect
#[derive(Debug, Clone, FromRow)]
pub struct DefectMode {
    pub id: i64,
    pub defect_id: i64,
    pub mode: String,
    pub description: String,
    pub image_filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Database model for the reference PDF of a defect
#[derive(Debug, Clone, FromRow)]
pub struct PdfFile {
    pub id: i64,
    pub defect_id: i64,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A defect together with everything it owns
#[derive(Debug, Clone)]
pub struct DefectDetail {
    pub defect: Defect,
    pub modes: Vec<DefectMode>,
    pub pdf: Option<PdfFile>,
}

impl DefectDetail {
    /// Stored image filenames referenced by this defect's modes
    pub fn image_filenames(&self) -> impl Iterator<Item = &str> {
        self.modes
            .iter()
            .filter_map(|m| m.image_filename.as_deref())
    }
}
