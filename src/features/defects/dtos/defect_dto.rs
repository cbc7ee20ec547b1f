use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::core::extractor::{FormData, UploadedFile};
use crate::features::defects::models::{DefectDetail, DefectMode};
use crate::shared::constants::{IMAGES_URL_PREFIX, PDFS_URL_PREFIX};
use crate::shared::validation::trimmed_or_none;

// =============================================================================
// RESPONSES
// =============================================================================

/// Response DTO for a defect mode
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DefectModeResponseDto {
    pub id: i64,
    pub mode: String,
    pub description: String,
    /// `/images/<filename>` or null when the mode has no image
    pub image_url: Option<String>,
}

impl From<DefectMode> for DefectModeResponseDto {
    fn from(m: DefectMode) -> Self {
        Self {
            id: m.id,
            mode: m.mode,
            description: m.description,
            image_url: m
                .image_filename
                .map(|f| format!("{}/{}", IMAGES_URL_PREFIX, f)),
        }
    }
}

/// Response DTO for a defect with its modes and PDF
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DefectResponseDto {
    pub id: i64,
    pub name: String,
    /// `/pdfs/<filename>` or null when no PDF is attached
    pub pdf_url: Option<String>,
    pub modes: Vec<DefectModeResponseDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DefectDetail> for DefectResponseDto {
    fn from(d: DefectDetail) -> Self {
        Self {
            id: d.defect.id,
            name: d.defect.name,
            pdf_url: d
                .pdf
                .map(|p| format!("{}/{}", PDFS_URL_PREFIX, p.filename)),
            modes: d.modes.into_iter().map(Into::into).collect(),
            created_at: d.defect.created_at,
            updated_at: d.defect.updated_at,
        }
    }
}

/// Result of an edit that may turn out to be a no-op
#[derive(Debug)]
pub enum Change<T> {
    Updated(T),
    Unchanged(T),
}

impl<T> Change<T> {
    pub fn is_updated(&self) -> bool {
        matches!(self, Change::Updated(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Change::Updated(v) | Change::Unchanged(v) => v,
        }
    }
}

// =============================================================================
// QUERY PARAMS
// =============================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchDefectsQuery {
    /// Substring matched against defect name, mode label and mode description,
    /// ignoring ASCII case. Empty matches every defect.
    #[serde(default)]
    pub query: String,
}

// =============================================================================
// FIELD VALIDATION
// =============================================================================

/// Defect name rule, applied after trimming
#[derive(Debug, Validate)]
pub struct DefectNameInput {
    #[validate(length(min = 3, message = "Defect name must be at least 3 characters long"))]
    pub name: String,
}

/// Mode label and description rules, applied after trimming. `None` skips the check.
#[derive(Debug, Default, Validate)]
pub struct ModeFieldsInput {
    #[validate(length(min = 2, message = "Defect mode must be at least 2 characters long"))]
    pub mode: Option<String>,
    #[validate(length(min = 5, message = "Description must be at least 5 characters long"))]
    pub description: Option<String>,
}

/// One entry of `defect_modes_json`.
///
/// An entry carrying an `id` updates that mode; an entry without one creates a
/// new mode. `new_image` names the multipart file part holding the image.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ModeEntryDto {
    Existing(ExistingModeUpdate),
    New(NewModeCreate),
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExistingModeUpdate {
    pub id: i64,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub new_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewModeCreate {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub description: String,
    /// File part holding this mode's image. When absent the part
    /// `new_image_<k>` is used, where `k` is this entry's zero-based position
    /// among the entries without an `id`. Counting only new entries keeps two
    /// new modes from ever resolving to the same part; counting existing ids
    /// instead would give `[new, new]` the name `new_image_0` twice.
    #[serde(default)]
    pub new_image: Option<String>,
}

// =============================================================================
// MULTIPART REQUESTS
// =============================================================================

/// Fields of `POST /admin/upload`, as received
#[derive(Debug, Default)]
pub struct CreateDefectRequest {
    pub name: Option<String>,
    /// JSON array of mode labels
    pub modes_json: Option<String>,
    pub descriptions: Vec<String>,
    /// Positional: image `i` belongs to mode `i`; `None` for an empty selection
    pub images: Vec<Option<UploadedFile>>,
    pub pdf: Option<UploadedFile>,
}

impl From<FormData> for CreateDefectRequest {
    fn from(mut form: FormData) -> Self {
        Self {
            name: trimmed_or_none(form.text("defect_name")),
            modes_json: form.text("defect_modes").map(str::to_string),
            descriptions: form.texts("descriptions"),
            images: form.take_files("images"),
            pdf: form.take_file("pdf"),
        }
    }
}

/// Fields of `PUT /defect/{id}`
#[derive(Debug, Default)]
pub struct UpdateDefectRequest {
    pub name: Option<String>,
    pub pdf: Option<UploadedFile>,
}

impl From<FormData> for UpdateDefectRequest {
    fn from(mut form: FormData) -> Self {
        Self {
            name: trimmed_or_none(form.text("defect_name")),
            pdf: form.take_file("pdf"),
        }
    }
}

/// Fields of `PUT /defect/mode/{id}`
#[derive(Debug, Default)]
pub struct UpdateModeRequest {
    pub mode: Option<String>,
    pub description: Option<String>,
    pub image: Option<UploadedFile>,
}

impl From<FormData> for UpdateModeRequest {
    fn from(mut form: FormData) -> Self {
        Self {
            mode: trimmed_or_none(form.text("mode")),
            description: trimmed_or_none(form.text("description")),
            image: form.take_file("image"),
        }
    }
}

/// Fields of `POST /defect/{id}`. Remaining file parts stay in `attachments`
/// so mode entries can reference them by field name.
#[derive(Debug, Default)]
pub struct ReplaceDefectDetailsRequest {
    pub name: Option<String>,
    pub modes_json: Option<String>,
    pub pdf: Option<UploadedFile>,
    pub attachments: FormData,
}

impl From<FormData> for ReplaceDefectDetailsRequest {
    fn from(mut form: FormData) -> Self {
        Self {
            name: trimmed_or_none(form.text("defect_name")),
            modes_json: form.text("defect_modes_json").map(str::to_string),
            pdf: form.take_file("pdf"),
            attachments: form,
        }
    }
}

// =============================================================================
// OPENAPI FORM SCHEMAS
// Documentation only: handlers read these fields through `FormData`.
// =============================================================================

/// Multipart body for creating a defect
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CreateDefectFormDto {
    #[schema(example = "Edge Chipping")]
    pub defect_name: String,
    /// JSON array string of mode labels
    #[schema(example = r#"["Radial", "Circumferential"]"#)]
    pub defect_modes: String,
    /// One description per mode, in the same order
    pub descriptions: Vec<String>,
    /// Optional JPG/PNG image per mode, in the same order
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub images: Option<Vec<String>>,
    #[schema(format = Binary, content_media_type = "application/pdf")]
    pub pdf: String,
}

/// Multipart body for renaming a defect or replacing its PDF
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UpdateDefectFormDto {
    pub defect_name: Option<String>,
    #[schema(format = Binary, content_media_type = "application/pdf")]
    pub pdf: Option<String>,
}

/// Multipart body for editing one mode
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UpdateModeFormDto {
    pub mode: Option<String>,
    pub description: Option<String>,
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: Option<String>,
}

/// Multipart body for replacing a defect's name, modes and PDF in one call
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ReplaceDefectDetailsFormDto {
    pub defect_name: String,
    /// JSON array of mode entries (`{id?, mode, description, new_image?}`)
    #[schema(example = r#"[{"id": 1, "mode": "Radial", "description": "Cracks along the radius"}, {"mode": "Notch", "description": "Chipping near the notch", "new_image": "new_image_0"}]"#)]
    pub defect_modes_json: String,
    #[schema(format = Binary, content_media_type = "application/pdf")]
    pub pdf: Option<String>,
}
