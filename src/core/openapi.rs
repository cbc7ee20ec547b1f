use utoipa::{Modify, OpenApi};

use crate::features::defects::{dtos as defects_dtos, handlers as defects_handlers};
use crate::features::files::handlers as files_handlers;
use crate::shared::types::{ApiResponse, ResponseStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Defects
        defects_handlers::create_defect,
        defects_handlers::search_defects,
        defects_handlers::get_defect,
        defects_handlers::update_defect,
        defects_handlers::replace_defect_details,
        defects_handlers::delete_defect,
        defects_handlers::update_mode,
        defects_handlers::delete_mode,
        // Files
        files_handlers::serve_image,
        files_handlers::serve_pdf,
    ),
    components(
        schemas(
            ResponseStatus,
            // Defects
            defects_dtos::DefectResponseDto,
            defects_dtos::DefectModeResponseDto,
            defects_dtos::ModeEntryDto,
            defects_dtos::ExistingModeUpdate,
            defects_dtos::NewModeCreate,
            defects_dtos::CreateDefectFormDto,
            defects_dtos::UpdateDefectFormDto,
            defects_dtos::UpdateModeFormDto,
            defects_dtos::ReplaceDefectDetailsFormDto,
            ApiResponse<defects_dtos::DefectResponseDto>,
            ApiResponse<Vec<defects_dtos::DefectResponseDto>>,
            ApiResponse<defects_dtos::DefectModeResponseDto>,
        )
    ),
    tags(
        (name = "defects", description = "Wafer defect catalog: defects, their modes and reference PDFs"),
        (name = "files", description = "Stored mode images and defect PDFs"),
    ),
    info(
        title = "Wafer Defect Catalog API",
        version = "0.1.0",
        description = "API documentation for the wafer defect catalog",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_is_documented() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/admin/upload",
            "/defect/search",
            "/defect/{id}",
            "/defect/mode/{id}",
            "/images/{filename}",
            "/pdfs/{filename}",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_info_modifier_overrides_title() {
        let mut doc = ApiDoc::openapi();
        SwaggerInfoModifier {
            title: "Fab 7 Defects".into(),
            version: "2.0.0".into(),
            description: "Line catalog".into(),
        }
        .modify(&mut doc);

        assert_eq!(doc.info.title, "Fab 7 Defects");
        assert_eq!(doc.info.version, "2.0.0");
    }
}
