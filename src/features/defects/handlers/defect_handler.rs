use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::core::error::Result;
use crate::core::extractor::{AppPath, FormData};
use crate::features::defects::dtos::{
    Change, CreateDefectFormDto, DefectModeResponseDto, DefectResponseDto,
    ReplaceDefectDetailsFormDto, SearchDefectsQuery, UpdateDefectFormDto, UpdateModeFormDto,
};
use crate::features::defects::services::DefectService;
use crate::shared::types::ApiResponse;

fn change_response<T>(
    change: Change<T>,
    updated_message: &str,
    unchanged_message: &str,
) -> Json<ApiResponse<T>> {
    let message = if change.is_updated() {
        updated_message
    } else {
        unchanged_message
    };
    Json(ApiResponse::success(Some(change.into_inner()), message))
}

/// Create a defect
///
/// Accepts multipart/form-data with:
/// - `defect_name`: defect name (at least 3 characters)
/// - `defect_modes`: JSON array string of mode labels
/// - `descriptions[]`: one description per mode, same order
/// - `images[]`: optional JPG/PNG per mode, same order
/// - `pdf`: the defect's reference PDF
#[utoipa::path(
    post,
    path = "/admin/upload",
    tag = "defects",
    request_body(content = CreateDefectFormDto, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Defect uploaded successfully", body = ApiResponse<DefectResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 413, description = "Request body too large")
    )
)]
pub async fn create_defect(
    State(service): State<Arc<DefectService>>,
    form: FormData,
) -> Result<Json<ApiResponse<DefectResponseDto>>> {
    let defect = service.create_defect(form.into()).await?;
    Ok(Json(ApiResponse::success(
        Some(defect),
        "Defect uploaded successfully",
    )))
}

/// Search defects
///
/// Substring match on defect name, mode label and mode description, ignoring ASCII case.
#[utoipa::path(
    get,
    path = "/defect/search",
    tag = "defects",
    params(SearchDefectsQuery),
    responses(
        (status = 200, description = "Matching defects", body = ApiResponse<Vec<DefectResponseDto>>),
    )
)]
pub async fn search_defects(
    State(service): State<Arc<DefectService>>,
    Query(query): Query<SearchDefectsQuery>,
) -> Result<Json<ApiResponse<Vec<DefectResponseDto>>>> {
    let defects = service.search(&query.query).await?;
    Ok(Json(ApiResponse::success(
        Some(defects),
        "Defects retrieved successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/defect/{id}",
    tag = "defects",
    params(("id" = i64, Path, description = "Defect id")),
    responses(
        (status = 200, description = "Defect found", body = ApiResponse<DefectResponseDto>),
        (status = 404, description = "Defect not found")
    )
)]
pub async fn get_defect(
    State(service): State<Arc<DefectService>>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ApiResponse<DefectResponseDto>>> {
    let defect = service.get_defect(id).await?;
    Ok(Json(ApiResponse::success(
        Some(defect),
        "Defect retrieved successfully",
    )))
}

/// Rename a defect and/or replace its PDF
#[utoipa::path(
    put,
    path = "/defect/{id}",
    tag = "defects",
    params(("id" = i64, Path, description = "Defect id")),
    request_body(content = UpdateDefectFormDto, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Defect updated, or no changes were made", body = ApiResponse<DefectResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Defect not found")
    )
)]
pub async fn update_defect(
    State(service): State<Arc<DefectService>>,
    AppPath(id): AppPath<i64>,
    form: FormData,
) -> Result<Json<ApiResponse<DefectResponseDto>>> {
    let change = service.update_defect(id, form.into()).await?;
    Ok(change_response(
        change,
        "Defect updated successfully",
        "No changes were made",
    ))
}

/// Update name, modes and optionally the PDF of a defect in one request
///
/// Entries of `defect_modes_json` with an `id` update that mode, entries without
/// one create a new mode. Modes not mentioned are left as they are.
#[utoipa::path(
    post,
    path = "/defect/{id}",
    tag = "defects",
    params(("id" = i64, Path, description = "Defect id")),
    request_body(content = ReplaceDefectDetailsFormDto, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Defect details updated, or no changes were made", body = ApiResponse<DefectResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Defect not found")
    )
)]
pub async fn replace_defect_details(
    State(service): State<Arc<DefectService>>,
    AppPath(id): AppPath<i64>,
    form: FormData,
) -> Result<Json<ApiResponse<DefectResponseDto>>> {
    let change = service.replace_details(id, form.into()).await?;
    Ok(change_response(
        change,
        "Defect details updated successfully",
        "No changes were made",
    ))
}

/// Delete a defect with all its modes, its PDF and their files
#[utoipa::path(
    delete,
    path = "/defect/{id}",
    tag = "defects",
    params(("id" = i64, Path, description = "Defect id")),
    responses(
        (status = 200, description = "Defect deleted successfully"),
        (status = 404, description = "Defect not found")
    )
)]
pub async fn delete_defect(
    State(service): State<Arc<DefectService>>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete_defect(id).await?;
    Ok(Json(ApiResponse::success(None, "Defect deleted successfully")))
}

#[utoipa::path(
    put,
    path = "/defect/mode/{id}",
    tag = "defects",
    params(("id" = i64, Path, description = "Defect mode id")),
    request_body(content = UpdateModeFormDto, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Defect mode updated, or no changes were made", body = ApiResponse<DefectModeResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Defect mode not found")
    )
)]
pub async fn update_mode(
    State(service): State<Arc<DefectService>>,
    AppPath(id): AppPath<i64>,
    form: FormData,
) -> Result<Json<ApiResponse<DefectModeResponseDto>>> {
    let change = service.update_mode(id, form.into()).await?;
    Ok(change_response(
        change,
        "Defect mode updated successfully",
        "No changes were made to this mode",
    ))
}

#[utoipa::path(
    delete,
    path = "/defect/mode/{id}",
    tag = "defects",
    params(("id" = i64, Path, description = "Defect mode id")),
    responses(
        (status = 200, description = "Defect mode deleted successfully"),
        (status = 404, description = "Defect mode not found")
    )
)]
pub async fn delete_mode(
    State(service): State<Arc<DefectService>>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete_mode(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        "Defect mode deleted successfully",
    )))
}
