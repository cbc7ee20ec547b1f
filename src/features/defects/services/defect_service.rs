use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::UploadedFile;
use crate::features::defects::dtos::{
    Change, CreateDefectRequest, DefectModeResponseDto, DefectNameInput, DefectResponseDto,
    ModeEntryDto, ModeFieldsInput, ReplaceDefectDetailsRequest, UpdateDefectRequest,
    UpdateModeRequest,
};
use crate::features::defects::services::{CatalogStore, ModeChanges};
use crate::modules::storage::FileStore;
use crate::shared::constants::{ALLOWED_IMAGE_EXTENSIONS, ALLOWED_PDF_EXTENSIONS};
use crate::shared::validation::is_allowed;

/// A mode that passed validation and is ready to be created
#[derive(Debug)]
struct NewMode {
    mode: String,
    description: String,
    image: Option<UploadedFile>,
}

#[derive(Debug)]
struct NewDefect {
    name: String,
    modes: Vec<NewMode>,
    pdf: UploadedFile,
}

/// A validated `defect_modes_json` entry. `id` is set for updates of existing modes.
#[derive(Debug)]
struct PlannedMode {
    id: Option<i64>,
    mode: String,
    description: String,
    image: Option<UploadedFile>,
}

#[derive(Debug)]
struct ReplacePlan {
    name: String,
    pdf: Option<UploadedFile>,
    modes: Vec<PlannedMode>,
}

/// Orchestrates catalog rows and stored files for defects and their modes.
///
/// Every mutation validates its whole input before touching either store, runs
/// its catalog changes in one transaction, and removes superseded files only
/// after that transaction commits. File writes are not covered by the
/// transaction: a failure after a file was saved rolls back the rows but leaves
/// the file behind as an orphan.
pub struct DefectService {
    catalog: CatalogStore,
    images: Arc<FileStore>,
    pdfs: Arc<FileStore>,
}

impl DefectService {
    pub fn new(pool: SqlitePool, images: Arc<FileStore>, pdfs: Arc<FileStore>) -> Self {
        Self {
            catalog: CatalogStore::new(pool),
            images,
            pdfs,
        }
    }

    /// Create a defect with its modes, optional mode images and the required PDF
    pub async fn create_defect(&self, request: CreateDefectRequest) -> Result<DefectResponseDto> {
        let new_defect = validate_create(request)?;
        let now = Utc::now();

        let mut tx = self.catalog.begin().await?;

        let defect = self
            .catalog
            .create_defect(&mut tx, &new_defect.name, now)
            .await?;

        for mode in &new_defect.modes {
            let image_filename = match &mode.image {
                Some(image) => Some(self.images.save(&image.data, &image.file_name).await?),
                None => None,
            };
            self.catalog
                .add_mode(
                    &mut tx,
                    defect.id,
                    &mode.mode,
                    &mode.description,
                    image_filename.as_deref(),
                    now,
                )
                .await?;
        }

        let pdf_filename = self
            .pdfs
            .save(&new_defect.pdf.data, &new_defect.pdf.file_name)
            .await?;
        self.catalog
            .set_pdf(&mut tx, defect.id, &pdf_filename, now)
            .await?;

        let detail = self.catalog.get_detail(&mut tx, defect.id).await?;
        tx.commit().await?;

        info!(
            "Defect created: id={}, name={}, modes={}",
            detail.defect.id,
            detail.defect.name,
            detail.modes.len()
        );

        Ok(detail.into())
    }

    /// Defects matching `query` in their name or any mode label/description
    ///
    /// The id list and every detail are read from one snapshot, so a concurrent
    /// delete cannot drop a matched defect out from under the search.
    pub async fn search(&self, query: &str) -> Result<Vec<DefectResponseDto>> {
        let mut tx = self.catalog.begin_read().await?;

        let defects = self.catalog.search(&mut tx, query.trim()).await?;

        let mut results = Vec::with_capacity(defects.len());
        for defect in defects {
            results.push(self.catalog.get_detail(&mut tx, defect.id).await?.into());
        }
        tx.commit().await?;

        debug!("Search '{}' matched {} defects", query, results.len());
        Ok(results)
    }

    pub async fn get_defect(&self, id: i64) -> Result<DefectResponseDto> {
        let mut tx = self.catalog.begin_read().await?;
        let detail = self.catalog.get_detail(&mut tx, id).await?;
        tx.commit().await?;
        Ok(detail.into())
    }

    /// Delete a defect, its modes, its PDF record and every file they reference
    pub async fn delete_defect(&self, id: i64) -> Result<()> {
        let mut tx = self.catalog.begin().await?;

        let detail = self.catalog.get_detail(&mut tx, id).await?;
        self.catalog.delete_defect(&mut tx, id).await?;

        tx.commit().await?;

        let images: Vec<String> = detail.image_filenames().map(str::to_string).collect();
        let pdf = detail.pdf.map(|p| p.filename);
        self.discard_files(images, pdf).await;

        info!("Defect deleted: id={}", id);
        Ok(())
    }

    /// Delete one mode and its image
    pub async fn delete_mode(&self, mode_id: i64) -> Result<()> {
        let mut tx = self.catalog.begin().await?;

        let mode = self.catalog.get_mode(&mut tx, mode_id).await?;
        self.catalog.delete_mode(&mut tx, mode_id).await?;
        self.catalog
            .update_defect(&mut tx, mode.defect_id, None, Utc::now())
            .await?;

        tx.commit().await?;

        self.discard_files(mode.image_filename, None).await;

        info!(
            "Defect mode deleted: id={}, defect_id={}",
            mode_id, mode.defect_id
        );
        Ok(())
    }

    /// Rename a defect and/or replace its PDF
    pub async fn update_defect(
        &self,
        id: i64,
        request: UpdateDefectRequest,
    ) -> Result<Change<DefectResponseDto>> {
        let name = request.name.map(validate_name).transpose()?;
        if let Some(pdf) = &request.pdf {
            ensure_pdf(pdf)?;
        }

        let now = Utc::now();
        let mut tx = self.catalog.begin().await?;

        let current = self.catalog.get_detail(&mut tx, id).await?;
        let rename = name.filter(|n| *n != current.defect.name);

        if rename.is_none() && request.pdf.is_none() {
            return Ok(Change::Unchanged(current.into()));
        }

        let mut superseded_pdf = None;
        if let Some(pdf) = &request.pdf {
            let stored = self.pdfs.save(&pdf.data, &pdf.file_name).await?;
            self.catalog.set_pdf(&mut tx, id, &stored, now).await?;
            superseded_pdf = current.pdf.map(|p| p.filename);
        }

        self.catalog
            .update_defect(&mut tx, id, rename.as_deref(), now)
            .await?;

        let detail = self.catalog.get_detail(&mut tx, id).await?;
        tx.commit().await?;

        self.discard_files(None::<String>, superseded_pdf).await;

        info!("Defect updated: id={}", id);
        Ok(Change::Updated(detail.into()))
    }

    /// Edit a mode's label, description and/or image
    pub async fn update_mode(
        &self,
        mode_id: i64,
        request: UpdateModeRequest,
    ) -> Result<Change<DefectModeResponseDto>> {
        ModeFieldsInput {
            mode: request.mode.clone(),
            description: request.description.clone(),
        }
        .validate()?;
        if let Some(image) = &request.image {
            ensure_image(image, "Image must be a JPG or PNG file")?;
        }

        let mut tx = self.catalog.begin().await?;

        let current = self.catalog.get_mode(&mut tx, mode_id).await?;

        let mut changes = ModeChanges {
            mode: request.mode.filter(|m| *m != current.mode),
            description: request.description.filter(|d| *d != current.description),
            image_filename: None,
        };

        if changes.is_empty() && request.image.is_none() {
            return Ok(Change::Unchanged(current.into()));
        }

        let mut superseded_image = None;
        if let Some(image) = &request.image {
            changes.image_filename = Some(self.images.save(&image.data, &image.file_name).await?);
            superseded_image = current.image_filename.clone();
        }

        let updated = self.catalog.update_mode(&mut tx, mode_id, &changes).await?;
        self.catalog
            .update_defect(&mut tx, current.defect_id, None, Utc::now())
            .await?;

        tx.commit().await?;

        self.discard_files(superseded_image, None).await;

        info!("Defect mode updated: id={}", mode_id);
        Ok(Change::Updated(updated.into()))
    }

    /// Update name, optionally replace the PDF, and update or create modes in one call.
    ///
    /// Modes of the defect that the payload does not mention are left untouched;
    /// removing a mode goes through [`DefectService::delete_mode`].
    pub async fn replace_details(
        &self,
        id: i64,
        request: ReplaceDefectDetailsRequest,
    ) -> Result<Change<DefectResponseDto>> {
        let plan = validate_replace(request)?;
        let now = Utc::now();

        let mut tx = self.catalog.begin().await?;

        let current = self.catalog.get_detail(&mut tx, id).await?;

        // Ownership is checked for every entry before any file is written
        for mode_id in plan.modes.iter().filter_map(|m| m.id) {
            if !current.modes.iter().any(|m| m.id == mode_id) {
                return Err(AppError::Validation(format!(
                    "Defect mode with id {} not found for this defect",
                    mode_id
                )));
            }
        }

        let mut changed = false;
        let mut superseded_images = Vec::new();
        let mut superseded_pdf = None;

        let rename = (plan.name != current.defect.name).then_some(plan.name);
        changed |= rename.is_some();

        if let Some(pdf) = &plan.pdf {
            let stored = self.pdfs.save(&pdf.data, &pdf.file_name).await?;
            self.catalog.set_pdf(&mut tx, id, &stored, now).await?;
            superseded_pdf = current.pdf.as_ref().map(|p| p.filename.clone());
            changed = true;
        }

        for planned in &plan.modes {
            match planned.id {
                Some(mode_id) => {
                    let Some(existing) = current.modes.iter().find(|m| m.id == mode_id) else {
                        return Err(AppError::Internal(format!(
                            "Defect mode {} missing from loaded defect {}",
                            mode_id, id
                        )));
                    };

                    let mut changes = ModeChanges {
                        mode: (planned.mode != existing.mode).then(|| planned.mode.clone()),
                        description: (planned.description != existing.description)
                            .then(|| planned.description.clone()),
                        image_filename: None,
                    };

                    if let Some(image) = &planned.image {
                        changes.image_filename =
                            Some(self.images.save(&image.data, &image.file_name).await?);
                        if let Some(old) = &existing.image_filename {
                            superseded_images.push(old.clone());
                        }
                    }

                    if !changes.is_empty() {
                        self.catalog.update_mode(&mut tx, mode_id, &changes).await?;
                        changed = true;
                    }
                }
                None => {
                    let image_filename = match &planned.image {
                        Some(image) => {
                            Some(self.images.save(&image.data, &image.file_name).await?)
                        }
                        None => None,
                    };
                    self.catalog
                        .add_mode(
                            &mut tx,
                            id,
                            &planned.mode,
                            &planned.description,
                            image_filename.as_deref(),
                            now,
                        )
                        .await?;
                    changed = true;
                }
            }
        }

        if !changed {
            return Ok(Change::Unchanged(current.into()));
        }

        self.catalog
            .update_defect(&mut tx, id, rename.as_deref(), now)
            .await?;

        let detail = self.catalog.get_detail(&mut tx, id).await?;
        tx.commit().await?;

        self.discard_files(superseded_images, superseded_pdf).await;

        info!(
            "Defect details updated: id={}, modes={}",
            id,
            detail.modes.len()
        );
        Ok(Change::Updated(detail.into()))
    }

    /// Best-effort removal of files no longer referenced by any committed row
    async fn discard_files(
        &self,
        images: impl IntoIterator<Item = String>,
        pdf: Option<String>,
    ) {
        for name in images {
            self.images.delete(&name).await;
        }
        if let Some(name) = pdf {
            self.pdfs.delete(&name).await;
        }
    }
}

// =============================================================================
// VALIDATION
// Pure checks; nothing here touches the catalog or the file stores.
// =============================================================================

fn validate_name(name: String) -> Result<String> {
    let input = DefectNameInput {
        name: name.trim().to_string(),
    };
    input.validate()?;
    Ok(input.name)
}

fn validate_mode_fields(mode: &str, description: &str) -> Result<(String, String)> {
    let input = ModeFieldsInput {
        mode: Some(mode.trim().to_string()),
        description: Some(description.trim().to_string()),
    };
    input.validate()?;
    Ok((
        input.mode.unwrap_or_default(),
        input.description.unwrap_or_default(),
    ))
}

fn ensure_pdf(pdf: &UploadedFile) -> Result<()> {
    if !is_allowed(&pdf.file_name, ALLOWED_PDF_EXTENSIONS) {
        debug!(
            "Rejected PDF upload {} ({:?})",
            pdf.file_name, pdf.content_type
        );
        return Err(AppError::Validation(
            "Only PDF files are allowed".to_string(),
        ));
    }
    Ok(())
}

// Only the extension is checked; the client-declared content type is not trusted
fn ensure_image(image: &UploadedFile, message: &str) -> Result<()> {
    if !is_allowed(&image.file_name, ALLOWED_IMAGE_EXTENSIONS) {
        debug!(
            "Rejected image upload {} ({:?})",
            image.file_name, image.content_type
        );
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}

fn validate_create(request: CreateDefectRequest) -> Result<NewDefect> {
    let name = validate_name(request.name.unwrap_or_default())?;

    let labels: Vec<String> = serde_json::from_str(request.modes_json.as_deref().unwrap_or("[]"))
        .map_err(|_| AppError::Validation("Invalid JSON format for defect_modes".to_string()))?;

    if labels.is_empty() {
        return Err(AppError::Validation(
            "At least one defect mode is required".to_string(),
        ));
    }

    if labels.len() != request.descriptions.len() {
        return Err(AppError::Validation(
            "Number of defect modes and descriptions must match".to_string(),
        ));
    }

    let pdf = request
        .pdf
        .ok_or_else(|| AppError::Validation("A PDF file is required".to_string()))?;
    ensure_pdf(&pdf)?;

    if request.images.len() > labels.len() {
        return Err(AppError::Validation(
            "Number of images exceeds the number of defect modes".to_string(),
        ));
    }

    for (label, image) in labels.iter().zip(&request.images) {
        if let Some(image) = image {
            ensure_image(
                image,
                &format!("Image for mode {} must be a JPG or PNG file", label.trim()),
            )?;
        }
    }

    let mut images = request.images.into_iter();
    let modes = labels
        .iter()
        .zip(&request.descriptions)
        .map(|(label, description)| {
            let (mode, description) = validate_mode_fields(label, description)?;
            Ok(NewMode {
                mode,
                description,
                image: images.next().flatten(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NewDefect { name, modes, pdf })
}

fn validate_replace(request: ReplaceDefectDetailsRequest) -> Result<ReplacePlan> {
    let name = validate_name(request.name.unwrap_or_default())?;

    if let Some(pdf) = &request.pdf {
        ensure_pdf(pdf)?;
    }

    let entries: Vec<ModeEntryDto> =
        serde_json::from_str(request.modes_json.as_deref().unwrap_or("[]")).map_err(|_| {
            AppError::Validation("Invalid JSON format for defect_modes_json".to_string())
        })?;

    if entries.is_empty() {
        return Err(AppError::Validation(
            "At least one defect mode is required".to_string(),
        ));
    }

    let mut attachments = request.attachments;
    let mut seen_ids = HashSet::new();
    let mut new_index = 0usize;
    let mut modes = Vec::with_capacity(entries.len());

    for entry in entries {
        let (id, mode, description, image_field) = match entry {
            ModeEntryDto::Existing(e) => (Some(e.id), e.mode, e.description, e.new_image),
            ModeEntryDto::New(n) => {
                let field = n
                    .new_image
                    .unwrap_or_else(|| format!("new_image_{}", new_index));
                new_index += 1;
                (None, n.mode, n.description, Some(field))
            }
        };

        if let Some(mode_id) = id {
            if !seen_ids.insert(mode_id) {
                return Err(AppError::Validation(format!(
                    "Defect mode with id {} appears more than once",
                    mode_id
                )));
            }
        }

        let (mode, description) = validate_mode_fields(&mode, &description)?;

        let image = image_field.and_then(|field| attachments.take_file(&field));
        if let Some(image) = &image {
            ensure_image(image, &format!("Invalid image file for mode {}", mode))?;
        }

        modes.push(PlannedMode {
            id,
            mode,
            description,
            image,
        });
    }

    Ok(ReplacePlan {
        name,
        pdf: request.pdf,
        modes,
    })
}
