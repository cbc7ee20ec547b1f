use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::core::error::{AppError, Result};
use crate::features::defects::models::{Defect, DefectDetail, DefectMode, PdfFile};

const DEFECT_COLUMNS: &str = "id, name, created_at, updated_at";
const MODE_COLUMNS: &str = "id, defect_id, mode, description, image_filename, created_at";
const PDF_COLUMNS: &str = "id, defect_id, filename, created_at, updated_at";

/// Field updates for a mode; `None` leaves the column as is
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModeChanges {
    pub mode: Option<String>,
    pub description: Option<String>,
    pub image_filename: Option<String>,
}

impl ModeChanges {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.description.is_none() && self.image_filename.is_none()
    }
}

/// Relational storage for defects, modes and PDF records.
///
/// Every query runs on a caller-supplied connection so one request's mutations
/// can share a single transaction.
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write transaction. Takes SQLite's write lock up front, so a read followed
    /// by a write never fails with SQLITE_BUSY when another writer commits in
    /// between; contending writers wait on `busy_timeout` instead.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Read-only transaction. Under WAL every read inside it sees the same
    /// snapshot, taken at its first statement.
    pub async fn begin_read(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    #[cfg(test)]
    pub async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    // =========================================================================
    // DEFECTS
    // =========================================================================

    pub async fn create_defect(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Defect> {
        let defect = sqlx::query_as::<_, Defect>(&format!(
            "INSERT INTO defects (name, created_at, updated_at) VALUES (?, ?, ?) RETURNING {}",
            DEFECT_COLUMNS
        ))
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(defect)
    }

    pub async fn get_defect(&self, conn: &mut SqliteConnection, id: i64) -> Result<Defect> {
        sqlx::query_as::<_, Defect>(&format!(
            "SELECT {} FROM defects WHERE id = ?",
            DEFECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Defect {} not found", id)))
    }

    /// Load a defect with its modes (in creation order) and PDF record
    pub async fn get_detail(&self, conn: &mut SqliteConnection, id: i64) -> Result<DefectDetail> {
        let defect = self.get_defect(&mut *conn, id).await?;
        let modes = self.list_modes(&mut *conn, id).await?;
        let pdf = self.get_pdf(&mut *conn, id).await?;

        Ok(DefectDetail { defect, modes, pdf })
    }

    /// Rename a defect (when `name` is given) and refresh its `updated_at`
    pub async fn update_defect(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Defect> {
        sqlx::query_as::<_, Defect>(&format!(
            "UPDATE defects SET name = COALESCE(?, name), updated_at = ? WHERE id = ? RETURNING {}",
            DEFECT_COLUMNS
        ))
        .bind(name)
        .bind(now)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Defect {} not found", id)))
    }

    /// Delete a defect; its modes and PDF record go with it (ON DELETE CASCADE)
    pub async fn delete_defect(&self, conn: &mut SqliteConnection, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM defects WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Defect {} not found", id)));
        }
        Ok(())
    }

    /// Defects whose name, or any mode label or description, contains `query`
    /// (ASCII case-insensitive, as SQLite `LIKE` folds). Each defect appears once,
    /// ordered by id.
    pub async fn search(&self, conn: &mut SqliteConnection, query: &str) -> Result<Vec<Defect>> {
        let pattern = format!("%{}%", escape_like(query));

        let defects = sqlx::query_as::<_, Defect>(
            r#"
            SELECT DISTINCT d.id, d.name, d.created_at, d.updated_at
            FROM defects d
            LEFT JOIN defect_modes m ON m.defect_id = d.id
            WHERE d.name LIKE ? ESCAPE '\'
               OR m.mode LIKE ? ESCAPE '\'
               OR m.description LIKE ? ESCAPE '\'
            ORDER BY d.id
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(conn)
        .await?;

        Ok(defects)
    }

    // =========================================================================
    // MODES
    // =========================================================================

    pub async fn list_modes(
        &self,
        conn: &mut SqliteConnection,
        defect_id: i64,
    ) -> Result<Vec<DefectMode>> {
        let modes = sqlx::query_as::<_, DefectMode>(&format!(
            "SELECT {} FROM defect_modes WHERE defect_id = ? ORDER BY id",
            MODE_COLUMNS
        ))
        .bind(defect_id)
        .fetch_all(conn)
        .await?;

        Ok(modes)
    }

    pub async fn get_mode(&self, conn: &mut SqliteConnection, mode_id: i64) -> Result<DefectMode> {
        sqlx::query_as::<_, DefectMode>(&format!(
            "SELECT {} FROM defect_modes WHERE id = ?",
            MODE_COLUMNS
        ))
        .bind(mode_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Defect mode {} not found", mode_id)))
    }

    pub async fn add_mode(
        &self,
        conn: &mut SqliteConnection,
        defect_id: i64,
        mode: &str,
        description: &str,
        image_filename: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DefectMode> {
        let created = sqlx::query_as::<_, DefectMode>(&format!(
            r#"
            INSERT INTO defect_modes (defect_id, mode, description, image_filename, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            MODE_COLUMNS
        ))
        .bind(defect_id)
        .bind(mode)
        .bind(description)
        .bind(image_filename)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(created)
    }

    pub async fn update_mode(
        &self,
        conn: &mut SqliteConnection,
        mode_id: i64,
        changes: &ModeChanges,
    ) -> Result<DefectMode> {
        sqlx::query_as::<_, DefectMode>(&format!(
            r#"
            UPDATE defect_modes
            SET mode = COALESCE(?, mode),
                description = COALESCE(?, description),
                image_filename = COALESCE(?, image_filename)
            WHERE id = ?
            RETURNING {}
            "#,
            MODE_COLUMNS
        ))
        .bind(changes.mode.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.image_filename.as_deref())
        .bind(mode_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Defect mode {} not found", mode_id)))
    }

    pub async fn delete_mode(&self, conn: &mut SqliteConnection, mode_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM defect_modes WHERE id = ?")
            .bind(mode_id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Defect mode {} not found",
                mode_id
            )));
        }
        Ok(())
    }

    // =========================================================================
    // PDF
    // =========================================================================

    pub async fn get_pdf(
        &self,
        conn: &mut SqliteConnection,
        defect_id: i64,
    ) -> Result<Option<PdfFile>> {
        let pdf = sqlx::query_as::<_, PdfFile>(&format!(
            "SELECT {} FROM pdf_files WHERE defect_id = ?",
            PDF_COLUMNS
        ))
        .bind(defect_id)
        .fetch_optional(conn)
        .await?;

        Ok(pdf)
    }

    /// Attach `filename` as the defect's PDF, replacing any existing record
    pub async fn set_pdf(
        &self,
        conn: &mut SqliteConnection,
        defect_id: i64,
        filename: &str,
        now: DateTime<Utc>,
    ) -> Result<PdfFile> {
        sqlx::query("DELETE FROM pdf_files WHERE defect_id = ?")
            .bind(defect_id)
            .execute(&mut *conn)
            .await?;

        let pdf = sqlx::query_as::<_, PdfFile>(&format!(
            r#"
            INSERT INTO pdf_files (defect_id, filename, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING {}
            "#,
            PDF_COLUMNS
        ))
        .bind(defect_id)
        .bind(filename)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(pdf)
    }
}

/// Escape LIKE wildcards so user input only ever matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::test_pool;

    async fn seed(store: &CatalogStore, conn: &mut SqliteConnection) -> (Defect, Defect) {
        let now = Utc::now();
        let scratch = store.create_defect(conn, "Scratch", now).await.unwrap();
        store
            .add_mode(conn, scratch.id, "Linear", "Straight line across die", None, now)
            .await
            .unwrap();
        store
            .add_mode(conn, scratch.id, "Arc", "Curved line near the edge", None, now)
            .await
            .unwrap();

        let particle = store.create_defect(conn, "Particle", now).await.unwrap();
        store
            .add_mode(conn, particle.id, "Cluster", "Dense group of particles", None, now)
            .await
            .unwrap();

        (scratch, particle)
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn test_search_deduplicates_multi_mode_matches() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        let mut conn = store.acquire().await.unwrap();
        let (scratch, _) = seed(&store, &mut conn).await;

        // "line" matches both Scratch modes
        let found = store.search(&mut conn, "LINE").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, scratch.id);
    }

    #[tokio::test]
    async fn test_search_empty_query_matches_all_including_modeless() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        let mut conn = store.acquire().await.unwrap();
        seed(&store, &mut conn).await;
        store
            .create_defect(&mut conn, "Bare defect", Utc::now())
            .await
            .unwrap();

        let found = store.search(&mut conn, "").await.unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        let mut conn = store.acquire().await.unwrap();
        seed(&store, &mut conn).await;

        assert!(store.search(&mut conn, "%").await.unwrap().is_empty());
        assert!(store.search(&mut conn, "_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_matches_non_ascii_names() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        let mut conn = store.acquire().await.unwrap();
        let eclat = store
            .create_defect(&mut conn, "Éclat", Utc::now())
            .await
            .unwrap();
        store
            .create_defect(&mut conn, "Ölfleck", Utc::now())
            .await
            .unwrap();

        let found = store.search(&mut conn, "Éclat").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, eclat.id);
        // ASCII letters still fold
        assert_eq!(store.search(&mut conn, "ÉCLAT").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_pdf_replaces_existing_record() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        let mut conn = store.acquire().await.unwrap();
        let (scratch, _) = seed(&store, &mut conn).await;

        store
            .set_pdf(&mut conn, scratch.id, "a_first.pdf", Utc::now())
            .await
            .unwrap();
        store
            .set_pdf(&mut conn, scratch.id, "b_second.pdf", Utc::now())
            .await
            .unwrap();

        let pdf = store.get_pdf(&mut conn, scratch.id).await.unwrap().unwrap();
        assert_eq!(pdf.filename, "b_second.pdf");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pdf_files")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_update_mode_only_touches_given_fields() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        let mut conn = store.acquire().await.unwrap();
        let (scratch, _) = seed(&store, &mut conn).await;
        let mode = store.list_modes(&mut conn, scratch.id).await.unwrap()[0].clone();

        let updated = store
            .update_mode(
                &mut conn,
                mode.id,
                &ModeChanges {
                    image_filename: Some("x_linear.png".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.mode, mode.mode);
        assert_eq!(updated.description, mode.description);
        assert_eq!(updated.image_filename.as_deref(), Some("x_linear.png"));
    }

    #[tokio::test]
    async fn test_delete_defect_cascades() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        let mut conn = store.acquire().await.unwrap();
        let (scratch, particle) = seed(&store, &mut conn).await;
        store
            .set_pdf(&mut conn, scratch.id, "c_scratch.pdf", Utc::now())
            .await
            .unwrap();

        store.delete_defect(&mut conn, scratch.id).await.unwrap();

        assert!(matches!(
            store.get_defect(&mut conn, scratch.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.list_modes(&mut conn, scratch.id).await.unwrap().is_empty());
        assert!(store.get_pdf(&mut conn, scratch.id).await.unwrap().is_none());
        assert_eq!(store.list_modes(&mut conn, particle.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        let mut conn = store.acquire().await.unwrap();

        assert!(matches!(
            store.delete_defect(&mut conn, 42).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_mode(&mut conn, 42).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.update_mode(&mut conn, 42, &ModeChanges::default()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_image_filename_cannot_be_shared() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        let mut conn = store.acquire().await.unwrap();
        let (scratch, particle) = seed(&store, &mut conn).await;
        let now = Utc::now();

        store
            .add_mode(&mut conn, scratch.id, "Dup", "First holder", Some("same.png"), now)
            .await
            .unwrap();
        let second = store
            .add_mode(&mut conn, particle.id, "Dup", "Second holder", Some("same.png"), now)
            .await;

        assert!(matches!(second, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_rows() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);

        {
            let mut tx = store.begin().await.unwrap();
            store
                .create_defect(&mut tx, "Rolled back", Utc::now())
                .await
                .unwrap();
            // dropped without commit
        }

        let mut conn = store.acquire().await.unwrap();
        assert!(store.search(&mut conn, "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_transaction_keeps_its_snapshot() {
        let (_dir, pool) = test_pool().await;
        let store = CatalogStore::new(pool);
        {
            let mut conn = store.acquire().await.unwrap();
            seed(&store, &mut conn).await;
        }

        let mut read = store.begin_read().await.unwrap();
        let found = store.search(&mut read, "").await.unwrap();
        assert_eq!(found.len(), 2);

        let mut write = store.begin().await.unwrap();
        store.delete_defect(&mut write, found[1].id).await.unwrap();
        write.commit().await.unwrap();

        // The delete committed after the snapshot was taken
        let detail = store.get_detail(&mut read, found[1].id).await.unwrap();
        assert_eq!(detail.defect.name, "Particle");
        assert_eq!(detail.modes.len(), 1);
        read.commit().await.unwrap();

        let mut conn = store.acquire().await.unwrap();
        assert_eq!(store.search(&mut conn, "").await.unwrap().len(), 1);
    }
}
