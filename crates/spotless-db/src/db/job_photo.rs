use chrono::Utc;
use spotless_core::models::{JobPhoto, NewJobPhoto};
use spotless_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, booking_id, customer_id, cleaner_id, file_path, category, \
                              postcode, booking_date, annotation, created_at";

/// Postgres access to `job_photos`.
#[derive(Clone)]
pub struct JobPhotoRepository {
    pool: PgPool,
}

impl JobPhotoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(
        skip(self, photo),
        fields(db.table = "job_photos", db.operation = "insert", booking_id = %photo.booking_id)
    )]
    pub async fn insert(&self, photo: NewJobPhoto) -> Result<JobPhoto, AppError> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        let row = sqlx::query_as::<Postgres, JobPhoto>(&format!(
            r#"
            INSERT INTO job_photos
                (id, booking_id, customer_id, cleaner_id, file_path, category,
                 postcode, booking_date, annotation, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(photo.booking_id)
        .bind(photo.customer_id)
        .bind(photo.cleaner_id)
        .bind(&photo.file_path)
        .bind(photo.category)
        .bind(&photo.postcode)
        .bind(photo.booking_date)
        .bind(&photo.annotation)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// All photos of a booking, newest first.
    #[tracing::instrument(skip(self), fields(db.table = "job_photos", db.operation = "select"))]
    pub async fn list_by_booking(&self, booking_id: Uuid) -> Result<Vec<JobPhoto>, AppError> {
        let rows = sqlx::query_as::<Postgres, JobPhoto>(&format!(
            "SELECT {} FROM job_photos WHERE booking_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "job_photos", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<JobPhoto>, AppError> {
        let row = sqlx::query_as::<Postgres, JobPhoto>(&format!(
            "SELECT {} FROM job_photos WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Returns whether a row was removed.
    #[tracing::instrument(skip(self), fields(db.table = "job_photos", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let rows_affected = sqlx::query("DELETE FROM job_photos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}
