use crate::db::{
    errors::{DbError, Result},
    models::generations::{
        GenerationCreateDBRequest, GenerationDBResponse, GenerationOutput, GenerationStatus,
    },
};
use crate::types::{GenerationId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

// Database entity model for a generation row. Status is stored as text and
// parsed into the domain enum on the way out.
#[derive(Debug, Clone, FromRow)]
struct GenerationRow {
    pub id: GenerationId,
    pub user_id: UserId,
    pub prompt: String,
    pub optimized_prompt: Option<String>,
    pub model: String,
    pub status: String,
    pub image_url: Option<String>,
    pub image_b64: Option<String>,
    pub error_message: Option<String>,
    pub points_used: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<GenerationRow> for GenerationDBResponse {
    type Error = DbError;

    fn try_from(row: GenerationRow) -> Result<Self> {
        let status: GenerationStatus = row
            .status
            .parse()
            .map_err(|e: String| DbError::Other(anyhow::anyhow!(e)))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            prompt: row.prompt,
            optimized_prompt: row.optimized_prompt,
            model: row.model,
            status,
            image_url: row.image_url,
            image_b64: row.image_b64,
            error_message: row.error_message,
            points_used: row.points_used,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

const GENERATION_COLUMNS: &str = "id, user_id, prompt, optimized_prompt, model, status, \
     image_url, image_b64, error_message, points_used, created_at, completed_at";

pub struct Generations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Generations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert one record in `processing` state
    pub async fn create(&mut self, request: &GenerationCreateDBRequest) -> Result<GenerationDBResponse> {
        let row = sqlx::query_as::<_, GenerationRow>(&format!(
            "INSERT INTO generations (user_id, prompt, optimized_prompt, model, status)
             VALUES ($1, $2, $3, $4, 'processing')
             RETURNING {GENERATION_COLUMNS}"
        ))
        .bind(request.user_id)
        .bind(&request.prompt)
        .bind(&request.optimized_prompt)
        .bind(&request.model)
        .fetch_one(&mut *self.db)
        .await?;

        row.try_into()
    }

    /// Fetch a record by id
    pub async fn get(&mut self, id: GenerationId) -> Result<Option<GenerationDBResponse>> {
        let row = sqlx::query_as::<_, GenerationRow>(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Mark a record completed with its image output and completion timestamp
    pub async fn mark_completed(
        &mut self,
        id: GenerationId,
        output: &GenerationOutput,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let (image_url, image_b64) = match output {
            GenerationOutput::Url(url) => (Some(url.as_str()), None),
            GenerationOutput::Inline(b64) => (None, Some(b64.as_str())),
        };

        sqlx::query(
            "UPDATE generations
             SET status = 'completed', image_url = $2, image_b64 = $3, completed_at = $4
             WHERE id = $1",
        )
        .bind(id)
        .bind(image_url)
        .bind(image_b64)
        .bind(completed_at)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Mark a record failed with a human-readable error message
    pub async fn mark_failed(&mut self, id: GenerationId, error_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE generations
             SET status = 'failed', error_message = $2, points_used = 0
             WHERE id = $1",
        )
        .bind(id)
        .bind(error_message)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Record the settled batch charge on a record
    pub async fn set_points_used(&mut self, id: GenerationId, points: i64) -> Result<()> {
        sqlx::query("UPDATE generations SET points_used = $2 WHERE id = $1")
            .bind(id)
            .bind(points)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// List an account's records newest-first with pagination
    pub async fn list(
        &mut self,
        user_id: UserId,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<GenerationDBResponse>> {
        let rows = sqlx::query_as::<_, GenerationRow>(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generations
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             OFFSET $2 LIMIT $3"
        ))
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Count an account's records
    pub async fn count(&mut self, user_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM generations WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Delete records by id, restricted to the owning account.
    /// Returns how many rows were removed.
    pub async fn delete_owned(&mut self, user_id: UserId, ids: &[GenerationId]) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM generations WHERE user_id = $1 AND id = ANY($2)",
        )
        .bind(user_id)
        .bind(ids)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete all of an account's records. Returns how many rows were removed.
    pub async fn clear_owned(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM generations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
