use centavo_core::schema::{GeneratedTip, NewTip};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use crate::{Store, StoreError};

/// Number of tips returned to clients.
pub const TIP_LIMIT: i64 = 5;

#[derive(FromRow)]
struct TipRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    tip_type: String,
    text: String,
    model_source: String,
    relevance: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<TipRow> for GeneratedTip {
    type Error = StoreError;

    fn try_from(row: TipRow) -> Result<Self, Self::Error> {
        Ok(GeneratedTip {
            id: row.id,
            tip_type: row.tip_type.parse()?,
            text: row.text,
            model_source: row.model_source,
            relevance: row.relevance,
            created_at: row.created_at,
        })
    }
}

impl Store {
    /// The user's most relevant tips, newest first among equals.
    pub async fn list_tips(&self, user_id: Uuid) -> Result<Vec<GeneratedTip>, StoreError> {
        let rows: Vec<TipRow> = sqlx::query_as(
            "SELECT id, type, text, model_source, relevance, created_at
             FROM generated_tips
             WHERE user_id = $1
             ORDER BY relevance DESC, created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(TIP_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GeneratedTip::try_from).collect()
    }

    /// Replace every stored tip of the user with `tips` in one transaction,
    /// then return the new top tips.
    pub async fn replace_tips(
        &self,
        user_id: Uuid,
        tips: &[NewTip],
    ) -> Result<Vec<GeneratedTip>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM generated_tips WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for tip in tips {
            sqlx::query(
                "INSERT INTO generated_tips (id, user_id, type, text, model_source, relevance)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(tip.tip_type.as_str())
            .bind(&tip.text)
            .bind(&tip.model_source)
            .bind(tip.relevance.clamp(0, 100))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            "Replaced {} tips with {} for user {}",
            removed,
            tips.len(),
            user_id
        );

        self.list_tips(user_id).await
    }
}
