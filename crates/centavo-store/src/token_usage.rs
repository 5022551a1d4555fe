//! Append-only token usage ledger. Entries are inserted and read, never
//! updated or deleted.

use centavo_core::ledger::{
    NewTokenUsage, PageRequest, Pagination, TokenUsageEntry, TokenUsagePage, TokenUsageSummary,
};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{Store, StoreError};

#[derive(FromRow)]
struct EntryRow {
    id: Uuid,
    request_type: String,
    request_id: Uuid,
    prompt_tokens: i64,
    response_tokens: i64,
    total_tokens: i64,
    cost_in_cents: i64,
    metadata: Json<serde_json::Map<String, serde_json::Value>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for TokenUsageEntry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(TokenUsageEntry {
            id: row.id,
            request_type: row.request_type.parse()?,
            request_id: row.request_id,
            prompt_tokens: row.prompt_tokens,
            response_tokens: row.response_tokens,
            total_tokens: row.total_tokens,
            cost_in_cents: row.cost_in_cents,
            metadata: row.metadata.0,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct SummaryRow {
    total_prompt_tokens: i64,
    total_response_tokens: i64,
    total_tokens: i64,
    total_cost_cents: i64,
    total_entries: i64,
}

impl Store {
    pub async fn record_usage(&self, usage: &NewTokenUsage) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO token_usages
                (id, user_id, request_type, request_id, prompt_tokens, response_tokens,
                 total_tokens, cost_in_cents, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(usage.user_id)
        .bind(usage.request_type.as_str())
        .bind(usage.request_id)
        .bind(usage.counts.prompt)
        .bind(usage.counts.response)
        .bind(usage.counts.total)
        .bind(usage.cost_in_cents)
        .bind(Json(&usage.metadata))
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// One page of entries, newest first, with sums over all of the user's entries.
    pub async fn usage_page(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<TokenUsagePage, StoreError> {
        let summary: SummaryRow = sqlx::query_as(
            "SELECT COALESCE(SUM(prompt_tokens), 0)::BIGINT AS total_prompt_tokens,
                    COALESCE(SUM(response_tokens), 0)::BIGINT AS total_response_tokens,
                    COALESCE(SUM(total_tokens), 0)::BIGINT AS total_tokens,
                    COALESCE(SUM(cost_in_cents), 0)::BIGINT AS total_cost_cents,
                    COUNT(*) AS total_entries
             FROM token_usages
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT id, request_type, request_id, prompt_tokens, response_tokens,
                    total_tokens, cost_in_cents, metadata, created_at
             FROM token_usages
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(TokenUsagePage {
            entries: rows
                .into_iter()
                .map(TokenUsageEntry::try_from)
                .collect::<Result<_, _>>()?,
            summary: TokenUsageSummary {
                total_prompt_tokens: summary.total_prompt_tokens,
                total_response_tokens: summary.total_response_tokens,
                total_tokens: summary.total_tokens,
                total_cost_cents: summary.total_cost_cents,
            },
            pagination: Pagination {
                page: page.page,
                limit: page.limit,
                total_entries: summary.total_entries,
            },
        })
    }
}
