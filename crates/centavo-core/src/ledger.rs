//! Token usage bookkeeping: cost estimation and ledger records.
//!
//! Entries are append-only. Nothing in this crate or the store updates or
//! deletes an entry once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::schema::RequestType;

pub const PROMPT_RATE_ENV: &str = "GEMINI_PROMPT_COST_PER_1K_CENTS";
pub const RESPONSE_RATE_ENV: &str = "GEMINI_RESPONSE_COST_PER_1K_CENTS";

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Token counts reported by the model for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    pub prompt: i64,
    pub response: i64,
    pub total: i64,
}

/// Cents charged per 1000 prompt and response tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostRates {
    pub prompt_per_1k: f64,
    pub response_per_1k: f64,
}

impl CostRates {
    pub fn new(prompt_per_1k: f64, response_per_1k: f64) -> Self {
        Self {
            prompt_per_1k,
            response_per_1k,
        }
    }

    /// Read both rates from the environment. Unset values count as zero;
    /// unparsable values are logged and also count as zero.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            prompt_per_1k: read_rate(PROMPT_RATE_ENV, lookup(PROMPT_RATE_ENV)),
            response_per_1k: read_rate(RESPONSE_RATE_ENV, lookup(RESPONSE_RATE_ENV)),
        }
    }

    /// Estimated cost in whole cents, rounded to nearest. Non-positive totals are 0.
    pub fn estimate_cents(&self, counts: TokenCounts) -> i64 {
        let prompt = counts.prompt as f64 / 1000.0 * self.prompt_per_1k;
        let response = counts.response as f64 / 1000.0 * self.response_per_1k;
        let total = prompt + response;
        if total.is_nan() || total <= 0.0 {
            return 0;
        }
        total.round() as i64
    }
}

fn read_rate(key: &str, raw: Option<String>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            warn!("Invalid value for {}: {:?}, using 0", key, raw);
            0.0
        }
    }
}

/// A ledger entry about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTokenUsage {
    pub user_id: Uuid,
    pub request_type: RequestType,
    pub request_id: Uuid,
    pub counts: TokenCounts,
    pub cost_in_cents: i64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NewTokenUsage {
    /// Price the call and give it a fresh correlation id.
    pub fn new(
        user_id: Uuid,
        request_type: RequestType,
        counts: TokenCounts,
        rates: &CostRates,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            user_id,
            request_type,
            request_id: Uuid::new_v4(),
            counts,
            cost_in_cents: rates.estimate_cents(counts),
            metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageEntry {
    pub id: Uuid,
    pub request_type: RequestType,
    pub request_id: Uuid,
    pub prompt_tokens: i64,
    pub response_tokens: i64,
    pub total_tokens: i64,
    pub cost_in_cents: i64,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Sums over every entry a user has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageSummary {
    pub total_prompt_tokens: i64,
    pub total_response_tokens: i64,
    pub total_tokens: i64,
    pub total_cost_cents: i64,
}

/// Raw `limit`/`page` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

/// Clamped pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub page: i64,
}

impl PageRequest {
    pub fn from_query(query: PageQuery) -> Self {
        let limit = match query.limit {
            Some(limit) if limit > 0 => limit.min(MAX_PAGE_LIMIT),
            _ => DEFAULT_PAGE_LIMIT,
        };
        let page = query.page.unwrap_or(1).max(1);
        Self { limit, page }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::from_query(PageQuery::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_entries: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenUsagePage {
    pub entries: Vec<TokenUsageEntry>,
    pub summary: TokenUsageSummary,
    pub pagination: Pagination,
}
