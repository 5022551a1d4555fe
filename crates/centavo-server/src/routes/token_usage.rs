use axum::extract::{Query, State};
use axum::{Extension, Json};
use centavo_core::ledger::{PageQuery, PageRequest, TokenUsagePage};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{success, ApiError, Envelope};
use crate::state::SharedState;

/// Raw query strings, so that garbage falls back to defaults instead of a 400.
#[derive(Debug, Default, Deserialize)]
pub struct UsageQuery {
    limit: Option<String>,
    page: Option<String>,
}

impl UsageQuery {
    fn page_request(&self) -> PageRequest {
        PageRequest::from_query(PageQuery {
            limit: self.limit.as_deref().and_then(|l| l.trim().parse().ok()),
            page: self.page.as_deref().and_then(|p| p.trim().parse().ok()),
        })
    }
}

pub async fn list_token_usage(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<Envelope<TokenUsagePage>>, ApiError> {
    let page = state
        .store
        .usage_page(user.id, query.page_request())
        .await
        .map_err(|e| ApiError::store("erro ao carregar consumo de tokens", e))?;
    Ok(success("consumo de tokens", page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: &str, page: &str) -> UsageQuery {
        UsageQuery {
            limit: Some(limit.to_string()),
            page: Some(page.to_string()),
        }
    }

    #[test]
    fn defaults_when_absent_or_garbage() {
        assert_eq!(UsageQuery::default().page_request(), PageRequest::default());
        assert_eq!(query("abc", "x").page_request(), PageRequest::default());
    }

    #[test]
    fn limits_are_clamped() {
        let request = query("1000", "0").page_request();
        assert_eq!(request.limit, 200);
        assert_eq!(request.page, 1);

        let request = query("20", "3").page_request();
        assert_eq!(request.limit, 20);
        assert_eq!(request.page, 3);
        assert_eq!(request.offset(), 40);
    }
}
