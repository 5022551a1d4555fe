use axum::extract::{Query, State};
use axum::{Extension, Json};
use centavo_ai::Source;
use centavo_core::insight::{MonthPeriod, UserProfile};
use centavo_core::schema::GeneratedTip;
use centavo_core::RequestType;
use centavo_store::StoreError;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::{parse_or, track};
use crate::auth::AuthUser;
use crate::error::{success, ApiError, Envelope};
use crate::state::{AppState, SharedState};

/// `month`/`year` default to the current month; unparsable values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct TipsQuery {
    month: Option<String>,
    year: Option<String>,
    refresh: Option<String>,
}

impl TipsQuery {
    fn period(&self) -> Result<MonthPeriod, ApiError> {
        let now = MonthPeriod::current();
        let month = parse_or(self.month.as_deref(), now.month);
        let year = parse_or(self.year.as_deref(), now.year);
        MonthPeriod::new(month, year).ok_or_else(|| {
            ApiError::bad_request("período inválido")
                .with_details(format!("mês {} de {} fora do intervalo", month, year))
        })
    }

    fn refresh(&self) -> bool {
        self.refresh
            .as_deref()
            .is_some_and(|r| r.trim().eq_ignore_ascii_case("true"))
    }
}

pub async fn list_tips(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<TipsQuery>,
) -> Result<Json<Envelope<Vec<GeneratedTip>>>, ApiError> {
    let period = query.period()?;
    let stored = state
        .store
        .list_tips(user.id)
        .await
        .map_err(|e| ApiError::store("erro ao carregar dicas", e))?;

    if !query.refresh() && !stored.is_empty() {
        return Ok(success("dicas", stored));
    }

    match regenerate(&state, &user, period).await {
        Ok((tips, _)) => Ok(success("dicas", tips)),
        Err(e) if !stored.is_empty() => {
            warn!("Tip refresh failed for user {}, serving stored tips: {}", user.id, e);
            Ok(success("dicas", stored))
        }
        Err(e) => Err(ApiError::store("não foi possível gerar dicas", e)),
    }
}

pub async fn generate_tips(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<TipsQuery>,
) -> Result<Json<Envelope<Vec<GeneratedTip>>>, ApiError> {
    let period = query.period()?;
    let (tips, source) = regenerate(&state, &user, period)
        .await
        .map_err(|e| ApiError::store("não foi possível gerar dicas", e))?;
    Ok(success(format!("dicas geradas via {}", source.label()), tips))
}

/// Replace the user's tips with a fresh set for `period`.
async fn regenerate(
    state: &AppState,
    user: &UserProfile,
    period: MonthPeriod,
) -> Result<(Vec<GeneratedTip>, Source), StoreError> {
    let snapshot = state.store.spending_snapshot(user.id, period).await?;
    let cancel = state.shutdown.child_token();
    let advice = state.advisor.tips(user, &snapshot, &cancel).await;

    let tips = state.store.replace_tips(user.id, &advice.value).await?;

    let metadata = json!({
        "month": period.month,
        "year": period.year,
        "tipsGenerated": advice.value.len(),
        "model": advice.source.model_name(),
    });
    track(state, user.id, RequestType::Insight, &advice, metadata).await;

    Ok((tips, advice.source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn query(month: Option<&str>, year: Option<&str>, refresh: Option<&str>) -> TipsQuery {
        TipsQuery {
            month: month.map(String::from),
            year: year.map(String::from),
            refresh: refresh.map(String::from),
        }
    }

    #[test]
    fn period_defaults_to_current_month() {
        assert_eq!(query(None, None, None).period().unwrap(), MonthPeriod::current());
        assert_eq!(
            query(Some("abc"), Some(""), None).period().unwrap(),
            MonthPeriod::current()
        );
    }

    #[test]
    fn explicit_period() {
        let period = query(Some("2"), Some("2024"), None).period().unwrap();
        assert_eq!(period, MonthPeriod::new(2, 2024).unwrap());
    }

    #[test]
    fn out_of_range_month_is_rejected() {
        let err = query(Some("13"), Some("2024"), None).period().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "período inválido");
    }

    #[test]
    fn refresh_flag_is_case_insensitive() {
        assert!(query(None, None, Some("TRUE")).refresh());
        assert!(query(None, None, Some("true")).refresh());
        assert!(!query(None, None, Some("1")).refresh());
        assert!(!query(None, None, None).refresh());
    }
}
