use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use centavo_core::insight::MealPlanRequest;
use centavo_core::schema::MealPlan;
use centavo_core::{IsoWeek, RequestType};
use serde::Deserialize;
use serde_json::json;

use super::{parse_body, track};
use crate::auth::AuthUser;
use crate::error::{success, ApiError, Envelope};
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    week: Option<String>,
}

/// A blank or missing week means the current one.
fn resolve_week(raw: Option<&str>) -> Result<IsoWeek, ApiError> {
    match raw.map(str::trim).filter(|w| !w.is_empty()) {
        None => Ok(IsoWeek::current()),
        Some(week) => week
            .parse::<IsoWeek>()
            .map_err(|e| ApiError::bad_request("semana inválida").with_details(e)),
    }
}

pub async fn get_meal_plan(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Envelope<MealPlan>>, ApiError> {
    let week = resolve_week(query.week.as_deref())?;
    let plan = state
        .store
        .load_meal_plan(user.id, &week)
        .await
        .map_err(|e| ApiError::store("erro ao carregar plano", e))?
        .ok_or_else(|| {
            ApiError::not_found("plano não encontrado")
                .with_details(format!("nenhum plano salvo para {}", week))
        })?;
    Ok(success("plano", plan))
}

pub async fn generate_meal_plan(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<Envelope<MealPlan>>, ApiError> {
    let request: MealPlanRequest = parse_body(&body)?;
    let week = resolve_week(request.week.as_deref())?;

    let context = state
        .store
        .meal_plan_context(user.id, &week)
        .await
        .map_err(|e| ApiError::store("erro ao carregar histórico", e))?;

    let cancel = state.shutdown.child_token();
    let advice = state
        .advisor
        .meal_plan(&user, &week, &request, &context, &cancel)
        .await;

    let plan = state
        .store
        .replace_meal_plan(user.id, &week, &advice.value)
        .await
        .map_err(|e| ApiError::store("erro ao persistir plano", e))?;

    let metadata = json!({
        "isoWeek": week.to_string(),
        "items": plan.items.len(),
        "calorieGoal": plan.calorie_goal,
        "estimatedCost": plan.estimated_cost,
        "model": advice.source.model_name(),
    });
    track(&state, user.id, RequestType::MealPlan, &advice, metadata).await;

    Ok(success(
        format!("plano gerado via {}", advice.source.label()),
        plan,
    ))
}
