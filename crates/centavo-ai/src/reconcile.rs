//! Reconciliation of model JSON into validated domain records.
//!
//! Inputs are expected to be sanitized already (see [`crate::sanitize_json`]).
//! Numbers may arrive as JSON numbers or numeric strings, and any field may be
//! missing or null. Items with an unrecognized day, meal type or tip type, or
//! with a blank title, are dropped individually.

use centavo_core::heuristics::FALLBACK_MEAL_COST;
use centavo_core::normalize::{self, clamp_confidence, clamp_relevance, round2};
use centavo_core::receipt::{choose_date, ReceiptExtraction, ReceiptItem};
use centavo_core::{heuristics, schema::*};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::error::AiError;

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    if text.trim().is_empty() {
        return Err(AiError::Parse("empty model response".to_string()));
    }
    serde_json::from_str(text).map_err(|e| AiError::Parse(e.to_string()))
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(values)) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => vec![s],
        _ => Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Tips
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TipsPayload {
    tips: Vec<RawTip>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTip {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    tip_type: String,
    #[serde(deserialize_with = "lenient_string")]
    message: String,
    #[serde(deserialize_with = "lenient_f64")]
    relevance: Option<f64>,
}

/// Parse `{"tips":[{type, message, relevance}]}` into tips attributed to `model`.
pub fn reconcile_tips(text: &str, model: &str) -> Result<Vec<NewTip>, AiError> {
    let payload: TipsPayload = parse_json(text)?;
    if payload.tips.is_empty() {
        return Err(AiError::NoItems("tips"));
    }

    let received = payload.tips.len();
    let tips: Vec<NewTip> = payload
        .tips
        .into_iter()
        .filter_map(|raw| {
            let text = raw.message.trim();
            if text.is_empty() {
                return None;
            }
            let Some(tip_type) = normalize::tip_type(&raw.tip_type) else {
                debug!("Dropping tip with unknown type {:?}", raw.tip_type);
                return None;
            };
            Some(NewTip {
                tip_type,
                text: text.to_string(),
                model_source: model.to_string(),
                relevance: clamp_relevance(raw.relevance.unwrap_or(0.0)),
            })
        })
        .collect();

    debug!("Reconciled {}/{} tips", tips.len(), received);
    if tips.is_empty() {
        return Err(AiError::NoItems("tips"));
    }
    Ok(tips)
}

// ---------------------------------------------------------------------------
// Meal plans
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MealPlanPayload {
    #[serde(deserialize_with = "lenient_f64")]
    estimated_cost: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    calorie_goal: Option<f64>,
    meals: Vec<RawMeal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawMeal {
    #[serde(deserialize_with = "lenient_string")]
    day: String,
    #[serde(deserialize_with = "lenient_string")]
    meal_type: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_strings")]
    ingredients: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    instructions: String,
    #[serde(deserialize_with = "lenient_f64")]
    estimated_cost: Option<f64>,
}

impl RawMeal {
    fn into_item(self) -> Option<MealItemDraft> {
        let day = normalize::meal_day(&self.day)?;
        let meal_type = normalize::meal_type(&self.meal_type)?;
        let title = self.title.trim();
        if title.is_empty() {
            return None;
        }
        Some(MealItemDraft {
            day,
            meal_type,
            title: title.to_string(),
            estimated_cost: round2(self.estimated_cost.unwrap_or(0.0)),
            ingredients: normalize::clean_strings(&self.ingredients),
            instructions: self.instructions.trim().to_string(),
        })
    }
}

/// Parse a generated meal plan.
///
/// The calorie goal comes from the payload when positive, then from
/// `requested_calorie_goal` when positive, then the default. A missing plan
/// cost is estimated per item.
pub fn reconcile_meal_plan(
    text: &str,
    requested_calorie_goal: Option<i32>,
) -> Result<MealPlanDraft, AiError> {
    let payload: MealPlanPayload = parse_json(text)?;
    if payload.meals.is_empty() {
        return Err(AiError::NoItems("meals"));
    }

    let received = payload.meals.len();
    let items: Vec<MealItemDraft> = payload
        .meals
        .into_iter()
        .filter_map(RawMeal::into_item)
        .collect();
    debug!("Reconciled {}/{} meals", items.len(), received);
    if items.is_empty() {
        return Err(AiError::NoItems("meals"));
    }

    let calorie_goal = payload
        .calorie_goal
        .map(|goal| goal.round())
        .filter(|goal| *goal > 0.0 && *goal <= f64::from(i32::MAX))
        .map(|goal| goal as i32)
        .or(requested_calorie_goal.filter(|goal| *goal > 0))
        .unwrap_or(heuristics::DEFAULT_CALORIE_GOAL);

    let estimated_cost = match payload.estimated_cost.map(round2) {
        Some(cost) if cost > 0.0 => cost,
        _ => round2(items.len() as f64 * FALLBACK_MEAL_COST),
    };

    Ok(MealPlanDraft {
        calorie_goal,
        estimated_cost,
        generated_by_ai: true,
        items,
    })
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReceiptPayload {
    #[serde(deserialize_with = "lenient_f64")]
    total: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    currency: String,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    date: String,
    items: Vec<RawReceiptItem>,
    #[serde(deserialize_with = "lenient_string")]
    raw_text: String,
    #[serde(rename = "rawText", deserialize_with = "lenient_string")]
    raw_text_alt: String,
    #[serde(deserialize_with = "lenient_string")]
    notes: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawReceiptItem {
    #[serde(deserialize_with = "lenient_string")]
    description: String,
    #[serde(deserialize_with = "lenient_f64")]
    quantity: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    unit_price: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    total: Option<f64>,
}

/// Parse a receipt extraction, filling gaps from the amount hint and the
/// size heuristics.
pub fn reconcile_receipt(
    text: &str,
    image_size: usize,
    currency: &str,
    amount_hint: Option<f64>,
) -> Result<ReceiptExtraction, AiError> {
    let payload: ReceiptPayload = parse_json(text)?;

    let suggested_amount = match payload.total {
        Some(total) if total > 0.0 => total,
        _ => match amount_hint {
            Some(hint) if hint > 0.0 => hint,
            _ => heuristics::receipt_amount(image_size),
        },
    };

    let confidence = match payload.confidence.map(clamp_confidence) {
        Some(confidence) if confidence > 0.0 => confidence,
        _ => heuristics::receipt_confidence(image_size),
    };

    let extracted_text = [&payload.raw_text, &payload.raw_text_alt, &payload.notes]
        .into_iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string();

    let items = payload
        .items
        .into_iter()
        .filter_map(|item| {
            let description = item.description.trim();
            if description.is_empty() {
                return None;
            }
            Some(ReceiptItem {
                description: description.to_string(),
                quantity: round2(item.quantity.unwrap_or(0.0)),
                unit_price: round2(item.unit_price.unwrap_or(0.0)),
                total: round2(item.total.unwrap_or(0.0)),
            })
        })
        .collect();

    let detected_currency = payload.currency.trim().to_uppercase();
    let currency = if detected_currency.is_empty() {
        currency.to_string()
    } else {
        detected_currency
    };

    Ok(ReceiptExtraction {
        suggested_amount: round2(suggested_amount),
        suggested_date: choose_date(&payload.date),
        currency,
        extracted_text,
        items,
        confidence: round2(confidence),
    })
}
