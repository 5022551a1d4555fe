use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use centavo_ai::ReceiptScan;
use centavo_core::insight::UserProfile;
use centavo_core::receipt::{split_data_url, ReceiptExtraction};
use centavo_core::schema::ExpenseOrigin;
use centavo_core::RequestType;
use centavo_store::SavedReceipt;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{parse_body, track};
use crate::auth::AuthUser;
use crate::error::{success, ApiError, Envelope};
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanRequest {
    image_base64: String,
    currency: Option<String>,
    amount_hint: Option<f64>,
    locale: Option<String>,
    return_raw: bool,
}

impl ScanRequest {
    fn currency(&self, user: &UserProfile) -> String {
        self.currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| user.currency.clone())
    }

    fn locale(&self, user: &UserProfile) -> String {
        self.locale
            .as_deref()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| user.language.clone())
    }
}

/// The expense created from a scanned receipt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedExpense {
    id: Uuid,
    category_id: Uuid,
    receipt_id: Uuid,
    description: String,
    amount: f64,
    date: NaiveDate,
    origin: ExpenseOrigin,
}

impl SavedExpense {
    fn new(saved: SavedReceipt, extraction: &ReceiptExtraction) -> Self {
        Self {
            id: saved.expense_id,
            category_id: saved.category_id,
            receipt_id: saved.receipt_id,
            description: extraction.expense_description(),
            amount: extraction.suggested_amount.max(0.0),
            date: extraction.suggested_date,
            origin: ExpenseOrigin::Ocr,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    #[serde(flatten)]
    extraction: ReceiptExtraction,
    tokens_used: i64,
    token_cost_cents: i64,
    model: String,
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_model_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_expense: Option<SavedExpense>,
}

/// Split and decode the submitted image. Returns the MIME type, the bare
/// base64 payload and the decoded size.
fn decode_image(raw: &str) -> Result<(String, &str, usize), ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::bad_request("imagem é obrigatória"));
    }
    let (mime_type, payload) = split_data_url(raw);
    if payload.is_empty() {
        return Err(ApiError::bad_request("imagem inválida").with_details("payload base64 vazio"));
    }
    let data = STANDARD
        .decode(payload)
        .map_err(|e| ApiError::bad_request("imagem inválida").with_details(e))?;
    Ok((mime_type, payload, data.len()))
}

pub async fn scan_receipt(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<Envelope<ScanResponse>>, ApiError> {
    let request: ScanRequest = parse_body(&body)?;
    let (mime_type, payload, image_size) = decode_image(&request.image_base64)?;
    let currency = request.currency(&user);
    let locale = request.locale(&user);

    let scan = ReceiptScan {
        image_base64: payload,
        mime_type: &mime_type,
        image_size,
        currency: &currency,
        locale: &locale,
        amount_hint: request.amount_hint,
    };
    let cancel = state.shutdown.child_token();
    let advice = state.advisor.receipt(&scan, &cancel).await;

    // Heuristic estimates are returned but never stored as expenses.
    let saved = if advice.source.is_model() {
        let saved = state
            .store
            .save_receipt(user.id, &advice.value, advice.raw_output.as_deref())
            .await
            .map_err(|e| ApiError::store("não foi possível salvar o recibo", e))?;
        Some(saved)
    } else {
        None
    };

    let metadata = json!({
        "currency": advice.value.currency,
        "locale": locale,
        "mimeType": mime_type,
        "itemsDetected": advice.value.items.len(),
        "returnRaw": request.return_raw,
        "hasAmountHint": request.amount_hint.is_some(),
        "model": advice.source.model_name(),
        "expenseId": saved.map(|s| s.expense_id),
    });
    let token_cost_cents = track(&state, user.id, RequestType::Receipt, &advice, metadata)
        .await
        .unwrap_or(0);

    let saved_expense = saved.map(|s| SavedExpense::new(s, &advice.value));
    let response = ScanResponse {
        tokens_used: advice.usage.map(|u| u.total).unwrap_or(0),
        token_cost_cents,
        model: advice.source.model_name().to_string(),
        source: advice.source.label(),
        raw_model_output: advice.raw_output.filter(|_| request.return_raw),
        saved_expense,
        extraction: advice.value,
    };
    Ok(success("recebido", response))
}
