//! Receipt scan results and the input helpers around them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::heuristics;
use crate::normalize::round2;

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";
pub const OCR_CATEGORY_NAME: &str = "Compras OCR";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
}

/// Structured data pulled out of a receipt image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptExtraction {
    pub suggested_amount: f64,
    pub suggested_date: NaiveDate,
    pub currency: String,
    pub extracted_text: String,
    pub items: Vec<ReceiptItem>,
    pub confidence: f64,
}

impl ReceiptExtraction {
    /// Size-based estimate used when no model output is available.
    pub fn fallback(image_size: usize, currency: &str, amount_hint: Option<f64>) -> Self {
        let suggested_amount = match amount_hint {
            Some(hint) if hint > 0.0 => round2(hint),
            _ => heuristics::receipt_amount(image_size),
        };
        Self {
            suggested_amount,
            suggested_date: Utc::now().date_naive(),
            currency: currency.to_string(),
            extracted_text: String::new(),
            items: Vec::new(),
            confidence: round2(heuristics::receipt_confidence(image_size)),
        }
    }

    /// Description used for the expense created from this receipt.
    pub fn expense_description(&self) -> String {
        format!("Compra no mercado ({})", self.suggested_date.format("%d/%m"))
    }
}

/// Split an optional `data:<mime>;base64,` prefix from the payload.
///
/// Plain base64 yields [`DEFAULT_MIME_TYPE`]. The payload is trimmed.
pub fn split_data_url(raw: &str) -> (String, &str) {
    let Some((prefix, payload)) = raw.split_once(',') else {
        return (DEFAULT_MIME_TYPE.to_string(), raw.trim());
    };
    let mime = prefix
        .strip_prefix("data:")
        .map(|rest| rest.split(';').next().unwrap_or(rest).trim())
        .filter(|mime| !mime.is_empty())
        .unwrap_or(DEFAULT_MIME_TYPE);
    (mime.to_string(), payload.trim())
}

/// Parse a date in any of the layouts receipts commonly use, falling back to today.
pub fn choose_date(value: &str) -> NaiveDate {
    parse_receipt_date(value).unwrap_or_else(|| Utc::now().date_naive())
}

fn parse_receipt_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.date_naive());
    }
    ["%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(trimmed, layout).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_data_url_extracts_mime() {
        let (mime, payload) = split_data_url("data:image/png;base64, QUJD ");
        assert_eq!(mime, "image/png");
        assert_eq!(payload, "QUJD");
    }

    #[test]
    fn split_plain_base64_defaults_to_jpeg() {
        let (mime, payload) = split_data_url("  QUJD\n");
        assert_eq!(mime, "image/jpeg");
        assert_eq!(payload, "QUJD");
    }

    #[test]
    fn split_data_url_without_base64_marker() {
        let (mime, payload) = split_data_url("data:image/webp,QUJD");
        assert_eq!(mime, "image/webp");
        assert_eq!(payload, "QUJD");
    }

    #[test]
    fn choose_date_accepts_known_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(choose_date("2024-03-09"), expected);
        assert_eq!(choose_date("2024-03-09T14:30:00-03:00"), expected);
        assert_eq!(choose_date("09/03/2024"), expected);
        assert_eq!(choose_date("09-03-2024"), expected);
    }

    #[test]
    fn choose_date_falls_back_to_today() {
        let today = Utc::now().date_naive();
        let chosen = choose_date("ontem");
        // Allow for a midnight rollover between the two calls.
        assert!(chosen == today || chosen == Utc::now().date_naive());
        assert!(choose_date("").signed_duration_since(today).num_days().abs() <= 1);
    }

    #[test]
    fn fallback_prefers_positive_hint() {
        let extraction = ReceiptExtraction::fallback(500, "BRL", Some(42.556));
        assert_eq!(extraction.suggested_amount, 42.56);
        assert!(extraction.items.is_empty());

        let extraction = ReceiptExtraction::fallback(500, "BRL", Some(0.0));
        assert_eq!(extraction.suggested_amount, 19.75);
    }

    #[test]
    fn expense_description_uses_day_and_month() {
        let mut extraction = ReceiptExtraction::fallback(0, "BRL", None);
        extraction.suggested_date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(extraction.expense_description(), "Compra no mercado (09/03)");
    }
}
