use centavo_core::receipt::{ReceiptExtraction, OCR_CATEGORY_NAME};
use centavo_core::schema::{CategoryType, ExpenseOrigin};
use chrono::NaiveTime;
use tracing::info;
use uuid::Uuid;

use crate::{Store, StoreError};

const OCR_CATEGORY_ICON: &str = "shopping_cart";
const OCR_CATEGORY_COLOR: &str = "#2E7D32";
const OCR_CATEGORY_ORDER: i32 = 999;

/// Identifiers of the rows written for a scanned receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedReceipt {
    pub expense_id: Uuid,
    pub receipt_id: Uuid,
    pub category_id: Uuid,
}

impl Store {
    /// Record a scanned receipt as an OCR expense with its line items.
    ///
    /// Creates the user's OCR category on first use. When the extraction has
    /// no text, `raw_output` is stored as the receipt text instead.
    pub async fn save_receipt(
        &self,
        user_id: Uuid,
        extraction: &ReceiptExtraction,
        raw_output: Option<&str>,
    ) -> Result<SavedReceipt, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The no-op update makes RETURNING yield the existing row's id.
        let (category_id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO categories (id, user_id, name, icon, color_hex, type, sort_order, active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
             ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(OCR_CATEGORY_NAME)
        .bind(OCR_CATEGORY_ICON)
        .bind(OCR_CATEGORY_COLOR)
        .bind(CategoryType::Variavel.as_str())
        .bind(OCR_CATEGORY_ORDER)
        .fetch_one(&mut *tx)
        .await?;

        let expense_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO expenses (id, user_id, category_id, description, amount, date, recurring, origin)
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)",
        )
        .bind(expense_id)
        .bind(user_id)
        .bind(category_id)
        .bind(extraction.expense_description())
        .bind(extraction.suggested_amount.max(0.0))
        .bind(extraction.suggested_date.and_time(NaiveTime::MIN).and_utc())
        .bind(ExpenseOrigin::Ocr.as_str())
        .execute(&mut *tx)
        .await?;

        for item in &extraction.items {
            sqlx::query(
                "INSERT INTO expense_items (id, expense_id, name, quantity, unit_price, total_price)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(expense_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total)
            .execute(&mut *tx)
            .await?;
        }

        let extracted_text = if extraction.extracted_text.trim().is_empty() {
            raw_output.unwrap_or_default()
        } else {
            extraction.extracted_text.as_str()
        };

        let receipt_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO receipts (id, expense_id, extracted_text, ocr_confidence)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(receipt_id)
        .bind(expense_id)
        .bind(extracted_text)
        .bind(extraction.confidence)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            "Saved receipt expense {} ({} items) for user {}",
            expense_id,
            extraction.items.len(),
            user_id
        );

        Ok(SavedReceipt {
            expense_id,
            receipt_id,
            category_id,
        })
    }
}
