//! Read-only aggregates over a user's expenses, used as AI context.

use centavo_core::insight::{
    CategoryTotal, ExpenseLine, MealPlanContext, MonthPeriod, PurchasedItem, SpendingSnapshot,
};
use centavo_core::normalize::round2;
use centavo_core::IsoWeek;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{Store, StoreError};

pub const TOP_CATEGORY_LIMIT: i64 = 5;
pub const TIPS_RECENT_EXPENSES: i64 = 6;
pub const MEAL_PLAN_RECENT_EXPENSES: i64 = 12;
pub const MEAL_PLAN_RECENT_ITEMS: i64 = 20;

#[derive(FromRow)]
struct CategoryTotalRow {
    name: String,
    total: f64,
}

#[derive(FromRow)]
struct ExpenseRow {
    description: String,
    amount: f64,
    date: DateTime<Utc>,
    category: Option<String>,
}

#[derive(FromRow)]
struct ItemRow {
    name: String,
    quantity: f64,
    total_price: f64,
}

impl Store {
    /// Sum of expense amounts dated within `[start, end)`.
    pub async fn total_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, StoreError> {
        let (total,): (f64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0)::DOUBLE PRECISION
             FROM expenses
             WHERE user_id = $1 AND date >= $2 AND date < $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(round2(total))
    }

    /// Highest-spending categories within `[start, end)`, largest first.
    pub async fn top_categories(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CategoryTotal>, StoreError> {
        let rows: Vec<CategoryTotalRow> = sqlx::query_as(
            "SELECT c.name, SUM(e.amount)::DOUBLE PRECISION AS total
             FROM expenses e
             JOIN categories c ON c.id = e.category_id
             WHERE e.user_id = $1 AND e.date >= $2 AND e.date < $3
             GROUP BY c.id, c.name
             ORDER BY total DESC
             LIMIT $4",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CategoryTotal {
                name: row.name,
                total: round2(row.total),
            })
            .collect())
    }

    /// Most recent expenses by date, newest first.
    pub async fn recent_expenses(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExpenseLine>, StoreError> {
        let rows: Vec<ExpenseRow> = sqlx::query_as(
            "SELECT e.description, e.amount, e.date, c.name AS category
             FROM expenses e
             LEFT JOIN categories c ON c.id = e.category_id
             WHERE e.user_id = $1
             ORDER BY e.date DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ExpenseLine {
                description: row.description,
                amount: row.amount,
                date: row.date.date_naive(),
                category: row.category,
            })
            .collect())
    }

    /// Most recently recorded expense line items, newest first.
    pub async fn recent_items(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PurchasedItem>, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            "SELECT i.name, i.quantity, i.total_price
             FROM expense_items i
             JOIN expenses e ON e.id = i.expense_id
             WHERE e.user_id = $1
             ORDER BY i.created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PurchasedItem {
                name: row.name,
                quantity: row.quantity,
                total_price: row.total_price,
            })
            .collect())
    }

    pub async fn spending_snapshot(
        &self,
        user_id: Uuid,
        period: MonthPeriod,
    ) -> Result<SpendingSnapshot, StoreError> {
        let (start, end) = period
            .bounds()
            .ok_or_else(|| StoreError::Corrupt(format!("month {:?} out of range", period)))?;

        Ok(SpendingSnapshot {
            period,
            total: self.total_between(user_id, start, end).await?,
            top_categories: self
                .top_categories(user_id, start, end, TOP_CATEGORY_LIMIT)
                .await?,
            recent_expenses: self.recent_expenses(user_id, TIPS_RECENT_EXPENSES).await?,
        })
    }

    pub async fn meal_plan_context(
        &self,
        user_id: Uuid,
        week: &IsoWeek,
    ) -> Result<MealPlanContext, StoreError> {
        let start = week.start().and_time(NaiveTime::MIN).and_utc();
        let end = week.end().and_time(NaiveTime::MIN).and_utc();

        Ok(MealPlanContext {
            recent_expenses: self
                .recent_expenses(user_id, MEAL_PLAN_RECENT_EXPENSES)
                .await?,
            recent_items: self.recent_items(user_id, MEAL_PLAN_RECENT_ITEMS).await?,
            top_categories: self
                .top_categories(user_id, start, end, TOP_CATEGORY_LIMIT)
                .await?,
        })
    }
}
