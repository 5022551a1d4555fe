//! Inputs gathered from the user's history before asking for tips or a meal plan.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "BRL";
pub const DEFAULT_LANGUAGE: &str = "pt-BR";

/// The authenticated user together with the preferences the prompts need.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub currency: String,
    pub language: String,
    pub monthly_limit: f64,
}

impl UserProfile {
    /// Build a profile, filling blank preferences with the service defaults.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        currency: Option<&str>,
        language: Option<&str>,
        monthly_limit: Option<f64>,
    ) -> Self {
        let currency = currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let language = language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        Self {
            id,
            name: name.into(),
            currency,
            language,
            monthly_limit: monthly_limit.filter(|l| *l > 0.0).unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseLine {
    pub description: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub category: Option<String>,
}

/// A line item bought recently, used to steer meal-plan ingredients.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchasedItem {
    pub name: String,
    pub quantity: f64,
    pub total_price: f64,
}

/// A calendar month as a half-open UTC interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthPeriod {
    pub month: u32,
    pub year: i32,
}

impl MonthPeriod {
    /// Returns `None` when `month` is not in `1..=12` or the year is out of range.
    pub fn new(month: u32, year: i32) -> Option<Self> {
        let period = Self { month, year };
        period.bounds().map(|_| period)
    }

    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self {
            month: today.month(),
            year: today.year(),
        }
    }

    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = Utc
            .with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()?;
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        let end = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()?;
        Some((start, end))
    }
}

/// Aggregated spending for one month, fed to tip generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingSnapshot {
    pub period: MonthPeriod,
    pub total: f64,
    pub top_categories: Vec<CategoryTotal>,
    pub recent_expenses: Vec<ExpenseLine>,
}

/// Optional preferences for meal-plan generation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MealPlanRequest {
    pub week: Option<String>,
    pub calorie_goal: Option<i32>,
    pub servings: Option<i32>,
    pub dietary_preference: Option<String>,
    pub exclusions: Vec<String>,
    pub budget: Option<f64>,
}

impl MealPlanRequest {
    /// The requested calorie goal when it is positive.
    pub fn positive_calorie_goal(&self) -> Option<i32> {
        self.calorie_goal.filter(|goal| *goal > 0)
    }
}

/// Everything the meal-plan prompt draws from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MealPlanContext {
    pub recent_expenses: Vec<ExpenseLine>,
    pub recent_items: Vec<PurchasedItem>,
    pub top_categories: Vec<CategoryTotal>,
}
