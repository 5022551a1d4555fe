//! Domain enumerations and records persisted by the store and returned by the API.
//!
//! Enumerations are stored as TEXT columns using their canonical Portuguese
//! short codes (`seg`, `almoco`, `alerta`, ...). `FromStr` only accepts those
//! canonical codes; loosely-typed model output goes through
//! [`crate::normalize`] instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $code:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Codes stored in `categories.type`. The server only creates `variavel`
/// categories, the app writes `fixa` ones directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    Fixa,
    Variavel,
}

text_enum!(CategoryType, "category type", { Fixa => "fixa", Variavel => "variavel" });

/// Codes stored in `expenses.origin`. Receipt imports write `ocr`; `manual`
/// and `ia` rows come from the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseOrigin {
    Manual,
    Ocr,
    Ia,
}

text_enum!(ExpenseOrigin, "expense origin", { Manual => "manual", Ocr => "ocr", Ia => "ia" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipType {
    Economia,
    Planejamento,
    Alerta,
}

text_enum!(TipType, "tip type", {
    Economia => "economia",
    Planejamento => "planejamento",
    Alerta => "alerta",
});

/// Day of the week a meal is planned for, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealDay {
    Seg,
    Ter,
    Qua,
    Qui,
    Sex,
    Sab,
    Dom,
}

text_enum!(MealDay, "meal day", {
    Seg => "seg",
    Ter => "ter",
    Qua => "qua",
    Qui => "qui",
    Sex => "sex",
    Sab => "sab",
    Dom => "dom",
});

impl MealDay {
    pub const ALL: [MealDay; 7] = [
        MealDay::Seg,
        MealDay::Ter,
        MealDay::Qua,
        MealDay::Qui,
        MealDay::Sex,
        MealDay::Sab,
        MealDay::Dom,
    ];

    /// Zero-based position in the week (Monday = 0).
    pub fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Cafe,
    Almoco,
    Janta,
    Lanche,
}

text_enum!(MealType, "meal type", {
    Cafe => "cafe",
    Almoco => "almoco",
    Janta => "janta",
    Lanche => "lanche",
});

impl MealType {
    /// Position within a day, breakfast first.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Kind of AI call recorded in the token ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Receipt,
    Insight,
    MealPlan,
}

text_enum!(RequestType, "request type", {
    Receipt => "receipt",
    Insight => "insight",
    MealPlan => "meal_plan",
});

// ---------------------------------------------------------------------------
// Tips
// ---------------------------------------------------------------------------

/// A tip ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTip {
    pub tip_type: TipType,
    pub text: String,
    pub model_source: String,
    pub relevance: i32,
}

/// A stored tip as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTip {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub tip_type: TipType,
    pub text: String,
    #[serde(rename = "source")]
    pub model_source: String,
    pub relevance: i32,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Meal plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MealItemDraft {
    pub day: MealDay,
    pub meal_type: MealType,
    pub title: String,
    pub estimated_cost: f64,
    pub ingredients: Vec<String>,
    pub instructions: String,
}

/// A meal plan that has not been stored yet. The ISO week is assigned by the
/// caller when persisting.
#[derive(Debug, Clone, PartialEq)]
pub struct MealPlanDraft {
    pub calorie_goal: i32,
    pub estimated_cost: f64,
    pub generated_by_ai: bool,
    pub items: Vec<MealItemDraft>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealItem {
    pub id: Uuid,
    pub day_of_week: MealDay,
    pub meal_type: MealType,
    pub title: String,
    pub estimated_cost: f64,
    pub ingredients: Vec<String>,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub id: Uuid,
    pub iso_week: String,
    pub calorie_goal: i32,
    pub estimated_cost: f64,
    pub generated_by_ai: bool,
    pub created_at: DateTime<Utc>,
    pub items: Vec<MealItem>,
}

impl MealPlan {
    /// Order items by day, then by meal within the day.
    pub fn sort_items(&mut self) {
        self.items
            .sort_by_key(|item| (item.day_of_week.index(), item.meal_type.index()));
    }
}
