//! Centavo Core - domain model for the personal-finance assistant
//!
//! This crate provides:
//! - Enumerations and records shared by the AI, store and server crates
//! - Synonym normalization and clamping rules applied to model output
//! - ISO week arithmetic for meal plans
//! - Deterministic heuristic generators used when the AI path fails
//! - Token cost estimation for the usage ledger

pub mod heuristics;
pub mod insight;
pub mod ledger;
pub mod normalize;
pub mod receipt;
pub mod schema;
pub mod week;

pub use ledger::{CostRates, TokenCounts};
pub use schema::{
    CategoryType, ExpenseOrigin, MealDay, MealType, RequestType, TipType, UnknownVariant,
};
pub use week::IsoWeek;
