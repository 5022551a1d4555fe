//! Weekly meal plans, unique per user and ISO week.

use centavo_core::schema::{MealItem, MealPlan, MealPlanDraft};
use centavo_core::IsoWeek;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use crate::{Store, StoreError};

#[derive(FromRow)]
struct PlanRow {
    id: Uuid,
    iso_week: String,
    calorie_goal: i32,
    estimated_cost: f64,
    generated_by_ai: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ItemRow {
    id: Uuid,
    day_of_week: String,
    meal_type: String,
    title: String,
    estimated_cost: f64,
    ingredients: Json<Vec<String>>,
    instructions: String,
}

impl TryFrom<ItemRow> for MealItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(MealItem {
            id: row.id,
            day_of_week: row.day_of_week.parse()?,
            meal_type: row.meal_type.parse()?,
            title: row.title,
            estimated_cost: row.estimated_cost,
            ingredients: row.ingredients.0,
            instructions: row.instructions,
        })
    }
}

impl Store {
    pub async fn load_meal_plan(
        &self,
        user_id: Uuid,
        week: &IsoWeek,
    ) -> Result<Option<MealPlan>, StoreError> {
        let plan: Option<PlanRow> = sqlx::query_as(
            "SELECT id, iso_week, calorie_goal, estimated_cost, generated_by_ai, created_at
             FROM meal_plans
             WHERE user_id = $1 AND iso_week = $2",
        )
        .bind(user_id)
        .bind(week.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(plan) = plan else {
            return Ok(None);
        };

        let items: Vec<ItemRow> = sqlx::query_as(
            "SELECT id, day_of_week, meal_type, title, estimated_cost, ingredients, instructions
             FROM meal_items
             WHERE meal_plan_id = $1",
        )
        .bind(plan.id)
        .fetch_all(&self.pool)
        .await?;

        let mut plan = MealPlan {
            id: plan.id,
            iso_week: plan.iso_week,
            calorie_goal: plan.calorie_goal,
            estimated_cost: plan.estimated_cost,
            generated_by_ai: plan.generated_by_ai,
            created_at: plan.created_at,
            items: items
                .into_iter()
                .map(MealItem::try_from)
                .collect::<Result<_, _>>()?,
        };
        plan.sort_items();
        Ok(Some(plan))
    }

    /// Store `draft` as the user's plan for `week`, replacing any previous
    /// plan and its items in one transaction.
    ///
    /// The upsert locks the plan row, so concurrent replacements for the same
    /// week serialize and the last one to commit wins.
    pub async fn replace_meal_plan(
        &self,
        user_id: Uuid,
        week: &IsoWeek,
        draft: &MealPlanDraft,
    ) -> Result<MealPlan, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (plan_id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO meal_plans (id, user_id, iso_week, calorie_goal, estimated_cost, generated_by_ai)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id, iso_week) DO UPDATE
             SET calorie_goal = EXCLUDED.calorie_goal,
                 estimated_cost = EXCLUDED.estimated_cost,
                 generated_by_ai = EXCLUDED.generated_by_ai,
                 created_at = NOW(),
                 updated_at = NOW()
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(week.to_string())
        .bind(draft.calorie_goal)
        .bind(draft.estimated_cost)
        .bind(draft.generated_by_ai)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM meal_items WHERE meal_plan_id = $1")
            .bind(plan_id)
            .execute(&mut *tx)
            .await?;

        for item in &draft.items {
            sqlx::query(
                "INSERT INTO meal_items
                    (id, meal_plan_id, day_of_week, meal_type, title, estimated_cost, ingredients, instructions)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::new_v4())
            .bind(plan_id)
            .bind(item.day.as_str())
            .bind(item.meal_type.as_str())
            .bind(&item.title)
            .bind(item.estimated_cost)
            .bind(Json(&item.ingredients))
            .bind(&item.instructions)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            "Stored meal plan {} for user {} week {} ({} items)",
            plan_id,
            user_id,
            week,
            draft.items.len()
        );

        self.load_meal_plan(user_id, week)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("meal plan {} vanished after commit", plan_id)))
    }
}
