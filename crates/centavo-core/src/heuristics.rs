//! Deterministic generators used whenever the AI path fails or is unavailable.
//!
//! Each generator always returns a non-empty result.

use crate::insight::SpendingSnapshot;
use crate::normalize::round2;
use crate::schema::{MealDay, MealItemDraft, MealPlanDraft, MealType, NewTip, TipType};

pub const HEURISTIC_SOURCE: &str = "heuristic";
pub const DEFAULT_CALORIE_GOAL: i32 = 2000;
pub const HEURISTIC_PLAN_COST: f64 = 210.0;
/// Per-meal cost assumed when the model omits a plan total.
pub const FALLBACK_MEAL_COST: f64 = 18.0;

const BREAKFASTS: [&str; 3] = [
    "Iogurte natural com granola e frutas",
    "Ovos mexidos com torradas integrais",
    "Vitamina de banana com aveia",
];

const LUNCHES: [&str; 4] = [
    "Peito de frango grelhado com legumes assados",
    "Tilápia ao forno com salada de quinoa",
    "Carne magra ensopada com batata-doce",
    "Arroz integral com feijão e legumes salteados",
];

const DINNERS: [&str; 3] = [
    "Sopa de legumes com torradas integrais",
    "Omelete de espinafre e queijo branco",
    "Macarrão integral ao pesto com frango desfiado",
];

/// A full week of breakfast, lunch and dinner: 21 items.
pub fn meal_plan(requested_calorie_goal: Option<i32>) -> MealPlanDraft {
    let mut items = Vec::with_capacity(MealDay::ALL.len() * 3);
    for (i, day) in MealDay::ALL.into_iter().enumerate() {
        items.push(heuristic_meal(day, MealType::Cafe, BREAKFASTS[i % BREAKFASTS.len()]));
        items.push(heuristic_meal(day, MealType::Almoco, LUNCHES[i % LUNCHES.len()]));
        items.push(heuristic_meal(day, MealType::Janta, DINNERS[i % DINNERS.len()]));
    }

    MealPlanDraft {
        calorie_goal: requested_calorie_goal
            .filter(|goal| *goal > 0)
            .unwrap_or(DEFAULT_CALORIE_GOAL),
        estimated_cost: HEURISTIC_PLAN_COST,
        generated_by_ai: false,
        items,
    }
}

fn heuristic_meal(day: MealDay, meal_type: MealType, title: &str) -> MealItemDraft {
    let (ingredients, instructions, cost): (&[&str], &str, f64) = match meal_type {
        MealType::Cafe => (
            &["Iogurte natural", "Granola", "Frutas da estação"],
            "Monte o bowl com iogurte, adicione a granola e finalize com frutas frescas.",
            12.0,
        ),
        MealType::Janta => (
            &["Legumes frescos", "Caldo de legumes", "Pão integral"],
            "Cozinhe os legumes no caldo até ficarem macios e sirva acompanhados de torradas integrais.",
            20.0,
        ),
        MealType::Almoco | MealType::Lanche => (
            &["Proteína magra", "Legumes variados", "Azeite"],
            "Tempere a proteína e os legumes com azeite, asse até dourar e sirva quente.",
            FALLBACK_MEAL_COST,
        ),
    };

    MealItemDraft {
        day,
        meal_type,
        title: title.to_string(),
        estimated_cost: cost,
        ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
        instructions: instructions.to_string(),
    }
}

/// Tips derived from the month's spending against the configured limit.
pub fn tips(monthly_limit: f64, snapshot: &SpendingSnapshot) -> Vec<NewTip> {
    let mut tips = Vec::new();
    let total = snapshot.total;

    if monthly_limit > 0.0 {
        if total > monthly_limit {
            tips.push(heuristic_tip(
                TipType::Alerta,
                format!(
                    "Você já ultrapassou seu limite mensal de R$ {:.2}. Revise seus gastos das últimas semanas.",
                    monthly_limit
                ),
                95,
            ));
        } else if total > monthly_limit * 0.85 {
            let percent = ((total / monthly_limit) * 100.0) as i64;
            tips.push(heuristic_tip(
                TipType::Planejamento,
                format!(
                    "Atingiu {}% do limite mensal. Considere pausar compras não essenciais para evitar surpresas.",
                    percent
                ),
                80,
            ));
        }
    }

    if let Some(top) = snapshot.top_categories.first() {
        tips.push(heuristic_tip(
            TipType::Economia,
            format!(
                "Categoria {} representa R$ {:.2} neste mês. Avalie trocas ou renegociações para reduzir esse custo.",
                top.name, top.total
            ),
            75,
        ));
    }

    tips.push(heuristic_tip(
        TipType::Planejamento,
        "Reserve 10 minutos para revisar seu fluxo de caixa e planejar a próxima semana.".to_string(),
        60,
    ));

    tips
}

fn heuristic_tip(tip_type: TipType, text: String, relevance: i32) -> NewTip {
    NewTip {
        tip_type,
        text,
        model_source: HEURISTIC_SOURCE.to_string(),
        relevance,
    }
}

/// Receipt total guessed from the decoded image size in bytes.
pub fn receipt_amount(image_size: usize) -> f64 {
    let factor = (image_size as f64 / 1000.0).max(1.0);
    round2(19.75 * factor)
}

/// Confidence attached to a size-based guess, capped at 0.95.
pub fn receipt_confidence(image_size: usize) -> f64 {
    let confidence = 0.7 + (image_size as f64 / 12000.0).min(0.2);
    confidence.min(0.95)
}
