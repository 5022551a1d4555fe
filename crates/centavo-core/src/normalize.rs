//! Synonym matching and clamping for loosely-typed model output.
//!
//! Every matcher lower-cases and trims its input before comparing, and returns
//! `None` for values it does not recognize so callers can drop just that item.

use crate::schema::{MealDay, MealType, TipType};

pub fn meal_day(value: &str) -> Option<MealDay> {
    let day = match value.trim().to_lowercase().as_str() {
        "seg" | "segunda" | "segunda-feira" | "monday" => MealDay::Seg,
        "ter" | "terca" | "terça" | "terca-feira" | "terça-feira" | "tuesday" => MealDay::Ter,
        "qua" | "quarta" | "quarta-feira" | "wednesday" => MealDay::Qua,
        "qui" | "quinta" | "quinta-feira" | "thursday" => MealDay::Qui,
        "sex" | "sexta" | "sexta-feira" | "friday" => MealDay::Sex,
        "sab" | "sáb" | "sabado" | "sábado" | "saturday" => MealDay::Sab,
        "dom" | "domingo" | "sunday" => MealDay::Dom,
        _ => return None,
    };
    Some(day)
}

pub fn meal_type(value: &str) -> Option<MealType> {
    let meal = match value.trim().to_lowercase().as_str() {
        "cafe" | "café" | "cafe da manha" | "café da manhã" | "breakfast" => MealType::Cafe,
        "almoco" | "almoço" | "lunch" => MealType::Almoco,
        "janta" | "jantar" | "dinner" => MealType::Janta,
        "lanche" | "snack" => MealType::Lanche,
        _ => return None,
    };
    Some(meal)
}

pub fn tip_type(value: &str) -> Option<TipType> {
    let tip = match value.trim().to_lowercase().as_str() {
        "alerta" | "alert" | "warning" => TipType::Alerta,
        "economia" | "saving" | "savings" => TipType::Economia,
        "planejamento" | "planning" | "plan" => TipType::Planejamento,
        _ => return None,
    };
    Some(tip)
}

/// Clamp a relevance score into `0..=100`, rounding fractional scores.
pub fn clamp_relevance(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as i32
}

/// Clamp an OCR confidence into `0.0..=1.0`.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Round a monetary value to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Trim every entry and drop the blank ones.
pub fn clean_strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|v| {
            let trimmed = v.as_ref().trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_synonyms_resolve_to_the_same_day() {
        for value in ["seg", "Segunda", "segunda-feira", "Monday", "  SEG  "] {
            assert_eq!(meal_day(value), Some(MealDay::Seg), "value: {value:?}");
        }
        assert_eq!(meal_day("Terça-feira"), Some(MealDay::Ter));
        assert_eq!(meal_day("sábado"), Some(MealDay::Sab));
        assert_eq!(meal_day("Sunday"), Some(MealDay::Dom));
    }

    #[test]
    fn unknown_day_is_none() {
        assert_eq!(meal_day("someday"), None);
        assert_eq!(meal_day(""), None);
    }

    #[test]
    fn meal_type_synonyms() {
        assert_eq!(meal_type("Café da manhã"), Some(MealType::Cafe));
        assert_eq!(meal_type("breakfast"), Some(MealType::Cafe));
        assert_eq!(meal_type("Almoço"), Some(MealType::Almoco));
        assert_eq!(meal_type("jantar"), Some(MealType::Janta));
        assert_eq!(meal_type("snack"), Some(MealType::Lanche));
        assert_eq!(meal_type("brunch"), None);
    }

    #[test]
    fn tip_type_synonyms() {
        assert_eq!(tip_type("WARNING"), Some(TipType::Alerta));
        assert_eq!(tip_type("savings"), Some(TipType::Economia));
        assert_eq!(tip_type("planejamento"), Some(TipType::Planejamento));
        assert_eq!(tip_type("motivational"), None);
    }

    #[test]
    fn relevance_is_clamped() {
        assert_eq!(clamp_relevance(-5.0), 0);
        assert_eq!(clamp_relevance(150.0), 100);
        assert_eq!(clamp_relevance(72.6), 73);
        assert_eq!(clamp_relevance(f64::NAN), 0);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
    }

    #[test]
    fn round2_rounds_half_away_from_zero() {
        assert_eq!(round2(10.005_1), 10.01);
        assert_eq!(round2(3.14159), 3.14);
    }

    #[test]
    fn clean_strings_drops_blanks() {
        let cleaned = clean_strings(["  arroz ", "", "   ", "feijão"]);
        assert_eq!(cleaned, vec!["arroz", "feijão"]);
    }
}
