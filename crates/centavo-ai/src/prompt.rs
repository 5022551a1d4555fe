//! Prompt building for tips, meal plans and receipt extraction.
//!
//! Every prompt asks for bare JSON in a fixed shape; [`crate::reconcile`]
//! tolerates the common deviations.

use centavo_core::insight::{MealPlanContext, MealPlanRequest, SpendingSnapshot, UserProfile};
use centavo_core::IsoWeek;

const MAX_PROMPT_EXPENSES: usize = 8;
const MAX_PROMPT_ITEMS: usize = 20;
const MAX_FALLBACK_EXPENSES: usize = 10;

pub fn tips_prompt(profile: &UserProfile, snapshot: &SpendingSnapshot) -> String {
    let currency = &profile.currency;
    let mut prompt = String::from(
        "Você é um assistente financeiro pessoal.\n\
         Use os dados fornecidos para criar de 3 a 5 dicas práticas e motivacionais.\n\
         Responda apenas em JSON no formato {\"tips\":[{\"type\":\"...\",\"message\":\"...\",\"relevance\":int}]} sem comentários adicionais.\n\
         Tipos permitidos: alerta, planejamento, economia. O campo relevance deve estar entre 0 e 100.\n\
         Dados do usuário:\n",
    );
    prompt.push_str(&format!("- Nome: {}\n", profile.name.trim()));
    prompt.push_str(&format!(
        "- Mês analisado: {:02}/{}\n",
        snapshot.period.month, snapshot.period.year
    ));
    prompt.push_str(&format!(
        "- Total gasto no período: {:.2} {}\n",
        snapshot.total, currency
    ));
    if profile.monthly_limit > 0.0 {
        prompt.push_str(&format!(
            "- Limite mensal configurado: {:.2} {}\n",
            profile.monthly_limit, currency
        ));
    }
    if !snapshot.top_categories.is_empty() {
        prompt.push_str("- Principais categorias:\n");
        for (i, category) in snapshot.top_categories.iter().enumerate() {
            prompt.push_str(&format!(
                "  {}. {}: {:.2} {}\n",
                i + 1,
                category.name,
                category.total,
                currency
            ));
        }
    }
    if !snapshot.recent_expenses.is_empty() {
        prompt.push_str("- Despesas recentes:\n");
        for expense in snapshot.recent_expenses.iter().take(MAX_PROMPT_EXPENSES) {
            prompt.push_str(&format!(
                "  - {}: {} em {} ({:.2} {})\n",
                expense.date.format("%d/%m"),
                expense.description,
                expense.category.as_deref().unwrap_or(""),
                expense.amount,
                currency
            ));
        }
    }
    prompt.push_str(&format!(
        "Considere que o idioma preferido do usuário é {}. Sempre inclua orientações acionáveis, curtas e claras.\n",
        profile.language
    ));
    prompt.push_str("Se o usuário estiver perto ou acima do limite, priorize dicas de alerta e planejamento.\n");
    prompt.push_str("Garanta que cada dica esteja adaptada ao contexto apresentado.\n");
    prompt
}

pub fn meal_plan_prompt(
    profile: &UserProfile,
    week: &IsoWeek,
    request: &MealPlanRequest,
    context: &MealPlanContext,
) -> String {
    let currency = &profile.currency;
    let mut prompt = String::from(
        "Você é um nutricionista financeiro que cria planos de refeições realistas.\n\
         Entregue receitas práticas usando ingredientes do histórico de compras.\n\
         Retorne apenas JSON com este formato:\n\
         {\"estimatedCost\":number,\"calorieGoal\":number,\"meals\":[{\"day\":\"seg|ter|...\",\"mealType\":\"cafe|almoco|janta|lanche\",\"title\":\"...\",\"ingredients\":[\"ingredient\"],\"instructions\":\"passo a passo\",\"estimatedCost\":number}]}\n",
    );
    prompt.push_str(&format!(
        "Use ponto como separador decimal e idioma {}.\n",
        profile.language
    ));
    prompt.push_str(&format!(
        "Planeje a semana ISO {} iniciando em {}.\n",
        week,
        week.start().format("%d/%m/%Y")
    ));
    prompt.push_str(&format!("Moeda preferida: {}.\n", currency));

    if let Some(goal) = request.positive_calorie_goal() {
        prompt.push_str(&format!("Objetivo calórico diário: {} kcal.\n", goal));
    }
    if let Some(servings) = request.servings.filter(|s| *s > 0) {
        prompt.push_str(&format!("Número de porções por refeição: {}.\n", servings));
    }
    if let Some(preference) = request
        .dietary_preference
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        prompt.push_str(&format!("Preferência alimentar: {}.\n", preference));
    }
    if !request.exclusions.is_empty() {
        prompt.push_str(&format!(
            "Evite ingredientes: {}.\n",
            request.exclusions.join(", ")
        ));
    }
    if let Some(budget) = request.budget.filter(|b| *b > 0.0) {
        prompt.push_str(&format!(
            "Orçamento semanal máximo: {:.2} {}.\n",
            budget, currency
        ));
    }

    if !context.top_categories.is_empty() {
        prompt.push_str("Categorias com mais gastos recentes:\n");
        for (i, category) in context.top_categories.iter().enumerate() {
            prompt.push_str(&format!(
                "  {}. {}: {:.2} {}\n",
                i + 1,
                category.name,
                category.total,
                currency
            ));
        }
    }

    if !context.recent_items.is_empty() {
        prompt.push_str("Itens de mercado recentes:\n");
        for item in context.recent_items.iter().take(MAX_PROMPT_ITEMS) {
            prompt.push_str(&format!(
                "  - {} ({:.2} unidades), total {:.2} {}\n",
                item.name, item.quantity, item.total_price, currency
            ));
        }
    } else if !context.recent_expenses.is_empty() {
        prompt.push_str("Despesas recentes relevantes:\n");
        for expense in context.recent_expenses.iter().take(MAX_FALLBACK_EXPENSES) {
            prompt.push_str(&format!(
                "  - {} ({}) em {}: {:.2} {}\n",
                expense.description,
                expense.date.format("%d/%m"),
                expense.category.as_deref().unwrap_or(""),
                expense.amount,
                currency
            ));
        }
    }

    prompt.push_str("Inclua instruções passo a passo curtas (máx 3 frases) para cada refeição.\n");
    prompt.push_str("Garanta que os dias usem a sigla em português (seg, ter, qua, qui, sex, sab, dom).\n");
    prompt.push_str("Se possível, reutilize ingredientes para reduzir custos.\n");
    prompt
}

pub fn receipt_prompt(currency: &str, locale: &str, amount_hint: Option<f64>) -> String {
    let mut prompt = String::from(
        "Você é um assistente de finanças que extrai dados estruturados de recibos em imagem.\n\
         Retorne apenas JSON, sem comentários nem texto adicional.\n\
         Formato esperado:\n",
    );
    prompt.push_str(&format!(
        "{{\"total\": number, \"currency\": \"{}\", \"confidence\": number entre 0 e 1, \"date\": \"YYYY-MM-DD\", \"items\": [ {{\"description\": string, \"quantity\": number, \"unitPrice\": number, \"total\": number}} ], \"raw_text\": string, \"notes\": string }}\n",
        currency
    ));
    prompt.push_str("Se algum valor não estiver presente, use null ou string vazia.\n");
    prompt.push_str("Use ponto como separador decimal.\n");
    prompt.push_str(&format!(
        "Interprete quantias na moeda {} e utilize o formato de data {} convertendo para YYYY-MM-DD.\n",
        currency, locale
    ));
    if let Some(hint) = amount_hint.filter(|h| *h > 0.0) {
        prompt.push_str(&format!(
            "O total esperado aproximado é {:.2} {}. Utilize isso apenas como referência ao validar o valor extraído.\n",
            hint, currency
        ));
    }
    prompt.push_str("Mantenha a chave currency em letras maiúsculas.\n");
    prompt
}
