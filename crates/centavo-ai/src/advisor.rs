//! AI-or-heuristic generation of tips, meal plans and receipt extractions.
//!
//! Every operation returns an [`Advice`]: the model's reconciled answer when
//! the call and the reconciliation both succeed, otherwise the deterministic
//! heuristic result. Token usage is reported whenever the model answered,
//! even if its answer was then rejected.

use centavo_core::heuristics;
use centavo_core::insight::{MealPlanContext, MealPlanRequest, SpendingSnapshot, UserProfile};
use centavo_core::receipt::ReceiptExtraction;
use centavo_core::schema::{MealPlanDraft, NewTip};
use centavo_core::{IsoWeek, TokenCounts};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{GeminiClient, GenerateContentRequest, Generation, Part};
use crate::error::AiError;
use crate::prompt;
use crate::reconcile;
use crate::sanitize::sanitize_json;

pub const TIPS_TIMEOUT: Duration = Duration::from_secs(40);
pub const MEAL_PLAN_TIMEOUT: Duration = Duration::from_secs(45);
pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(45);

/// Where a generated value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Model(String),
    Heuristic,
}

impl Source {
    pub fn is_model(&self) -> bool {
        matches!(self, Source::Model(_))
    }

    /// Label used in response messages.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Model(_) => "gemini",
            Source::Heuristic => "heurísticas",
        }
    }

    /// Value stored as the model source of persisted records.
    pub fn model_name(&self) -> &str {
        match self {
            Source::Model(model) => model,
            Source::Heuristic => heuristics::HEURISTIC_SOURCE,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct Advice<T> {
    pub value: T,
    pub source: Source,
    /// Tokens billed by the model, if a call completed.
    pub usage: Option<TokenCounts>,
    /// Sanitized model text, if a call completed.
    pub raw_output: Option<String>,
}

impl<T> Advice<T> {
    fn heuristic(value: T) -> Self {
        Self {
            value,
            source: Source::Heuristic,
            usage: None,
            raw_output: None,
        }
    }
}

/// Inputs of a receipt scan. `image_base64` is the payload without any
/// data-URL prefix.
#[derive(Debug, Clone)]
pub struct ReceiptScan<'a> {
    pub image_base64: &'a str,
    pub mime_type: &'a str,
    pub image_size: usize,
    pub currency: &'a str,
    pub locale: &'a str,
    pub amount_hint: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub tips: Duration,
    pub meal_plan: Duration,
    pub receipt: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            tips: TIPS_TIMEOUT,
            meal_plan: MEAL_PLAN_TIMEOUT,
            receipt: RECEIPT_TIMEOUT,
        }
    }
}

/// Shared entry point for every AI-backed feature.
///
/// Built without a client, every operation goes straight to heuristics.
#[derive(Debug, Clone, Default)]
pub struct Advisor {
    client: Option<Arc<GeminiClient>>,
    timeouts: Timeouts,
}

impl Advisor {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client: Some(Arc::new(client)),
            timeouts: Timeouts::default(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn model(&self) -> Option<&str> {
        self.client.as_deref().map(GeminiClient::model)
    }

    pub async fn tips(
        &self,
        profile: &UserProfile,
        snapshot: &SpendingSnapshot,
        cancel: &CancellationToken,
    ) -> Advice<Vec<NewTip>> {
        let request = GenerateContentRequest::user(vec![Part::text(prompt::tips_prompt(
            profile, snapshot,
        ))]);
        let fallback = || heuristics::tips(profile.monthly_limit, snapshot);

        let generation = match self.call(&request, self.timeouts.tips, cancel).await {
            Ok(generation) => generation,
            Err(err) => {
                warn!("AI tips unavailable ({}), using heuristics: {}", err.kind(), err);
                return Advice::heuristic(fallback());
            }
        };

        let text = sanitize_json(&generation.text);
        let outcome = reconcile::reconcile_tips(text, &generation.model);
        settle(generation.clone(), text, outcome, fallback, "tips")
    }

    pub async fn meal_plan(
        &self,
        profile: &UserProfile,
        week: &IsoWeek,
        request: &MealPlanRequest,
        context: &MealPlanContext,
        cancel: &CancellationToken,
    ) -> Advice<MealPlanDraft> {
        let calorie_goal = request.positive_calorie_goal();
        let ai_request = GenerateContentRequest::user(vec![Part::text(
            prompt::meal_plan_prompt(profile, week, request, context),
        )]);
        let fallback = || heuristics::meal_plan(calorie_goal);

        let generation = match self.call(&ai_request, self.timeouts.meal_plan, cancel).await {
            Ok(generation) => generation,
            Err(err) => {
                warn!(
                    "AI meal plan unavailable for {} ({}), using heuristics: {}",
                    week,
                    err.kind(),
                    err
                );
                return Advice::heuristic(fallback());
            }
        };

        let text = sanitize_json(&generation.text);
        let outcome = reconcile::reconcile_meal_plan(text, calorie_goal);
        settle(generation.clone(), text, outcome, fallback, "meal plan")
    }

    pub async fn receipt(
        &self,
        scan: &ReceiptScan<'_>,
        cancel: &CancellationToken,
    ) -> Advice<ReceiptExtraction> {
        let request = GenerateContentRequest::user(vec![
            Part::text(prompt::receipt_prompt(
                scan.currency,
                scan.locale,
                scan.amount_hint,
            )),
            Part::inline(scan.mime_type, scan.image_base64),
        ]);
        let fallback =
            || ReceiptExtraction::fallback(scan.image_size, scan.currency, scan.amount_hint);

        let generation = match self.call(&request, self.timeouts.receipt, cancel).await {
            Ok(generation) => generation,
            Err(err) => {
                warn!(
                    "AI receipt extraction unavailable ({}), using estimate: {}",
                    err.kind(),
                    err
                );
                return Advice::heuristic(fallback());
            }
        };

        let text = sanitize_json(&generation.text);
        let outcome =
            reconcile::reconcile_receipt(text, scan.image_size, scan.currency, scan.amount_hint);
        settle(generation.clone(), text, outcome, fallback, "receipt")
    }

    async fn call(
        &self,
        request: &GenerateContentRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Generation, AiError> {
        let client = self.client.as_ref().ok_or(AiError::MissingCredentials)?;
        let child = cancel.child_token();
        match tokio::time::timeout(timeout, client.generate_content(request, &child)).await {
            Ok(result) => result,
            Err(_) => {
                child.cancel();
                Err(AiError::TimedOut)
            }
        }
    }
}

fn settle<T>(
    generation: Generation,
    text: &str,
    outcome: Result<T, AiError>,
    fallback: impl FnOnce() -> T,
    what: &str,
) -> Advice<T> {
    let usage = Some(TokenCounts::from(generation.usage));
    let raw_output = Some(text.to_string());
    match outcome {
        Ok(value) => {
            info!("Generated {} with model {}", what, generation.model);
            Advice {
                value,
                source: Source::Model(generation.model),
                usage,
                raw_output,
            }
        }
        Err(err) => {
            warn!(
                "Discarding model {} output ({}), using heuristics: {}",
                what,
                err.kind(),
                err
            );
            Advice {
                value: fallback(),
                source: Source::Heuristic,
                usage,
                raw_output,
            }
        }
    }
}
