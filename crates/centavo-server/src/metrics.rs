//! Prometheus metrics for AI usage and fallbacks.

use centavo_ai::Source;
use centavo_core::{RequestType, TokenCounts};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct RequestTypeLabel(pub RequestType);

impl prometheus_client::encoding::EncodeLabelSet for RequestTypeLabel {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("request_type", self.0.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct GenerationLabels {
    pub request_type: RequestType,
    /// `model` or `heuristic`.
    pub source: &'static str,
}

impl prometheus_client::encoding::EncodeLabelSet for GenerationLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("request_type", self.request_type.as_str()).encode(encoder.encode_label())?;
        ("source", self.source).encode(encoder.encode_label())?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ServerMetrics {
    pub generations: Family<GenerationLabels, Counter>,
    pub fallbacks: Family<RequestTypeLabel, Counter>,
    pub tokens: Family<RequestTypeLabel, Counter>,
    pub cost_cents: Counter,
    pub ledger_failures: Counter,
    pub registry: Arc<Registry>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let generations = Family::<GenerationLabels, Counter>::default();
        registry.register(
            "centavo_ai_generations",
            "Generated results by request type and source",
            generations.clone(),
        );

        let fallbacks = Family::<RequestTypeLabel, Counter>::default();
        registry.register(
            "centavo_ai_fallbacks",
            "Requests answered by heuristics instead of the model",
            fallbacks.clone(),
        );

        let tokens = Family::<RequestTypeLabel, Counter>::default();
        registry.register(
            "centavo_ai_tokens",
            "Total tokens billed by request type",
            tokens.clone(),
        );

        let cost_cents = Counter::default();
        registry.register(
            "centavo_ai_cost_cents",
            "Estimated AI cost in cents",
            cost_cents.clone(),
        );

        let ledger_failures = Counter::default();
        registry.register(
            "centavo_ledger_write_failures",
            "Token usage entries that could not be stored",
            ledger_failures.clone(),
        );

        Self {
            generations,
            fallbacks,
            tokens,
            cost_cents,
            ledger_failures,
            registry: Arc::new(registry),
        }
    }

    pub fn observe_generation(&self, request_type: RequestType, source: &Source) {
        let source = if source.is_model() { "model" } else { "heuristic" };
        self.generations
            .get_or_create(&GenerationLabels {
                request_type,
                source,
            })
            .inc();
        if source == "heuristic" {
            self.fallbacks
                .get_or_create(&RequestTypeLabel(request_type))
                .inc();
        }
    }

    pub fn observe_usage(&self, request_type: RequestType, counts: TokenCounts, cost_cents: i64) {
        self.tokens
            .get_or_create(&RequestTypeLabel(request_type))
            .inc_by(counts.total.max(0) as u64);
        self.cost_cents.inc_by(cost_cents.max(0) as u64);
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_and_fallbacks_are_labelled() {
        let metrics = ServerMetrics::new();
        metrics.observe_generation(RequestType::MealPlan, &Source::Heuristic);
        metrics.observe_generation(RequestType::Insight, &Source::Model("gemini-x".into()));
        metrics.observe_usage(
            RequestType::Insight,
            TokenCounts {
                prompt: 1500,
                response: 500,
                total: 2000,
            },
            25,
        );

        let text = metrics.encode().unwrap();
        assert!(text.contains(
            "centavo_ai_generations_total{request_type=\"meal_plan\",source=\"heuristic\"} 1"
        ));
        assert!(text.contains(
            "centavo_ai_generations_total{request_type=\"insight\",source=\"model\"} 1"
        ));
        assert!(text.contains("centavo_ai_fallbacks_total{request_type=\"meal_plan\"} 1"));
        assert!(!text.contains("centavo_ai_fallbacks_total{request_type=\"insight\"}"));
        assert!(text.contains("centavo_ai_tokens_total{request_type=\"insight\"} 2000"));
        assert!(text.contains("centavo_ai_cost_cents_total 25"));
    }
}
