//! Client for the Gemini `generateContent` endpoint.
//!
//! A call makes up to `max_retries` attempts. Transport failures, non-2xx
//! statuses and undecodable bodies are retried after waiting `backoff`,
//! `2 * backoff`, `4 * backoff`, ... between attempts. A response that decodes
//! but carries no text fails immediately. Every attempt and every wait races
//! the caller's [`CancellationToken`].

use async_trait::async_trait;
use centavo_core::TokenCounts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::AiError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ERROR_BODY_LIMIT: usize = 512;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Url,
    /// Total number of attempts per call.
    pub max_retries: u32,
    /// First wait between attempts; doubles after each wait.
    pub backoff: Duration,
    /// Per-attempt HTTP timeout.
    pub request_timeout: Duration,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, AiError> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| AiError::InvalidConfig(format!("default base URL: {}", e)))?;
        Ok(Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Create a configuration from environment variables.
    pub fn from_env() -> Result<Self, AiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AiError> {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(*key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let api_key = first(&["GEMINI_API_KEY", "EXPO_PUBLIC_GEMINI_API_KEY"])
            .ok_or(AiError::MissingCredentials)?;
        let mut config = Self::new(api_key)?;

        if let Some(model) = first(&["GEMINI_MODEL", "EXPO_PUBLIC_GEMINI_MODEL"]) {
            config = config.with_model(model);
        }
        if let Some(base_url) = first(&["GEMINI_BASE_URL"]) {
            config.base_url = Url::parse(&base_url)
                .map_err(|e| AiError::InvalidConfig(format!("GEMINI_BASE_URL: {}", e)))?;
        }

        let max_retries = match first(&["GEMINI_MAX_RETRIES"]) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| AiError::InvalidConfig(format!("GEMINI_MAX_RETRIES: {:?}", raw)))?,
            None => 0,
        };
        let backoff_ms = match first(&["GEMINI_BACKOFF_MS"]) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| AiError::InvalidConfig(format!("GEMINI_BACKOFF_MS: {:?}", raw)))?,
            None => 0,
        };

        Ok(config.with_retry(max_retries, Duration::from_millis(backoff_ms)))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    /// Override retry policy. Zero values keep the current setting.
    pub fn with_retry(mut self, max_retries: u32, backoff: Duration) -> Self {
        if max_retries > 0 {
            self.max_retries = max_retries;
        }
        if !backoff.is_zero() {
            self.backoff = backoff;
        }
        self
    }

    /// Full request URL, including the key query parameter.
    pub fn endpoint(&self) -> Result<Url, AiError> {
        let raw = format!(
            "{}/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            self.model
        );
        let mut url =
            Url::parse(&raw).map_err(|e| AiError::InvalidConfig(format!("endpoint: {}", e)))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// A single user turn made of the given parts.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
        }
    }

    pub fn has_parts(&self) -> bool {
        self.contents.iter().any(|c| !c.parts.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    /// Base64 payload, e.g. an image.
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetadata {
    pub prompt_token_count: i64,
    pub candidates_token_count: i64,
    pub total_token_count: i64,
}

impl From<UsageMetadata> for TokenCounts {
    fn from(usage: UsageMetadata) -> Self {
        TokenCounts {
            prompt: usage.prompt_token_count,
            response: usage.candidates_token_count,
            total: usage.total_token_count,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    usage_metadata: UsageMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// First non-blank text part, scanning candidates in order.
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .iter()
            .flat_map(|c| c.content.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .find(|text| !text.trim().is_empty())
    }
}

/// Text and token usage of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: UsageMetadata,
    pub model: String,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// One HTTP round trip. Implementations must not retry on their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &Url, body: Vec<u8>) -> Result<RawResponse, AiError>;
}

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::InvalidConfig(format!("http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &Url, body: Vec<u8>) -> Result<RawResponse, AiError> {
        // The URL carries the API key, so it is stripped from error messages.
        let response = self
            .client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| AiError::Transport(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| AiError::Transport(e.without_url().to_string()))?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AiError> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn from_env() -> Result<Self, AiError> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn with_transport(config: GeminiConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation, AiError> {
        if !request.has_parts() {
            return Err(AiError::EmptyRequest);
        }
        let url = self.config.endpoint()?;
        let body = serde_json::to_vec(request).map_err(|e| AiError::Encode(e.to_string()))?;

        let attempts = self.config.max_retries.max(1);
        let mut wait = self.config.backoff;
        let mut last_error = None;

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Err(AiError::Cancelled);
            }

            debug!(
                "Calling Gemini model {} (attempt {}/{})",
                self.config.model, attempt, attempts
            );
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AiError::Cancelled),
                outcome = self.attempt(&url, body.clone()) => outcome,
            };

            match outcome {
                Ok(generation) => {
                    info!(
                        "Received Gemini response ({} tokens)",
                        generation.usage.total_token_count
                    );
                    return Ok(generation);
                }
                Err(err) if err.is_retryable() => {
                    warn!("Gemini attempt {}/{} failed: {}", attempt, attempts, err);
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }

            if attempt < attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AiError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
                wait = wait.saturating_mul(2);
            }
        }

        Err(AiError::RetriesExhausted {
            attempts,
            last: Box::new(
                last_error
                    .unwrap_or_else(|| AiError::Transport("unknown failure".to_string())),
            ),
        })
    }

    async fn attempt(&self, url: &Url, body: Vec<u8>) -> Result<Generation, AiError> {
        let raw = self.transport.post_json(url, body).await?;

        if !(200..300).contains(&raw.status) {
            let mut body = String::from_utf8_lossy(&raw.body).into_owned();
            if body.len() > ERROR_BODY_LIMIT {
                let cut = (0..=ERROR_BODY_LIMIT)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(AiError::Status {
                status: raw.status,
                body,
            });
        }

        let decoded: GenerateContentResponse =
            serde_json::from_slice(&raw.body).map_err(|e| AiError::Decode(e.to_string()))?;
        let text = decoded.first_text().ok_or(AiError::NoText)?;

        Ok(Generation {
            text: text.trim().to_string(),
            usage: decoded.usage_metadata,
            model: self.config.model.clone(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::collections::HashMap;

    fn assert_about(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(50),
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    #[tokio::test]
    async fn returns_first_non_blank_text_and_usage() {
        let transport = ScriptedTransport::always(ok_json(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "   "}, {}]}},
                {"content": {"parts": [{"text": "  {\"ok\": true}\n"}, {"text": "ignored"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14}
        })));
        let client = client_with(transport.clone());

        let generation = client
            .generate_content(&text_request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(generation.text, "{\"ok\": true}");
        assert_eq!(generation.usage.total_token_count, 14);
        assert_eq!(generation.model, DEFAULT_MODEL);
        assert_eq!(transport.call_count(), 1);
        let counts: TokenCounts = generation.usage.into();
        assert_eq!(counts.prompt, 10);
        assert_eq!(counts.response, 4);
    }

    #[tokio::test]
    async fn zero_candidates_is_a_content_error_without_retry() {
        let transport = ScriptedTransport::always(ok_json(serde_json::json!({"candidates": []})));
        let client = client_with(transport.clone());

        let err = client
            .generate_content(&text_request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::NoText), "got {err:?}");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_transport_exhausts_retries_with_doubling_waits() {
        let transport = ScriptedTransport::always(server_error());
        let client = client_with(transport.clone());
        let start = tokio::time::Instant::now();

        let err = client
            .generate_content(&text_request(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            AiError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, AiError::Status { status: 500, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let calls = transport.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert_about(calls[1] - calls[0], Duration::from_secs(1));
        assert_about(calls[2] - calls[1], Duration::from_secs(2));
        // No wait after the final attempt.
        assert_about(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried() {
        let transport = ScriptedTransport::new(
            vec![
                Err(AiError::Transport("connection reset".into())),
                Ok(RawResponse {
                    status: 200,
                    body: b"not json".to_vec(),
                }),
            ],
            ok_text("{}"),
        );
        let client = client_with(transport.clone());

        let generation = client
            .generate_content(&text_request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(generation.text, "{}");
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_server_error() {
        let transport = ScriptedTransport::new(vec![Ok(server_error())], ok_text("pronto"));
        let client = client_with(transport.clone());

        let generation = client
            .generate_content(&text_request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(generation.text, "pronto");
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_further_calls() {
        let transport = ScriptedTransport::always(server_error());
        let client = Arc::new(client_with(transport.clone()));
        let cancel = CancellationToken::new();

        let task = {
            let client = client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { client.generate_content(&text_request(), &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, AiError::Cancelled), "got {err:?}");
        assert_eq!(transport.call_count(), 1);

        // Nothing else happens once cancelled.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn already_cancelled_token_makes_no_calls() {
        let transport = ScriptedTransport::always(ok_text("x"));
        let client = client_with(transport.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.generate_content(&text_request(), &cancel).await.unwrap_err();

        assert!(matches!(err, AiError::Cancelled));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_request_is_rejected_before_any_call() {
        let transport = ScriptedTransport::always(ok_text("x"));
        let client = client_with(transport.clone());

        for request in [
            GenerateContentRequest::default(),
            GenerateContentRequest::user(vec![]),
        ] {
            let err = client
                .generate_content(&request, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, AiError::EmptyRequest));
        }
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn request_body_and_endpoint_match_wire_format() {
        let transport = ScriptedTransport::always(ok_text("x"));
        let client = client_with(transport.clone());
        let request = GenerateContentRequest::user(vec![
            Part::text("leia o recibo"),
            Part::inline("image/png", "QUJD"),
        ]);

        client
            .generate_content(&request, &CancellationToken::new())
            .await
            .unwrap();

        let body: serde_json::Value =
            serde_json::from_slice(&transport.bodies.lock().unwrap()[0]).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "leia o recibo"},
                        {"inlineData": {"mimeType": "image/png", "data": "QUJD"}}
                    ]
                }]
            })
        );

        let url = transport.urls.lock().unwrap()[0].clone();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-05-20:generateContent?key=test-key"
        );
    }

    #[test]
    fn from_lookup_requires_a_key() {
        let err = GeminiConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, AiError::MissingCredentials));

        let err = GeminiConfig::from_lookup(|key| {
            (key == "GEMINI_API_KEY").then(|| "   ".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AiError::MissingCredentials));
    }

    #[test]
    fn from_lookup_reads_fallback_names_and_overrides() {
        let env: HashMap<&str, &str> = [
            ("EXPO_PUBLIC_GEMINI_API_KEY", "expo-key"),
            ("EXPO_PUBLIC_GEMINI_MODEL", "gemini-pro"),
            ("GEMINI_MAX_RETRIES", "5"),
            ("GEMINI_BACKOFF_MS", "0"),
        ]
        .into_iter()
        .collect();

        let config = GeminiConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.api_key, "expo-key");
        assert_eq!(config.model, "gemini-pro");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff, DEFAULT_BACKOFF);
    }

    #[test]
    fn from_lookup_rejects_invalid_numbers() {
        let err = GeminiConfig::from_lookup(|key| match key {
            "GEMINI_API_KEY" => Some("k".to_string()),
            "GEMINI_MAX_RETRIES" => Some("many".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, AiError::InvalidConfig(_)));
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = GeminiConfig::new("super-secret").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));

        let client = GeminiClient::with_transport(config, ScriptedTransport::always(ok_text("x")));
        assert!(!format!("{:?}", client).contains("super-secret"));
    }

    #[test]
    fn with_retry_ignores_zero_values() {
        let config = test_config().with_retry(0, Duration::ZERO);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.backoff, DEFAULT_BACKOFF);

        let config = test_config().with_retry(2, Duration::from_millis(10));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.backoff, Duration::from_millis(10));
    }
}
