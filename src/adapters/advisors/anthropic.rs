//! Anthropic API advisor provider.
//!
//! Calls the Messages API with a JSON-only reply contract and parses the
//! response into an `AdvisorProposal`. Malformed output surfaces as a
//! schema violation, which the chain treats like any other provider
//! failure. Client-side rate limiting and bounded retry keep a flaky
//! upstream from stalling the cycle.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::AnthropicConfig;
use crate::domain::ports::{Advisor, AdvisorContext, AdvisorProposal};

const ANTHROPIC_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "You are a heat pump tuning assistant. Reply with a single JSON \
object and nothing else, using exactly these fields: action (\"adjust\" or \"hold\"), \
parameter (one of curve_offset, curve_slope, start_threshold, ventilation_level, or null), \
current_value (number or null), suggested_value (number or null), reasoning (string), \
confidence (number 0-1), expected_impact (number 0-1). Propose at most one conservative \
adjustment backed by the telemetry; hold when nothing is clearly worth testing.";

/// Request to the Anthropic Messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

pub struct AnthropicAdvisor {
    config: AnthropicConfig,
    client: Client,
    limiter: DefaultDirectRateLimiter,
}

impl AnthropicAdvisor {
    pub fn new(config: AnthropicConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::ExternalService {
                service: "anthropic".to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        let per_minute =
            NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_minute(per_minute));
        Ok(Self {
            config,
            client,
            limiter,
        })
    }

    fn api_key(&self) -> DomainResult<String> {
        self.config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| DomainError::ExternalService {
                service: "anthropic".to_string(),
                message: "no API key configured".to_string(),
            })
    }

    fn build_prompt(context: &AdvisorContext<'_>) -> String {
        let metrics = context.metrics;
        let mut prompt = format!(
            "Telemetry over the last {}h: COP {:.2}, delta T {:.1}C, indoor {:.1}C, \
             outdoor {:.1}C, {} compressor starts, cost {:.2}.\n",
            metrics.window_hours(),
            metrics.cop,
            metrics.delta_t,
            metrics.indoor_temp,
            metrics.outdoor_temp,
            metrics.compressor_starts,
            metrics.energy_cost,
        );

        prompt.push_str("Current parameter values:\n");
        for definition in context.parameters.iter() {
            if let Some(value) = context.state.value_of(definition.id) {
                prompt.push_str(&format!(
                    "- {} = {:.2} {} (bounds [{:.1}, {:.1}], max step {:.1})\n",
                    definition.id, value, definition.unit, definition.min, definition.max,
                    definition.max_step,
                ));
            }
        }

        if !context.evaluated.is_empty() {
            prompt.push_str("Recently evaluated experiments:\n");
            for (change, result) in context.evaluated {
                prompt.push_str(&format!(
                    "- {} {:+.2}: score {:.0}, {}\n",
                    change.parameter,
                    change.delta(),
                    result.total_score,
                    result.recommendation.as_str(),
                ));
            }
        }

        let rejections = context
            .history
            .iter()
            .filter(|entry| !entry.applied && entry.rejection_reason.is_some())
            .count();
        if rejections > 0 {
            prompt.push_str(&format!(
                "{rejections} recent proposals were rejected by the safety validator.\n"
            ));
        }

        prompt.push_str("Propose the single most promising tuning experiment, or hold.");
        prompt
    }

    /// Extract the JSON object from a reply that may carry stray prose.
    fn parse_proposal(text: &str) -> DomainResult<AdvisorProposal> {
        let start = text.find('{');
        let end = text.rfind('}');
        let json = match (start, end) {
            (Some(start), Some(end)) if end > start => &text[start..=end],
            _ => {
                return Err(DomainError::SchemaViolation(
                    "reply contains no JSON object".to_string(),
                ))
            }
        };
        serde_json::from_str(json)
            .map_err(|e| DomainError::SchemaViolation(format!("malformed proposal JSON: {e}")))
    }

    async fn call_api(&self, api_key: &str, request: &MessagesRequest) -> DomainResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let operation = || async {
            let response = self
                .client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header(header::CONTENT_TYPE, "application/json")
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    // Network errors are worth one more try.
                    backoff::Error::transient(DomainError::ExternalService {
                        service: "anthropic".to_string(),
                        message: e.to_string(),
                    })
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(backoff::Error::transient(DomainError::ExternalService {
                    service: "anthropic".to_string(),
                    message: format!("HTTP {status}"),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DomainError::ExternalService {
                    service: "anthropic".to_string(),
                    message: format!("HTTP {status}"),
                }));
            }

            let body: MessagesResponse = response.json().await.map_err(|e| {
                backoff::Error::permanent(DomainError::ExternalService {
                    service: "anthropic".to_string(),
                    message: format!("invalid response body: {e}"),
                })
            })?;

            let text = body
                .content
                .iter()
                .filter(|block| block.block_type == "text")
                .map(|block| block.text.as_str())
                .collect::<String>();
            Ok(text)
        };

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(self.config.timeout_secs * 2)),
            ..ExponentialBackoff::default()
        };
        backoff::future::retry(policy, operation).await
    }
}

#[async_trait]
impl Advisor for AnthropicAdvisor {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn propose(&self, context: &AdvisorContext<'_>) -> DomainResult<AdvisorProposal> {
        let api_key = self.api_key()?;
        self.limiter.until_ready().await;

        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user",
                content: Self::build_prompt(context),
            }],
        };

        let text = self.call_api(&api_key, &request).await?;
        debug!(chars = text.len(), "anthropic reply received");

        let proposal = Self::parse_proposal(&text);
        if let Err(err) = &proposal {
            warn!(error = %err, "anthropic reply failed to parse");
        }
        proposal
    }
}
