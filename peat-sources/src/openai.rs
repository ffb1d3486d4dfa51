//! Narrative generation over the OpenAI chat completions API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use peat_core::error::{PeatError, Result};
use peat_core::narrative::NarrativeContext;
use peat_core::traits::NarrativeGenerator;
use peat_core::types::ScanKind;

use crate::TemplateNarrator;

const SYSTEM_PROMPT: &str = "You are a cybersecurity analyst writing a personalized digital risk assessment. \
Speak directly to the user. Answer in markdown with these sections: \
'## Immediate Risks' (2-4 sentences), '## Platform-Specific Risks' (2-3 sentences), \
'## Long-term Concerns' (2-4 sentences), '## Action Plan' (3-5 numbered, bolded items) \
and '## Positive Notes' (2-4 sentences ending on an empowering note). \
Reference the user's actual breaches and platforms rather than generic advice.";

/// OpenAI narrator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: String,
    /// Chat model
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Completion token limit
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl OpenAiConfig {
    /// Creates a config for the public API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gpt-4".into(),
            base_url: "https://api.openai.com/v1".into(),
            max_tokens: 750,
            temperature: 0.3,
            timeout_seconds: 60,
        }
    }

    /// Sets the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Narrative generator backed by a chat model.
///
/// Username scans never reach the model; they are rendered by the
/// [`TemplateNarrator`].
pub struct OpenAiNarrator {
    config: OpenAiConfig,
    http_client: reqwest::Client,
    template: TemplateNarrator,
}

impl OpenAiNarrator {
    /// Creates a narrator with the given config.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PeatError::ConfigError("OpenAI API key is empty".into()));
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PeatError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            template: TemplateNarrator::new(),
        })
    }

    fn user_prompt(ctx: &NarrativeContext) -> String {
        let insights = ctx.insights();
        let metrics = ctx.risk_metrics();

        let recent = ctx
            .breaches
            .iter()
            .take(4)
            .map(|b| match b.breach_date {
                Some(date) => format!("{} ({})", b.title, date),
                None => format!("{} (unknown date)", b.title),
            })
            .collect::<Vec<_>>();
        let sensitive = if insights.sensitive_data.is_empty() {
            "Standard account data".to_string()
        } else {
            insights.sensitive_data.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        };
        let services = ctx.registrations.iter().take(4).cloned().collect::<Vec<_>>();
        let unchecked = ctx.rate_limited.iter().take(4).cloned().collect::<Vec<_>>();
        let profiles = ctx
            .username_hits
            .iter()
            .take(4)
            .map(|h| h.platform.clone())
            .collect::<Vec<_>>();

        let or_none = |items: Vec<String>| {
            if items.is_empty() {
                "None found".to_string()
            } else {
                items.join(", ")
            }
        };

        format!(
            "Provide a security brief for this user.\n\n\
             Email: {}\n\
             Breach count: {}\n\
             Recent breaches: {}\n\
             Most sensitive data exposed: {}\n\
             Oldest breach: {} years ago\n\
             Platform presence: {} registered accounts, {} public profiles\n\
             Overall risk: {} ({}/10)\n\
             Registered services: {}\n\
             Possibly registered (rate limited): {}\n\
             Public profiles: {}\n",
            ctx.subject,
            ctx.breaches.len(),
            or_none(recent),
            sensitive,
            insights.years_old,
            ctx.registrations.len() + ctx.rate_limited.len(),
            ctx.username_hits.len(),
            metrics.level,
            metrics.score,
            or_none(services),
            or_none(unchecked),
            or_none(profiles),
        )
    }
}

#[async_trait]
impl NarrativeGenerator for OpenAiNarrator {
    #[instrument(skip(self, context), fields(kind = %context.kind))]
    async fn generate(&self, context: &NarrativeContext) -> Result<String> {
        if context.kind == ScanKind::Username {
            return Ok(self.template.render(context));
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: Self::user_prompt(context),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PeatError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PeatError::NarrativeError(format!("HTTP {}: {}", status, text)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| PeatError::NarrativeError(format!("invalid response body: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PeatError::NarrativeError("no content in response".into()))?;

        debug!(chars = content.len(), "narrative generated");
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
