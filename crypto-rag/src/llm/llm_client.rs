use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client as OpenAiClient,
};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful cryptocurrency assistant that provides \
accurate information based on the given market data and community discussions.";

/// Configuration for the LLM client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub requests_per_minute: u32,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub system_prompt: String,
    /// Override for OpenAI-compatible endpoints
    pub api_base: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            requests_per_minute: 10,
            timeout_seconds: 30,
            max_retries: 3,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            api_base: None,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, PartialEq)]
pub enum LlmProvider {
    OpenAI,
}

/// Response from the LLM with metadata
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

/// Hosted text generation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse>;

    fn model_name(&self) -> &str;
}

/// LLM client with rate limiting and retry logic
pub struct LlmClient {
    openai_client: OpenAiClient<OpenAIConfig>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client from configuration
    ///
    /// # Arguments
    /// * `config` - LLM configuration
    /// * `api_key` - API key for the LLM provider
    pub fn new(config: LlmConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("OpenAI API key is empty"));
        }

        tracing::info!(
            "Initializing LLM client: provider={:?}, model={}, rate_limit={}/min",
            config.provider,
            config.model,
            config.requests_per_minute
        );

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = &config.api_base {
            openai_config = openai_config.with_api_base(base.clone());
        }
        let openai_client = OpenAiClient::with_config(openai_config);

        let requests_per_minute = NonZeroU32::new(config.requests_per_minute)
            .ok_or_else(|| anyhow!("requests_per_minute must be > 0"))?;

        let quota = Quota::per_minute(requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        tracing::info!("LLM client initialized successfully");

        Ok(Self {
            openai_client,
            rate_limiter,
            config,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Call OpenAI chat completions with the system prompt and one user message
    async fn call_openai(&self, prompt: &str) -> Result<LlmResponse> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.config.system_prompt.clone())
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.config.model.clone())
            .messages(messages)
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature)
            .build()?;

        let response = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.openai_client.chat().create(request),
        )
        .await
        .map_err(|_| anyhow!("LLM request timed out after {}s", self.config.timeout_seconds))?
        .map_err(|e| anyhow!("OpenAI API error: {}", e))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow!("Empty response from LLM"))?;

        Ok(LlmResponse {
            text,
            model: response.model.clone(),
            tokens_used: response.usage.map(|u| u.total_tokens),
        })
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    /// Rate limits, then calls the API with exponential backoff between attempts
    async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("Sending prompt to LLM (length: {} chars)", prompt.len());

        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.call_openai(prompt).await {
                Ok(response) => {
                    tracing::info!(
                        "LLM response received: model={}, tokens={:?}, length={} chars",
                        response.model,
                        response.tokens_used,
                        response.text.len()
                    );
                    return Ok(response);
                }
                Err(e) => {
                    if attempt + 1 < attempts {
                        let backoff_ms = 2_u64.pow(attempt) * 1000;
                        tracing::warn!(
                            "LLM call failed (attempt {}/{}), retrying in {}ms: {}",
                            attempt + 1,
                            attempts,
                            backoff_ms,
                            e
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
