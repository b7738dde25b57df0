use crypto_core::{ConversationTurn, ExecutionMode, MarketRecord, RetrievalResult, ScoredPost};
use std::sync::Arc;

use super::canned::{CannedRules, Response};
use super::llm_client::LanguageModel;
use super::prompt_formatter::{
    budgeted_posts, format_thousands, format_timestamp, market_line, LlmPromptFormatter,
};

/// Returned whenever retrieval found neither market data nor discussions
pub const NO_INFORMATION_RESPONSE: &str = "I'm sorry, I couldn't find any market data or community \
discussions relevant to your question. Try asking about a specific cryptocurrency such as Bitcoin, \
Ethereum or Solana.";

/// Configuration for answer composition
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Maximum characters of a single discussion excerpt
    pub excerpt_chars: usize,

    /// Maximum characters of discussion titles and excerpts in one answer or prompt
    pub context_budget_chars: usize,

    /// Conversation turns carried into the prompt
    pub history_turns: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: 280,
            context_budget_chars: 1200,
            history_turns: 6,
        }
    }
}

/// Where answers come from. Fixed when the composer is built.
#[derive(Clone)]
pub enum ComposerBackend {
    Hosted(Arc<dyn LanguageModel>),
    Canned(CannedRules),
}

/// Turns retrieved evidence into a natural-language answer
#[derive(Clone)]
pub struct Composer {
    config: ComposerConfig,
    backend: ComposerBackend,
}

impl Composer {
    /// Composer backed by a hosted language model
    pub fn live(config: ComposerConfig, llm: Arc<dyn LanguageModel>) -> Self {
        tracing::info!(
            "Initializing composer: model={}, excerpt_chars={}, context_budget_chars={}, history_turns={}",
            llm.model_name(),
            config.excerpt_chars,
            config.context_budget_chars,
            config.history_turns
        );

        Self {
            config,
            backend: ComposerBackend::Hosted(llm),
        }
    }

    /// Deterministic composer using canned rules and templates. No network access.
    pub fn mock(config: ComposerConfig) -> Self {
        Self::with_rules(config, CannedRules::default())
    }

    pub fn with_rules(config: ComposerConfig, rules: CannedRules) -> Self {
        Self {
            config,
            backend: ComposerBackend::Canned(rules),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.backend {
            ComposerBackend::Hosted(_) => ExecutionMode::Live,
            ComposerBackend::Canned(_) => ExecutionMode::Mock,
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Compose an answer. Never fails: model errors degrade to the template.
    pub async fn compose(&self, result: &RetrievalResult, history: &[ConversationTurn]) -> String {
        if result.is_empty() {
            tracing::debug!("No evidence for query={:?}, returning no-information answer", result.query);
            return NO_INFORMATION_RESPONSE.to_string();
        }

        match &self.backend {
            ComposerBackend::Hosted(llm) => {
                let prompt = LlmPromptFormatter::format(result, history, &self.config);
                tracing::debug!("Prompt for query={:?}: {} chars", result.query, prompt.chars().count());

                match llm.generate(&prompt).await {
                    Ok(response) if !response.text.trim().is_empty() => {
                        tracing::debug!(
                            "Model {} answered, tokens={:?}",
                            response.model,
                            response.tokens_used
                        );
                        response.text.trim().to_string()
                    }
                    Ok(_) => {
                        tracing::warn!("Model {} returned an empty answer, using template", llm.model_name());
                        self.templated(result)
                    }
                    Err(e) => {
                        tracing::warn!("Language model failed: {:#}, using template", e);
                        self.templated(result)
                    }
                }
            }
            ComposerBackend::Canned(rules) => match rules.select(&result.query) {
                Response::Canned(text) => text.to_string(),
                Response::Evidence => self.templated(result),
            },
        }
    }

    /// Answer built from the evidence alone
    pub fn templated(&self, result: &RetrievalResult) -> String {
        if result.is_empty() {
            return NO_INFORMATION_RESPONSE.to_string();
        }

        let mut sections = Vec::new();
        if let Some(record) = &result.market {
            sections.push(market_summary(record));
        }
        if !result.posts.is_empty() {
            sections.push(discussion_digest(&result.posts, &self.config));
        }
        sections.join("\n\n")
    }
}

/// Market facts with supply and freshness
pub fn market_summary(record: &MarketRecord) -> String {
    format!(
        "{} Circulating supply is {} {} (as of {}).",
        market_line(record),
        format_thousands(record.circulating_supply, 0),
        record.symbol,
        format_timestamp(&record.last_updated)
    )
}

/// Numbered titles with excerpts, within the context budget
pub fn discussion_digest(posts: &[ScoredPost], config: &ComposerConfig) -> String {
    let mut digest = String::from("Here is what the community has been discussing:");

    for (i, post) in budgeted_posts(posts, config).iter().enumerate() {
        digest.push_str(&format!("\n{}. {}", i + 1, post.title));
        if !post.excerpt.is_empty() {
            digest.push_str(&format!(": {}", post.excerpt));
        }
    }

    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::llm_client::LlmResponse;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use crypto_core::DiscussionPost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoModel {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn generate(&self, prompt: &str) -> anyhow::Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("service unavailable"));
            }
            Ok(LlmResponse {
                text: format!("answered {} chars", prompt.len()),
                model: "echo".to_string(),
                tokens_used: None,
            })
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn bitcoin() -> MarketRecord {
        MarketRecord::new(
            "BTC",
            "Bitcoin",
            65000.25,
            1.25e12,
            30e9,
            19.5e6,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    fn with_market(query: &str) -> RetrievalResult {
        RetrievalResult {
            query: query.to_string(),
            market: Some(bitcoin()),
            posts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_no_information_skips_model() {
        let model = Arc::new(EchoModel {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let composer = Composer::live(ComposerConfig::default(), model.clone());

        let answer = composer.compose(&RetrievalResult::empty("anything?"), &[]).await;
        assert_eq!(answer, NO_INFORMATION_RESPONSE);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hosted_answer_used() {
        let model = Arc::new(EchoModel {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let composer = Composer::live(ComposerConfig::default(), model.clone());

        let answer = composer.compose(&with_market("bitcoin price"), &[]).await;
        assert!(answer.starts_with("answered"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(composer.mode(), ExecutionMode::Live);
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_template() {
        let model = Arc::new(EchoModel {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let composer = Composer::live(ComposerConfig::default(), model.clone());

        let result = with_market("bitcoin price");
        let answer = composer.compose(&result, &[]).await;
        assert_eq!(answer, composer.templated(&result));
        assert!(answer.contains("Bitcoin (BTC) is trading at $65,000.25"));
        assert!(answer.contains("as of 2025-03-01 12:00 UTC"));
    }

    #[tokio::test]
    async fn test_mock_canned_rule() {
        let composer = Composer::mock(ComposerConfig::default());
        let answer = composer
            .compose(&with_market("How does regulation affect bitcoin?"), &[])
            .await;
        assert!(answer.contains("cryptocurrency regulations"));
        assert_eq!(composer.mode(), ExecutionMode::Mock);
    }

    #[test]
    fn test_market_summary() {
        let summary = market_summary(&bitcoin());
        assert_eq!(
            summary,
            "Bitcoin (BTC) is trading at $65,000.25. The market cap is $1,250,000,000,000.00 \
with a 24-hour trading volume of $30,000,000,000.00. Circulating supply is 19,500,000 BTC \
(as of 2025-03-01 12:00 UTC)."
        );
    }

    #[test]
    fn test_discussion_digest_numbered() {
        let post = |id: &str, title: &str| ScoredPost {
            post: DiscussionPost {
                post_id: id.to_string(),
                title: title.to_string(),
                body: "Short body.".to_string(),
                score: 1,
                num_comments: 0,
                created_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            },
            similarity: 0.5,
        };
        let digest = discussion_digest(
            &[post("a", "First"), post("b", "Second")],
            &ComposerConfig::default(),
        );
        assert!(digest.contains("\n1. First: Short body."));
        assert!(digest.contains("\n2. Second: Short body."));
    }

    #[test]
    fn test_discussion_digest_within_budget() {
        let posts: Vec<ScoredPost> = (0..20)
            .map(|i| ScoredPost {
                post: DiscussionPost {
                    post_id: format!("p{}", i),
                    title: "Is this the top or just the start of the run? ".repeat(7),
                    body: "ok".to_string(),
                    score: 1,
                    num_comments: 0,
                    created_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
                },
                similarity: 0.5,
            })
            .collect();
        let config = ComposerConfig::default();

        let digest = discussion_digest(&posts, &config);
        let listed = digest.lines().count() - 1;
        assert!(listed < posts.len());
        // Header plus "\nN. " and ": " framing per listed post
        let framing = "Here is what the community has been discussing:".len() + 8 * listed;
        assert!(digest.chars().count() <= config.context_budget_chars + framing);
    }
}
