use chrono::{DateTime, Utc};
use crypto_core::{ConversationTurn, MarketRecord, RetrievalResult, ScoredPost};
use crypto_data_services::rag::post_formatter::truncate_chars;
use crypto_data_services::PostFormatter;

use super::composer::ComposerConfig;

const MIN_EXCERPT_CHARS: usize = 20;

/// Formatter for hosted-model prompts built from retrieved evidence
pub struct LlmPromptFormatter;

impl LlmPromptFormatter {
    /// Format the full prompt: question, market facts, discussion excerpts,
    /// recent conversation, then instructions.
    ///
    /// Market facts always precede discussion text. Discussion titles and
    /// excerpts share the `context_budget_chars` budget.
    pub fn format(
        result: &RetrievalResult,
        history: &[ConversationTurn],
        config: &ComposerConfig,
    ) -> String {
        let mut prompt = String::new();

        prompt.push_str("═══ CRYPTO MARKET QUESTION ═══\n\n");

        prompt.push_str("USER QUESTION:\n");
        prompt.push_str(&format!("  {}\n\n", result.query));

        // Structured facts
        match &result.market {
            Some(record) => {
                prompt.push_str(&format!(
                    "MARKET DATA FOR {} ({}):\n",
                    record.name.to_uppercase(),
                    record.symbol
                ));
                prompt.push_str(&format!("  Current Price: ${}\n", format_thousands(record.price, 2)));
                prompt.push_str(&format!("  Market Cap: ${}\n", format_thousands(record.market_cap, 2)));
                prompt.push_str(&format!(
                    "  24h Trading Volume: ${}\n",
                    format_thousands(record.volume_24h, 2)
                ));
                prompt.push_str(&format!(
                    "  Circulating Supply: {} {}\n",
                    format_thousands(record.circulating_supply, 0),
                    record.symbol
                ));
                prompt.push_str(&format!("  As Of: {}\n", format_timestamp(&record.last_updated)));
            }
            None => {
                prompt.push_str("[No market data found for this question]\n");
            }
        }

        // Unstructured excerpts
        prompt.push_str("\nRELEVANT COMMUNITY DISCUSSIONS:\n");
        let posts = budgeted_posts(&result.posts, config);
        if posts.is_empty() {
            prompt.push_str("[No relevant discussions found]\n");
        } else {
            for (i, post) in posts.iter().enumerate() {
                prompt.push_str(&format!(
                    "{}. {} (Similarity: {:.1}%)\n",
                    i + 1,
                    post.title,
                    post.similarity * 100.0
                ));
                if !post.excerpt.is_empty() {
                    prompt.push_str(&format!("   {}\n", post.excerpt));
                }
            }
        }

        // Conversation context
        let recent = recent_turns(history, config.history_turns);
        if !recent.is_empty() {
            prompt.push_str("\nRECENT CONVERSATION:\n");
            for turn in recent {
                prompt.push_str(&format!(
                    "  {}: {}\n",
                    turn.role,
                    truncate_chars(&turn.text, config.excerpt_chars)
                ));
            }
        }

        prompt.push_str("\n═══════════════════════════════════════════════════════════\n");
        prompt.push_str("INSTRUCTIONS:\n");
        prompt.push_str("Answer the user question using only the sources above.\n");
        prompt.push_str("Quote specific figures from the market data when available and\n");
        prompt.push_str("summarise community sentiment from the discussions.\n");
        prompt.push_str("If the sources do not cover the question, say so.\n");
        prompt.push_str("Respond in a helpful, conversational tone.\n");

        prompt
    }
}

/// A post trimmed to fit the discussion budget
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetedPost {
    pub title: String,
    pub similarity: f32,
    pub excerpt: String,
}

/// Posts in rank order, titles and excerpts together within `context_budget_chars`.
///
/// Each title and each excerpt is capped at `excerpt_chars`. Stops at the first
/// post that no longer fits.
pub fn budgeted_posts(posts: &[ScoredPost], config: &ComposerConfig) -> Vec<BudgetedPost> {
    let floor = MIN_EXCERPT_CHARS.min(config.excerpt_chars).max(1);
    let mut remaining = config.context_budget_chars;
    let mut budgeted = Vec::new();

    for scored in posts {
        // A few leftover chars are not worth a fragment
        if remaining < floor {
            break;
        }

        let title = truncate_chars(&scored.post.title, config.excerpt_chars.min(remaining));
        remaining = remaining.saturating_sub(title.chars().count());

        // Title-only posts would repeat the title as their excerpt
        let excerpt = if remaining < floor || scored.post.body.trim().is_empty() {
            String::new()
        } else {
            scored.post.excerpt(config.excerpt_chars.min(remaining))
        };
        remaining = remaining.saturating_sub(excerpt.chars().count());

        if title.is_empty() && excerpt.is_empty() {
            continue;
        }
        budgeted.push(BudgetedPost {
            title,
            similarity: scored.similarity,
            excerpt,
        });
    }

    budgeted
}

/// The last `n` turns, oldest first
pub fn recent_turns(history: &[ConversationTurn], n: usize) -> &[ConversationTurn] {
    &history[history.len().saturating_sub(n)..]
}

/// Fixed decimals with comma thousands separators (e.g. 1,250,000.00)
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// One-line market facts, shared by prompts and templated answers
pub fn market_line(record: &MarketRecord) -> String {
    format!(
        "{} ({}) is trading at ${}. The market cap is ${} with a 24-hour trading volume of ${}.",
        record.name,
        record.symbol,
        format_thousands(record.price, 2),
        format_thousands(record.market_cap, 2),
        format_thousands(record.volume_24h, 2)
    )
}
