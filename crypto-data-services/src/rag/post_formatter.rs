use crypto_core::DiscussionPost;

/// Trait for converting discussion posts into text for embeddings and prompts
pub trait PostFormatter {
    /// Title and body, whitespace-normalised, as fed to the embedder
    fn to_embedding_text(&self) -> String;

    /// Body (or title when the body is empty) cut to at most `max_chars` characters
    fn excerpt(&self, max_chars: usize) -> String;
}

impl PostFormatter for DiscussionPost {
    fn to_embedding_text(&self) -> String {
        let title = normalize_whitespace(&self.title);
        let body = normalize_whitespace(&self.body);

        if body.is_empty() {
            title
        } else if title.is_empty() {
            body
        } else {
            format!("{}. {}", title.trim_end_matches('.'), body)
        }
    }

    fn excerpt(&self, max_chars: usize) -> String {
        let source = if self.body.trim().is_empty() {
            &self.title
        } else {
            &self.body
        };
        truncate_chars(source, max_chars)
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max_chars` characters, preferring a word boundary
/// and marking the cut with "...". Counts chars, never splits a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let normalized = normalize_whitespace(text);
    if normalized.chars().count() <= max_chars {
        return normalized;
    }
    if max_chars <= 3 {
        return normalized.chars().take(max_chars).collect();
    }

    let head: String = normalized.chars().take(max_chars - 3).collect();
    let cut = match head.rfind(' ') {
        Some(i) if i > 0 => &head[..i],
        _ => head.as_str(),
    };
    format!("{}...", cut.trim_end())
}
