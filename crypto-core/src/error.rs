use thiserror::Error;

/// External capability a retrieval or composition step depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStage {
    AssetCatalogue,
    MarketLookup,
    Embedding,
    VectorSearch,
    LanguageModel,
}

impl std::fmt::Display for UpstreamStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UpstreamStage::AssetCatalogue => "asset catalogue",
            UpstreamStage::MarketLookup => "market lookup",
            UpstreamStage::Embedding => "embedding",
            UpstreamStage::VectorSearch => "vector search",
            UpstreamStage::LanguageModel => "language model",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the retrieval and composition core.
///
/// "Nothing found" is not an error: empty lookups produce empty results.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Upstream {stage} unavailable: {message}")]
    UpstreamUnavailable {
        stage: UpstreamStage,
        message: String,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl RagError {
    /// Wrap an adapter failure, keeping the full context chain in the message
    pub fn upstream(stage: UpstreamStage, err: impl std::fmt::Display) -> Self {
        RagError::UpstreamUnavailable {
            stage,
            message: format!("{:#}", err),
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, RagError::UpstreamUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_message() {
        let err = RagError::upstream(UpstreamStage::VectorSearch, "connection refused");
        assert!(err.is_upstream());
        assert_eq!(
            err.to_string(),
            "Upstream vector search unavailable: connection refused"
        );
    }

    #[test]
    fn test_malformed_input_message() {
        let err = RagError::MalformedInput("query must not be empty".to_string());
        assert!(!err.is_upstream());
        assert!(err.to_string().contains("query must not be empty"));
    }
}
