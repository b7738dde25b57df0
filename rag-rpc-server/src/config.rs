use crypto_rag::RagSettings;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Stores, models and mode of the assistant behind the server
    pub rag: RagSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7879,
            rag: RagSettings::default(),
        }
    }
}
