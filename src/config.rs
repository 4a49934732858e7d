//! Process configuration from environment variables.

use tracing::warn;

pub const DEFAULT_DATABASE_URL: &str = "postgresql://postgres@localhost:5432/data_matching";

/// pg_trgm ships with 0.3; kept as the default so behavior matches a store
/// that was never tuned.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_SECRET: &str = "secret";

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub database_url: String,
    /// Trigram similarity cutoff bound into every fuzzy clause.
    pub similarity_threshold: f32,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
    pub port: u16,
}

impl ConnectorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every setting through `get` so tests can supply values without
    /// touching process-global environment state.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let similarity_threshold = match get("SIMILARITY_THRESHOLD") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "unparsable SIMILARITY_THRESHOLD, using default");
                DEFAULT_SIMILARITY_THRESHOLD
            }),
            None => DEFAULT_SIMILARITY_THRESHOLD,
        };

        let webhook_secret = get("WEBHOOK_SECRET_KEY").unwrap_or_else(|| DEFAULT_SECRET.to_string());

        let port = get("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            database_url,
            similarity_threshold,
            webhook_secret,
            port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_falls_back_to_defaults() {
        let config = ConnectorConfig::from_lookup(|_| None);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.similarity_threshold, DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(config.webhook_secret, DEFAULT_SECRET);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn unparsable_threshold_falls_back_to_default() {
        let config = ConnectorConfig::from_lookup(|key| match key {
            "SIMILARITY_THRESHOLD" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(config.similarity_threshold, DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn explicit_settings_override_defaults() {
        let config = ConnectorConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgresql://app@db:5432/vendors".to_string()),
            "SIMILARITY_THRESHOLD" => Some("0.45".to_string()),
            "WEBHOOK_SECRET_KEY" => Some("hunter2".to_string()),
            "PORT" => Some("8080".to_string()),
            _ => None,
        });
        assert_eq!(config.database_url, "postgresql://app@db:5432/vendors");
        assert_eq!(config.similarity_threshold, 0.45);
        assert_eq!(config.webhook_secret, "hunter2");
        assert_eq!(config.port, 8080);
    }
}
