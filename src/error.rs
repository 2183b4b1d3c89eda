//! Error types for the Jobify bot.

use std::time::Duration;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} does not support {operation}")]
    Unsupported { name: String, operation: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("No LLM provider configured")]
    NotConfigured,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the external collaborators invoked by onboarding steps:
/// document reading, opportunity search and chat completion.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{adapter} timed out after {timeout:?}")]
    Timeout { adapter: String, timeout: Duration },

    #[error("{adapter} transport failure: {reason}")]
    Transport { adapter: String, reason: String },

    #[error("Unsupported document: {file_name}")]
    UnsupportedDocument { file_name: String },

    #[error("Text extraction failed for {file_name}: {reason}")]
    Extraction { file_name: String, reason: String },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl AdapterError {
    pub fn transport(adapter: &str, reason: impl ToString) -> Self {
        Self::Transport {
            adapter: adapter.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;

/// Bound an adapter future by `timeout`, folding the elapsed case into
/// [`AdapterError::Timeout`].
pub async fn with_timeout<T, F>(
    adapter: &str,
    timeout: Duration,
    fut: F,
) -> std::result::Result<T, AdapterError>
where
    F: std::future::Future<Output = std::result::Result<T, AdapterError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout {
            adapter: adapter.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_passes_through_result() {
        let ok = with_timeout("test", Duration::from_secs(1), async {
            Ok::<_, AdapterError>(7)
        })
        .await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn with_timeout_reports_elapsed() {
        let result = with_timeout("search", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, AdapterError>(())
        })
        .await;
        match result {
            Err(AdapterError::Timeout { adapter, .. }) => assert_eq!(adapter, "search"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn adapter_error_display() {
        let err = AdapterError::transport("opportunity search", "connection refused");
        assert_eq!(
            err.to_string(),
            "opportunity search transport failure: connection refused"
        );
    }
}
