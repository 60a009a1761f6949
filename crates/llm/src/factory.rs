//! LLM provider factory.

use std::sync::Arc;
use std::time::Duration;

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use crate::types::ProviderType;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Create an LLM client for an enabled provider.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `model` - Default model for requests
/// * `timeout` - Optional HTTP request timeout
///
/// # Errors
/// Returns an error if the provider is unknown, disabled, or the HTTP
/// client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    model: &str,
    timeout: Option<Duration>,
) -> Result<Arc<dyn LlmClient>, String> {
    match ProviderType::parse(provider) {
        Some(ProviderType::Ollama) => {
            let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_URL);
            let client = OllamaClient::with_options(base_url, model, timeout)
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(client))
        }
        Some(ProviderType::Disabled) => Err(format!("Provider '{}' is disabled", provider)),
        None => Err(format!("Unknown provider: {}", provider)),
    }
}

/// Like [`create_client`], but maps a disabled provider to `None`.
pub fn create_optional_client(
    provider: &str,
    endpoint: Option<&str>,
    model: &str,
    timeout: Option<Duration>,
) -> Result<Option<Arc<dyn LlmClient>>, String> {
    if ProviderType::parse(provider) == Some(ProviderType::Disabled) {
        return Ok(None);
    }
    create_client(provider, endpoint, model, timeout).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, "llama3.2", None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.default_model(), "llama3.2");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint_and_timeout() {
        let client = create_client(
            "ollama",
            Some("http://localhost:8080"),
            "mistral",
            Some(Duration::from_secs(5)),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_disabled_provider_yields_none() {
        let client = create_optional_client("none", None, "llama3.2", None).unwrap();
        assert!(client.is_none());
        assert!(create_client("none", None, "llama3.2", None).is_err());
    }

    #[test]
    fn test_unknown_provider() {
        match create_optional_client("unknown", None, "m", None) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
