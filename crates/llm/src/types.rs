//! Provider identifiers.

/// LLM providers the factory knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    /// No LLM; answers are built from retrieved excerpts only.
    Disabled,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "none" | "disabled" | "off" => Some(Self::Disabled),
            _ => None,
        }
    }

    /// Canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Disabled => "none",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("ollama"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse(" Ollama "), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse("none"), Some(ProviderType::Disabled));
        assert_eq!(ProviderType::parse("disabled"), Some(ProviderType::Disabled));
        assert_eq!(ProviderType::parse("openai"), None);
        assert_eq!(ProviderType::Disabled.as_str(), "none");
    }
}
