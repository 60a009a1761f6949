//! LLM integration for DocQA.
//!
//! A provider-agnostic completion interface used by the answer synthesizer.
//! The knowledge crate only ever sees `Arc<dyn LlmClient>`; whether one exists
//! at all is decided by the factory.
//!
//! # Providers
//! - **Ollama**: local LLM runtime (default)
//! - **none**: run without an LLM; answers fall back to retrieved excerpts
//!
//! # Example
//! ```no_run
//! use docqa_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Summarize page 3", "llama3.2").with_temperature(0.0);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, create_optional_client};
pub use providers::OllamaClient;
pub use types::ProviderType;
