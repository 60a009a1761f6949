//! Prompt system for DocQA.
//!
//! - Prompt definitions: built-in defaults, overridable by YAML files in
//!   `.docqa/prompts/<id>.yml`
//! - Handlebars rendering without HTML escaping

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

pub use builder::build_prompt;
pub use builtin::{builtin_prompt, RAG_ANSWER_PROMPT_ID};
pub use loader::{load_prompt, resolve_prompt};
pub use types::{BuiltPrompt, PromptDefinition};
