//! Prompt rendering.

use std::collections::HashMap;

use docqa_core::{AppError, AppResult};
use handlebars::Handlebars;

use crate::types::{BuiltPrompt, PromptDefinition};

/// Render a prompt definition with the given variables.
///
/// Missing variables render as empty strings and `{{#if}}` treats an empty
/// string as false, so optional sections can simply be left out of `variables`.
///
/// # Example
/// ```
/// use docqa_prompt::{build_prompt, builtin_prompt, RAG_ANSWER_PROMPT_ID};
/// use std::collections::HashMap;
///
/// let def = builtin_prompt(RAG_ANSWER_PROMPT_ID).unwrap();
/// let mut vars = HashMap::new();
/// vars.insert("context".to_string(), "[Page 0]\nThe sky is blue.".to_string());
/// vars.insert("question".to_string(), "What colour is the sky?".to_string());
/// let built = build_prompt(&def, &vars).unwrap();
/// assert!(built.user.contains("The sky is blue."));
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: &HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!(prompt_id = %definition.id, "Building prompt");

    let mut handlebars = Handlebars::new();
    // Prompts are plain text; HTML escaping would mangle quotes in documents.
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("user", &definition.template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let user = handlebars
        .render("user", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    let system = match definition.system {
        Some(ref system) => Some(
            handlebars
                .render_template(system, variables)
                .map_err(|e| AppError::Prompt(format!("Failed to render system prompt: {}", e)))?,
        ),
        None => None,
    };

    Ok(BuiltPrompt {
        system,
        user,
        source_prompt_id: definition.id.clone(),
    })
}
