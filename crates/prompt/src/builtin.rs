//! Prompts shipped with the binary.

use crate::types::PromptDefinition;

/// Identifier of the grounded-answer prompt.
pub const RAG_ANSWER_PROMPT_ID: &str = "rag.answer";

/// Variables: `history` (optional), `context`, `question`, `not_found`.
const RAG_ANSWER_TEMPLATE: &str = "{{#if history}}{{history}}
{{/if}}You are a helpful assistant. Answer the question based ONLY on the following context. \
Be concise and specific. Give a direct answer in 1-2 sentences maximum. \
If the answer is not in the context, say \"{{not_found}}\"

Context:
{{context}}

Question: {{question}}

Answer (be brief and direct):";

/// Look up a built-in prompt by id.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    match id {
        RAG_ANSWER_PROMPT_ID => Some(PromptDefinition {
            id: RAG_ANSWER_PROMPT_ID.to_string(),
            title: "Grounded document answer".to_string(),
            api_version: "1.0".to_string(),
            system: None,
            template: RAG_ANSWER_TEMPLATE.to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rag_answer_is_builtin() {
        let def = builtin_prompt(RAG_ANSWER_PROMPT_ID).unwrap();
        assert!(def.template.contains("{{context}}"));
        assert!(def.template.contains("{{question}}"));
        assert!(builtin_prompt("nope").is_none());
    }
}
