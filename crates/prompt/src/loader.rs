//! Loading prompt definitions from the workspace.

use std::path::{Path, PathBuf};

use docqa_core::{config::STATE_DIR, AppError, AppResult};

use crate::builtin::builtin_prompt;
use crate::types::PromptDefinition;

fn prompt_path(workspace_path: &Path, prompt_id: &str) -> PathBuf {
    workspace_path
        .join(STATE_DIR)
        .join("prompts")
        .join(format!("{}.yml", prompt_id))
}

/// Load a prompt definition from `.docqa/prompts/<id>.yml`.
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompt_path(workspace_path, prompt_id);
    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!("Failed to read prompt file {:?}: {}", prompt_file, e))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", prompt_file, e))
    })?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            prompt_file, definition.id, prompt_id
        )));
    }
    if definition.template.trim().is_empty() {
        return Err(AppError::Prompt(format!("Prompt '{}' has an empty template", prompt_id)));
    }

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);
    Ok(definition)
}

/// Workspace override if present, otherwise the built-in definition.
pub fn resolve_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    if prompt_path(workspace_path, prompt_id).exists() {
        return load_prompt(workspace_path, prompt_id);
    }
    builtin_prompt(prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))
}
