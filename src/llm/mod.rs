//! Text generation for agent runs and prep kits.
//!
//! Supports:
//! - **Template**: deterministic per-agent responses, always available
//! - **OpenAI**: chat completions over HTTP when an API key is configured
//!
//! Callers hold a [`FallbackGenerator`], which tries the configured provider
//! and drops back to the template generator on any provider error.

pub mod fallback;
pub mod openai;
pub mod template;

pub use fallback::FallbackGenerator;
pub use openai::OpenAiGenerator;
pub use template::TemplateGenerator;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LlmSettings;
use crate::error::LlmError;
use crate::templates::TemplateRegistry;

/// Structured prep-kit content produced by a generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepKitDraft {
    #[serde(default)]
    pub checklist_docs: Vec<String>,
    #[serde(default)]
    pub questions_for_lawyer: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// A source of generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Free text for one agent run. `context` is the run input.
    async fn generate(&self, agent: &str, prompt: &str, context: &Value)
    -> Result<String, LlmError>;

    /// Prep-kit content for a case description.
    async fn generate_structured(
        &self,
        case_type: &str,
        description: &str,
        language: &str,
    ) -> Result<PrepKitDraft, LlmError>;
}

/// Build the generator stack from settings: OpenAI in front when a key is
/// present, the template generator always behind it.
pub fn create_generator(settings: &LlmSettings, templates: Arc<TemplateRegistry>) -> FallbackGenerator {
    let fallback = TemplateGenerator::new(templates);
    match &settings.api_key {
        Some(key) => {
            tracing::info!("Using OpenAI (model: {})", settings.model);
            let primary = OpenAiGenerator::new(key.clone(), settings);
            FallbackGenerator::new(Some(Arc::new(primary)), fallback)
        }
        None => {
            tracing::info!("No OPENAI_API_KEY set, using template responses");
            FallbackGenerator::new(None, fallback)
        }
    }
}

/// Language from a run input, `es` when absent.
pub(crate) fn context_language(context: &Value) -> &str {
    context
        .get("language")
        .and_then(Value::as_str)
        .filter(|l| !l.is_empty())
        .unwrap_or("es")
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;

    #[test]
    fn language_defaults_to_spanish() {
        assert_eq!(context_language(&json!({})), "es");
        assert_eq!(context_language(&json!({"language": ""})), "es");
        assert_eq!(context_language(&json!({"language": "en"})), "en");
    }

    #[test]
    fn generator_without_key_has_no_primary() {
        let templates = Arc::new(TemplateRegistry::builtin().unwrap());
        let generator = create_generator(&LlmSettings::default(), templates);
        assert_eq!(generator.primary_name(), None);
    }

    #[test]
    fn generator_with_key_uses_openai() {
        let templates = Arc::new(TemplateRegistry::builtin().unwrap());
        let settings = LlmSettings {
            api_key: Some(SecretString::from("sk-test")),
            ..LlmSettings::default()
        };
        let generator = create_generator(&settings, templates);
        assert_eq!(generator.primary_name(), Some("openai"));
    }

    #[test]
    fn prep_kit_draft_tolerates_missing_fields() {
        let draft: PrepKitDraft = serde_json::from_str(r#"{"checklist_docs": ["INE"]}"#).unwrap();
        assert_eq!(draft.checklist_docs, vec!["INE"]);
        assert!(draft.questions_for_lawyer.is_empty());
        assert!(draft.disclaimer.is_none());
    }
}
