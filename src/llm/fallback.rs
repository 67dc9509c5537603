//! Provider with template fallback.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::{PrepKitDraft, TemplateGenerator, TextGenerator};

/// Tries the primary generator, answers from templates when it is absent
/// or fails. Never returns an error.
pub struct FallbackGenerator {
    primary: Option<Arc<dyn TextGenerator>>,
    fallback: TemplateGenerator,
}

impl FallbackGenerator {
    pub fn new(primary: Option<Arc<dyn TextGenerator>>, fallback: TemplateGenerator) -> Self {
        Self { primary, fallback }
    }

    /// Template responses only.
    pub fn templates_only(fallback: TemplateGenerator) -> Self {
        Self::new(None, fallback)
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.primary.as_deref().map(|p| p.name())
    }

    pub async fn generate(&self, agent: &str, prompt: &str, context: &Value) -> String {
        if let Some(primary) = &self.primary {
            match primary.generate(agent, prompt, context).await {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => warn!(provider = primary.name(), agent, "Empty completion, using template"),
                Err(e) => warn!(provider = primary.name(), agent, error = %e, "Generation failed, using template"),
            }
        }
        self.fallback.respond(agent, context)
    }

    pub async fn generate_structured(
        &self,
        case_type: &str,
        description: &str,
        language: &str,
    ) -> PrepKitDraft {
        if let Some(primary) = &self.primary {
            match primary
                .generate_structured(case_type, description, language)
                .await
            {
                Ok(draft) => return draft,
                Err(e) => warn!(
                    provider = primary.name(),
                    case_type,
                    error = %e,
                    "Structured generation failed, using template"
                ),
            }
        }
        self.fallback.prep_kit(case_type, language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::LlmError;
    use crate::templates::TemplateRegistry;

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn generate(&self, _: &str, _: &str, _: &Value) -> Result<String, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "failing".into(),
                reason: "down".into(),
            })
        }
        async fn generate_structured(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<PrepKitDraft, LlmError> {
            Err(LlmError::NotConfigured {
                provider: "failing".into(),
            })
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl TextGenerator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn generate(&self, _: &str, _: &str, _: &Value) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
        async fn generate_structured(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<PrepKitDraft, LlmError> {
            Ok(PrepKitDraft {
                checklist_docs: vec![self.0.to_string()],
                ..PrepKitDraft::default()
            })
        }
    }

    fn templates() -> TemplateGenerator {
        TemplateGenerator::new(Arc::new(TemplateRegistry::builtin().unwrap()))
    }

    #[tokio::test]
    async fn primary_output_wins() {
        let generator = FallbackGenerator::new(Some(Arc::new(Fixed("from primary"))), templates());
        assert_eq!(generator.generate("x", "p", &json!({})).await, "from primary");
        let kit = generator.generate_structured("mx_divorce", "d", "es").await;
        assert_eq!(kit.checklist_docs, vec!["from primary"]);
    }

    #[tokio::test]
    async fn failures_fall_back_to_templates() {
        let generator = FallbackGenerator::new(Some(Arc::new(Failing)), templates());
        let text = generator
            .generate("intake_specialist", "p", &json!({"case_type": "immigration"}))
            .await;
        assert!(text.starts_with("[MOCK] Intake analysis"));
        let kit = generator.generate_structured("mx_divorce", "d", "es").await;
        assert_eq!(kit.checklist_docs.len(), 7);
    }

    #[tokio::test]
    async fn blank_completion_falls_back() {
        let generator = FallbackGenerator::new(Some(Arc::new(Fixed("   "))), templates());
        let text = generator.generate("unknown", "p", &json!({})).await;
        assert!(text.starts_with("[MOCK] Agent processing complete."));
    }
}
