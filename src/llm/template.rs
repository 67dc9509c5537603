//! Deterministic generator used when no provider is configured or the
//! provider fails.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{PrepKitDraft, TextGenerator};
use crate::error::LlmError;
use crate::templates::TemplateRegistry;

pub const FALLBACK_CHECKLIST: &[&str] = &[
    "Identificación oficial",
    "Documentos relevantes a su caso",
    "Resumen escrito de su situación",
];

pub const FALLBACK_QUESTIONS: &[&str] = &[
    "¿Qué tipo de profesional debo consultar?",
    "¿Qué documentos necesito?",
    "¿Cuáles son los costos?",
];

pub const GENERIC_DISCLAIMER: &str = "Esta herramienta NO proporciona asesoría legal. \
Toda la información es orientativa y debe ser revisada por un profesional. \
No se crea relación abogado-cliente al usar esta plataforma.";

pub struct TemplateGenerator {
    templates: Arc<TemplateRegistry>,
}

impl TemplateGenerator {
    pub fn new(templates: Arc<TemplateRegistry>) -> Self {
        Self { templates }
    }

    /// Canned response for `agent`, with a few context values spliced in.
    pub fn respond(&self, agent: &str, context: &Value) -> String {
        let ctx = |key: &str, default: &str| -> String {
            context
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };

        match agent {
            "intake_specialist" => {
                let case_type = ctx("case_type", "unknown");
                format!(
                    "[MOCK] Intake analysis complete for case type: {case_type}.\n\
                     Classification: {case_type}\n\
                     Urgency: medium (no immediate court dates detected)\n\
                     Missing info: [date_of_birth, country_of_origin, current_status]\n\
                     Documents needed: [government_id, relevant_notices]\n\
                     Next step: Schedule consultation with attorney for case evaluation.\n\
                     NOTE: This is an automated summary – requires attorney review before any action."
                )
            }
            "tax_solutions_assistant" => "[MOCK] Tax case preliminary summary:\n\
                 - Tax years in question: [needs input]\n\
                 - Notice type: [needs input – CP2000, CP501, etc.]\n\
                 - Estimated liability: [needs CPA review]\n\
                 - Missing documents: [IRS notices, W-2s/1099s, prior returns]\n\
                 - Recommendation for human review: Evaluate for OIC, installment agreement, or CNC.\n\
                 NOTE: No tax advice provided. All determinations require licensed CPA/EA review."
                .to_string(),
            "paralegal_ops_assistant" => "[MOCK] Paralegal task list generated:\n\
                 1. Send document request email to client (template: DOC_REQ_01)\n\
                 2. Prepare filing checklist for jurisdiction\n\
                 3. Schedule follow-up call in 3 business days\n\
                 4. Verify court/county filing requirements (NOTE: varies by county)\n\
                 5. Prepare draft communication for attorney review\n\
                 NOTE: Filing requirements are general. Verify with specific court clerk."
                .to_string(),
            "client_personal_assistant" => "[MOCK] Client status update:\n\
                 - Your case is currently: in review\n\
                 - Documents pending: [government_id]\n\
                 - Next appointment: [pending scheduling]\n\
                 - Action items for you: Upload missing documents, confirm contact info\n\
                 NOTE: For legal questions, please speak with your assigned attorney."
                .to_string(),
            "interpreter_coordinator" => {
                let language = ctx("language", "Spanish");
                let modality = ctx("modality", "virtual");
                format!(
                    "[MOCK] Interpreter coordination:\n\
                     - Language requested: {language}\n\
                     - Modality: {modality}\n\
                     - Availability check: [simulated – 3 interpreters available]\n\
                     - Suggested slot: Next available business day, 10:00 AM\n\
                     - Confirmation status: pending\n\
                     NOTE: This is scheduling coordination only. No legal interpretation provided."
                )
            }
            "mx_divorce_intake" => "[MOCK] Divorcio incausado – intake summary:\n\
                 - Jurisdicción: México\n\
                 - Tipo: Divorcio incausado (unilateral, sin expresión de causa)\n\
                 - Documentos requeridos: [acta_matrimonio, identificación_oficial, comprobante_domicilio, CURP]\n\
                 - Datos faltantes: [domicilio_conyugal, régimen_patrimonial, hijos_menores]\n\
                 - Siguiente paso: Revisión por licenciado(a) antes de preparar demanda.\n\
                 NOTA: Este es un resumen operativo. NO constituye asesoría legal."
                .to_string(),
            _ => "[MOCK] Agent processing complete.\n\
                 Input received and analyzed. Output requires human review.\n\
                 NOTE: This is a placeholder response from the mock LLM."
                .to_string(),
        }
    }

    /// Prep kit straight from the vertical template, or generic content
    /// for unknown verticals.
    pub fn prep_kit(&self, case_type: &str, language: &str) -> PrepKitDraft {
        match self.templates.get(case_type) {
            Some(template) => PrepKitDraft {
                checklist_docs: template.checklist(),
                questions_for_lawyer: if template.suggested_questions.is_empty() {
                    owned(FALLBACK_QUESTIONS)
                } else {
                    template.suggested_questions.clone()
                },
                disclaimer: Some(
                    template
                        .disclaimer(language)
                        .unwrap_or(GENERIC_DISCLAIMER)
                        .to_string(),
                ),
                summary: None,
            },
            None => PrepKitDraft {
                checklist_docs: owned(FALLBACK_CHECKLIST),
                questions_for_lawyer: owned(FALLBACK_QUESTIONS),
                disclaimer: Some(GENERIC_DISCLAIMER.to_string()),
                summary: None,
            },
        }
    }
}

pub(crate) fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl TextGenerator for TemplateGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(
        &self,
        agent: &str,
        _prompt: &str,
        context: &Value,
    ) -> Result<String, LlmError> {
        Ok(self.respond(agent, context))
    }

    async fn generate_structured(
        &self,
        case_type: &str,
        _description: &str,
        language: &str,
    ) -> Result<PrepKitDraft, LlmError> {
        Ok(self.prep_kit(case_type, language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generator() -> TemplateGenerator {
        TemplateGenerator::new(Arc::new(TemplateRegistry::builtin().unwrap()))
    }

    #[test]
    fn intake_response_mentions_case_type() {
        let text = generator().respond("intake_specialist", &json!({"case_type": "immigration"}));
        assert!(text.starts_with("[MOCK] Intake analysis complete for case type: immigration."));
        assert!(text.contains("Missing info"));
    }

    #[test]
    fn interpreter_defaults() {
        let text = generator().respond("interpreter_coordinator", &json!({}));
        assert!(text.contains("Language requested: Spanish"));
        assert!(text.contains("Modality: virtual"));
    }

    #[test]
    fn unknown_agent_gets_placeholder() {
        let text = generator().respond("nobody", &json!({}));
        assert!(text.starts_with("[MOCK] Agent processing complete."));
    }

    #[test]
    fn prep_kit_from_template() {
        let kit = generator().prep_kit("mx_divorce", "en");
        assert_eq!(kit.checklist_docs.len(), 7);
        assert!(!kit.questions_for_lawyer.is_empty());
        assert!(kit.disclaimer.unwrap().starts_with("This tool"));
    }

    #[test]
    fn prep_kit_for_unknown_vertical() {
        let kit = generator().prep_kit("space_law", "es");
        assert_eq!(kit.checklist_docs, owned(FALLBACK_CHECKLIST));
        assert_eq!(kit.questions_for_lawyer, owned(FALLBACK_QUESTIONS));
        assert_eq!(kit.disclaimer.as_deref(), Some(GENERIC_DISCLAIMER));
    }

    #[tokio::test]
    async fn trait_methods_never_fail() {
        let generator = generator();
        let text = generator
            .generate("mx_divorce_intake", "prompt", &json!({}))
            .await
            .unwrap();
        assert!(text.contains("Datos faltantes"));
        let kit = generator
            .generate_structured("tax_resolution", "IRS letter", "es")
            .await
            .unwrap();
        assert!(!kit.checklist_docs.is_empty());
    }
}
