//! Client-facing preparation kit: a document checklist and questions to
//! bring to a professional.
//!
//! Generated content is policy-scanned. When anything is flagged the kit is
//! rebuilt from the vertical template instead of showing generated text.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::llm::template::{FALLBACK_CHECKLIST, FALLBACK_QUESTIONS, GENERIC_DISCLAIMER, owned};
use crate::llm::FallbackGenerator;
use crate::policy::{self, COMPLIANCE_FLAGS_KEY, PolicyEngine};
use crate::templates::TemplateRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepKit {
    pub case_type: String,
    pub language: String,
    pub checklist_docs: Vec<String>,
    pub questions_for_lawyer: Vec<String>,
    pub disclaimer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Generated content was flagged and replaced by template content.
    pub policy_blocked: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compliance_flags: Vec<String>,
}

pub struct PrepKitBuilder {
    generator: Arc<FallbackGenerator>,
    policy: Arc<PolicyEngine>,
    templates: Arc<TemplateRegistry>,
}

impl PrepKitBuilder {
    pub fn new(
        generator: Arc<FallbackGenerator>,
        policy: Arc<PolicyEngine>,
        templates: Arc<TemplateRegistry>,
    ) -> Self {
        Self {
            generator,
            policy,
            templates,
        }
    }

    fn template_checklist(&self, case_type: &str) -> Vec<String> {
        self.templates
            .get(case_type)
            .map(|t| t.checklist())
            .unwrap_or_else(|| owned(FALLBACK_CHECKLIST))
    }

    fn template_questions(&self, case_type: &str) -> Vec<String> {
        self.templates
            .get(case_type)
            .filter(|t| !t.suggested_questions.is_empty())
            .map(|t| t.suggested_questions.clone())
            .unwrap_or_else(|| owned(FALLBACK_QUESTIONS))
    }

    fn template_disclaimer(&self, case_type: &str, language: &str) -> String {
        self.templates
            .get(case_type)
            .and_then(|t| t.disclaimer(language))
            .unwrap_or(GENERIC_DISCLAIMER)
            .to_string()
    }

    pub async fn build(&self, case_type: &str, description: &str, language: &str) -> PrepKit {
        let draft = self
            .generator
            .generate_structured(case_type, description, language)
            .await;

        let annotated = self.policy.check_and_annotate(json!({
            "checklist_docs": draft.checklist_docs,
            "questions_for_lawyer": draft.questions_for_lawyer,
            "disclaimer": draft.disclaimer,
            "summary": draft.summary,
        }));

        if policy::is_blocked(&annotated) {
            let flags: Vec<String> = annotated[COMPLIANCE_FLAGS_KEY]
                .as_array()
                .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            warn!(case_type, flags = flags.len(), "Prep kit content flagged, using template");
            return PrepKit {
                case_type: case_type.to_string(),
                language: language.to_string(),
                checklist_docs: self.template_checklist(case_type),
                questions_for_lawyer: self.template_questions(case_type),
                disclaimer: self.template_disclaimer(case_type, language),
                summary: None,
                policy_blocked: true,
                compliance_flags: flags,
            };
        }

        let checklist_docs = if draft.checklist_docs.is_empty() {
            self.template_checklist(case_type)
        } else {
            draft.checklist_docs
        };
        let questions_for_lawyer = if draft.questions_for_lawyer.is_empty() {
            self.template_questions(case_type)
        } else {
            draft.questions_for_lawyer
        };
        let disclaimer = draft
            .disclaimer
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| self.template_disclaimer(case_type, language));

        info!(case_type, docs = checklist_docs.len(), "Prep kit built");
        PrepKit {
            case_type: case_type.to_string(),
            language: language.to_string(),
            checklist_docs,
            questions_for_lawyer,
            disclaimer,
            summary: draft.summary,
            policy_blocked: false,
            compliance_flags: Vec::new(),
        }
    }
}
