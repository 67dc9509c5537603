//! Vertical templates: what each kind of matter needs before it can move on.

pub mod completeness;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pipeline::stages::PipelineFlow;

pub use completeness::{CompletenessReport, evaluate_completeness, matter_completeness};

const BUILTIN_TEMPLATES: &str = include_str!("verticals.yaml");

fn required_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDoc {
    pub key: String,
    pub label: String,
    #[serde(default = "required_by_default")]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateField {
    pub key: String,
    pub label: String,
    #[serde(default = "required_by_default")]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerticalTemplate {
    pub vertical: String,
    pub display_name: String,
    pub country: String,
    pub required_documents: Vec<TemplateDoc>,
    pub required_fields: Vec<TemplateField>,
    pub pipeline: PipelineFlow,
    /// Language code to disclaimer text.
    #[serde(default)]
    pub disclaimers: BTreeMap<String, String>,
    #[serde(default)]
    pub default_tasks: Vec<String>,
    #[serde(default)]
    pub suggested_questions: Vec<String>,
}

impl VerticalTemplate {
    /// Documents flagged as required.
    pub fn required_docs(&self) -> impl Iterator<Item = &TemplateDoc> {
        self.required_documents.iter().filter(|d| d.required)
    }

    pub fn required_field_defs(&self) -> impl Iterator<Item = &TemplateField> {
        self.required_fields.iter().filter(|f| f.required)
    }

    /// Required documents whose key is not among `received_kinds`.
    pub fn missing_docs<'a>(&'a self, received_kinds: &HashSet<&str>) -> Vec<&'a TemplateDoc> {
        self.required_docs()
            .filter(|d| !received_kinds.contains(d.key.as_str()))
            .collect()
    }

    /// Disclaimer in `language`, else Spanish, else English.
    pub fn disclaimer(&self, language: &str) -> Option<&str> {
        [language, "es", "en"]
            .iter()
            .find_map(|lang| self.disclaimers.get(*lang))
            .map(String::as_str)
    }

    /// Labels of every listed document, required or not.
    pub fn checklist(&self) -> Vec<String> {
        self.required_documents.iter().map(|d| d.label.clone()).collect()
    }
}

/// Read-only set of templates keyed by vertical.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, VerticalTemplate>,
}

impl TemplateRegistry {
    /// Templates shipped with the binary.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_TEMPLATES)
    }

    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let list: Vec<VerticalTemplate> = serde_yaml::from_str(source)
            .map_err(|e| ConfigError::ParseError(format!("vertical templates: {e}")))?;
        Ok(Self {
            templates: list
                .into_iter()
                .map(|t| (t.vertical.clone(), t))
                .collect(),
        })
    }

    pub fn get(&self, vertical: &str) -> Option<&VerticalTemplate> {
        self.templates.get(vertical)
    }

    pub fn list(&self) -> impl Iterator<Item = &VerticalTemplate> {
        self.templates.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_templates_parse() {
        let registry = TemplateRegistry::builtin().unwrap();
        let verticals: Vec<&str> = registry.list().map(|t| t.vertical.as_str()).collect();
        assert_eq!(
            verticals,
            vec!["immigration", "mx_consumer", "mx_divorce", "mx_labor", "tax_resolution"]
        );
    }

    #[test]
    fn divorce_requires_four_documents() {
        let registry = TemplateRegistry::builtin().unwrap();
        let divorce = registry.get("mx_divorce").unwrap();
        let keys: Vec<&str> = divorce.required_docs().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["acta_matrimonio", "ine_pasaporte", "curp", "comprobante_domicilio"]);
        assert_eq!(divorce.required_field_defs().count(), 7);
        assert_eq!(divorce.pipeline, PipelineFlow::Mx);
    }

    #[test]
    fn missing_docs_skip_received_and_optional() {
        let registry = TemplateRegistry::builtin().unwrap();
        let divorce = registry.get("mx_divorce").unwrap();
        let received: HashSet<&str> = ["curp", "actas_hijos"].into_iter().collect();
        let missing: Vec<&str> = divorce
            .missing_docs(&received)
            .iter()
            .map(|d| d.key.as_str())
            .collect();
        assert_eq!(missing, vec!["acta_matrimonio", "ine_pasaporte", "comprobante_domicilio"]);
    }

    #[test]
    fn disclaimer_falls_back_by_language() {
        let registry = TemplateRegistry::builtin().unwrap();
        let tax = registry.get("tax_resolution").unwrap();
        assert_eq!(tax.disclaimer("es"), Some("This tool does NOT provide tax or legal advice."));
        let divorce = registry.get("mx_divorce").unwrap();
        assert!(divorce.disclaimer("fr").unwrap().starts_with("Esta herramienta"));
        assert!(divorce.disclaimer("en").unwrap().starts_with("This tool"));
    }
}
