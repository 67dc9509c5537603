//! Urgency detection over run input.

use serde_json::Value;

pub const DETAINED_PERSON: &str = "DETAINED_PERSON";
pub const UPCOMING_COURT_DATE: &str = "UPCOMING_COURT_DATE";
pub const DEADLINE_APPROACHING: &str = "DEADLINE_APPROACHING";
pub const REMOVAL_PROCEEDINGS: &str = "REMOVAL_PROCEEDINGS";

/// Maps free text to a set of urgency flags.
pub trait UrgencyClassifier: Send + Sync {
    /// Flags raised by `text`, in a stable order, without duplicates.
    fn classify(&self, text: &str) -> Vec<String>;

    /// Classify the serialized form of a structured input.
    fn classify_input(&self, input: &Value) -> Vec<String> {
        self.classify(&input.to_string())
    }
}

/// Bilingual substring matcher: each flag fires when any of its keywords
/// appears in the lowercased text.
#[derive(Debug, Clone)]
pub struct KeywordUrgencyClassifier {
    rules: Vec<(String, Vec<String>)>,
}

impl Default for KeywordUrgencyClassifier {
    fn default() -> Self {
        let rules: &[(&str, &[&str])] = &[
            (DETAINED_PERSON, &["detained", "detenido", "custody", "jail"]),
            (UPCOMING_COURT_DATE, &["court date", "hearing", "audiencia"]),
            (DEADLINE_APPROACHING, &["deadline", "vence", "expires"]),
            (REMOVAL_PROCEEDINGS, &["deportation", "removal", "deportación"]),
        ];
        Self {
            rules: rules
                .iter()
                .map(|(flag, keywords)| {
                    (
                        flag.to_string(),
                        keywords.iter().map(|k| k.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl KeywordUrgencyClassifier {
    /// Builder: add or extend a flag's keyword list.
    pub fn with_rule(mut self, flag: &str, keywords: &[&str]) -> Self {
        let keywords = keywords.iter().map(|k| k.to_lowercase());
        match self.rules.iter_mut().find(|(f, _)| f == flag) {
            Some((_, existing)) => existing.extend(keywords),
            None => self.rules.push((flag.to_string(), keywords.collect())),
        }
        self
    }
}

impl UrgencyClassifier for KeywordUrgencyClassifier {
    fn classify(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(flag, _)| flag.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_keywords_no_flags() {
        let classifier = KeywordUrgencyClassifier::default();
        assert!(classifier.classify("Routine question about paperwork").is_empty());
    }

    #[test]
    fn several_flags_can_fire() {
        let classifier = KeywordUrgencyClassifier::default();
        let flags = classifier.classify_input(&json!({
            "description": "My brother is DETAINED and has a hearing next week",
            "notes": "Posible deportación",
        }));
        assert_eq!(flags, vec![DETAINED_PERSON, UPCOMING_COURT_DATE, REMOVAL_PROCEEDINGS]);
    }

    #[test]
    fn spanish_keywords() {
        let classifier = KeywordUrgencyClassifier::default();
        assert_eq!(classifier.classify("El plazo vence el lunes"), vec![DEADLINE_APPROACHING]);
        assert_eq!(classifier.classify("Está detenido"), vec![DETAINED_PERSON]);
    }

    #[test]
    fn custom_rules_extend_defaults() {
        let classifier = KeywordUrgencyClassifier::default()
            .with_rule("MINOR_INVOLVED", &["Minor"])
            .with_rule(DETAINED_PERSON, &["arrested"]);
        assert_eq!(
            classifier.classify("A minor was arrested"),
            vec![DETAINED_PERSON, "MINOR_INVOLVED"]
        );
    }
}
