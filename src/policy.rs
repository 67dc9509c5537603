//! Unauthorized-practice-of-law (UPL) scanner.
//!
//! Bilingual (English/Spanish) regex rules over generated text. Any match
//! blocks the text; the scanner errs on the side of over-blocking since a
//! human reviews every blocked output anyway.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Flag code attached to any blocked text.
pub const UPL_FLAG: &str = "UPL_DETECTED";

/// Value written to `policy_status` on blocked records.
pub const BLOCKED_STATUS: &str = "BLOCKED – requires human review";

/// Key holding per-field match details on annotated records.
pub const COMPLIANCE_FLAGS_KEY: &str = "compliance_flags";

/// Key holding [`BLOCKED_STATUS`] on annotated records.
pub const POLICY_STATUS_KEY: &str = "policy_status";

/// (pattern, description). Patterns are compiled case-insensitive.
const ENGLISH_RULES: &[(&str, &str)] = &[
    (r"\byou should file\b", "Directive to file a legal document"),
    (r"\byou must file\b", "Directive to file a legal document"),
    (
        r"\bi recommend (filing|suing|demanding|petitioning)",
        "Recommending legal action",
    ),
    (
        r"\byou should (sue|demand|petition|appeal|file)",
        "Advising specific legal action",
    ),
    (r"\byour best (legal )?option is\b", "Prescribing legal strategy"),
    (r"\bfile form [A-Z0-9-]+\b", "Directing to file a specific form"),
    (
        r"\byou (have|need) a (strong|good|valid) case\b",
        "Assessing legal merits",
    ),
    (r"\byou will (likely )?win\b", "Predicting legal outcomes"),
    (
        r"\bguarantee[ds]?\b.*\b(outcome|result|approval)\b",
        "Guaranteeing legal outcomes",
    ),
    (
        r"\bas your (lawyer|attorney|legal counsel)\b",
        "Impersonating attorney",
    ),
    (
        r"\bmy legal (advice|opinion|recommendation)\b",
        "Presenting as legal advice",
    ),
    (
        r"\blegally (obligated|required|bound) to\b",
        "Stating legal obligations",
    ),
];

const SPANISH_RULES: &[(&str, &str)] = &[
    (
        r"\bdebes (presentar|demandar|apelar|solicitar)\b",
        "Aconsejando acción legal específica",
    ),
    (
        r"\bte recomiendo (demandar|presentar|apelar)",
        "Recomendando acción legal",
    ),
    (
        r"\bpresenta (el|la|los|las) (formulario|forma|demanda|solicitud)\b",
        "Dirigiendo a presentar documento legal",
    ),
    (r"\btienes un (buen|fuerte) caso\b", "Evaluando méritos legales"),
    (r"\bcomo tu abogado\b", "Haciéndose pasar por abogado"),
    (r"\bmi consejo legal\b", "Presentando como consejo legal"),
    (r"\bestás legalmente obligado\b", "Afirmando obligaciones legales"),
    (r"\bvas a ganar\b", "Prediciendo resultado legal"),
];

/// A compiled UPL rule.
#[derive(Debug, Clone)]
pub struct UplRule {
    pub regex: Regex,
    pub description: String,
}

impl UplRule {
    pub fn compile(pattern: &str, description: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&format!("(?i){pattern}"))?,
            description: description.to_string(),
        })
    }
}

/// Outcome of scanning one piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCheckResult {
    pub is_blocked: bool,
    /// De-duplicated flag codes.
    pub flags: Vec<String>,
    /// One `Pattern matched: ...` entry per matching rule.
    pub details: Vec<String>,
}

/// Stateless UPL scanner.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<UplRule>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine {
    /// Engine with the built-in English and Spanish rules.
    pub fn new() -> Self {
        let rules = ENGLISH_RULES
            .iter()
            .chain(SPANISH_RULES)
            .filter_map(|(pattern, description)| match UplRule::compile(pattern, description) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!(pattern, error = %e, "Skipping invalid UPL rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Built-in rules plus caller-supplied `(pattern, description)` pairs.
    pub fn with_extra_rules(extra: &[(&str, &str)]) -> Result<Self, regex::Error> {
        let mut engine = Self::new();
        for (pattern, description) in extra {
            engine.rules.push(UplRule::compile(pattern, description)?);
        }
        Ok(engine)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Scan `text` against every rule, collecting all matches.
    pub fn scan(&self, text: &str) -> PolicyCheckResult {
        let details: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| rule.regex.is_match(text))
            .map(|rule| format!("Pattern matched: {}", rule.description))
            .collect();

        if details.is_empty() {
            return PolicyCheckResult::default();
        }

        debug!(matches = details.len(), "UPL rules matched");
        PolicyCheckResult {
            is_blocked: true,
            flags: vec![UPL_FLAG.to_string()],
            details,
        }
    }

    /// Scan every string field, and every string inside list fields, of a
    /// JSON object.
    ///
    /// When anything matches, `compliance_flags` (prefixed by field name,
    /// `key[]` for list items) and `policy_status` are added. Clean records
    /// and non-object values come back unchanged.
    pub fn check_and_annotate(&self, record: Value) -> Value {
        let Value::Object(mut map) = record else {
            return record;
        };

        let mut compliance_flags = Vec::new();
        for (key, value) in &map {
            if key == COMPLIANCE_FLAGS_KEY || key == POLICY_STATUS_KEY {
                continue;
            }
            match value {
                Value::String(text) => {
                    let check = self.scan(text);
                    compliance_flags.extend(check.details.iter().map(|d| format!("{key}: {d}")));
                }
                Value::Array(items) => {
                    for item in items.iter().filter_map(Value::as_str) {
                        let check = self.scan(item);
                        compliance_flags
                            .extend(check.details.iter().map(|d| format!("{key}[]: {d}")));
                    }
                }
                _ => {}
            }
        }

        if !compliance_flags.is_empty() {
            debug!(flags = compliance_flags.len(), "Record blocked by policy");
            map.insert(
                COMPLIANCE_FLAGS_KEY.to_string(),
                Value::Array(compliance_flags.into_iter().map(Value::String).collect()),
            );
            map.insert(
                POLICY_STATUS_KEY.to_string(),
                Value::String(BLOCKED_STATUS.to_string()),
            );
        }
        Value::Object(map)
    }
}

/// Whether a record was annotated as blocked by [`PolicyEngine::check_and_annotate`].
pub fn is_blocked(record: &Value) -> bool {
    record
        .get(COMPLIANCE_FLAGS_KEY)
        .and_then(Value::as_array)
        .is_some_and(|flags| !flags.is_empty())
}
