//! Turns raw generated text into the gated agent output record.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use super::definition::{AgentDefinition, AgentRegistry};
use super::urgency::UrgencyClassifier;
use crate::error::GateError;
use crate::model::AgentRunStatus;
use crate::policy::{self, COMPLIANCE_FLAGS_KEY, PolicyEngine};

pub const DEFAULT_DISCLAIMER: &str = "This output requires review by a licensed professional.";

/// Markers in generated text that mean the agent is asking for more input.
const MISSING_MARKERS: &[&str] = &["faltante", "needs input"];

pub struct AgentOutputBuilder {
    registry: Arc<AgentRegistry>,
    policy: Arc<PolicyEngine>,
    urgency: Arc<dyn UrgencyClassifier>,
}

impl AgentOutputBuilder {
    pub fn new(
        registry: Arc<AgentRegistry>,
        policy: Arc<PolicyEngine>,
        urgency: Arc<dyn UrgencyClassifier>,
    ) -> Self {
        Self {
            registry,
            policy,
            urgency,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn definition(&self, agent: &str) -> Result<Arc<AgentDefinition>, GateError> {
        self.registry
            .get(agent)
            .ok_or_else(|| GateError::InvalidArgument(format!("Unknown agent: {agent}")))
    }

    /// Build the policy-checked output for one run.
    ///
    /// The result always carries `requires_approval: true` and a disclaimer.
    pub fn build(&self, agent: &str, input: &Value, raw: &str) -> Result<Value, GateError> {
        let def = self.definition(agent)?;

        let record = json!({
            "agent_name": def.name,
            "case_packet": raw,
            "questions_to_ask": questions_to_ask(&def, input, raw),
            "next_actions": def.next_actions(),
            "urgency_flags": self.urgency.classify_input(input),
            COMPLIANCE_FLAGS_KEY: [],
        });

        let Value::Object(mut map) = self.policy.check_and_annotate(record) else {
            return Ok(Value::Object(Map::new()));
        };
        map.insert("requires_approval".to_string(), Value::Bool(true));
        map.insert(
            "disclaimer".to_string(),
            Value::String(
                def.disclaimer
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DISCLAIMER.to_string()),
            ),
        );
        Ok(Value::Object(map))
    }
}

/// Status a freshly built run should be stored with.
pub fn run_status(output: &Value) -> AgentRunStatus {
    if policy::is_blocked(output) {
        AgentRunStatus::Blocked
    } else {
        AgentRunStatus::NeedsApproval
    }
}

fn questions_to_ask(def: &AgentDefinition, input: &Value, raw: &str) -> Vec<String> {
    let lowered = raw.to_lowercase();
    let asks_for_input =
        raw.contains("Missing") || MISSING_MARKERS.iter().any(|m| lowered.contains(m));
    if !asks_for_input {
        return Vec::new();
    }
    def.required_input_fields
        .iter()
        .filter(|field| !is_truthy(input.get(field.as_str())))
        .map(|field| format!("Please provide: {field}"))
        .collect()
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::urgency::KeywordUrgencyClassifier;
    use crate::policy::{BLOCKED_STATUS, POLICY_STATUS_KEY};

    fn builder() -> AgentOutputBuilder {
        AgentOutputBuilder::new(
            Arc::new(AgentRegistry::builtin().unwrap()),
            Arc::new(PolicyEngine::new()),
            Arc::new(KeywordUrgencyClassifier::default()),
        )
    }

    #[test]
    fn clean_output_needs_approval() {
        let out = builder()
            .build(
                "intake_specialist",
                &json!({"case_type": "immigration", "description": "Visa question"}),
                "Summary ready for review.",
            )
            .unwrap();

        assert_eq!(out["agent_name"], "intake_specialist");
        assert_eq!(out["case_packet"], "Summary ready for review.");
        assert_eq!(out["requires_approval"], true);
        assert_eq!(out[COMPLIANCE_FLAGS_KEY], json!([]));
        assert!(out.get(POLICY_STATUS_KEY).is_none());
        assert_eq!(out["questions_to_ask"], json!([]));
        assert_eq!(out["next_actions"].as_array().unwrap().len(), 3);
        assert_eq!(run_status(&out), AgentRunStatus::NeedsApproval);
    }

    #[test]
    fn legal_advice_is_blocked() {
        let out = builder()
            .build(
                "intake_specialist",
                &json!({"case_type": "immigration"}),
                "You should file Form I-130 immediately.",
            )
            .unwrap();

        let flags = out[COMPLIANCE_FLAGS_KEY].as_array().unwrap();
        assert!(!flags.is_empty());
        assert!(flags[0].as_str().unwrap().starts_with("case_packet: Pattern matched:"));
        assert_eq!(out[POLICY_STATUS_KEY], BLOCKED_STATUS);
        assert_eq!(out["requires_approval"], true);
        assert_eq!(run_status(&out), AgentRunStatus::Blocked);
    }

    #[test]
    fn missing_marker_produces_questions() {
        let out = builder()
            .build(
                "intake_specialist",
                &json!({"case_type": "immigration", "description": ""}),
                "Missing info: [date_of_birth]",
            )
            .unwrap();
        assert_eq!(
            out["questions_to_ask"],
            json!([
                "Please provide: description",
                "Please provide: full_name",
                "Please provide: language",
            ])
        );
    }

    #[test]
    fn spanish_marker_produces_questions() {
        let out = builder()
            .build("mx_divorce_intake", &json!({}), "Datos faltantes: [curp]")
            .unwrap();
        assert!(!out["questions_to_ask"].as_array().unwrap().is_empty());
    }

    #[test]
    fn urgency_comes_from_input() {
        let out = builder()
            .build(
                "intake_specialist",
                &json!({"description": "Client is in custody, hearing tomorrow"}),
                "ok",
            )
            .unwrap();
        assert_eq!(
            out["urgency_flags"],
            json!(["DETAINED_PERSON", "UPCOMING_COURT_DATE"])
        );
    }

    #[test]
    fn disclaimer_defaults_when_definition_has_none() {
        let registry = AgentRegistry::from_definitions([AgentDefinition {
            name: "bare".to_string(),
            purpose: String::new(),
            boundaries: Vec::new(),
            required_input_fields: Vec::new(),
            workflow_steps: Vec::new(),
            disclaimer: None,
        }]);
        let builder = AgentOutputBuilder::new(
            Arc::new(registry),
            Arc::new(PolicyEngine::new()),
            Arc::new(KeywordUrgencyClassifier::default()),
        );
        let out = builder.build("bare", &json!({}), "text").unwrap();
        assert_eq!(out["disclaimer"], DEFAULT_DISCLAIMER);
    }

    #[test]
    fn unknown_agent_is_invalid_argument() {
        let err = builder().build("ghost", &json!({}), "text").unwrap_err();
        assert!(matches!(err, GateError::InvalidArgument(_)));
    }
}
