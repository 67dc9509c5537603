//! Declarative agent definitions and the registry that holds them.
//!
//! Definitions are YAML documents. The built-in set is compiled into the
//! binary; an optional directory can add to or replace them at startup.
//! After construction the registry is read-only.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ConfigError;

const BUILTIN_DEFINITIONS: &[(&str, &str)] = &[
    ("intake_specialist.yaml", include_str!("definitions/intake_specialist.yaml")),
    ("tax_solutions_assistant.yaml", include_str!("definitions/tax_solutions_assistant.yaml")),
    ("paralegal_ops_assistant.yaml", include_str!("definitions/paralegal_ops_assistant.yaml")),
    ("client_personal_assistant.yaml", include_str!("definitions/client_personal_assistant.yaml")),
    ("interpreter_coordinator.yaml", include_str!("definitions/interpreter_coordinator.yaml")),
    ("mx_divorce_intake.yaml", include_str!("definitions/mx_divorce_intake.yaml")),
];

/// One step of an agent's workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    /// Template with `{{key}}` placeholders filled from the run input.
    #[serde(default)]
    pub prompt_template: String,
    /// Follow-up task this step suggests, surfaced as a next action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creates_task: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub boundaries: Vec<String>,
    /// Input keys the agent expects; absent ones become questions.
    #[serde(default)]
    pub required_input_fields: Vec<String>,
    #[serde(default)]
    pub workflow_steps: Vec<WorkflowStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
}

/// What the API lists for each agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub name: String,
    pub purpose: String,
    pub boundaries: Vec<String>,
    pub workflow_steps: Vec<String>,
}

impl AgentDefinition {
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(source)
            .map_err(|e| ConfigError::ParseError(format!("agent definition: {e}")))
    }

    /// Prompt: header lines, then one line per workflow step with the
    /// input substituted into its template.
    pub fn build_prompt(&self, input: &Value) -> String {
        let mut parts = vec![
            format!("Agent: {}", self.name),
            format!("Purpose: {}", self.purpose),
        ];
        if !self.boundaries.is_empty() {
            parts.push(format!("Boundaries: {}", self.boundaries.join("; ")));
        }
        for step in &self.workflow_steps {
            parts.push(format!(
                "Step [{}]: {}",
                step.name,
                substitute(&step.prompt_template, input)
            ));
        }
        parts.join("\n")
    }

    /// Follow-up tasks named by the workflow steps, in order.
    pub fn next_actions(&self) -> Vec<String> {
        self.workflow_steps
            .iter()
            .filter_map(|s| s.creates_task.clone())
            .collect()
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            name: self.name.clone(),
            purpose: self.purpose.clone(),
            boundaries: self.boundaries.clone(),
            workflow_steps: self.workflow_steps.iter().map(|s| s.name.clone()).collect(),
        }
    }
}

/// Replace `{{key}}` with each top-level input value. Unknown placeholders stay.
fn substitute(template: &str, input: &Value) -> String {
    let Some(map) = input.as_object() else {
        return template.to_string();
    };
    map.iter().fold(template.to_string(), |acc, (key, value)| {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        acc.replace(&format!("{{{{{key}}}}}"), &rendered)
    })
}

/// Immutable set of agent definitions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<AgentDefinition>>,
}

impl AgentRegistry {
    /// The definitions shipped with the binary.
    pub fn builtin() -> Result<Self, ConfigError> {
        let mut agents = BTreeMap::new();
        for (file, source) in BUILTIN_DEFINITIONS {
            let def = AgentDefinition::from_yaml(source)
                .map_err(|e| ConfigError::ParseError(format!("{file}: {e}")))?;
            agents.insert(def.name.clone(), Arc::new(def));
        }
        Ok(Self { agents })
    }

    /// Built-ins plus every `*.yaml` in `dir`. Same-named files replace built-ins.
    pub fn with_dir(dir: &Path) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin()?;
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
            .collect();
        paths.sort();

        for path in paths {
            let source = std::fs::read_to_string(&path)?;
            let def = AgentDefinition::from_yaml(&source)
                .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
            debug!(agent = %def.name, path = %path.display(), "Loaded agent definition");
            registry.agents.insert(def.name.clone(), Arc::new(def));
        }
        info!(count = registry.agents.len(), dir = %dir.display(), "Agent registry loaded");
        Ok(registry)
    }

    /// Build from already-parsed definitions.
    pub fn from_definitions(defs: impl IntoIterator<Item = AgentDefinition>) -> Self {
        Self {
            agents: defs
                .into_iter()
                .map(|d| (d.name.clone(), Arc::new(d)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<AgentDefinition>> {
        self.agents.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn summaries(&self) -> Vec<AgentSummary> {
        self.agents.values().map(|d| d.summary()).collect()
    }
}
