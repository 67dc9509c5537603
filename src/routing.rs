//! Lead routing to partner tenants by vertical and region.
//!
//! Rules live in an explicit [`RuleStore`] built at startup. Among several
//! matching rules the pick is a hash of the lead id, so the same lead always
//! lands on the same tenant. This spreads leads but does not balance load.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ConfigError, GateError};
use crate::model::AuditEvent;
use crate::model::event::LEAD_ROUTED;
use crate::store::Database;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub vertical: String,
    /// `None` makes this a catch-all for the vertical.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub tenant_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: Vec<RoutingRule>,
}

impl RuleStore {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    /// Load a JSON array of rules.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let rules: Vec<RoutingRule> = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
        info!(count = rules.len(), path = %path.display(), "Routing rules loaded");
        Ok(Self { rules })
    }

    pub fn with_rule(mut self, rule: RoutingRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules matching vertical and region exactly, or the vertical's
    /// catch-alls when there are none.
    pub fn candidates(&self, vertical: &str, region: Option<&str>) -> Vec<&RoutingRule> {
        let exact: Vec<&RoutingRule> = self
            .rules
            .iter()
            .filter(|r| r.vertical == vertical)
            .filter(|r| r.region.is_some() && r.region.as_deref() == region)
            .collect();
        if !exact.is_empty() {
            return exact;
        }
        self.rules
            .iter()
            .filter(|r| r.vertical == vertical && r.region.is_none())
            .collect()
    }
}

/// A lead to be routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub vertical: String,
    /// Contact data; `entidad_federativa` or `region` selects regional rules.
    #[serde(default)]
    pub contact: Value,
}

impl Lead {
    pub fn region(&self) -> Option<&str> {
        ["entidad_federativa", "region"]
            .iter()
            .find_map(|key| {
                self.contact
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|r| !r.is_empty())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub tenant_id: Uuid,
    pub rule_matched: String,
}

/// SHA-256 of `key` read as a big-endian integer, modulo `n`.
fn hash_index(key: &str, n: usize) -> usize {
    let digest = Sha256::digest(key.as_bytes());
    let n = n as u128;
    let rem = digest
        .iter()
        .fold(0u128, |rem, &byte| (rem * 256 + u128::from(byte)) % n);
    rem as usize
}

pub struct LeadRouter {
    rules: Arc<RuleStore>,
    db: Arc<dyn Database>,
}

impl LeadRouter {
    pub fn new(rules: Arc<RuleStore>, db: Arc<dyn Database>) -> Self {
        Self { rules, db }
    }

    /// Pick a rule for the lead without side effects.
    pub fn decide(&self, lead: &Lead) -> Option<RoutingDecision> {
        if lead.vertical.is_empty() {
            return None;
        }
        let candidates = self.rules.candidates(&lead.vertical, lead.region());
        if candidates.is_empty() {
            return None;
        }
        let selected = candidates[hash_index(&lead.id.to_string(), candidates.len())];
        let rule_matched = match &selected.region {
            Some(region) => format!("vertical={}, region={region}", selected.vertical),
            None => format!("vertical={}", selected.vertical),
        };
        Some(RoutingDecision {
            tenant_id: selected.tenant_id,
            rule_matched,
        })
    }

    /// Route the lead and record `lead_routed` under the receiving tenant.
    pub async fn route(&self, lead: &Lead) -> Result<Option<RoutingDecision>, GateError> {
        let Some(decision) = self.decide(lead) else {
            debug!(lead_id = %lead.id, vertical = %lead.vertical, "No routing rule matched");
            return Ok(None);
        };
        self.db
            .insert_event(&AuditEvent::new(
                decision.tenant_id,
                LEAD_ROUTED,
                json!({
                    "lead_id": lead.id,
                    "vertical": lead.vertical,
                    "region": lead.region(),
                    "routed_to_tenant": decision.tenant_id,
                    "rule_matched": decision.rule_matched,
                }),
            ))
            .await?;
        info!(lead_id = %lead.id, tenant_id = %decision.tenant_id, rule = %decision.rule_matched, "Lead routed");
        Ok(Some(decision))
    }
}
