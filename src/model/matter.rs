//! Intakes, matters and uploaded document metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStatus {
    New,
    Processing,
    Converted,
    Archived,
}

text_enum!(IntakeStatus, "intake status", {
    New => "new",
    Processing => "processing",
    Converted => "converted",
    Archived => "archived",
});

/// A raw inbound request before it becomes a matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intake {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Free-form form payload (`case_type`, `full_name`, `nombre_completo`, ...).
    pub payload: serde_json::Value,
    pub status: IntakeStatus,
    /// Stored as text; only the stage tracker writes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_stage: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Intake {
    pub fn new(tenant_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            payload,
            status: IntakeStatus::New,
            pipeline_stage: None,
            created_at: Utc::now(),
        }
    }

    /// Builder: initial stage.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.pipeline_stage = Some(stage.into());
        self
    }

    /// Non-empty string field from the payload.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Client name, Spanish form first.
    pub fn client_name(&self) -> Option<&str> {
        self.field("nombre_completo").or_else(|| self.field("full_name"))
    }

    pub fn case_type(&self) -> Option<&str> {
        self.field("case_type")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatterStatus {
    Open,
    InProgress,
    PendingReview,
    Closed,
}

text_enum!(MatterStatus, "matter status", {
    Open => "open",
    InProgress => "in_progress",
    PendingReview => "pending_review",
    Closed => "closed",
});

/// A tracked legal case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matter {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Vertical key, e.g. `mx_divorce` or `immigration`.
    pub matter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    /// 0-100.
    pub urgency_score: u8,
    pub status: MatterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intake_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Matter {
    pub fn new(tenant_id: Uuid, matter_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            matter_type: matter_type.into(),
            jurisdiction: None,
            urgency_score: 0,
            status: MatterStatus::Open,
            pipeline_stage: None,
            intake_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: initial stage.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.pipeline_stage = Some(stage.into());
        self
    }

    /// Builder: link the originating intake.
    pub fn with_intake(mut self, intake_id: Uuid) -> Self {
        self.intake_id = Some(intake_id);
        self
    }

    /// Builder: urgency, clamped to 0-100.
    pub fn with_urgency(mut self, score: u8) -> Self {
        self.urgency_score = score.min(100);
        self
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    /// Hours since creation as of `now`.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 3600.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Verified,
    Rejected,
}

text_enum!(DocumentStatus, "document status", {
    Uploaded => "uploaded",
    Verified => "verified",
    Rejected => "rejected",
});

/// Metadata for a document attached to a matter. Bytes live elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub matter_id: Uuid,
    /// Template document key, e.g. `acta_matrimonio`.
    pub kind: String,
    pub filename: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        tenant_id: Uuid,
        matter_id: Uuid,
        kind: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            matter_id,
            kind: kind.into(),
            filename: filename.into(),
            status: DocumentStatus::Uploaded,
            created_at: Utc::now(),
        }
    }

    /// Uploaded and verified documents count toward completeness.
    pub fn counts_as_received(&self) -> bool {
        matches!(self.status, DocumentStatus::Uploaded | DocumentStatus::Verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_name_prefers_spanish_field() {
        let intake = Intake::new(
            Uuid::new_v4(),
            json!({"nombre_completo": "María López", "full_name": "Maria Lopez"}),
        );
        assert_eq!(intake.client_name(), Some("María López"));

        let intake = Intake::new(Uuid::new_v4(), json!({"nombre_completo": "  ", "full_name": "Ana"}));
        assert_eq!(intake.client_name(), Some("Ana"));

        let intake = Intake::new(Uuid::new_v4(), json!({}));
        assert_eq!(intake.client_name(), None);
    }

    #[test]
    fn urgency_is_clamped() {
        let matter = Matter::new(Uuid::new_v4(), "immigration").with_urgency(250);
        assert_eq!(matter.urgency_score, 100);
    }

    #[test]
    fn rejected_documents_do_not_count() {
        let mut doc = Document::new(Uuid::new_v4(), Uuid::new_v4(), "curp", "curp.pdf");
        assert!(doc.counts_as_received());
        doc.status = DocumentStatus::Rejected;
        assert!(!doc.counts_as_received());
    }
}
