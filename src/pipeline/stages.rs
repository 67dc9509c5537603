//! Pipeline stage vocabulary.
//!
//! Two flows share one vocabulary: the 9-stage Mexican flow and the
//! 7-stage US flow. Any stage from either flow is a valid transition
//! target; the board is laid out in the Mexican ordering.

use serde::{Deserialize, Serialize};

/// Every stage known to either flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    NewLead,
    IntakeCompleted,
    DocsPending,
    ExpedienteDraft,
    PendingApproval,
    Approved,
    ContractOnboarding,
    InProgress,
    Closed,
    NewIntake,
    Qualified,
    MatterCreated,
    CasePacketPending,
}

/// Stage ordering for Mexican verticals. Also the board layout.
pub const MX_STAGES: [PipelineStage; 9] = [
    PipelineStage::NewLead,
    PipelineStage::IntakeCompleted,
    PipelineStage::DocsPending,
    PipelineStage::ExpedienteDraft,
    PipelineStage::PendingApproval,
    PipelineStage::Approved,
    PipelineStage::ContractOnboarding,
    PipelineStage::InProgress,
    PipelineStage::Closed,
];

/// Stage ordering for US verticals.
pub const US_STAGES: [PipelineStage; 7] = [
    PipelineStage::NewIntake,
    PipelineStage::Qualified,
    PipelineStage::MatterCreated,
    PipelineStage::DocsPending,
    PipelineStage::CasePacketPending,
    PipelineStage::Approved,
    PipelineStage::Closed,
];

/// Which ordering a vertical follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineFlow {
    Mx,
    Us,
}

impl PipelineFlow {
    pub fn stages(self) -> &'static [PipelineStage] {
        match self {
            Self::Mx => &MX_STAGES,
            Self::Us => &US_STAGES,
        }
    }
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewLead => "new_lead",
            Self::IntakeCompleted => "intake_completed",
            Self::DocsPending => "docs_pending",
            Self::ExpedienteDraft => "expediente_draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::ContractOnboarding => "contract_onboarding",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
            Self::NewIntake => "new_intake",
            Self::Qualified => "qualified",
            Self::MatterCreated => "matter_created",
            Self::CasePacketPending => "case_packet_pending",
        }
    }

    /// Static suggestion shown on the board for items in this stage.
    pub fn next_action(&self) -> &'static str {
        match self {
            Self::NewLead => "Revisar lead y contactar",
            Self::IntakeCompleted => "Verificar datos y crear expediente",
            Self::DocsPending => "Recopilar documentos faltantes",
            Self::ExpedienteDraft => "Generar borrador de expediente",
            Self::PendingApproval => "Revisar y aprobar expediente",
            Self::Approved => "Enviar convenio/contrato al cliente",
            Self::ContractOnboarding => "Confirmar firma y onboarding",
            Self::InProgress => "Dar seguimiento al caso",
            Self::Closed => "Archivado",
            Self::NewIntake => "Review intake and qualify",
            Self::Qualified => "Create matter from intake",
            Self::MatterCreated => "Upload required documents",
            Self::CasePacketPending => "Review and approve case packet",
        }
    }

    /// Whether the stage appears on the (Mexican-ordered) board.
    pub fn on_board(&self) -> bool {
        MX_STAGES.contains(self)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MX_STAGES
            .iter()
            .chain(US_STAGES.iter())
            .find(|stage| stage.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Invalid stage: {s}"))
    }
}
