//! On-demand cadence checks: SLA nudges and document reminders.
//!
//! Nothing here runs on a timer. Each check is called explicitly (by the
//! API or an external poller) and re-derives what to do from stored state,
//! so repeating a call creates nothing new.

pub mod doc_chase;
pub mod sla;
pub mod whatsapp;

pub use doc_chase::{DocChaser, DocReminder};
pub use sla::{SlaBreach, SlaChecker};
pub use whatsapp::{WhatsappReminder, WhatsappReminders};

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::config::MAX_CADENCE_HOURS;
use crate::error::GateError;
use crate::model::{Intake, Matter};
use crate::pipeline::PipelineStage;
use crate::store::Database;
use crate::templates::{TemplateDoc, TemplateRegistry};

/// Stage whose matters are chased for documents.
pub(crate) const CHASED_STAGE: PipelineStage = PipelineStage::DocsPending;

/// A configured hour threshold as a duration.
///
/// Fails for negative, non-finite or absurdly large values instead of
/// overflowing.
pub(crate) fn hours(h: f64) -> Result<Duration, GateError> {
    let out_of_range =
        || GateError::InvalidArgument(format!("{h} hours is not between 0 and {MAX_CADENCE_HOURS}"));
    if !h.is_finite() || !(0.0..=MAX_CADENCE_HOURS).contains(&h) {
        return Err(out_of_range());
    }
    Duration::try_seconds((h * 3600.0).round() as i64).ok_or_else(out_of_range)
}

/// `now` minus `window`, or an error if that leaves chrono's range.
pub(crate) fn cutoff(now: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>, GateError> {
    now.checked_sub_signed(window)
        .ok_or_else(|| GateError::InvalidArgument(format!("{now} minus {window} is out of range")))
}

/// Whether `last` falls inside the cooldown window ending at `now`.
pub(crate) fn in_cooldown(last: Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown: Duration) -> bool {
    last.is_some_and(|last| now - last < cooldown)
}

/// Required template documents the matter has not received yet.
/// Empty when the vertical has no template.
pub(crate) async fn missing_documents(
    db: &dyn Database,
    templates: &TemplateRegistry,
    matter: &Matter,
) -> Result<Vec<TemplateDoc>, GateError> {
    let Some(template) = templates.get(&matter.matter_type) else {
        return Ok(Vec::new());
    };
    let documents = db.list_documents(matter.tenant_id, matter.id).await?;
    let received: HashSet<&str> = documents
        .iter()
        .filter(|d| d.counts_as_received())
        .map(|d| d.kind.as_str())
        .collect();
    Ok(template
        .missing_docs(&received)
        .into_iter()
        .cloned()
        .collect())
}

pub(crate) async fn matter_intake(
    db: &dyn Database,
    matter: &Matter,
) -> Result<Option<Intake>, GateError> {
    match matter.intake_id {
        Some(id) => Ok(db.get_intake(matter.tenant_id, id).await?),
        None => Ok(None),
    }
}
