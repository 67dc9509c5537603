//! Document and field completeness of a matter against its vertical template.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GateError;
use crate::model::{Document, Intake, Matter};
use crate::store::Database;
use crate::templates::{TemplateRegistry, VerticalTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub matter_id: Uuid,
    pub vertical: String,
    pub docs_required: usize,
    /// Required documents received (uploaded or verified).
    pub docs_uploaded: usize,
    /// Labels of required documents still missing.
    pub docs_missing: Vec<String>,
    pub fields_required: usize,
    pub fields_present: usize,
    pub fields_missing: Vec<String>,
    /// Percentage of all requirements met, one decimal.
    pub completeness_pct: f64,
    pub is_complete: bool,
}

/// Pure completeness calculation.
///
/// Fields are read from the intake payload; blank strings and nulls count
/// as missing. A matter without a template has no requirements.
pub fn evaluate_completeness(
    matter: &Matter,
    template: Option<&VerticalTemplate>,
    documents: &[Document],
    intake: Option<&Intake>,
) -> CompletenessReport {
    let Some(template) = template else {
        return CompletenessReport {
            matter_id: matter.id,
            vertical: matter.matter_type.clone(),
            docs_required: 0,
            docs_uploaded: 0,
            docs_missing: Vec::new(),
            fields_required: 0,
            fields_present: 0,
            fields_missing: Vec::new(),
            completeness_pct: 100.0,
            is_complete: true,
        };
    };

    let received: HashSet<&str> = documents
        .iter()
        .filter(|d| d.counts_as_received())
        .map(|d| d.kind.as_str())
        .collect();
    let docs_required = template.required_docs().count();
    let docs_missing: Vec<String> = template
        .missing_docs(&received)
        .into_iter()
        .map(|d| d.label.clone())
        .collect();

    let fields_required = template.required_field_defs().count();
    let fields_missing: Vec<String> = template
        .required_field_defs()
        .filter(|f| !field_present(intake, &f.key))
        .map(|f| f.label.clone())
        .collect();

    let total = docs_required + fields_required;
    let present = (docs_required - docs_missing.len()) + (fields_required - fields_missing.len());
    let completeness_pct = if total == 0 {
        100.0
    } else {
        (present as f64 / total as f64 * 1000.0).round() / 10.0
    };

    CompletenessReport {
        matter_id: matter.id,
        vertical: matter.matter_type.clone(),
        docs_required,
        docs_uploaded: docs_required - docs_missing.len(),
        is_complete: docs_missing.is_empty() && fields_missing.is_empty(),
        docs_missing,
        fields_required,
        fields_present: fields_required - fields_missing.len(),
        fields_missing,
        completeness_pct,
    }
}

fn field_present(intake: Option<&Intake>, key: &str) -> bool {
    let Some(value) = intake.and_then(|i| i.payload.get(key)) else {
        return false;
    };
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => !s.trim().is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
        serde_json::Value::Number(_) => true,
    }
}

/// Load the matter, its documents and intake, and evaluate completeness.
pub async fn matter_completeness(
    db: &dyn Database,
    templates: &TemplateRegistry,
    tenant_id: Uuid,
    matter_id: Uuid,
) -> Result<CompletenessReport, GateError> {
    let matter = db
        .get_matter(tenant_id, matter_id)
        .await?
        .ok_or_else(|| GateError::not_found("Matter", matter_id))?;
    let documents = db.list_documents(tenant_id, matter_id).await?;
    let intake = match matter.intake_id {
        Some(intake_id) => db.get_intake(tenant_id, intake_id).await?,
        None => None,
    };

    Ok(evaluate_completeness(
        &matter,
        templates.get(&matter.matter_type),
        &documents,
        intake.as_ref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::model::DocumentStatus;
    use crate::store::LibSqlBackend;

    fn divorce_payload() -> serde_json::Value {
        json!({
            "nombre_completo": "María López",
            "phone": "+52 55 1234 5678",
            "case_type": "mx_divorce",
            "descripcion": "Divorcio sin hijos",
            "entidad_federativa": "CDMX",
            "regimen_patrimonial": "separación",
            "hijos_menores": "no",
        })
    }

    #[test]
    fn no_template_is_complete() {
        let matter = Matter::new(Uuid::new_v4(), "unknown_vertical");
        let report = evaluate_completeness(&matter, None, &[], None);
        assert_eq!(report.completeness_pct, 100.0);
        assert!(report.is_complete);
        assert_eq!(report.docs_required, 0);
    }

    #[test]
    fn half_the_documents_and_all_fields() {
        let registry = TemplateRegistry::builtin().unwrap();
        let tenant = Uuid::new_v4();
        let intake = Intake::new(tenant, divorce_payload());
        let matter = Matter::new(tenant, "mx_divorce").with_intake(intake.id);
        let docs = vec![
            Document::new(tenant, matter.id, "acta_matrimonio", "acta.pdf"),
            Document::new(tenant, matter.id, "curp", "curp.pdf"),
        ];

        let report =
            evaluate_completeness(&matter, registry.get("mx_divorce"), &docs, Some(&intake));
        assert_eq!(report.docs_required, 4);
        assert_eq!(report.docs_uploaded, 2);
        assert_eq!(
            report.docs_missing,
            vec![
                "Identificación oficial (INE o pasaporte)".to_string(),
                "Comprobante de domicilio reciente (< 3 meses)".to_string(),
            ]
        );
        assert_eq!(report.fields_required, 7);
        assert_eq!(report.fields_present, 7);
        // 9 of 11 requirements met.
        assert_eq!(report.completeness_pct, 81.8);
        assert!(!report.is_complete);
    }

    #[test]
    fn rejected_documents_and_blank_fields_are_missing() {
        let registry = TemplateRegistry::builtin().unwrap();
        let tenant = Uuid::new_v4();
        let mut payload = divorce_payload();
        payload["phone"] = json!("   ");
        let intake = Intake::new(tenant, payload);
        let matter = Matter::new(tenant, "mx_divorce").with_intake(intake.id);
        let mut rejected = Document::new(tenant, matter.id, "curp", "curp.pdf");
        rejected.status = DocumentStatus::Rejected;

        let report = evaluate_completeness(
            &matter,
            registry.get("mx_divorce"),
            &[rejected],
            Some(&intake),
        );
        assert_eq!(report.docs_uploaded, 0);
        assert_eq!(report.fields_missing, vec!["Teléfono / WhatsApp".to_string()]);
    }

    #[tokio::test]
    async fn loads_from_store_and_scopes_by_tenant() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let registry = TemplateRegistry::builtin().unwrap();
        let tenant = Uuid::new_v4();
        let intake = Intake::new(tenant, divorce_payload());
        let matter = Matter::new(tenant, "mx_divorce").with_intake(intake.id);
        db.insert_intake(&intake).await.unwrap();
        db.insert_matter(&matter).await.unwrap();
        for kind in ["acta_matrimonio", "ine_pasaporte", "curp", "comprobante_domicilio"] {
            db.insert_document(&Document::new(tenant, matter.id, kind, "f.pdf"))
                .await
                .unwrap();
        }

        let report = matter_completeness(&db, &registry, tenant, matter.id)
            .await
            .unwrap();
        assert!(report.is_complete);
        assert_eq!(report.completeness_pct, 100.0);

        let err = matter_completeness(&db, &registry, Uuid::new_v4(), matter.id)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotFound { .. }));
    }
}
