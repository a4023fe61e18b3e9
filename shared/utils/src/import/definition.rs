//! Workflow-definition JSON import/export.
//!
//! The wire format is the portal's camelCase JSON. Import applies the
//! compatibility shims legacy exports need: `slaDays` maps to
//! `defaultSlaDays`, routing/SLA rules with an empty field or value are
//! dropped, a missing `allowedUserIds` defaults to `["all"]`, and `areaId`
//! is mandatory.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use uuid::Uuid;

use riva_models::{
    FieldType, FormField, RoutingRule, SlaRule, StatusDef, WorkflowDefinition, ALL_USERS,
};

use crate::import::ImportError;
use crate::validation::format_validation_errors;

/// Result of a successful import: the definition plus the shims that fired.
#[derive(Debug)]
pub struct DefinitionImport {
    pub definition: WorkflowDefinition,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionWire {
    name: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    area_id: Option<String>,
    #[serde(default)]
    owner_email: String,
    #[serde(default)]
    fields: Vec<FormFieldWire>,
    statuses: Vec<StatusWire>,
    #[serde(default)]
    routing_rules: Vec<RoutingRuleWire>,
    #[serde(default)]
    sla_rules: Vec<SlaRuleWire>,
    #[serde(default, alias = "slaDays")]
    default_sla_days: Option<i64>,
    #[serde(default)]
    allowed_user_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormFieldWire {
    id: String,
    label: String,
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusWire {
    id: String,
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    terminal: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutingRuleWire {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: String,
    assignee_id: Uuid,
    assignee_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlaRuleWire {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: String,
    days: i64,
}

const FALLBACK_SLA_DAYS: i64 = 5;

/// Parse and shim a camelCase definition JSON document.
pub fn import_definition(json: &str) -> Result<DefinitionImport, ImportError> {
    let wire: DefinitionWire = serde_json::from_str(json).map_err(|e| match e.classify() {
        Category::Syntax | Category::Eof => ImportError::Syntax(e),
        _ => ImportError::Schema(e.to_string()),
    })?;

    let mut warnings = Vec::new();

    let area_id = match wire.area_id {
        Some(area_id) if !area_id.trim().is_empty() => area_id,
        _ => return Err(ImportError::Validation("areaId is required".to_string())),
    };

    let routing_rules: Vec<RoutingRule> = wire
        .routing_rules
        .into_iter()
        .filter_map(|rule| {
            if rule.field.trim().is_empty() || rule.value.trim().is_empty() {
                warnings.push("Dropped routing rule with empty field or value".to_string());
                None
            } else {
                Some(RoutingRule {
                    field: rule.field,
                    value: rule.value,
                    assignee_id: rule.assignee_id,
                    assignee_name: rule.assignee_name,
                })
            }
        })
        .collect();

    let sla_rules: Vec<SlaRule> = wire
        .sla_rules
        .into_iter()
        .filter_map(|rule| {
            if rule.field.trim().is_empty() || rule.value.trim().is_empty() {
                warnings.push("Dropped SLA rule with empty field or value".to_string());
                None
            } else {
                Some(SlaRule {
                    field: rule.field,
                    value: rule.value,
                    days: rule.days,
                })
            }
        })
        .collect();

    let default_sla_days = wire.default_sla_days.unwrap_or_else(|| {
        warnings.push(format!(
            "No defaultSlaDays in import, falling back to {} business days",
            FALLBACK_SLA_DAYS
        ));
        FALLBACK_SLA_DAYS
    });

    let allowed_user_ids = if wire.allowed_user_ids.is_empty() {
        warnings.push("No allowedUserIds in import, defaulting to all users".to_string());
        vec![ALL_USERS.to_string()]
    } else {
        wire.allowed_user_ids
    };

    let now = Utc::now();
    let definition = WorkflowDefinition {
        id: Uuid::new_v4(),
        name: wire.name,
        icon: wire.icon,
        area_id,
        owner_email: wire.owner_email,
        fields: wire
            .fields
            .into_iter()
            .map(|f| FormField {
                id: f.id,
                label: f.label,
                field_type: f.field_type,
                required: f.required,
            })
            .collect(),
        statuses: wire
            .statuses
            .into_iter()
            .map(|s| StatusDef {
                id: s.id,
                label: s.label,
                terminal: s.terminal,
            })
            .collect(),
        routing_rules,
        sla_rules,
        default_sla_days,
        allowed_user_ids,
        created_at: now,
        updated_at: now,
    };

    if let Err(errors) = validator::Validate::validate(&definition) {
        return Err(ImportError::Validation(format_validation_errors(&errors)));
    }

    Ok(DefinitionImport {
        definition,
        warnings,
    })
}

/// Render a definition in the same wire format `import_definition` accepts.
/// The internal ID and timestamps are intentionally omitted: importing an
/// export always creates a new definition.
pub fn export_definition(definition: &WorkflowDefinition) -> serde_json::Value {
    let wire = DefinitionWire {
        name: definition.name.clone(),
        icon: definition.icon.clone(),
        area_id: Some(definition.area_id.clone()),
        owner_email: definition.owner_email.clone(),
        fields: definition
            .fields
            .iter()
            .map(|f| FormFieldWire {
                id: f.id.clone(),
                label: f.label.clone(),
                field_type: f.field_type,
                required: f.required,
            })
            .collect(),
        statuses: definition
            .statuses
            .iter()
            .map(|s| StatusWire {
                id: s.id.clone(),
                label: s.label.clone(),
                terminal: s.terminal,
            })
            .collect(),
        routing_rules: definition
            .routing_rules
            .iter()
            .map(|r| RoutingRuleWire {
                field: r.field.clone(),
                value: r.value.clone(),
                assignee_id: r.assignee_id,
                assignee_name: r.assignee_name.clone(),
            })
            .collect(),
        sla_rules: definition
            .sla_rules
            .iter()
            .map(|r| SlaRuleWire {
                field: r.field.clone(),
                value: r.value.clone(),
                days: r.days,
            })
            .collect(),
        default_sla_days: Some(definition.default_sla_days),
        allowed_user_ids: definition.allowed_user_ids.clone(),
    };

    serde_json::to_value(wire).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_import() -> serde_json::Value {
        json!({
            "name": "Reembolso de Despesas",
            "icon": "receipt",
            "areaId": "financeiro",
            "ownerEmail": "financeiro@riva.com",
            "fields": [
                { "id": "tier", "label": "Categoria", "type": "select", "required": true },
                { "id": "valor", "label": "Valor", "type": "number", "required": true }
            ],
            "statuses": [
                { "id": "em-aberto", "label": "Em Aberto" },
                { "id": "finalizado", "label": "Finalizado" }
            ],
            "routingRules": [
                { "field": "tier", "value": "gold", "assigneeId": "5f64a3c0-93a3-4c35-a2a6-013b9f0a2e1d", "assigneeName": "Bruno Lima" }
            ],
            "slaRules": [
                { "field": "tier", "value": "gold", "days": 2 }
            ],
            "defaultSlaDays": 5,
            "allowedUserIds": ["all"]
        })
    }

    #[test]
    fn test_import_accepts_well_formed_definition() {
        let imported = import_definition(&base_import().to_string()).unwrap();
        assert!(imported.warnings.is_empty());
        assert_eq!(imported.definition.name, "Reembolso de Despesas");
        assert_eq!(imported.definition.default_sla_days, 5);
        assert_eq!(imported.definition.sla_rules.len(), 1);
    }

    #[test]
    fn test_legacy_sla_days_key_maps_to_default_sla_days() {
        let mut doc = base_import();
        let obj = doc.as_object_mut().unwrap();
        obj.remove("defaultSlaDays");
        obj.insert("slaDays".into(), json!(7));

        let imported = import_definition(&doc.to_string()).unwrap();
        assert_eq!(imported.definition.default_sla_days, 7);
    }

    #[test]
    fn test_empty_rules_are_dropped_with_warnings() {
        let mut doc = base_import();
        doc["routingRules"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "field": "", "value": "x", "assigneeId": "5f64a3c0-93a3-4c35-a2a6-013b9f0a2e1d", "assigneeName": "x" }));
        doc["slaRules"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "field": "tier", "value": "", "days": 3 }));

        let imported = import_definition(&doc.to_string()).unwrap();
        assert_eq!(imported.definition.routing_rules.len(), 1);
        assert_eq!(imported.definition.sla_rules.len(), 1);
        assert_eq!(imported.warnings.len(), 2);
    }

    #[test]
    fn test_missing_allowed_user_ids_defaults_to_all() {
        let mut doc = base_import();
        doc.as_object_mut().unwrap().remove("allowedUserIds");

        let imported = import_definition(&doc.to_string()).unwrap();
        assert_eq!(imported.definition.allowed_user_ids, vec![ALL_USERS.to_string()]);
    }

    #[test]
    fn test_missing_area_id_is_rejected() {
        let mut doc = base_import();
        doc.as_object_mut().unwrap().remove("areaId");

        let err = import_definition(&doc.to_string()).unwrap_err();
        assert!(matches!(err, ImportError::Validation(_)));
    }

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            import_definition("{ not json"),
            Err(ImportError::Syntax(_))
        ));
        assert!(matches!(
            import_definition("{\"name\": 42}"),
            Err(ImportError::Schema(_))
        ));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let imported = import_definition(&base_import().to_string()).unwrap();
        let exported = export_definition(&imported.definition);
        let reimported = import_definition(&exported.to_string()).unwrap();

        assert!(reimported.warnings.is_empty());
        assert_eq!(reimported.definition.name, imported.definition.name);
        assert_eq!(reimported.definition.area_id, imported.definition.area_id);
        assert_eq!(reimported.definition.fields, imported.definition.fields);
        assert_eq!(reimported.definition.statuses, imported.definition.statuses);
        assert_eq!(reimported.definition.routing_rules, imported.definition.routing_rules);
        assert_eq!(reimported.definition.sla_rules, imported.definition.sla_rules);
        assert_eq!(
            reimported.definition.default_sla_days,
            imported.definition.default_sla_days
        );
        assert_eq!(
            reimported.definition.allowed_user_ids,
            imported.definition.allowed_user_ids
        );
    }
}
