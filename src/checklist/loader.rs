//! Checklist definition loader.
//!
//! Normalizes template payloads coming from the backend or from a manually
//! picked file into a [`ChecklistDefinition`], and validates definitions
//! before they are saved back.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::api::wire::{TemplateFile, TemplatePayload, WireItem};
use crate::checklist::types::{ChecklistDefinition, StepSpec};
use crate::error::ValidationError;

/// Builder limit on items per template.
pub const MAX_STEPS: usize = 10;

/// Upper bound for a step's target time (one day).
pub const MAX_TARGET_SECONDS: u64 = 86_400;

/// Normalize a wire payload. `fallback_model` is used when the payload
/// carries no model of its own (the serial lookup puts it in the envelope).
pub fn from_payload(
    payload: TemplatePayload,
    fallback_model: Option<&str>,
) -> Result<ChecklistDefinition, ValidationError> {
    let model = payload
        .modelo
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .or_else(|| fallback_model.map(str::trim))
        .unwrap_or_default()
        .to_string();

    let items = payload.items.unwrap_or_default();
    if items.is_empty() {
        return Err(ValidationError::EmptyChecklist);
    }

    let mut seen_orders = HashSet::new();
    let mut steps = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let step = normalize_item(index, item)?;
        if !seen_orders.insert(step.order) {
            return Err(ValidationError::InvalidStep {
                index: index + 1,
                reason: format!("duplicate order {}", step.order),
            });
        }
        steps.push(step);
    }

    tracing::debug!(model = %model, steps = steps.len(), "Checklist normalized");
    Ok(ChecklistDefinition { model, steps })
}

fn normalize_item(index: usize, item: WireItem) -> Result<StepSpec, ValidationError> {
    let position = index + 1;
    let order = item
        .ordem
        .as_ref()
        .and_then(as_positive_int)
        .and_then(|o| u32::try_from(o).ok())
        .unwrap_or(position as u32);

    let description = item.descricao.unwrap_or_default().trim().to_string();
    if description.is_empty() {
        return Err(ValidationError::InvalidStep {
            index: position,
            reason: "description is required".to_string(),
        });
    }

    let target_seconds = item
        .tempo_seg
        .as_ref()
        .and_then(as_positive_int)
        .filter(|t| *t <= MAX_TARGET_SECONDS)
        .ok_or_else(|| ValidationError::InvalidStep {
            index: position,
            reason: format!("target seconds must be an integer in 1..={}", MAX_TARGET_SECONDS),
        })?;

    Ok(StepSpec {
        order,
        description,
        target_seconds,
        suggested_tags: normalize_tags(item.ncr_tags.as_ref()),
    })
}

/// Positive integer from a JSON number or numeric string. Fractions are
/// rejected in both forms; whole values written as `30.0` are accepted.
fn as_positive_int(value: &Value) -> Option<u64> {
    let n = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_number)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
        }
        _ => None,
    }?;
    (n > 0).then_some(n)
}

fn whole_number(f: f64) -> Option<u64> {
    // u64::MAX as f64 rounds up to 2^64, hence the strict bound
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then_some(f as u64)
}

fn normalize_tags(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(raw)) = value else {
        return Vec::new();
    };
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.iter().filter_map(Value::as_str).map(str::trim) {
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Parse the contents of a manually loaded file.
pub fn parse_file_contents(contents: &str) -> Result<ChecklistDefinition, ValidationError> {
    let file: TemplateFile = serde_json::from_str(contents)
        .map_err(|e| ValidationError::InvalidFile(e.to_string()))?;
    from_payload(file.into_payload(), None)
}

/// Read and parse a checklist file. Unreadable files are validation errors.
pub fn load_file(path: impl AsRef<Path>) -> Result<ChecklistDefinition, ValidationError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ValidationError::InvalidFile(format!("{}: {}", path.display(), e)))?;
    let definition = parse_file_contents(&contents)?;
    tracing::info!(path = %path.display(), model = %definition.model, "Checklist loaded from file");
    Ok(definition)
}

/// Checks applied before a template is saved.
pub fn validate_for_save(
    definition: &ChecklistDefinition,
    max_steps: usize,
) -> Result<(), ValidationError> {
    if definition.model.trim().is_empty() {
        return Err(ValidationError::EmptyModel);
    }
    if definition.steps.is_empty() {
        return Err(ValidationError::EmptyChecklist);
    }
    if definition.steps.len() > max_steps {
        return Err(ValidationError::TooManySteps {
            max: max_steps,
            actual: definition.steps.len(),
        });
    }
    let mut seen = HashSet::new();
    for (i, step) in definition.steps.iter().enumerate() {
        let index = i + 1;
        if step.description.trim().is_empty() {
            return Err(ValidationError::InvalidStep {
                index,
                reason: "description is required".to_string(),
            });
        }
        if step.order == 0 || !seen.insert(step.order) {
            return Err(ValidationError::InvalidStep {
                index,
                reason: "order is invalid or duplicated".to_string(),
            });
        }
        if step.target_seconds == 0 || step.target_seconds > MAX_TARGET_SECONDS {
            return Err(ValidationError::InvalidStep {
                index,
                reason: format!("target seconds must be an integer in 1..={}", MAX_TARGET_SECONDS),
            });
        }
    }
    Ok(())
}

/// Model for a serial: the third digit of the serial picks the entry.
pub fn infer_model_from_serial(serial: &str, models: &BTreeMap<String, String>) -> Option<String> {
    let digits: Vec<char> = serial.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 3 {
        return None;
    }
    models.get(&digits[2].to_string()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> TemplatePayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalizes_lenient_fields() {
        let def = from_payload(
            payload(json!({
                "modelo": "PM2100",
                "items": [
                    { "ordem": 0, "descricao": " Aperto ", "tempo_seg": "30", "ncr_tags": ["AJUSTE", "AJUSTE", ""] },
                    { "descricao": "Pintura", "tempo_seg": 45, "ncr_tags": "not-a-list" }
                ]
            })),
            None,
        )
        .unwrap();

        assert_eq!(def.model, "PM2100");
        assert_eq!(def.steps[0].order, 1);
        assert_eq!(def.steps[0].description, "Aperto");
        assert_eq!(def.steps[0].target_seconds, 30);
        assert_eq!(def.steps[0].suggested_tags, vec!["AJUSTE"]);
        assert_eq!(def.steps[1].order, 2);
        assert!(def.steps[1].suggested_tags.is_empty());
    }

    #[test]
    fn test_fallback_model_used_when_missing() {
        let def = from_payload(
            payload(json!({ "items": [{ "descricao": "A", "tempo_seg": 5 }] })),
            Some("PM700"),
        )
        .unwrap();
        assert_eq!(def.model, "PM700");
    }

    #[test]
    fn test_empty_items_rejected() {
        let err = from_payload(payload(json!({ "modelo": "PM700", "items": [] })), None).unwrap_err();
        assert_eq!(err, ValidationError::EmptyChecklist);
    }

    #[test]
    fn test_non_positive_target_rejected() {
        let err = from_payload(
            payload(json!({ "items": [{ "descricao": "A", "tempo_seg": "abc" }] })),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidStep { index: 1, .. }));
    }

    #[test]
    fn test_fractional_targets_rejected_in_either_form() {
        for target in [json!(30.5), json!("30.5")] {
            let err = from_payload(
                payload(json!({ "items": [{ "descricao": "A", "tempo_seg": target }] })),
                None,
            )
            .unwrap_err();
            assert!(matches!(err, ValidationError::InvalidStep { index: 1, .. }));
        }

        let whole = from_payload(
            payload(json!({ "items": [
                { "descricao": "A", "tempo_seg": 30.0 },
                { "descricao": "B", "tempo_seg": " 30.0 " }
            ] })),
            None,
        )
        .unwrap();
        assert!(whole.steps.iter().all(|s| s.target_seconds == 30));
    }

    #[test]
    fn test_huge_target_rejected() {
        let err = parse_file_contents(
            r#"{"modelo":"PM700","items":[{"descricao":"A","tempo_seg":1e20}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidStep { index: 1, .. }));

        let err = parse_file_contents(
            r#"{"modelo":"PM700","items":[{"descricao":"A","tempo_seg":"18446744073709551615"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidStep { index: 1, .. }));

        let max = parse_file_contents(
            r#"{"modelo":"PM700","items":[{"descricao":"A","tempo_seg":86400}]}"#,
        )
        .unwrap();
        assert_eq!(max.steps[0].target_seconds, MAX_TARGET_SECONDS);
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let err = from_payload(
            payload(json!({ "items": [
                { "ordem": 2, "descricao": "A", "tempo_seg": 5 },
                { "ordem": 2, "descricao": "B", "tempo_seg": 5 }
            ] })),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidStep { index: 2, .. }));
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let err = parse_file_contents("{ not json").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFile(_)));
    }

    #[test]
    fn test_validate_for_save_limits() {
        let step = |order: u32| StepSpec {
            order,
            description: "x".to_string(),
            target_seconds: 1,
            suggested_tags: vec![],
        };
        let too_many = ChecklistDefinition {
            model: "PM700".to_string(),
            steps: (1..=11).map(step).collect(),
        };
        assert_eq!(
            validate_for_save(&too_many, MAX_STEPS),
            Err(ValidationError::TooManySteps { max: 10, actual: 11 })
        );

        let no_model = ChecklistDefinition {
            model: " ".to_string(),
            steps: vec![step(1)],
        };
        assert_eq!(validate_for_save(&no_model, MAX_STEPS), Err(ValidationError::EmptyModel));

        let too_long = ChecklistDefinition {
            model: "PM700".to_string(),
            steps: vec![StepSpec {
                target_seconds: MAX_TARGET_SECONDS + 1,
                ..step(1)
            }],
        };
        assert!(matches!(
            validate_for_save(&too_long, MAX_STEPS),
            Err(ValidationError::InvalidStep { index: 1, .. })
        ));

        let ok = ChecklistDefinition {
            model: "PM700".to_string(),
            steps: vec![step(1), step(2)],
        };
        assert_eq!(validate_for_save(&ok, MAX_STEPS), Ok(()));
    }

    #[test]
    fn test_infer_model_from_serial() {
        let models: BTreeMap<String, String> = [("1", "PM2100"), ("2", "PM2200"), ("7", "PM700")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert_eq!(infer_model_from_serial("SN-041234", &models), Some("PM2100".to_string()));
        assert_eq!(infer_model_from_serial("99700", &models), Some("PM700".to_string()));
        assert_eq!(infer_model_from_serial("12", &models), None);
        assert_eq!(infer_model_from_serial("00900", &models), None);
    }
}
