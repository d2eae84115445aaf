use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::ElementHandle;
use crate::profile::ProfileValue;

/// Priority given to instructions that don't carry one.
pub const DEFAULT_PRIORITY: u32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    #[default]
    Type,
    Select,
    Check,
    Click,
}

impl FillMethod {
    /// Typing into a `<select>` means picking an option.
    pub fn resolve_for<E: ElementHandle>(self, element: &E) -> FillMethod {
        match self {
            FillMethod::Type if element.is_select() => FillMethod::Select,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Phone,
    Date,
    #[serde(other)]
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    Email,
    Phone,
    Number,
    #[serde(other)]
    Any,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationKind::Email => "email",
            ValidationKind::Phone => "phone",
            ValidationKind::Number => "number",
            ValidationKind::Any => "any",
        };
        f.write_str(name)
    }
}

/// A directive to fill one field with one value via one method.
///
/// Produced either by the analysis service (camelCase JSON) or synthesized
/// from the field table. Consumed once per pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillInstruction {
    /// Semantic profile field this instruction fills, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub field_patterns: Vec<String>,
    #[serde(default)]
    pub value: ProfileValue,
    #[serde(default)]
    pub method: FillMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_to_field: Option<bool>,
}

impl FillInstruction {
    pub fn priority(&self) -> u32 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn scrolls(&self) -> bool {
        self.scroll_to_field != Some(false)
    }

    /// Human-readable target used in logs and skip reports.
    pub fn target(&self) -> String {
        if let Some(selector) = self.selector.as_deref().filter(|s| !s.is_empty()) {
            return selector.to_string();
        }
        if let Some(field) = &self.field {
            return field.clone();
        }
        format!("patterns {:?}", self.field_patterns)
    }
}

/// Stable ascending sort; equal priorities keep the order they were supplied in.
pub fn sort_by_priority(instructions: &mut [FillInstruction]) {
    instructions.sort_by_key(FillInstruction::priority);
}

/// One completed instruction. The element handle never outlives the pass.
#[derive(Debug, Clone)]
pub struct FilledField<E> {
    pub selector: String,
    pub value: String,
    pub element: E,
}

impl<E> FilledField<E> {
    pub fn payload(&self) -> FilledFieldPayload {
        FilledFieldPayload {
            selector: self.selector.clone(),
            value: self.value.clone(),
        }
    }
}

/// What leaves the page for the validation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilledFieldPayload {
    pub selector: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instruction_defaults() {
        let instruction: FillInstruction =
            serde_json::from_value(json!({"selector": "#email", "value": "ada@x.com"})).unwrap();
        assert_eq!(instruction.method, FillMethod::Type);
        assert_eq!(instruction.priority(), DEFAULT_PRIORITY);
        assert!(instruction.scrolls());
        assert!(instruction.field_patterns.is_empty());
    }

    #[test]
    fn test_instruction_full_wire_shape() {
        let instruction: FillInstruction = serde_json::from_value(json!({
            "selector": "select#state",
            "fieldPatterns": ["state", "province"],
            "value": "CA",
            "method": "select",
            "transform": "phone",
            "validation": "email",
            "priority": 2,
            "scrollToField": false
        }))
        .unwrap();
        assert_eq!(instruction.field_patterns, vec!["state", "province"]);
        assert_eq!(instruction.method, FillMethod::Select);
        assert_eq!(instruction.transform, Some(TransformKind::Phone));
        assert_eq!(instruction.validation, Some(ValidationKind::Email));
        assert_eq!(instruction.priority(), 2);
        assert!(!instruction.scrolls());
    }

    #[test]
    fn test_unknown_transform_and_validation_fall_back() {
        let instruction: FillInstruction = serde_json::from_value(json!({
            "value": 3.9,
            "transform": "uppercase",
            "validation": "^\\d+$"
        }))
        .unwrap();
        assert_eq!(instruction.transform, Some(TransformKind::Identity));
        assert_eq!(instruction.validation, Some(ValidationKind::Any));
        assert_eq!(instruction.value.to_string(), "3.9");
    }

    #[test]
    fn test_sort_is_stable_for_equal_priorities() {
        let make = |field: &str, priority: Option<u32>| FillInstruction {
            field: Some(field.to_string()),
            priority,
            ..Default::default()
        };
        let mut plan = vec![
            make("a", None),
            make("b", Some(1)),
            make("c", None),
            make("d", Some(1)),
            make("e", Some(0)),
        ];
        sort_by_priority(&mut plan);
        let order: Vec<_> = plan.iter().map(|i| i.field.clone().unwrap()).collect();
        assert_eq!(order, vec!["e", "b", "d", "a", "c"]);
    }

    #[test]
    fn test_target_prefers_selector() {
        let mut instruction = FillInstruction {
            field: Some("email".to_string()),
            ..Default::default()
        };
        assert_eq!(instruction.target(), "email");
        instruction.selector = Some("#email".to_string());
        assert_eq!(instruction.target(), "#email");
    }
}
