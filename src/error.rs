use thiserror::Error;
use wasm_bindgen::JsValue;

use crate::instruction::ValidationKind;
use crate::orchestrator::{PassEvent, PassState};

/// Failures raised by a document backend while reading or writing an element.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomError {
    #[error("ElementNotFound: No element found for selector '{selector}'")]
    ElementNotFound { selector: String },
    #[error("InvalidSelector: Invalid selector '{selector}'. Details: {error}")]
    InvalidSelector { selector: String, error: String },
    #[error("ElementTypeError: Element '{element}' is not of expected type '{expected_type}'")]
    ElementTypeError { element: String, expected_type: String },
    #[error("SerializationError: {message}")]
    SerializationError { message: String },
    #[error("JsError: {message}")]
    JsError { message: String },
}

impl From<JsValue> for DomError {
    fn from(value: JsValue) -> Self {
        DomError::JsError {
            message: value.as_string().unwrap_or_else(|| "Unknown JsValue error".to_string()),
        }
    }
}

impl From<DomError> for JsValue {
    fn from(err: DomError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Why the remote analysis service could not supply a plan.
///
/// Every variant sends the orchestrator down the pattern-table path; none of
/// them is fatal to a fill pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("AI analysis disabled by configuration")]
    Disabled,
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },
    #[error("{endpoint} answered with HTTP {status}")]
    Status { endpoint: String, status: u16 },
    #[error("malformed analysis response: {0}")]
    Decode(String),
    #[error("analysis service declined the form")]
    Rejected,
    #[error("analysis returned no usable instructions")]
    EmptyPlan,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FillError {
    #[error("no visible element matches {target}")]
    LocatorMiss { target: String },
    #[error("value {value:?} failed {kind} validation for {target}")]
    ValidationRejected {
        target: String,
        value: String,
        kind: ValidationKind,
    },
    #[error("failed to apply value to {target}: {source}")]
    SimulatorFault { target: String, source: DomError },
    #[error("AI bridge unavailable: {0}")]
    BridgeUnavailable(#[from] BridgeError),
    #[error("orchestrator fault: {0}")]
    OrchestratorFault(String),
    #[error("illegal pass transition from {from:?} on {event:?}")]
    IllegalTransition { from: PassState, event: PassEvent },
    #[error("fill pass cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid profile: {0}")]
    Profile(String),
}

impl FillError {
    /// Per-instruction failures are recorded and skipped; anything else ends the pass.
    pub fn is_instruction_local(&self) -> bool {
        matches!(
            self,
            FillError::LocatorMiss { .. }
                | FillError::ValidationRejected { .. }
                | FillError::SimulatorFault { .. }
        )
    }
}

impl From<FillError> for JsValue {
    fn from(err: FillError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_error_display() {
        assert_eq!(
            DomError::ElementNotFound { selector: "test".to_string() }.to_string(),
            "ElementNotFound: No element found for selector 'test'"
        );
        assert_eq!(
            DomError::InvalidSelector { selector: "test".to_string(), error: "details".to_string() }.to_string(),
            "InvalidSelector: Invalid selector 'test'. Details: details"
        );
        assert_eq!(
            DomError::ElementTypeError { element: "div#x".to_string(), expected_type: "HtmlInputElement".to_string() }.to_string(),
            "ElementTypeError: Element 'div#x' is not of expected type 'HtmlInputElement'"
        );
        assert_eq!(
            DomError::JsError { message: "js error".to_string() }.to_string(),
            "JsError: js error"
        );
    }

    #[test]
    fn test_fill_error_display() {
        let err = FillError::ValidationRejected {
            target: "email".to_string(),
            value: "nope".to_string(),
            kind: ValidationKind::Email,
        };
        assert_eq!(err.to_string(), "value \"nope\" failed email validation for email");

        let err = FillError::SimulatorFault {
            target: "#gpa".to_string(),
            source: DomError::JsError { message: "boom".to_string() },
        };
        assert_eq!(err.to_string(), "failed to apply value to #gpa: JsError: boom");
    }

    #[test]
    fn test_bridge_error_converts_into_fill_error() {
        let err: FillError = BridgeError::Rejected.into();
        assert_eq!(err, FillError::BridgeUnavailable(BridgeError::Rejected));
        assert!(!err.is_instruction_local());
    }

    #[test]
    fn test_instruction_local_errors() {
        assert!(FillError::LocatorMiss { target: "x".to_string() }.is_instruction_local());
        assert!(!FillError::Cancelled.is_instruction_local());
        assert!(!FillError::OrchestratorFault("x".to_string()).is_instruction_local());
    }
}
