use async_trait::async_trait;
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::FillConfig;
use crate::error::BridgeError;
use crate::instruction::{FillInstruction, FilledFieldPayload};
use crate::profile::Profile;

pub const ANALYZE_PATH: &str = "/api/analyze-form";
pub const VALIDATE_PATH: &str = "/api/validate-filled-form";

static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*/>|<script\b[^>]*>.*?</script\s*>")
        .expect("script pattern compiles")
});

/// Body of the analysis request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest<'a> {
    pub html: String,
    pub user_data: &'a Profile,
    pub url: &'a str,
}

impl<'a> AnalysisRequest<'a> {
    /// Script blocks never leave the page.
    pub fn new(html: &str, user_data: &'a Profile, url: &'a str) -> Self {
        AnalysisRequest {
            html: strip_scripts(html),
            user_data,
            url,
        }
    }
}

/// Body of the best-effort validation call made after a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub filled_fields: Vec<FilledFieldPayload>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisResponse {
    success: bool,
    #[serde(default)]
    filling_instructions: Vec<Value>,
}

/// Remote collaborator that can turn a form snapshot into a filling plan.
///
/// Implementations never panic on network or decoding trouble; every failure
/// comes back as a [`BridgeError`] and the caller falls back to patterns.
#[async_trait(?Send)]
pub trait FormAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Vec<FillInstruction>, BridgeError>;
    async fn report_filled(&self, report: &ValidationReport) -> Result<(), BridgeError>;
}

/// [`FormAnalyzer`] over HTTP/JSON. Uses fetch when compiled to wasm32.
#[derive(Debug, Clone)]
pub struct HttpFormAnalyzer {
    client: Client,
    analyze_url: String,
    validate_url: String,
}

impl HttpFormAnalyzer {
    pub fn new(config: &FillConfig) -> Self {
        HttpFormAnalyzer {
            client: Client::new(),
            analyze_url: config.endpoint(ANALYZE_PATH),
            validate_url: config.endpoint(VALIDATE_PATH),
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String, BridgeError> {
        let res = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| BridgeError::Request {
                endpoint: url.to_string(),
                message: e.to_string(),
            })?;

        debug!("{} answered {}", url, res.status());
        if !res.status().is_success() {
            return Err(BridgeError::Status {
                endpoint: url.to_string(),
                status: res.status().as_u16(),
            });
        }

        res.text().await.map_err(|e| BridgeError::Request {
            endpoint: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait(?Send)]
impl FormAnalyzer for HttpFormAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Vec<FillInstruction>, BridgeError> {
        debug!("Requesting analysis of {} bytes of form HTML", request.html.len());
        let body = self.post(&self.analyze_url, request).await.map_err(|e| {
            error!("AI analysis error: {}", e);
            e
        })?;
        parse_analysis(&body)
    }

    async fn report_filled(&self, report: &ValidationReport) -> Result<(), BridgeError> {
        self.post(&self.validate_url, report).await.map(|_| ())
    }
}

/// Decodes an analysis response body into a usable plan.
///
/// Malformed entries are skipped one by one; a declined, empty or
/// undecodable response is an error.
pub fn parse_analysis(body: &str) -> Result<Vec<FillInstruction>, BridgeError> {
    let response: AnalysisResponse =
        serde_json::from_str(body).map_err(|e| BridgeError::Decode(e.to_string()))?;
    if !response.success {
        return Err(BridgeError::Rejected);
    }

    let mut plan = Vec::with_capacity(response.filling_instructions.len());
    for (index, raw) in response.filling_instructions.into_iter().enumerate() {
        match serde_json::from_value::<FillInstruction>(raw) {
            Ok(instruction) => plan.push(instruction),
            Err(e) => warn!("Skipping malformed instruction at index {}: {}", index, e),
        }
    }

    if plan.is_empty() {
        return Err(BridgeError::EmptyPlan);
    }
    Ok(plan)
}

pub fn strip_scripts(html: &str) -> String {
    SCRIPT_BLOCK.replace_all(html, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::FillMethod;
    use serde_json::json;

    #[test]
    fn test_strip_scripts() {
        let html = r#"<form><script type="text/javascript">steal(document.cookie)</script><input name="gpa"><SCRIPT src="x.js"></SCRIPT><script src="y.js"/></form>"#;
        assert_eq!(strip_scripts(html), r#"<form><input name="gpa"></form>"#);
    }

    #[test]
    fn test_strip_scripts_spans_lines() {
        let html = "<div>\n<script>\nlet a = '<b>';\n</script>\n<input id=\"x\"></div>";
        assert_eq!(strip_scripts(html), "<div>\n\n<input id=\"x\"></div>");
    }

    #[test]
    fn test_request_serializes_wire_shape() {
        let profile: Profile = [("firstName", "Ada")].into_iter().collect();
        let request = AnalysisRequest::new("<form><script>x</script></form>", &profile, "https://apply.example.org");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "html": "<form></form>",
                "userData": {"firstName": "Ada"},
                "url": "https://apply.example.org"
            })
        );
    }

    #[test]
    fn test_validation_report_wire_shape() {
        let report = ValidationReport {
            filled_fields: vec![FilledFieldPayload { selector: "#gpa".to_string(), value: "3.9".to_string() }],
            url: "https://apply.example.org".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"filledFields": [{"selector": "#gpa", "value": "3.9"}], "url": "https://apply.example.org"})
        );
    }

    #[test]
    fn test_parse_analysis_success() {
        let body = json!({
            "success": true,
            "fillingInstructions": [
                {"selector": "#first", "value": "Ada", "method": "type", "priority": 1},
                {"selector": "#state", "value": "CA", "method": "select"}
            ]
        })
        .to_string();
        let plan = parse_analysis(&body).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].method, FillMethod::Select);
    }

    #[test]
    fn test_parse_analysis_skips_malformed_entries() {
        let body = json!({
            "success": true,
            "fillingInstructions": [
                {"selector": "#first", "value": "Ada", "method": "teleport"},
                "not an object",
                {"selector": "#last", "value": "Lovelace"}
            ]
        })
        .to_string();
        let plan = parse_analysis(&body).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].selector.as_deref(), Some("#last"));
    }

    #[test]
    fn test_parse_analysis_failures() {
        assert_eq!(parse_analysis(r#"{"success": false}"#), Err(BridgeError::Rejected));
        assert_eq!(parse_analysis(r#"{"success": true}"#), Err(BridgeError::EmptyPlan));
        assert_eq!(
            parse_analysis(r#"{"success": true, "fillingInstructions": [42]}"#),
            Err(BridgeError::EmptyPlan)
        );
        assert!(matches!(parse_analysis("<html>502</html>"), Err(BridgeError::Decode(_))));
        assert!(matches!(parse_analysis(r#"{"instructions": []}"#), Err(BridgeError::Decode(_))));
    }
}
