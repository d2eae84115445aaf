use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::FillError;

/// Runtime settings for the filler. Every field has a default so the
/// extension can pass a partial JSON object, or nothing at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FillConfig {
    /// Base URL of the form analysis service.
    pub api_base_url: String,
    /// When false the analysis service is never called.
    pub use_ai: bool,
    /// Pause after each filled field.
    pub field_delay_ms: u32,
    pub typing_delay_ms: u32,
    pub chunk_delay_ms: u32,
    pub chunk_size: usize,
    /// Values longer than this many characters are typed in chunks.
    pub long_text_threshold: usize,
    pub scroll_settle_ms: u32,
    pub highlight_ms: u32,
    pub status_dismiss_ms: u32,
    pub log_level: String,
}

impl Default for FillConfig {
    fn default() -> Self {
        FillConfig {
            api_base_url: "http://localhost:5001".to_string(),
            use_ai: true,
            field_delay_ms: 500,
            typing_delay_ms: 50,
            chunk_delay_ms: 20,
            chunk_size: 10,
            long_text_threshold: 100,
            scroll_settle_ms: 300,
            highlight_ms: 2000,
            status_dismiss_ms: 3000,
            log_level: "info".to_string(),
        }
    }
}

impl FillConfig {
    /// Parses and validates an optional JSON config; `None` or blank yields defaults.
    pub fn from_json(json: Option<&str>) -> Result<Self, FillError> {
        let config = match json.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => serde_json::from_str(raw).map_err(|e| FillError::Config(e.to_string()))?,
            None => FillConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FillError> {
        if self.api_base_url.trim().is_empty() {
            return Err(FillError::Config("apiBaseUrl must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(FillError::Config("chunkSize must be at least 1".to_string()));
        }
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter, FillError> {
        self.log_level
            .parse::<LevelFilter>()
            .map_err(|_| FillError::Config(format!("unknown log level '{}'", self.log_level)))
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
