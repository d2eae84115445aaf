use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::Promise;
use tokio_util::sync::CancellationToken;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::bridge::HttpFormAnalyzer;
use crate::config::FillConfig;
use crate::dom_utils::{BrowserDocument, OverlayStatus, TimerPacer};
use crate::error::{DomError, FillError};
use crate::orchestrator::FillSession;
use crate::profile::Profile;

pub mod bridge;
pub mod config;
pub mod document;
pub mod dom_utils;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod field_table;
pub mod instruction;
pub mod locator;
pub mod logger;
pub mod orchestrator;
pub mod profile;
pub mod simulator;
pub mod status;
pub mod transform;

// Expose ScholarFill to JavaScript
#[wasm_bindgen]
pub struct ScholarFill {
    config: Rc<FillConfig>,
    analyzer: Rc<HttpFormAnalyzer>,
    busy: Rc<Cell<bool>>,
    current: Rc<RefCell<Option<CancellationToken>>>,
}

#[wasm_bindgen]
impl ScholarFill {
    /// `config_json` is an optional partial `FillConfig` object.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<ScholarFill, JsValue> {
        let config = FillConfig::from_json(config_json.as_deref())?;
        logger::init(config.level_filter()?);
        log::info!("ScholarFill ready, analysis service at {}", config.api_base_url);

        Ok(ScholarFill {
            analyzer: Rc::new(HttpFormAnalyzer::new(&config)),
            config: Rc::new(config),
            busy: Rc::new(Cell::new(false)),
            current: Rc::new(RefCell::new(None)),
        })
    }

    /// Runs one fill pass over the current page. Resolves with the pass
    /// summary as JSON; rejects if a pass is already running.
    #[wasm_bindgen(js_name = fillForm)]
    pub fn fill_form(&self, profile_json: &str) -> Result<Promise, JsValue> {
        let profile = Profile::from_json(profile_json)?;
        if self.busy.get() {
            return Err(FillError::OrchestratorFault("a fill pass is already running".to_string()).into());
        }
        self.busy.set(true);

        let token = CancellationToken::new();
        *self.current.borrow_mut() = Some(token.clone());

        let config = Rc::clone(&self.config);
        let analyzer = Rc::clone(&self.analyzer);
        let busy = Rc::clone(&self.busy);
        Ok(future_to_promise(async move {
            let result = run_pass(&config, analyzer.as_ref(), &profile, token).await;
            busy.set(false);
            result
        }))
    }

    /// Stops the running pass before its next field.
    #[wasm_bindgen]
    pub fn cancel(&self) {
        if let Some(token) = self.current.borrow_mut().take() {
            token.cancel();
        }
    }

    #[wasm_bindgen(js_name = isBusy)]
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }
}

async fn run_pass(
    config: &FillConfig,
    analyzer: &HttpFormAnalyzer,
    profile: &Profile,
    token: CancellationToken,
) -> Result<JsValue, JsValue> {
    let document = BrowserDocument::current()?;
    let pacer = TimerPacer;
    let status = OverlayStatus::new(config.status_dismiss_ms);

    let report = FillSession::new(&document, analyzer, &pacer, &status, config)
        .with_cancellation(token)
        .run(profile)
        .await;

    let summary = serde_json::to_string(&report.summary()).map_err(|e| DomError::SerializationError {
        message: format!("Failed to serialize fill report. Details: {}", e),
    })?;
    Ok(JsValue::from_str(&summary))
}

// Initialize WASM module and log to console
#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    #[cfg(debug_assertions)]
    console_error_panic_hook::set_once(); // Better panic messages in browser
    logger::init(log::LevelFilter::Info);
    log::info!("ScholarFill initialized!");
    Ok(())
}
