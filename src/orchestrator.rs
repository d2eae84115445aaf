//! One fill pass, driven as an explicit state machine.
//!
//! ```text
//! Idle -Start-> Analyzing -PlanReady/Fallback-> Filling -FillingComplete-> Validating
//!                   |                              |                           |
//!                   +------------Fault-------------+-----------Fault-----------+--> Failed
//!
//! Validating -Validated-> Done
//! ```
//!
//! A [`FillSession`] is built per pass and consumed by [`FillSession::run`],
//! so two passes can never interleave on the same session.

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::bridge::{AnalysisRequest, FormAnalyzer, ValidationReport};
use crate::config::FillConfig;
use crate::document::{ElementHandle, FormDocument};
use crate::error::{BridgeError, FillError};
use crate::field_table;
use crate::instruction::{
    sort_by_priority, FillInstruction, FilledField, FilledFieldPayload, ValidationKind,
};
use crate::locator::{LocateMode, Locator};
use crate::profile::Profile;
use crate::simulator::{InputSimulator, Pacer};
use crate::status::{Status, StatusSurface};
use crate::transform::{transform, validate};

/// Where the instructions of a pass came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanSource {
    Analyzer,
    PatternTable,
}

impl PlanSource {
    pub fn locate_mode(self) -> LocateMode {
        match self {
            PlanSource::Analyzer => LocateMode::Extended,
            PlanSource::PatternTable => LocateMode::Heuristic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassState {
    Idle,
    Analyzing,
    Filling,
    Validating,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassEvent {
    Start,
    PlanReady,
    Fallback,
    FillingComplete,
    Validated,
    Fault,
}

impl PassState {
    /// The transition table. Pairs not listed are illegal and leave the state untouched.
    pub fn on(self, event: PassEvent) -> Result<PassState, FillError> {
        use PassEvent::*;
        use PassState::*;

        match (self, event) {
            (Idle, Start) => Ok(Analyzing),
            (Analyzing, PlanReady) | (Analyzing, Fallback) => Ok(Filling),
            (Filling, FillingComplete) => Ok(Validating),
            (Validating, Validated) => Ok(Done),
            (Analyzing, Fault) | (Filling, Fault) | (Validating, Fault) => Ok(Failed),
            (from, event) => Err(FillError::IllegalTransition { from, event }),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PassState::Done | PassState::Failed)
    }
}

/// An instruction that was dropped, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstruction {
    pub target: String,
    pub error: FillError,
}

/// Outcome of one pass. Progress made before a failure is kept.
#[derive(Debug)]
pub struct FillReport<E> {
    pub state: PassState,
    pub source: Option<PlanSource>,
    pub filled: Vec<FilledField<E>>,
    pub skipped: Vec<SkippedInstruction>,
    pub error: Option<FillError>,
}

impl<E> FillReport<E> {
    fn new() -> Self {
        FillReport {
            state: PassState::Idle,
            source: None,
            filled: Vec::new(),
            skipped: Vec::new(),
            error: None,
        }
    }

    /// Element-free view of the report, for handing back across the wasm boundary.
    pub fn summary(&self) -> FillSummary {
        FillSummary {
            state: self.state,
            source: self.source,
            filled: self.filled.iter().map(FilledField::payload).collect(),
            skipped: self
                .skipped
                .iter()
                .map(|s| SkippedSummary {
                    target: s.target.clone(),
                    reason: s.error.to_string(),
                })
                .collect(),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillSummary {
    pub state: PassState,
    pub source: Option<PlanSource>,
    pub filled: Vec<FilledFieldPayload>,
    pub skipped: Vec<SkippedSummary>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSummary {
    pub target: String,
    pub reason: String,
}

pub struct FillSession<'a, D: FormDocument> {
    document: &'a D,
    analyzer: &'a dyn FormAnalyzer,
    pacer: &'a dyn Pacer,
    status: &'a dyn StatusSurface,
    config: &'a FillConfig,
    cancel: CancellationToken,
    state: PassState,
}

impl<'a, D: FormDocument> FillSession<'a, D> {
    pub fn new(
        document: &'a D,
        analyzer: &'a dyn FormAnalyzer,
        pacer: &'a dyn Pacer,
        status: &'a dyn StatusSurface,
        config: &'a FillConfig,
    ) -> Self {
        FillSession {
            document,
            analyzer,
            pacer,
            status,
            config,
            cancel: CancellationToken::new(),
            state: PassState::Idle,
        }
    }

    /// Checked before every instruction; a cancelled pass ends `Failed`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub async fn run(mut self, profile: &Profile) -> FillReport<D::Element> {
        let mut report = FillReport::new();

        match self.drive(profile, &mut report).await {
            Ok(()) => {
                info!(
                    "Form filled: {} field(s) filled, {} skipped",
                    report.filled.len(),
                    report.skipped.len()
                );
                self.status.show(&Status::Success);
            }
            Err(e) => {
                error!("Error filling form: {}", e);
                match self.state.on(PassEvent::Fault) {
                    Ok(next) => self.state = next,
                    Err(illegal) => warn!("{}", illegal),
                }
                report.error = Some(e);
                self.status.show(&Status::Error);
            }
        }

        report.state = self.state;
        report
    }

    fn advance(&mut self, event: PassEvent) -> Result<(), FillError> {
        let next = self.state.on(event)?;
        debug!("Pass {:?} -> {:?} on {:?}", self.state, next, event);
        self.state = next;
        Ok(())
    }

    async fn drive(
        &mut self,
        profile: &Profile,
        report: &mut FillReport<D::Element>,
    ) -> Result<(), FillError> {
        self.advance(PassEvent::Start)?;
        self.status.show(&Status::Analyzing);

        let (plan, source) = self.plan(profile).await?;
        self.advance(match source {
            PlanSource::Analyzer => PassEvent::PlanReady,
            PlanSource::PatternTable => PassEvent::Fallback,
        })?;
        report.source = Some(source);
        self.status.show(&Status::Filling(source));

        self.fill(&plan, source.locate_mode(), report).await?;
        self.advance(PassEvent::FillingComplete)?;

        self.report_filled(report).await;
        self.advance(PassEvent::Validated)
    }

    async fn plan(
        &self,
        profile: &Profile,
    ) -> Result<(Vec<FillInstruction>, PlanSource), FillError> {
        match self.request_plan(profile).await {
            Ok(mut plan) => {
                sort_by_priority(&mut plan);
                info!("Analysis returned {} instruction(s)", plan.len());
                Ok((plan, PlanSource::Analyzer))
            }
            Err(FillError::BridgeUnavailable(e)) => {
                warn!("Falling back to pattern matching: {}", e);
                Ok((field_table::instructions_for(profile), PlanSource::PatternTable))
            }
            Err(e) => Err(e),
        }
    }

    async fn request_plan(&self, profile: &Profile) -> Result<Vec<FillInstruction>, FillError> {
        if !self.config.use_ai {
            return Err(BridgeError::Disabled.into());
        }
        let html = self
            .document
            .form_html()
            .map_err(|e| {
                FillError::OrchestratorFault(format!("could not snapshot the form: {}", e))
            })?;
        let url = self.document.page_url();
        let request = AnalysisRequest::new(&html, profile, &url);
        let plan = self.analyzer.analyze(&request).await?;
        if plan.is_empty() {
            return Err(BridgeError::EmptyPlan.into());
        }
        Ok(plan)
    }

    async fn fill(
        &self,
        plan: &[FillInstruction],
        mode: LocateMode,
        report: &mut FillReport<D::Element>,
    ) -> Result<(), FillError> {
        let locator = Locator::new(self.document, mode);
        let simulator = InputSimulator::new(self.pacer, self.config);
        let mut taken: Vec<D::Element> = Vec::new();

        for instruction in plan {
            if self.cancel.is_cancelled() {
                return Err(FillError::Cancelled);
            }
            match self.fill_one(&locator, &simulator, instruction, &taken).await {
                Ok(filled) => {
                    debug!("Filled {} with {:?}", filled.selector, filled.value);
                    taken.push(filled.element.clone());
                    report.filled.push(filled);
                    self.pacer.pause(self.config.field_delay_ms).await;
                }
                Err(e) if e.is_instruction_local() => {
                    warn!("Skipping {}: {}", instruction.target(), e);
                    report.skipped.push(SkippedInstruction {
                        target: instruction.target(),
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn fill_one(
        &self,
        locator: &Locator<'_, D>,
        simulator: &InputSimulator<'_>,
        instruction: &FillInstruction,
        taken: &[D::Element],
    ) -> Result<FilledField<D::Element>, FillError> {
        let target = instruction.target();
        let selector = instruction
            .selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let by_selector = selector.and_then(|s| {
            let element = locator.locate_selector(s, taken)?;
            Some((s.to_string(), element))
        });
        let (selector, element) = if let Some(hit) = by_selector {
            hit
        } else {
            let element = locate_by_patterns(locator, instruction, taken)
                .ok_or_else(|| FillError::LocatorMiss { target: target.clone() })?;
            (element.selector_hint(), element)
        };

        let value = transform(&instruction.value.to_string(), instruction.transform);
        if !validate(&value, instruction.validation) {
            return Err(FillError::ValidationRejected {
                target,
                value,
                kind: instruction.validation.unwrap_or(ValidationKind::Any),
            });
        }

        let method = instruction.method.resolve_for(&element);
        let value = simulator
            .apply(&element, &value, method, instruction.scrolls())
            .await
            .map_err(|source| FillError::SimulatorFault {
                target: target.clone(),
                source,
            })?;

        Ok(FilledField { selector, value, element })
    }

    async fn report_filled(&self, report: &FillReport<D::Element>) {
        if !self.config.use_ai {
            return;
        }
        let payload = ValidationReport {
            filled_fields: report.filled.iter().map(FilledField::payload).collect(),
            url: self.document.page_url(),
        };
        if let Err(e) = self.analyzer.report_filled(&payload).await {
            warn!("Form validation error: {}", e);
        }
    }
}

/// Instruction patterns, or the table's patterns for its semantic field when it carries none.
fn locate_by_patterns<D: FormDocument>(
    locator: &Locator<'_, D>,
    instruction: &FillInstruction,
    taken: &[D::Element],
) -> Option<D::Element> {
    if !instruction.field_patterns.is_empty() {
        return locator.locate_excluding(&instruction.field_patterns, taken);
    }
    let patterns = instruction.field.as_deref().and_then(field_table::patterns_for)?;
    locator.locate_excluding(patterns, taken)
}
