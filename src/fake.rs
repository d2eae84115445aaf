//! In-memory document backend.
//!
//! Implements the same capabilities as the browser backend over a small tree
//! of fake nodes that record every interaction, plus recording doubles for
//! the pacer, the status surface and the analysis service. Lets the whole
//! fill pipeline run natively without a browser.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;

use crate::bridge::{AnalysisRequest, FormAnalyzer, ValidationReport};
use crate::document::{ElementHandle, FormDocument, Notification, SelectOption};
use crate::error::{BridgeError, DomError};
use crate::instruction::FillInstruction;
use crate::simulator::Pacer;
use crate::status::{Status, StatusSurface};

/// Everything observable that happened to a fake element, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Scroll,
    Highlight(u32),
    Focus,
    Click,
    /// A dispatched notification and the element's value at dispatch time.
    Notify { notification: Notification, value: String },
}

#[derive(Debug, Default)]
struct Node {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    value: String,
    checked: bool,
    options: Vec<SelectOption>,
    selected: Option<usize>,
    children: Vec<FakeElement>,
    hidden: bool,
    zero_size: bool,
    detached: bool,
    failing: bool,
    input_mask: Option<InputMask>,
    events: Vec<FakeEvent>,
}

#[derive(Debug, Clone, Copy)]
struct InputMask {
    limit: usize,
    remaining: usize,
}

#[derive(Clone)]
pub struct FakeElement(Rc<RefCell<Node>>);

impl fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FakeElement({})", self.selector_hint())
    }
}

impl FakeElement {
    fn new(tag: &str) -> Self {
        FakeElement(Rc::new(RefCell::new(Node {
            tag: tag.to_string(),
            ..Default::default()
        })))
    }

    pub fn input() -> Self {
        Self::new("input")
    }

    pub fn textarea() -> Self {
        Self::new("textarea")
    }

    /// A `<select>` with `(value, text)` options; the first one starts selected.
    pub fn select(options: &[(&str, &str)]) -> Self {
        let element = Self::new("select");
        {
            let mut node = element.0.borrow_mut();
            node.options = options
                .iter()
                .map(|(value, text)| SelectOption {
                    value: value.to_string(),
                    text: text.to_string(),
                })
                .collect();
            if !node.options.is_empty() {
                node.selected = Some(0);
            }
        }
        element
    }

    pub fn checkbox() -> Self {
        Self::input().attr("type", "checkbox")
    }

    pub fn button(text: &str) -> Self {
        Self::new("button").text(text)
    }

    pub fn label(text: &str) -> Self {
        Self::new("label").text(text)
    }

    pub fn div() -> Self {
        Self::new("div")
    }

    pub fn attr(self, name: &str, value: &str) -> Self {
        {
            let mut node = self.0.borrow_mut();
            match node.attributes.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => node.attributes.push((name.to_string(), value.to_string())),
            }
        }
        self
    }

    pub fn text(self, text: &str) -> Self {
        self.0.borrow_mut().text = text.to_string();
        self
    }

    pub fn child(self, child: FakeElement) -> Self {
        self.0.borrow_mut().children.push(child);
        self
    }

    pub fn with_value(self, value: &str) -> Self {
        self.0.borrow_mut().value = value.to_string();
        self
    }

    pub fn display_none(self) -> Self {
        self.0.borrow_mut().hidden = true;
        self
    }

    pub fn zero_size(self) -> Self {
        self.0.borrow_mut().zero_size = true;
        self
    }

    /// No layout parent, as for `position: fixed` ancestors or removed nodes.
    pub fn detached(self) -> Self {
        self.0.borrow_mut().detached = true;
        self
    }

    pub fn disabled(self) -> Self {
        self.attr("disabled", "")
    }

    /// Every write and dispatch fails from now on.
    pub fn failing(self) -> Self {
        self.0.borrow_mut().failing = true;
        self
    }

    /// The next `dispatches` input notifications cut the value to `limit`
    /// chars, like a page mask script listening for `input`.
    pub fn truncate_on_input(self, limit: usize, dispatches: usize) -> Self {
        self.0.borrow_mut().input_mask = Some(InputMask { limit, remaining: dispatches });
        self
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.0.borrow().events.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.0
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                FakeEvent::Notify { notification, .. } => Some(*notification),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&FakeEvent) -> bool) -> usize {
        self.0.borrow().events.iter().filter(|&e| predicate(e)).count()
    }

    pub fn checked(&self) -> bool {
        self.0.borrow().checked
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.0.borrow().selected
    }

    fn record(&self, event: FakeEvent) {
        self.0.borrow_mut().events.push(event);
    }

    fn check_writable(&self, operation: &str) -> Result<(), DomError> {
        if self.0.borrow().failing {
            return Err(DomError::JsError {
                message: format!("{} rejected by {}", operation, self.selector_hint()),
            });
        }
        Ok(())
    }

    fn walk(&self, out: &mut Vec<FakeElement>) {
        out.push(self.clone());
        for child in &self.0.borrow().children {
            child.walk(out);
        }
    }

    fn to_html(&self, out: &mut String) {
        let node = self.0.borrow();
        out.push('<');
        out.push_str(&node.tag);
        for (name, value) in &node.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
        }
        out.push('>');
        if node.tag == "input" {
            return;
        }
        for option in &node.options {
            out.push_str(&format!(
                "<option value=\"{}\">{}</option>",
                escape(&option.value),
                escape(&option.text)
            ));
        }
        out.push_str(&escape(&node.text));
        for child in &node.children {
            child.to_html(out);
        }
        out.push_str(&format!("</{}>", node.tag));
    }

    fn matches(&self, selector: &SimpleSelector) -> bool {
        if let Some(tag) = &selector.tag {
            if !self.tag_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &selector.id {
            if self.attribute("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        let classes = self.attribute("class").unwrap_or_default();
        if !selector
            .classes
            .iter()
            .all(|c| classes.split_whitespace().any(|own| own == c))
        {
            return false;
        }
        selector.attributes.iter().all(|(name, expected)| match (self.attribute(name), expected) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => &actual == expected,
            (None, _) => false,
        })
    }
}

impl ElementHandle for FakeElement {
    fn tag_name(&self) -> String {
        self.0.borrow().tag.to_lowercase()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .borrow()
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    fn text_content(&self) -> String {
        let node = self.0.borrow();
        let mut text = node.text.clone();
        for child in &node.children {
            text.push_str(&child.text_content());
        }
        text
    }

    fn is_visible(&self) -> bool {
        let node = self.0.borrow();
        !node.detached && !node.zero_size && !node.hidden
    }

    fn is_disabled(&self) -> bool {
        self.attribute("disabled").is_some()
    }

    fn same_element(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn nested_control(&self) -> Option<Self> {
        let mut all = Vec::new();
        for child in &self.0.borrow().children {
            child.walk(&mut all);
        }
        all.into_iter()
            .find(|el| matches!(el.tag_name().as_str(), "input" | "textarea" | "select"))
    }

    fn value(&self) -> String {
        let node = self.0.borrow();
        if node.tag == "select" {
            return node
                .selected
                .and_then(|i| node.options.get(i))
                .map(|o| o.value.clone())
                .unwrap_or_default();
        }
        node.value.clone()
    }

    fn set_value(&self, value: &str) -> Result<(), DomError> {
        self.check_writable("set_value")?;
        let mut node = self.0.borrow_mut();
        if node.tag == "select" {
            node.selected = node.options.iter().position(|o| o.value == value);
        } else {
            node.value = value.to_string();
        }
        Ok(())
    }

    fn set_checked(&self, checked: bool) -> Result<(), DomError> {
        self.check_writable("set_checked")?;
        self.0.borrow_mut().checked = checked;
        Ok(())
    }

    fn options(&self) -> Vec<SelectOption> {
        self.0.borrow().options.clone()
    }

    fn select_index(&self, index: usize) -> Result<(), DomError> {
        self.check_writable("select_index")?;
        let mut node = self.0.borrow_mut();
        if index >= node.options.len() {
            return Err(DomError::ElementTypeError {
                element: format!("select with {} options", node.options.len()),
                expected_type: format!("option at index {}", index),
            });
        }
        node.selected = Some(index);
        Ok(())
    }

    fn focus(&self) -> Result<(), DomError> {
        self.record(FakeEvent::Focus);
        Ok(())
    }

    fn click(&self) -> Result<(), DomError> {
        self.record(FakeEvent::Click);
        if self.attribute("type").as_deref() == Some("checkbox") {
            let mut node = self.0.borrow_mut();
            node.checked = !node.checked;
        }
        Ok(())
    }

    fn scroll_into_view(&self) {
        self.record(FakeEvent::Scroll);
    }

    fn highlight(&self, duration_ms: u32) -> Result<(), DomError> {
        self.record(FakeEvent::Highlight(duration_ms));
        Ok(())
    }

    fn dispatch(&self, notification: Notification) -> Result<(), DomError> {
        self.check_writable(notification.event_type())?;
        if notification == Notification::Input {
            let mut node = self.0.borrow_mut();
            if let Some(mask) = node.input_mask.as_mut().filter(|m| m.remaining > 0) {
                mask.remaining -= 1;
                let limit = mask.limit;
                node.value = node.value.chars().take(limit).collect();
            }
        }
        let value = self.value();
        self.record(FakeEvent::Notify { notification, value });
        Ok(())
    }
}

/// One compound selector: `tag#id.class[attr=value]`.
#[derive(Debug, Default, PartialEq)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

fn invalid(selector: &str, error: &str) -> DomError {
    DomError::InvalidSelector {
        selector: selector.to_string(),
        error: error.to_string(),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_selector(original: &str) -> Result<SimpleSelector, DomError> {
    if original.starts_with("xpath:") {
        return Err(invalid(original, "XPath is not supported by the in-memory document"));
    }
    let selector = original.strip_prefix("css:").unwrap_or(original).trim();
    if selector.is_empty() {
        return Err(invalid(original, "empty selector"));
    }
    if selector.contains(|c: char| c.is_whitespace() || matches!(c, '>' | '+' | '~' | ',' | ':')) {
        return Err(invalid(original, "only simple compound selectors are supported"));
    }

    let mut parsed = SimpleSelector::default();
    let mut rest = selector;

    let tag_len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
    if tag_len > 0 {
        parsed.tag = Some(rest[..tag_len].to_string());
        rest = &rest[tag_len..];
    }

    while let Some(first) = rest.chars().next() {
        match first {
            '#' | '.' => {
                let body = &rest[1..];
                let len = body.find(|c: char| !is_ident_char(c)).unwrap_or(body.len());
                if len == 0 {
                    return Err(invalid(original, "expected an identifier"));
                }
                let ident = body[..len].to_string();
                if first == '#' {
                    parsed.id = Some(ident);
                } else {
                    parsed.classes.push(ident);
                }
                rest = &body[len..];
            }
            '[' => {
                let end = rest.find(']').ok_or_else(|| invalid(original, "unterminated attribute selector"))?;
                let inner = &rest[1..end];
                let attribute = match inner.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim_matches(|c| c == '"' || c == '\'');
                        (name.to_string(), Some(value.to_string()))
                    }
                    None => (inner.to_string(), None),
                };
                if attribute.0.is_empty() || !attribute.0.chars().all(is_ident_char) {
                    return Err(invalid(original, "bad attribute name"));
                }
                parsed.attributes.push(attribute);
                rest = &rest[end + 1..];
            }
            other => return Err(invalid(original, &format!("unexpected '{}'", other))),
        }
    }
    Ok(parsed)
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('"', "&quot;")
}

/// A page holding fake elements in document order.
pub struct FakeDocument {
    url: String,
    roots: RefCell<Vec<FakeElement>>,
    markup: RefCell<Option<String>>,
}

impl FakeDocument {
    pub fn new(url: &str) -> Self {
        FakeDocument {
            url: url.to_string(),
            roots: RefCell::new(Vec::new()),
            markup: RefCell::new(None),
        }
    }

    /// Appends a top-level element and hands back a handle to it.
    pub fn add(&self, element: FakeElement) -> FakeElement {
        self.roots.borrow_mut().push(element.clone());
        element
    }

    /// Overrides the HTML handed to the analysis service.
    pub fn set_markup(&self, html: &str) {
        *self.markup.borrow_mut() = Some(html.to_string());
    }

    fn all(&self) -> Vec<FakeElement> {
        let mut out = Vec::new();
        for root in self.roots.borrow().iter() {
            root.walk(&mut out);
        }
        out
    }
}

impl FormDocument for FakeDocument {
    type Element = FakeElement;

    fn form_controls(&self) -> Vec<FakeElement> {
        self.all()
            .into_iter()
            .filter(|el| matches!(el.tag_name().as_str(), "input" | "textarea" | "select"))
            .collect()
    }

    fn labels(&self) -> Vec<FakeElement> {
        self.all().into_iter().filter(|el| el.tag_name() == "label").collect()
    }

    fn element_by_id(&self, id: &str) -> Option<FakeElement> {
        self.all()
            .into_iter()
            .find(|el| el.attribute("id").as_deref() == Some(id))
    }

    fn query_selector(&self, selector: &str) -> Result<Option<FakeElement>, DomError> {
        let parsed = parse_selector(selector)?;
        Ok(self.all().into_iter().find(|el| el.matches(&parsed)))
    }

    fn form_html(&self) -> Result<String, DomError> {
        if let Some(markup) = self.markup.borrow().clone() {
            return Ok(markup);
        }
        let mut html = String::new();
        for root in self.roots.borrow().iter() {
            root.to_html(&mut html);
        }
        Ok(html)
    }

    fn page_url(&self) -> String {
        self.url.clone()
    }
}

/// Records every pause instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: RefCell<Vec<u32>>,
}

impl RecordingPacer {
    pub fn pauses(&self) -> Vec<u32> {
        self.pauses.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Pacer for RecordingPacer {
    async fn pause(&self, ms: u32) {
        self.pauses.borrow_mut().push(ms);
    }
}

#[derive(Debug, Default)]
pub struct RecordingStatus {
    shown: RefCell<Vec<Status>>,
}

impl RecordingStatus {
    pub fn shown(&self) -> Vec<Status> {
        self.shown.borrow().clone()
    }
}

impl StatusSurface for RecordingStatus {
    fn show(&self, status: &Status) {
        self.shown.borrow_mut().push(*status);
    }
}

/// What the analysis service was sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub html: String,
    pub url: String,
    pub user_data: serde_json::Value,
}

/// Analysis service double answering with a fixed plan or a fixed error.
#[derive(Debug)]
pub struct ScriptedAnalyzer {
    answer: Result<Vec<FillInstruction>, BridgeError>,
    report_error: Option<BridgeError>,
    requests: RefCell<Vec<RecordedRequest>>,
    reports: RefCell<Vec<ValidationReport>>,
}

impl ScriptedAnalyzer {
    fn with_answer(answer: Result<Vec<FillInstruction>, BridgeError>) -> Self {
        ScriptedAnalyzer {
            answer,
            report_error: None,
            requests: RefCell::new(Vec::new()),
            reports: RefCell::new(Vec::new()),
        }
    }

    pub fn with_plan(plan: Vec<FillInstruction>) -> Self {
        Self::with_answer(Ok(plan))
    }

    pub fn failing(error: BridgeError) -> Self {
        Self::with_answer(Err(error))
    }

    /// Makes the post-fill validation call fail with `error`.
    pub fn with_validation_error(mut self, error: BridgeError) -> Self {
        self.report_error = Some(error);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub fn reports(&self) -> Vec<ValidationReport> {
        self.reports.borrow().clone()
    }
}

#[async_trait(?Send)]
impl FormAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Vec<FillInstruction>, BridgeError> {
        self.requests.borrow_mut().push(RecordedRequest {
            html: request.html.clone(),
            url: request.url.to_string(),
            user_data: serde_json::to_value(request.user_data)
                .map_err(|e| BridgeError::Decode(e.to_string()))?,
        });
        self.answer.clone()
    }

    async fn report_filled(&self, report: &ValidationReport) -> Result<(), BridgeError> {
        self.reports.borrow_mut().push(report.clone());
        match &self.report_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_selector_compound() {
        let doc = FakeDocument::new("https://apply.example.org");
        doc.add(FakeElement::input().attr("name", "gpa").attr("class", "field wide"));
        let target = doc.add(FakeElement::input().attr("id", "gpa").attr("name", "gpa").attr("class", "field"));

        assert!(doc.query_selector("#gpa").unwrap().unwrap().same_element(&target));
        assert!(doc.query_selector("css:input#gpa.field").unwrap().unwrap().same_element(&target));
        assert!(doc
            .query_selector(r#"input[name="gpa"]"#)
            .unwrap()
            .unwrap()
            .same_element(&doc.form_controls()[0]));
        assert!(doc.query_selector("select").unwrap().is_none());
    }

    #[test]
    fn test_query_selector_rejects_unsupported_syntax() {
        let doc = FakeDocument::new("https://apply.example.org");
        for bad in ["", "form > input", "input:checked", "xpath://input", "[", "a, b", "#"] {
            assert!(
                matches!(doc.query_selector(bad), Err(DomError::InvalidSelector { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_selector_hint_round_trips_through_query() {
        let doc = FakeDocument::new("https://apply.example.org");
        let named = doc.add(FakeElement::textarea().attr("name", "career_goals"));
        let hint = named.selector_hint();
        assert_eq!(hint, r#"textarea[name="career_goals"]"#);
        assert!(doc.query_selector(&hint).unwrap().unwrap().same_element(&named));
    }

    #[test]
    fn test_generated_markup() {
        let doc = FakeDocument::new("https://apply.example.org");
        doc.add(
            FakeElement::div()
                .attr("id", "form")
                .child(FakeElement::label("Name").child(FakeElement::input().attr("name", "n")))
                .child(FakeElement::select(&[("a", "A & B")])),
        );
        assert_eq!(
            doc.form_html().unwrap(),
            r#"<div id="form"><label>Name<input name="n"></label><select><option value="a">A &amp; B</option></select></div>"#
        );
        doc.set_markup("<form></form>");
        assert_eq!(doc.form_html().unwrap(), "<form></form>");
    }

    #[test]
    fn test_nested_children_are_walked_in_document_order() {
        let doc = FakeDocument::new("https://apply.example.org");
        let inner = FakeElement::input().attr("id", "inner");
        doc.add(FakeElement::div().child(FakeElement::label("x").child(inner.clone())));
        let outer = doc.add(FakeElement::input().attr("id", "outer"));
        let controls = doc.form_controls();
        assert!(controls[0].same_element(&inner));
        assert!(controls[1].same_element(&outer));
        assert!(doc.element_by_id("inner").unwrap().same_element(&inner));
        assert_eq!(doc.labels().len(), 1);
    }
}
