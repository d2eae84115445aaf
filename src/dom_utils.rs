//! Browser backend: the document capabilities over `web_sys`.

use async_trait::async_trait;
use gloo_timers::callback::Timeout;
use gloo_timers::future::TimeoutFuture;
use log::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, Event, EventInit, HtmlElement, HtmlInputElement, HtmlOptionElement, HtmlSelectElement,
    HtmlTextAreaElement, NodeList, ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition, Window, XPathResult,
};

use crate::document::{ElementHandle, FormDocument, Notification, SelectOption};
use crate::error::DomError;
use crate::simulator::Pacer;
use crate::status::{Status, StatusSurface};

const CONTROLS: &str = "input, textarea, select";
const STATUS_ID: &str = "scholarai-status";
const HIGHLIGHT_BORDER: &str = "2px solid #4F46E5";
const HIGHLIGHT_SHADOW: &str = "0 0 10px rgba(79, 70, 229, 0.3)";

// Helper function to get window and document
fn get_window_document() -> Result<(Window, Document), DomError> {
    let window = web_sys::window().ok_or_else(|| DomError::JsError { message: "Failed to get window object".to_string() })?;
    let document = window.document().ok_or_else(|| DomError::JsError { message: "Failed to get document object".to_string() })?;
    Ok((window, document))
}

fn js_message(value: &wasm_bindgen::JsValue, fallback: &str) -> String {
    value.as_string().unwrap_or_else(|| fallback.to_string())
}

fn get_element_by_xpath_logic(document: &Document, xpath: &str, original_selector: &str) -> Result<Option<Element>, DomError> {
    let result = document
        .evaluate_with_opt_callback_and_type(xpath, document, None, XPathResult::FIRST_ORDERED_NODE_TYPE)
        .map_err(|e| DomError::InvalidSelector {
            selector: original_selector.to_string(),
            error: js_message(&e, "Unknown XPath error"),
        })?;

    match result.single_node_value() {
        Ok(Some(node)) => node.dyn_into::<Element>().map(Some).map_err(|_| DomError::ElementTypeError {
            element: original_selector.to_string(),
            expected_type: "Element".to_string(),
        }),
        Ok(None) => Ok(None),
        Err(e) => Err(DomError::JsError {
            message: format!(
                "Error retrieving single node for XPath '{}'. Details: {}",
                original_selector,
                js_message(&e, "Unknown node retrieval error")
            ),
        }),
    }
}

/// Resolves `xpath:` or `css:` prefixed selectors; unprefixed ones are CSS.
fn get_element(document: &Document, original_selector: &str) -> Result<Option<Element>, DomError> {
    if let Some(xpath) = original_selector.strip_prefix("xpath:") {
        debug!("Using XPath selector: {}", xpath);
        return get_element_by_xpath_logic(document, xpath, original_selector);
    }
    let css = original_selector.strip_prefix("css:").unwrap_or(original_selector);
    document.query_selector(css).map_err(|e| DomError::InvalidSelector {
        selector: original_selector.to_string(),
        error: js_message(&e, "Unknown querySelector error"),
    })
}

fn elements(list: &NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn query_all(document: &Document, selector: &str) -> Vec<BrowserElement> {
    match document.query_selector_all(selector) {
        Ok(list) => elements(&list).into_iter().map(BrowserElement).collect(),
        Err(e) => {
            warn!("querySelectorAll('{}') failed: {}", selector, js_message(&e, "unknown error"));
            Vec::new()
        }
    }
}

/// The page the content script runs in.
pub struct BrowserDocument {
    window: Window,
    document: Document,
}

impl BrowserDocument {
    pub fn current() -> Result<Self, DomError> {
        let (window, document) = get_window_document()?;
        Ok(BrowserDocument { window, document })
    }
}

impl FormDocument for BrowserDocument {
    type Element = BrowserElement;

    fn form_controls(&self) -> Vec<BrowserElement> {
        query_all(&self.document, CONTROLS)
    }

    fn labels(&self) -> Vec<BrowserElement> {
        query_all(&self.document, "label")
    }

    fn element_by_id(&self, id: &str) -> Option<BrowserElement> {
        self.document.get_element_by_id(id).map(BrowserElement)
    }

    fn query_selector(&self, selector: &str) -> Result<Option<BrowserElement>, DomError> {
        Ok(get_element(&self.document, selector)?.map(BrowserElement))
    }

    /// Every `<form>` with its scripts removed, then any control living outside a form.
    fn form_html(&self) -> Result<String, DomError> {
        let mut html = String::new();
        let forms = self.document.query_selector_all("form").map_err(DomError::from)?;
        for form in elements(&forms) {
            let copy = form
                .clone_node_with_deep(true)
                .map_err(DomError::from)?
                .dyn_into::<Element>()
                .map_err(|_| DomError::ElementTypeError {
                    element: "form".to_string(),
                    expected_type: "Element".to_string(),
                })?;
            for script in elements(&copy.query_selector_all("script").map_err(DomError::from)?) {
                script.remove();
            }
            html.push_str(&copy.outer_html());
        }

        for control in self.form_controls() {
            if control.0.closest("form").map_err(DomError::from)?.is_none() {
                html.push_str(&control.0.outer_html());
            }
        }
        Ok(html)
    }

    fn page_url(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct BrowserElement(pub Element);

impl BrowserElement {
    fn html(&self) -> Result<HtmlElement, DomError> {
        self.0.clone().dyn_into::<HtmlElement>().map_err(|_| DomError::ElementTypeError {
            element: self.selector_hint(),
            expected_type: "HtmlElement".to_string(),
        })
    }

    fn select_element(&self) -> Option<HtmlSelectElement> {
        self.0.dyn_ref::<HtmlSelectElement>().cloned()
    }
}

impl ElementHandle for BrowserElement {
    fn tag_name(&self) -> String {
        self.0.tag_name().to_lowercase()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn text_content(&self) -> String {
        self.0.text_content().unwrap_or_default()
    }

    fn is_visible(&self) -> bool {
        let Ok(html) = self.html() else {
            return false;
        };
        if html.offset_parent().is_none() || html.offset_width() <= 0 || html.offset_height() <= 0 {
            return false;
        }
        let display = web_sys::window()
            .and_then(|w| w.get_computed_style(&self.0).ok().flatten())
            .and_then(|style| style.get_property_value("display").ok());
        display.as_deref() != Some("none")
    }

    fn is_disabled(&self) -> bool {
        self.0.matches(":disabled").unwrap_or(false)
    }

    fn same_element(&self, other: &Self) -> bool {
        self.0 == other.0
    }

    fn nested_control(&self) -> Option<Self> {
        self.0.query_selector(CONTROLS).ok().flatten().map(BrowserElement)
    }

    fn value(&self) -> String {
        if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
            return input.value();
        }
        if let Some(area) = self.0.dyn_ref::<HtmlTextAreaElement>() {
            return area.value();
        }
        if let Some(select) = self.0.dyn_ref::<HtmlSelectElement>() {
            return select.value();
        }
        String::new()
    }

    fn set_value(&self, value: &str) -> Result<(), DomError> {
        if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(area) = self.0.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        } else if let Some(select) = self.0.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        } else {
            return Err(DomError::ElementTypeError {
                element: self.selector_hint(),
                expected_type: "HtmlInputElement".to_string(),
            });
        }
        Ok(())
    }

    fn set_checked(&self, checked: bool) -> Result<(), DomError> {
        let input = self.0.dyn_ref::<HtmlInputElement>().ok_or_else(|| DomError::ElementTypeError {
            element: self.selector_hint(),
            expected_type: "HtmlInputElement".to_string(),
        })?;
        input.set_checked(checked);
        Ok(())
    }

    fn options(&self) -> Vec<SelectOption> {
        let Some(select) = self.select_element() else {
            return Vec::new();
        };
        (0..select.length())
            .filter_map(|i| select.item(i))
            .filter_map(|el| el.dyn_into::<HtmlOptionElement>().ok())
            .map(|option| SelectOption {
                value: option.value(),
                text: option.text(),
            })
            .collect()
    }

    fn select_index(&self, index: usize) -> Result<(), DomError> {
        let select = self.select_element().ok_or_else(|| DomError::ElementTypeError {
            element: self.selector_hint(),
            expected_type: "HtmlSelectElement".to_string(),
        })?;
        let index = i32::try_from(index).map_err(|_| DomError::JsError {
            message: format!("option index {} out of range", index),
        })?;
        select.set_selected_index(index);
        Ok(())
    }

    fn focus(&self) -> Result<(), DomError> {
        self.html()?.focus().map_err(DomError::from)
    }

    fn click(&self) -> Result<(), DomError> {
        self.html()?.click();
        Ok(())
    }

    fn scroll_into_view(&self) {
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        options.set_block(ScrollLogicalPosition::Center);
        self.0.scroll_into_view_with_scroll_into_view_options(&options);
    }

    fn highlight(&self, duration_ms: u32) -> Result<(), DomError> {
        let style = self.html()?.style();
        let original_border = style.get_property_value("border").unwrap_or_default();
        style.set_property("border", HIGHLIGHT_BORDER).map_err(DomError::from)?;
        style.set_property("box-shadow", HIGHLIGHT_SHADOW).map_err(DomError::from)?;

        Timeout::new(duration_ms, move || {
            let _ = style.set_property("border", &original_border);
            let _ = style.remove_property("box-shadow");
        })
        .forget();
        Ok(())
    }

    fn dispatch(&self, notification: Notification) -> Result<(), DomError> {
        let init = EventInit::new();
        init.set_bubbles(true);
        let event = Event::new_with_event_init_dict(notification.event_type(), &init).map_err(DomError::from)?;
        self.0.dispatch_event(&event).map_err(DomError::from)?;
        Ok(())
    }
}

/// Suspends on a browser timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimerPacer;

#[async_trait(?Send)]
impl Pacer for TimerPacer {
    async fn pause(&self, ms: u32) {
        TimeoutFuture::new(ms).await;
    }
}

/// The fixed-position `#scholarai-status` banner.
#[derive(Debug, Clone, Copy)]
pub struct OverlayStatus {
    dismiss_ms: u32,
}

impl OverlayStatus {
    pub fn new(dismiss_ms: u32) -> Self {
        OverlayStatus { dismiss_ms }
    }

    fn render(&self, status: &Status) -> Result<(), DomError> {
        let (_window, document) = get_window_document()?;
        if let Some(existing) = document.get_element_by_id(STATUS_ID) {
            existing.remove();
        }

        let banner = document.create_element("div").map_err(DomError::from)?;
        banner.set_id(STATUS_ID);
        banner
            .set_attribute(
                "style",
                &format!(
                    "position: fixed; top: 20px; right: 20px; background: {}; color: white; \
                     padding: 15px 25px; border-radius: 10px; box-shadow: 0 4px 15px rgba(0, 0, 0, 0.2); \
                     z-index: 10000; font-family: Arial, sans-serif;",
                    status.color()
                ),
            )
            .map_err(DomError::from)?;
        banner.set_text_content(Some(status.message()));

        let body = document.body().ok_or_else(|| DomError::ElementNotFound { selector: "body".to_string() })?;
        body.append_child(&banner).map_err(DomError::from)?;

        if status.auto_dismisses() {
            Timeout::new(self.dismiss_ms, move || banner.remove()).forget();
        }
        Ok(())
    }
}

impl StatusSurface for OverlayStatus {
    fn show(&self, status: &Status) {
        if let Err(e) = self.render(status) {
            warn!("Could not show status '{}': {}", status.message(), e);
        }
    }
}
