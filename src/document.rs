//! Capability interface over the live document.
//!
//! The locator only reads through these traits and the simulator only writes
//! through them, so both run unchanged against the browser backend in
//! `dom_utils` and the in-memory backend in `fake`.

use std::fmt;

use crate::error::DomError;

/// DOM-level events dispatched to mimic a hand-typing user. All bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Input,
    Change,
    Blur,
}

impl Notification {
    pub fn event_type(self) -> &'static str {
        match self {
            Notification::Input => "input",
            Notification::Change => "change",
            Notification::Blur => "blur",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// A transient handle on one live node. Never held past a fill pass.
pub trait ElementHandle: Clone + fmt::Debug {
    /// Lowercase tag name.
    fn tag_name(&self) -> String;
    fn attribute(&self, name: &str) -> Option<String>;
    fn text_content(&self) -> String;
    /// Rendered with a layout parent, non-zero size, and not `display: none`.
    fn is_visible(&self) -> bool;
    fn is_disabled(&self) -> bool;
    fn same_element(&self, other: &Self) -> bool;
    /// First `input`, `textarea` or `select` nested inside this element.
    fn nested_control(&self) -> Option<Self>;

    fn value(&self) -> String;
    fn set_value(&self, value: &str) -> Result<(), DomError>;
    fn set_checked(&self, checked: bool) -> Result<(), DomError>;
    fn options(&self) -> Vec<SelectOption>;
    fn select_index(&self, index: usize) -> Result<(), DomError>;

    fn focus(&self) -> Result<(), DomError>;
    fn click(&self) -> Result<(), DomError>;
    fn scroll_into_view(&self);
    /// Applies the fill highlight and reverts it after `duration_ms`.
    fn highlight(&self, duration_ms: u32) -> Result<(), DomError>;
    fn dispatch(&self, notification: Notification) -> Result<(), DomError>;

    fn is_select(&self) -> bool {
        self.tag_name() == "select"
    }

    /// Best-effort CSS selector for reporting which element was filled.
    fn selector_hint(&self) -> String {
        let tag = self.tag_name();
        if let Some(id) = self.attribute("id").filter(|id| !id.is_empty()) {
            return format!("#{}", id);
        }
        if let Some(name) = self.attribute("name").filter(|name| !name.is_empty()) {
            return format!("{}[name=\"{}\"]", tag, name);
        }
        tag
    }
}

/// Read-side queries over the document a fill pass runs against.
pub trait FormDocument {
    type Element: ElementHandle;

    /// Every `input`, `textarea` and `select`, in document order.
    fn form_controls(&self) -> Vec<Self::Element>;
    /// Every `label`, in document order.
    fn labels(&self) -> Vec<Self::Element>;
    fn element_by_id(&self, id: &str) -> Option<Self::Element>;
    fn query_selector(&self, selector: &str) -> Result<Option<Self::Element>, DomError>;
    /// Serialized forms plus standalone fields, for the analysis service.
    fn form_html(&self) -> Result<String, DomError>;
    fn page_url(&self) -> String;
}
