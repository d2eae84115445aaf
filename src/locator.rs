use log::{debug, warn};

use crate::document::{ElementHandle, FormDocument};

/// Which strategy set the locator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateMode {
    /// Pattern-table fallback: name, id, input placeholder, label. Visible only.
    Heuristic,
    /// Analysis-plan path: adds textarea placeholders and class matching,
    /// and rejects disabled elements.
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Name,
    Id,
    Placeholder,
    Class,
    Label,
}

impl LocateMode {
    fn strategies(self) -> &'static [Strategy] {
        match self {
            LocateMode::Heuristic => &[
                Strategy::Name,
                Strategy::Id,
                Strategy::Placeholder,
                Strategy::Label,
            ],
            LocateMode::Extended => &[
                Strategy::Name,
                Strategy::Id,
                Strategy::Placeholder,
                Strategy::Class,
                Strategy::Label,
            ],
        }
    }
}

/// Finds at most one visible element for a list of patterns.
///
/// Pattern order is the priority: for each pattern every strategy is tried in
/// turn, and the first acceptable candidate wins. Read-only.
pub struct Locator<'a, D: FormDocument> {
    document: &'a D,
    mode: LocateMode,
}

impl<'a, D: FormDocument> Locator<'a, D> {
    pub fn new(document: &'a D, mode: LocateMode) -> Self {
        Locator { document, mode }
    }

    pub fn locate<S: AsRef<str>>(&self, patterns: &[S]) -> Option<D::Element> {
        self.locate_excluding(patterns, &[])
    }

    /// Like [`Locator::locate`], skipping elements already filled this pass.
    pub fn locate_excluding<S: AsRef<str>>(
        &self,
        patterns: &[S],
        taken: &[D::Element],
    ) -> Option<D::Element> {
        let controls = self.document.form_controls();
        for pattern in patterns {
            let needle = pattern.as_ref().trim().to_lowercase();
            if needle.is_empty() {
                continue;
            }
            for strategy in self.mode.strategies() {
                let found = match strategy {
                    Strategy::Label => self.by_label(&needle, taken),
                    attr => controls
                        .iter()
                        .filter(|el| self.attribute_matches(el, *attr, &needle))
                        .find(|el| self.accepts(el, taken))
                        .cloned(),
                };
                if let Some(element) = found {
                    debug!("Located {} via {:?} on pattern '{}'", element.selector_hint(), strategy, needle);
                    return Some(element);
                }
            }
        }
        None
    }

    /// Resolves an explicit selector, applying the same acceptance rules.
    /// Invalid selectors count as a miss.
    pub fn locate_selector(&self, selector: &str, taken: &[D::Element]) -> Option<D::Element> {
        match self.document.query_selector(selector) {
            Ok(Some(element)) if self.accepts(&element, taken) => Some(element),
            Ok(_) => None,
            Err(e) => {
                warn!("Selector '{}' could not be evaluated: {}", selector, e);
                None
            }
        }
    }

    fn attribute_matches(&self, element: &D::Element, strategy: Strategy, needle: &str) -> bool {
        let attr = match strategy {
            Strategy::Name => "name",
            Strategy::Id => "id",
            Strategy::Class => "class",
            Strategy::Placeholder => {
                let tag = element.tag_name();
                let allowed = match self.mode {
                    LocateMode::Heuristic => tag == "input",
                    LocateMode::Extended => tag == "input" || tag == "textarea",
                };
                if !allowed {
                    return false;
                }
                "placeholder"
            }
            Strategy::Label => return false,
        };
        element
            .attribute(attr)
            .map(|value| value.to_lowercase().contains(needle))
            .unwrap_or(false)
    }

    fn by_label(&self, needle: &str, taken: &[D::Element]) -> Option<D::Element> {
        for label in self.document.labels() {
            if !label.text_content().to_lowercase().contains(needle) {
                continue;
            }
            let linked = label
                .attribute("for")
                .filter(|id| !id.is_empty())
                .and_then(|id| self.document.element_by_id(&id));
            if let Some(element) = linked.filter(|el| self.accepts(el, taken)) {
                return Some(element);
            }
            if let Some(element) = label.nested_control().filter(|el| self.accepts(el, taken)) {
                return Some(element);
            }
        }
        None
    }

    fn accepts(&self, element: &D::Element, taken: &[D::Element]) -> bool {
        if !element.is_visible() {
            return false;
        }
        if self.mode == LocateMode::Extended && element.is_disabled() {
            return false;
        }
        !taken.iter().any(|t| t.same_element(element))
    }
}
