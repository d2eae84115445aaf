use async_trait::async_trait;
use log::{debug, warn};

use crate::config::FillConfig;
use crate::document::{ElementHandle, Notification, SelectOption};
use crate::error::DomError;
use crate::instruction::FillMethod;

/// The only place a fill pass suspends besides network calls.
#[async_trait(?Send)]
pub trait Pacer {
    async fn pause(&self, ms: u32);
}

/// Drives an element through focus, clear, incremental typing and blur so
/// that page scripts observe the same notifications a person would produce.
pub struct InputSimulator<'a> {
    pacer: &'a dyn Pacer,
    config: &'a FillConfig,
}

impl<'a> InputSimulator<'a> {
    pub fn new(pacer: &'a dyn Pacer, config: &'a FillConfig) -> Self {
        InputSimulator { pacer, config }
    }

    /// Returns the value to record. For typed fields that is what the element
    /// holds after its listeners ran, which a page mask may have cut short.
    pub async fn apply<E: ElementHandle>(
        &self,
        element: &E,
        value: &str,
        method: FillMethod,
        scroll: bool,
    ) -> Result<String, DomError> {
        if scroll {
            element.scroll_into_view();
            self.pacer.pause(self.config.scroll_settle_ms).await;
        }

        element.highlight(self.config.highlight_ms)?;
        element.focus()?;
        element.click()?;

        match method {
            FillMethod::Type => {
                element.set_value("")?;
                element.dispatch(Notification::Input)?;
                element.dispatch(Notification::Change)?;
                self.type_value(element, value).await?;
                if element.value() != value {
                    warn!("{} rewrote typed input, assigning it directly", element.selector_hint());
                    element.set_value(value)?;
                    element.dispatch(Notification::Input)?;
                }
            }
            FillMethod::Select => select_option(element, value)?,
            FillMethod::Check => element.set_checked(true)?,
            FillMethod::Click => element.click()?,
        }

        for notification in [Notification::Input, Notification::Change, Notification::Blur] {
            element.dispatch(notification)?;
        }

        if method != FillMethod::Type {
            return Ok(value.to_string());
        }
        let landed = element.value();
        if landed != value {
            warn!("{} holds {:?} instead of {:?}", element.selector_hint(), landed, value);
        }
        Ok(landed)
    }

    async fn type_value<E: ElementHandle>(&self, element: &E, value: &str) -> Result<(), DomError> {
        let chars: Vec<char> = value.chars().collect();
        let (step, delay) = if chars.len() > self.config.long_text_threshold {
            (self.config.chunk_size.max(1), self.config.chunk_delay_ms)
        } else {
            (1, self.config.typing_delay_ms)
        };
        debug!(
            "Typing {} chars into {} in steps of {}",
            chars.len(),
            element.selector_hint(),
            step
        );

        let mut typed = String::with_capacity(value.len());
        for piece in chars.chunks(step) {
            typed.extend(piece);
            element.set_value(&typed)?;
            element.dispatch(Notification::Input)?;
            self.pacer.pause(delay).await;
        }
        Ok(())
    }
}

/// Exact value-or-text match first, then the first option whose text contains
/// the target case-insensitively. Leaves the selection alone when nothing fits.
pub fn choose_option(options: &[SelectOption], target: &str) -> Option<usize> {
    if let Some(index) = options.iter().position(|o| o.value == target || o.text == target) {
        return Some(index);
    }
    let needle = target.to_lowercase();
    options
        .iter()
        .position(|o| o.text.to_lowercase().contains(&needle))
}

fn select_option<E: ElementHandle>(element: &E, target: &str) -> Result<(), DomError> {
    match choose_option(&element.options(), target) {
        Some(index) => element.select_index(index),
        None => {
            debug!("No option of {} matches '{}'", element.selector_hint(), target);
            Ok(())
        }
    }
}
