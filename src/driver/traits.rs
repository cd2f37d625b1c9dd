use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Element locator for page elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Select by XPath expression
    XPath(String),
    /// Select by CSS selector
    Css(String),
}

impl Locator {
    /// Build a locator from optional xpath/selector fields. XPath wins when both are set.
    pub fn from_parts(xpath: Option<&str>, selector: Option<&str>) -> Option<Self> {
        match (xpath, selector) {
            (Some(x), _) if !x.trim().is_empty() => Some(Locator::XPath(x.to_string())),
            (_, Some(s)) if !s.trim().is_empty() => Some(Locator::Css(s.to_string())),
            _ => None,
        }
    }

    /// The raw expression without its strategy
    pub fn expression(&self) -> &str {
        match self {
            Locator::XPath(x) => x,
            Locator::Css(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::XPath(x) => write!(f, "xpath={}", x),
            Locator::Css(s) => write!(f, "css={}", s),
        }
    }
}

/// A node handle returned by [`BrowserDriver::find_elements`].
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Rendered (width, height) in CSS pixels
    async fn size(&self) -> Result<(f64, f64)>;

    /// Whether the element is rendered and visible
    async fn is_displayed(&self) -> Result<bool>;

    async fn is_enabled(&self) -> Result<bool>;

    /// Whether the element or any ancestor up to the document root has the `hidden` attribute
    async fn has_hidden_ancestor(&self) -> Result<bool>;

    async fn click(&self) -> Result<()>;

    /// Click dispatched without actionability checks, used when a normal click is intercepted
    async fn force_click(&self) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    async fn send_keys(&self, text: &str) -> Result<()>;

    async fn press_enter(&self) -> Result<()>;

    /// Scroll the element to the center of the viewport
    async fn scroll_into_view(&self, smooth: bool) -> Result<()>;
}

/// Browser operations needed for capture and step execution.
///
/// Only one action runs at a time; the monitor uses the read-only calls
/// (`evaluate`, `current_url`, `is_alive`) concurrently with the sequencer and
/// relies on the driver serializing its own commands.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate the page to `url`
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<Value>;

    async fn current_url(&self) -> Result<String>;

    /// All elements currently matching `locator`, in document order
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<Box<dyn ElementHandle>>>;

    /// Serialized HTML of the current page
    async fn page_source(&self) -> Result<String>;

    /// Whether the browser still answers commands
    async fn is_alive(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpath_takes_priority() {
        assert_eq!(
            Locator::from_parts(Some("//button"), Some("button.buy")),
            Some(Locator::XPath("//button".into()))
        );
        assert_eq!(
            Locator::from_parts(None, Some("button.buy")),
            Some(Locator::Css("button.buy".into()))
        );
        assert_eq!(
            Locator::from_parts(Some("  "), Some("#go")),
            Some(Locator::Css("#go".into()))
        );
        assert_eq!(Locator::from_parts(None, None), None);
    }
}
