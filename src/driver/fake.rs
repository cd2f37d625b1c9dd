//! In-memory browser used by the unit tests.

use super::traits::{BrowserDriver, ElementHandle, Locator};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub width: f64,
    pub height: f64,
    pub displayed: bool,
    pub enabled: bool,
    pub hidden_ancestor: bool,
    /// Becomes displayed once scrolled into view
    pub shows_on_scroll: bool,
    /// Event pushed into the data layer when clicked
    pub on_click: Option<Value>,
    pub fail_click: bool,
    pub value: String,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 20.0,
            displayed: true,
            enabled: true,
            hidden_ancestor: false,
            shows_on_scroll: false,
            on_click: None,
            fail_click: false,
            value: String::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakePage {
    pub url: String,
    pub alive: bool,
    pub data_layer: Vec<Value>,
    /// Returned instead of the data layer when set
    pub data_layer_override: Option<Value>,
    pub elements: HashMap<String, Vec<FakeElement>>,
    /// Events pushed when navigating to a URL
    pub on_navigate: HashMap<String, Value>,
    pub clicks: Vec<String>,
    pub submitted: Vec<String>,
    pub scripts: Vec<String>,
    pub navigations: Vec<String>,
    pub snapshot_reads: usize,
    /// Number of upcoming `evaluate` calls that fail
    pub evaluate_failures: usize,
    pub source: String,
}

#[derive(Clone)]
pub struct FakeDriver {
    pub page: Arc<Mutex<FakePage>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        let page = FakePage {
            url: "data:,".to_string(),
            alive: true,
            ..FakePage::default()
        };
        Self {
            page: Arc::new(Mutex::new(page)),
        }
    }

    pub fn add_element(&self, expression: &str, element: FakeElement) {
        self.page
            .lock()
            .unwrap()
            .elements
            .entry(expression.to_string())
            .or_default()
            .push(element);
    }

    pub fn push_event(&self, event: Value) {
        self.page.lock().unwrap().data_layer.push(event);
    }

    pub fn with_page<T>(&self, f: impl FnOnce(&mut FakePage) -> T) -> T {
        f(&mut self.page.lock().unwrap())
    }
}

struct FakeHandle {
    page: Arc<Mutex<FakePage>>,
    expression: String,
    index: usize,
}

impl FakeHandle {
    fn read<T>(&self, f: impl FnOnce(&FakeElement) -> T) -> Result<T> {
        let page = self.page.lock().unwrap();
        match page.elements.get(&self.expression).and_then(|v| v.get(self.index)) {
            Some(el) => Ok(f(el)),
            None => bail!("stale element reference: {}", self.expression),
        }
    }

    fn write<T>(&self, f: impl FnOnce(&mut FakeElement) -> T) -> Result<T> {
        let mut page = self.page.lock().unwrap();
        match page
            .elements
            .get_mut(&self.expression)
            .and_then(|v| v.get_mut(self.index))
        {
            Some(el) => Ok(f(el)),
            None => bail!("stale element reference: {}", self.expression),
        }
    }

    fn do_click(&self) -> Result<()> {
        let (fail, event) = self.read(|el| (el.fail_click, el.on_click.clone()))?;
        if fail {
            bail!("element click intercepted\nStacktrace:\n#0 0x55d");
        }
        let mut page = self.page.lock().unwrap();
        page.clicks.push(format!("{}#{}", self.expression, self.index));
        if let Some(event) = event {
            page.data_layer.push(event);
        }
        Ok(())
    }
}

#[async_trait]
impl ElementHandle for FakeHandle {
    async fn size(&self) -> Result<(f64, f64)> {
        self.read(|el| (el.width, el.height))
    }

    async fn is_displayed(&self) -> Result<bool> {
        self.read(|el| el.displayed)
    }

    async fn is_enabled(&self) -> Result<bool> {
        self.read(|el| el.enabled)
    }

    async fn has_hidden_ancestor(&self) -> Result<bool> {
        self.read(|el| el.hidden_ancestor)
    }

    async fn click(&self) -> Result<()> {
        self.do_click()
    }

    async fn force_click(&self) -> Result<()> {
        self.write(|el| el.fail_click = false)?;
        self.do_click()
    }

    async fn clear(&self) -> Result<()> {
        self.write(|el| el.value.clear())
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.write(|el| el.value.push_str(text))
    }

    async fn press_enter(&self) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.submitted.push(self.expression.clone());
        Ok(())
    }

    async fn scroll_into_view(&self, _smooth: bool) -> Result<()> {
        self.write(|el| {
            if el.shows_on_scroll {
                el.displayed = true;
            }
        })
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.url = url.to_string();
        page.navigations.push(url.to_string());
        let base = url.split('?').next().unwrap_or(url).to_string();
        if let Some(event) = page.on_navigate.get(&base).cloned() {
            page.data_layer.push(event);
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let mut page = self.page.lock().unwrap();
        if page.evaluate_failures > 0 {
            page.evaluate_failures -= 1;
            bail!("javascript error: target closed\n    at Runtime.evaluate");
        }
        if script.contains(crate::capture::monitor::SNAPSHOT_MARKER) {
            page.snapshot_reads += 1;
            return Ok(page
                .data_layer_override
                .clone()
                .unwrap_or_else(|| Value::Array(page.data_layer.clone())));
        }
        if script.contains("document.readyState") {
            return Ok(Value::String("complete".to_string()));
        }
        page.scripts.push(script.to_string());
        Ok(Value::Null)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.lock().unwrap().url.clone())
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<Box<dyn ElementHandle>>> {
        let page = self.page.lock().unwrap();
        let count = page
            .elements
            .get(locator.expression())
            .map(|v| v.len())
            .unwrap_or(0);
        Ok((0..count)
            .map(|index| {
                Box::new(FakeHandle {
                    page: Arc::clone(&self.page),
                    expression: locator.expression().to_string(),
                    index,
                }) as Box<dyn ElementHandle>
            })
            .collect())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.page.lock().unwrap().source.clone())
    }

    async fn is_alive(&self) -> bool {
        self.page.lock().unwrap().alive
    }
}
