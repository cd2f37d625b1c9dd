//! Web Driver implementation using Playwright
//!
//! Implements [`BrowserDriver`] and [`ElementHandle`] on top of a single
//! Playwright page shared by the sequencer and the background monitor.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::driver::traits::{BrowserDriver, ElementHandle, Locator};

/// User agent used when the configuration lists none
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Appended to the user agent when automation info is requested
const AUTOMATION_SUFFIX: &str = " Selenium";

const ALIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Web browser type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Some(BrowserType::Chromium),
            "firefox" => Some(BrowserType::Firefox),
            "webkit" | "safari" => Some(BrowserType::Webkit),
            _ => None,
        }
    }
}

/// Web Driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// One is picked at random per run
    pub user_agents: Vec<String>,
    /// Mark the user agent as automated so analytics can filter the traffic
    pub include_automation_info: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        let headless = std::env::var("DLT_HEADLESS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            browser_type: BrowserType::Chromium,
            headless,
            viewport_width: 1280,
            viewport_height: 720,
            user_agents: vec![DEFAULT_USER_AGENT.to_string()],
            include_automation_info: false,
        }
    }
}

impl WebDriverConfig {
    /// Pick the user agent for this run
    pub fn choose_user_agent(&self) -> String {
        let mut agent = self
            .user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        if self.include_automation_info {
            agent.push_str(AUTOMATION_SUFFIX);
        }
        agent
    }
}

/// Web Driver using Playwright
pub struct WebDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    #[allow(dead_code)]
    browser: Arc<Browser>,
    #[allow(dead_code)]
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
}

impl WebDriver {
    /// Launch the browser and open the page used for the whole run
    pub async fn new(config: WebDriverConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = match config.browser_type {
            BrowserType::Chromium => launch_chromium_browser(&playwright.chromium(), &config).await?,
            BrowserType::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserType::Webkit => {
                playwright
                    .webkit()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
        };

        let user_agent = config.choose_user_agent();
        log::info!("Initializing browser with user agent: {}", user_agent);
        let context = browser
            .context_builder()
            .user_agent(&user_agent)
            .build()
            .await
            .context("Failed to create browser context")?;
        let page = context.new_page().await.context("Failed to open page")?;

        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await?;

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
        })
    }

    fn to_playwright_selector(locator: &Locator) -> String {
        match locator {
            Locator::XPath(xpath) => format!("xpath={}", xpath),
            Locator::Css(css) => css.clone(),
        }
    }
}

#[async_trait]
impl BrowserDriver for WebDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.goto_builder(url)
            .goto()
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let page = self.page.lock().await;
        let value: Value = page.evaluate(script, ()).await?;
        Ok(value)
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page.lock().await;
        let url: String = page.evaluate("window.location.href", ()).await?;
        Ok(url)
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<Box<dyn ElementHandle>>> {
        let selector = Self::to_playwright_selector(locator);
        let page = self.page.lock().await;
        let handles = page.query_selector_all(&selector).await?;
        Ok(handles
            .into_iter()
            .map(|handle| {
                Box::new(WebElement {
                    handle,
                    page: Arc::clone(&self.page),
                }) as Box<dyn ElementHandle>
            })
            .collect())
    }

    async fn page_source(&self) -> Result<String> {
        let page = self.page.lock().await;
        Ok(page.content().await?)
    }

    async fn is_alive(&self) -> bool {
        let page = self.page.lock().await;
        let probe = page.evaluate::<_, bool>("true", ());
        matches!(tokio::time::timeout(ALIVE_TIMEOUT, probe).await, Ok(Ok(true)))
    }
}

/// Element handle bound to the shared page
pub struct WebElement {
    handle: playwright::api::ElementHandle,
    page: Arc<Mutex<Page>>,
}

#[async_trait]
impl ElementHandle for WebElement {
    async fn size(&self) -> Result<(f64, f64)> {
        Ok(self
            .handle
            .bounding_box()
            .await?
            .map(|b| (b.width, b.height))
            .unwrap_or((0.0, 0.0)))
    }

    async fn is_displayed(&self) -> Result<bool> {
        Ok(self.handle.is_visible().await?)
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.handle.is_enabled().await?)
    }

    async fn has_hidden_ancestor(&self) -> Result<bool> {
        let hidden = self
            .handle
            .query_selector("xpath=ancestor-or-self::*[@hidden]")
            .await?;
        Ok(hidden.is_some())
    }

    async fn click(&self) -> Result<()> {
        self.handle.click_builder().click().await?;
        Ok(())
    }

    async fn force_click(&self) -> Result<()> {
        self.handle.click_builder().force(true).click().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.handle.fill_builder("").fill().await?;
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.handle.fill_builder(text).fill().await?;
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        self.handle.focus().await?;
        let page = self.page.lock().await;
        page.keyboard.down("Enter").await?;
        page.keyboard.up("Enter").await?;
        Ok(())
    }

    async fn scroll_into_view(&self, smooth: bool) -> Result<()> {
        if smooth {
            let page = self.page.lock().await;
            page.evaluate::<_, ()>(
                "el => el.scrollIntoView({ block: 'center', behavior: 'smooth' })",
                &self.handle,
            )
            .await?;
        } else {
            self.handle.scroll_into_view_if_needed(None).await?;
        }
        Ok(())
    }
}

/// Launch a new Chromium browser, preferring a locally installed one
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> Result<playwright::api::Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(std::path::PathBuf::from);
    let discovered_path = if env_path.is_none() {
        find_system_browser()
    } else {
        None
    };

    if let Some(ref path) = env_path {
        println!("{} Using browser from env: {}", "🌐".blue(), path.display());
        launcher = launcher.executable(path);
    } else if let Some(ref path) = discovered_path {
        println!(
            "{} Using discovered browser: {}",
            "🌐".blue(),
            path.display()
        );
        launcher = launcher.executable(path);
    } else {
        log::debug!("No browser executable found, using the Playwright default");
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--ignore-certificate-errors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    launcher = launcher.args(&args);

    Ok(launcher.launch().await?)
}

fn find_system_browser() -> Option<std::path::PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    common_paths
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.exists())
        .map(|p| p.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_choice() {
        let config = WebDriverConfig {
            user_agents: vec!["UA-1".to_string()],
            include_automation_info: true,
            ..WebDriverConfig::default()
        };
        assert_eq!(config.choose_user_agent(), "UA-1 Selenium");

        let empty = WebDriverConfig {
            user_agents: Vec::new(),
            include_automation_info: false,
            ..WebDriverConfig::default()
        };
        assert_eq!(empty.choose_user_agent(), DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_browser_type_names() {
        assert_eq!(BrowserType::from_name("Firefox"), Some(BrowserType::Firefox));
        assert_eq!(BrowserType::from_name("chrome"), Some(BrowserType::Chromium));
        assert_eq!(BrowserType::from_name("lynx"), None);
    }

    #[test]
    fn test_locator_to_playwright() {
        assert_eq!(
            WebDriver::to_playwright_selector(&Locator::XPath("//a".into())),
            "xpath=//a"
        );
        assert_eq!(
            WebDriver::to_playwright_selector(&Locator::Css("a.buy".into())),
            "a.buy"
        );
    }
}
