//! Browser actions behind the four step kinds.

use crate::capture::monitor::is_transitional_url;
use crate::driver::{BrowserDriver, ElementError, ElementHandle, ElementResolver, Locator};
use crate::parser::{
    ClickTarget, FormField, GlobalOptions, ScrollTarget, Step, StepAction, SubmitMethod,
};
use crate::utils::config::SequencerSettings;
use crate::utils::errors::clean_error_message;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Id of the injected style element, so repeated injections are no-ops
const HIDE_STYLE_ID: &str = "dlt-hide-elements";

const PAGE_LOAD_POLL: Duration = Duration::from_millis(100);

/// A step action failed
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Element(#[from] ElementError),

    #[error("All clicks in step failed")]
    AllClicksFailed,

    #[error("{0}")]
    Browser(String),
}

impl From<anyhow::Error> for ActionError {
    fn from(e: anyhow::Error) -> Self {
        ActionError::Browser(clean_error_message(&e))
    }
}

/// Everything an action needs besides the step itself
pub struct ActionContext<'a> {
    pub driver: &'a dyn BrowserDriver,
    pub resolver: &'a mut ElementResolver,
    pub options: &'a GlobalOptions,
    pub settings: &'a SequencerSettings,
    pub rng: &'a mut StdRng,
}

/// Script adding a stylesheet that hides `selectors`; `None` when there is nothing to hide.
pub fn hide_css_script(selectors: &[String]) -> Option<String> {
    let rules: Vec<String> = selectors
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| format!("{} {{ display: none !important; }}", s))
        .collect();
    if rules.is_empty() {
        return None;
    }

    let css = serde_json::Value::String(rules.join("\n")).to_string();
    Some(format!(
        r#"(() => {{
    if (document.getElementById('{id}')) return false;
    const style = document.createElement('style');
    style.type = 'text/css';
    style.id = '{id}';
    style.textContent = {css};
    (document.head || document.documentElement).appendChild(style);
    return true;
}})()"#,
        id = HIDE_STYLE_ID,
        css = css
    ))
}

/// Inject the configured hiding rules. Failures are only logged.
pub async fn inject_css(driver: &dyn BrowserDriver, selectors: &[String]) {
    let Some(script) = hide_css_script(selectors) else {
        return;
    };
    match driver.evaluate(&script).await {
        Ok(_) => log::debug!("CSS rules injected"),
        Err(e) => log::error!(
            "Warning: Failed to inject CSS rules: {}",
            clean_error_message(&e)
        ),
    }
}

/// Append the `bot=true` marker to a URL
pub fn with_bot_marker(url: &str) -> String {
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let separator = if base.contains('?') { '&' } else { '?' };
    match fragment {
        Some(fragment) => format!("{}{}bot=true#{}", base, separator, fragment),
        None => format!("{}{}bot=true", base, separator),
    }
}

/// Run the action of `step` and describe its outcome.
pub async fn perform_action(ctx: &mut ActionContext<'_>, step: &Step) -> Result<String, ActionError> {
    if let Ok(url) = ctx.driver.current_url().await {
        log::debug!("Current URL when performing action: {}", url);
    }

    match &step.action {
        StepAction::Visit { urls } => visit(ctx, urls).await,
        StepAction::Click { clicks } => click_all(ctx, clicks).await,
        StepAction::Form {
            fields,
            submit,
            submit_method,
        } => submit_form(ctx, fields, submit, *submit_method).await,
        StepAction::Scroll(target) => scroll(ctx, target).await,
    }
}

async fn visit(ctx: &mut ActionContext<'_>, urls: &[String]) -> Result<String, ActionError> {
    let url = match urls.choose(&mut *ctx.rng) {
        Some(url) => url,
        None => {
            log::info!("Step marked as page view without navigation");
            return Ok("Page view step (no navigation)".to_string());
        }
    };
    let final_url = if ctx.options.bot_info {
        with_bot_marker(url)
    } else {
        url.clone()
    };

    ctx.driver.navigate(&final_url).await?;

    if wait_for_page_load(ctx.driver, ctx.settings.page_load_timeout).await {
        log::info!("Page load completed");
        inject_css(ctx.driver, &ctx.options.css_elements_to_hide).await;
    } else {
        log::error!(
            "Warning: Page load wait timed out after {:.1}s",
            ctx.settings.page_load_timeout.as_secs_f64()
        );
    }

    if let Ok(current) = ctx.driver.current_url().await {
        if is_transitional_url(&current) {
            log::error!("Warning: URL is not saved correctly for page navigation");
        }
    }

    Ok(format!("Visited URL: {}", final_url))
}

/// Poll `document.readyState` until it is "complete". Returns false on timeout.
async fn wait_for_page_load(driver: &dyn BrowserDriver, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        if let Ok(state) = driver.evaluate("document.readyState").await {
            if state.as_str() == Some("complete") {
                return true;
            }
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(PAGE_LOAD_POLL).await;
    }
}

/// Click, falling back to a forced click when the normal one is rejected
async fn click_element(element: &dyn ElementHandle) -> Result<(), ActionError> {
    if let Err(e) = element.click().await {
        log::debug!(
            "Normal click failed ({}), retrying with a forced click",
            clean_error_message(&e)
        );
        element.force_click().await?;
    }
    Ok(())
}

async fn click_all(ctx: &mut ActionContext<'_>, clicks: &[ClickTarget]) -> Result<String, ActionError> {
    let mut success_count = 0;

    for (i, click) in clicks.iter().enumerate() {
        let result: Result<(), ActionError> = async {
            let element = ctx.resolver.resolve(ctx.driver, &click.locator).await?;
            click_element(element.as_ref()).await
        }
        .await;

        match result {
            Ok(()) => {
                log::info!("Clicked element {}: {}", i + 1, click.locator.expression());
                success_count += 1;

                if i + 1 < clicks.len() {
                    let delay = click.delay_after.unwrap_or(ctx.options.default_delay);
                    if !delay.is_zero() {
                        log::debug!("Waiting {:.1} seconds between clicks...", delay.as_secs_f64());
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            Err(e) => {
                log::error!("Failed to click element {}: {}", i + 1, e);
            }
        }
    }

    if success_count == 0 {
        Err(ActionError::AllClicksFailed)
    } else if success_count < clicks.len() {
        Ok(format!(
            "Completed {} out of {} clicks",
            success_count,
            clicks.len()
        ))
    } else {
        Ok("All clicks completed successfully".to_string())
    }
}

async fn submit_form(
    ctx: &mut ActionContext<'_>,
    fields: &[FormField],
    submit: &Locator,
    method: SubmitMethod,
) -> Result<String, ActionError> {
    for field in fields {
        let element = ctx.resolver.resolve(ctx.driver, &field.locator).await?;
        element.clear().await?;
        element.send_keys(&field.value).await?;
    }

    let button = ctx.resolver.resolve(ctx.driver, submit).await?;
    match method {
        SubmitMethod::Click => click_element(button.as_ref()).await?,
        SubmitMethod::Enter => button.press_enter().await?,
    }
    Ok("Form submitted successfully".to_string())
}

async fn scroll(ctx: &mut ActionContext<'_>, target: &ScrollTarget) -> Result<String, ActionError> {
    match target {
        ScrollTarget::Element(locator) => {
            let element = ctx.resolver.resolve(ctx.driver, locator).await?;
            log::info!("Scrolling to element");
            element.scroll_into_view(true).await?;
        }
        ScrollTarget::Pixels(pixels) => {
            log::info!("Scrolling by {} pixels", pixels);
            ctx.driver
                .evaluate(&format!("window.scrollBy(0, {})", pixels))
                .await?;
        }
        ScrollTarget::Percentage(percentage) => {
            log::info!("Scrolling to {}% of page", percentage);
            ctx.driver
                .evaluate(&format!(
                    "window.scrollTo(0, Math.max(document.body.scrollHeight, document.documentElement.scrollHeight) * {})",
                    percentage / 100.0
                ))
                .await?;
        }
    }

    tokio::time::sleep(ctx.settings.scroll_settle).await;
    Ok("Scrolled page successfully".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeDriver, FakeElement};
    use crate::utils::config::ResolverSettings;
    use rand::SeedableRng;

    fn quick_resolver() -> ElementResolver {
        ElementResolver::with_seed(
            ResolverSettings {
                presence_timeout: Duration::from_millis(50),
                final_check_timeout: Duration::from_millis(20),
                settle_pause: Duration::from_millis(1),
                poll_interval: Duration::from_millis(5),
                ..ResolverSettings::default()
            },
            7,
        )
    }

    fn quick_settings() -> SequencerSettings {
        SequencerSettings {
            page_load_timeout: Duration::from_millis(50),
            scroll_settle: Duration::from_millis(1),
        }
    }

    async fn run(driver: &FakeDriver, options: &GlobalOptions, action: StepAction) -> Result<String, ActionError> {
        let mut resolver = quick_resolver();
        let settings = quick_settings();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = ActionContext {
            driver,
            resolver: &mut resolver,
            options,
            settings: &settings,
            rng: &mut rng,
        };
        let step = Step {
            name: "step".to_string(),
            action,
            delay_after: None,
        };
        perform_action(&mut ctx, &step).await
    }

    #[test]
    fn test_bot_marker() {
        assert_eq!(with_bot_marker("https://a.example/"), "https://a.example/?bot=true");
        assert_eq!(with_bot_marker("https://a.example/?q=1"), "https://a.example/?q=1&bot=true");
        assert_eq!(with_bot_marker("https://a.example/#top"), "https://a.example/?bot=true#top");
    }

    #[test]
    fn test_hide_css_script() {
        assert!(hide_css_script(&[]).is_none());
        assert!(hide_css_script(&["  ".to_string()]).is_none());
        let script = hide_css_script(&["#cookie".to_string(), ".chat".to_string()]).unwrap();
        assert!(script.contains(r##""#cookie { display: none !important; }\n.chat { display: none !important; }""##));
        assert!(script.contains(HIDE_STYLE_ID));
    }

    #[tokio::test]
    async fn test_visit_without_url_is_page_view() {
        let driver = FakeDriver::new();
        let message = run(&driver, &GlobalOptions::default(), StepAction::Visit { urls: vec![] })
            .await
            .unwrap();
        assert_eq!(message, "Page view step (no navigation)");
        assert!(driver.with_page(|p| p.navigations.is_empty()));
    }

    #[tokio::test]
    async fn test_visit_appends_bot_marker_and_injects_css() {
        let driver = FakeDriver::new();
        let options = GlobalOptions {
            bot_info: true,
            css_elements_to_hide: vec!["#cookie".to_string()],
            ..GlobalOptions::default()
        };
        let message = run(
            &driver,
            &options,
            StepAction::Visit {
                urls: vec!["https://shop.example/".to_string()],
            },
        )
        .await
        .unwrap();

        assert_eq!(message, "Visited URL: https://shop.example/?bot=true");
        assert_eq!(
            driver.with_page(|p| p.navigations.clone()),
            vec!["https://shop.example/?bot=true"]
        );
        assert!(driver.with_page(|p| p.scripts.iter().any(|s| s.contains(HIDE_STYLE_ID))));
    }

    #[tokio::test]
    async fn test_partial_clicks() {
        let driver = FakeDriver::new();
        driver.add_element("a.one", FakeElement::default());
        let options = GlobalOptions {
            default_delay: Duration::ZERO,
            ..GlobalOptions::default()
        };
        let clicks = vec![
            ClickTarget {
                locator: Locator::Css("a.one".into()),
                delay_after: None,
            },
            ClickTarget {
                locator: Locator::Css("a.missing".into()),
                delay_after: None,
            },
        ];

        let message = run(&driver, &options, StepAction::Click { clicks }).await.unwrap();
        assert_eq!(message, "Completed 1 out of 2 clicks");
    }

    #[tokio::test]
    async fn test_all_clicks_failed() {
        let driver = FakeDriver::new();
        let clicks = vec![ClickTarget {
            locator: Locator::Css("a.missing".into()),
            delay_after: None,
        }];
        let err = run(&driver, &GlobalOptions::default(), StepAction::Click { clicks })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "All clicks in step failed");
    }

    #[tokio::test]
    async fn test_intercepted_click_falls_back_to_forced_click() {
        let driver = FakeDriver::new();
        driver.add_element(
            "button.buy",
            FakeElement {
                fail_click: true,
                ..FakeElement::default()
            },
        );
        let clicks = vec![ClickTarget {
            locator: Locator::Css("button.buy".into()),
            delay_after: None,
        }];
        let message = run(&driver, &GlobalOptions::default(), StepAction::Click { clicks })
            .await
            .unwrap();
        assert_eq!(message, "All clicks completed successfully");
        assert_eq!(driver.with_page(|p| p.clicks.clone()), vec!["button.buy#0"]);
    }

    #[tokio::test]
    async fn test_form_fill_and_enter_submit() {
        let driver = FakeDriver::new();
        driver.add_element(
            "#email",
            FakeElement {
                value: "old".to_string(),
                ..FakeElement::default()
            },
        );
        driver.add_element("//form//button", FakeElement::default());

        let message = run(
            &driver,
            &GlobalOptions::default(),
            StepAction::Form {
                fields: vec![FormField {
                    locator: Locator::Css("#email".into()),
                    value: "a@b.c".to_string(),
                }],
                submit: Locator::XPath("//form//button".into()),
                submit_method: SubmitMethod::Enter,
            },
        )
        .await
        .unwrap();

        assert_eq!(message, "Form submitted successfully");
        driver.with_page(|p| {
            assert_eq!(p.elements["#email"][0].value, "a@b.c");
            assert_eq!(p.submitted, vec!["//form//button"]);
            assert!(p.clicks.is_empty());
        });
    }

    #[tokio::test]
    async fn test_form_missing_field_is_element_error() {
        let driver = FakeDriver::new();
        let err = run(
            &driver,
            &GlobalOptions::default(),
            StepAction::Form {
                fields: vec![FormField {
                    locator: Locator::Css("#missing".into()),
                    value: "x".to_string(),
                }],
                submit: Locator::Css("button".into()),
                submit_method: SubmitMethod::Click,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Element not found: css=#missing");
    }

    #[tokio::test]
    async fn test_scroll_by_percentage() {
        let driver = FakeDriver::new();
        let message = run(
            &driver,
            &GlobalOptions::default(),
            StepAction::Scroll(ScrollTarget::Percentage(50.0)),
        )
        .await
        .unwrap();
        assert_eq!(message, "Scrolled page successfully");
        assert!(driver.with_page(|p| p.scripts.iter().any(|s| s.contains("window.scrollTo") && s.contains("* 0.5"))));
    }
}
