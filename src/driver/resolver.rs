//! Finds an interactable element among all nodes matching a locator.

use super::traits::{BrowserDriver, ElementHandle, Locator};
use crate::utils::config::ResolverSettings;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElementError {
    /// Nothing matched the locator before the timeout
    #[error("Element not found: {locator}")]
    NotFound { locator: String },

    /// Matches existed but none could be interacted with
    #[error("Element not clickable: {locator} ({reason})")]
    NotInteractable { locator: String, reason: String },

    #[error("Browser error while looking for {locator}: {message}")]
    Driver { locator: String, message: String },
}

pub struct ElementResolver {
    settings: ResolverSettings,
    rng: StdRng,
}

impl ElementResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self {
            settings,
            rng: StdRng::from_entropy(),
        }
    }

    /// Resolver with a fixed random sequence
    pub fn with_seed(settings: ResolverSettings, seed: u64) -> Self {
        Self {
            settings,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Wait for `locator`, then pick a random candidate that is visible and enabled.
    pub async fn resolve(
        &mut self,
        driver: &dyn BrowserDriver,
        locator: &Locator,
    ) -> Result<Box<dyn ElementHandle>, ElementError> {
        log::info!("Waiting for elements matching: {}", locator.expression());

        let result = self.try_resolve(driver, locator).await;
        if let Err(ref e) = result {
            match e {
                ElementError::NotInteractable { .. } => {
                    log::error!("Element found in page but not interactable: {}", locator)
                }
                _ => {
                    let in_source = driver
                        .page_source()
                        .await
                        .map(|html| html.contains(locator.expression()))
                        .unwrap_or(false);
                    if in_source {
                        log::error!("Locator text appears in the page source but no element matched: {}", locator);
                    } else {
                        log::error!("Element not found in the page source: {}", locator);
                    }
                }
            }
        }
        result
    }

    async fn try_resolve(
        &mut self,
        driver: &dyn BrowserDriver,
        locator: &Locator,
    ) -> Result<Box<dyn ElementHandle>, ElementError> {
        let elements = self.wait_for_presence(driver, locator).await?;
        let found = elements.len();

        let mut candidates = Vec::with_capacity(found);
        for element in elements {
            let sized = matches!(element.size().await, Ok((w, h)) if w > 0.0 && h > 0.0);
            if sized {
                candidates.push(element);
            }
        }
        let total = candidates.len();
        log::info!("{} out of {} matches qualified", total, found);

        let too_broad = total > self.settings.broad_match_threshold;
        if too_broad {
            log::warn!(
                "Selector '{}' matches {} elements - consider using a more specific selector",
                locator.expression(),
                total
            );
        }

        if candidates.is_empty() {
            return Err(ElementError::NotInteractable {
                locator: locator.to_string(),
                reason: format!("none of the {} matches has a visible size", found),
            });
        }

        for attempt in 1..=self.settings.max_attempts {
            if candidates.is_empty() {
                break;
            }
            let pick = self.rng.gen_range(0..candidates.len());

            let hidden = candidates[pick].has_hidden_ancestor().await.unwrap_or(true);
            let enabled = candidates[pick].is_enabled().await.unwrap_or(false);
            if hidden || !enabled {
                candidates.swap_remove(pick);
                log::info!(
                    "Selected element not clickable, trying another ({} remaining)",
                    candidates.len()
                );
                continue;
            }

            if !candidates[pick].is_displayed().await.unwrap_or(false) {
                log::info!("Selected element not in viewport, scrolling into view");
                if let Err(e) = candidates[pick].scroll_into_view(false).await {
                    log::warn!("Scroll into view failed: {}", e);
                }
                tokio::time::sleep(self.settings.settle_pause).await;
            }

            if self
                .wait_until_ready(candidates[pick].as_ref(), self.settings.final_check_timeout)
                .await
            {
                log::info!("Element is visible and clickable (attempt {})", attempt);
                return Ok(candidates.swap_remove(pick));
            }

            candidates.swap_remove(pick);
            log::info!("Element is not clickable after scroll, trying another one");
        }

        let reason = if too_broad {
            format!(
                "selector matches too many elements ({}); no clickable element after {} attempts",
                total, self.settings.max_attempts
            )
        } else {
            format!("no clickable element after {} attempts", self.settings.max_attempts)
        };
        Err(ElementError::NotInteractable {
            locator: locator.to_string(),
            reason,
        })
    }

    async fn wait_for_presence(
        &self,
        driver: &dyn BrowserDriver,
        locator: &Locator,
    ) -> Result<Vec<Box<dyn ElementHandle>>, ElementError> {
        let start = Instant::now();
        loop {
            let elements =
                driver
                    .find_elements(locator)
                    .await
                    .map_err(|e| ElementError::Driver {
                        locator: locator.to_string(),
                        message: crate::utils::errors::clean_error_message(&e),
                    })?;
            if !elements.is_empty() {
                return Ok(elements);
            }
            if start.elapsed() >= self.settings.presence_timeout {
                return Err(ElementError::NotFound {
                    locator: locator.to_string(),
                });
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn wait_until_ready(&self, element: &dyn ElementHandle, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            let displayed = element.is_displayed().await.unwrap_or(false);
            let enabled = element.is_enabled().await.unwrap_or(false);
            if displayed && enabled {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
