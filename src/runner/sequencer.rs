//! Runs the steps of a sequence and attributes captured events to them.

use super::actions::{inject_css, perform_action, ActionContext};
use super::events::{EventEmitter, RunEvent};
use super::log::LogRow;
use crate::capture::EventReceiver;
use crate::driver::{BrowserDriver, ElementResolver};
use crate::parser::{GlobalOptions, Sequence, Step};
use crate::utils::config::{SequencerSettings, Settings};
use crate::utils::errors::clean_message;
use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;

pub struct Sequencer {
    driver: Arc<dyn BrowserDriver>,
    options: GlobalOptions,
    settings: SequencerSettings,
    resolver: ElementResolver,
    rng: StdRng,
    emitter: EventEmitter,
}

impl Sequencer {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        options: GlobalOptions,
        settings: &Settings,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            driver,
            options,
            settings: settings.sequencer.clone(),
            resolver: ElementResolver::new(settings.resolver.clone()),
            rng: StdRng::from_entropy(),
            emitter,
        }
    }

    /// Fix the random choices (URLs, candidates) for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.resolver = ElementResolver::with_seed(self.resolver.settings().clone(), seed);
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Run every step in order and return the rows of the sequence.
    ///
    /// Events are drained after each step's delay using the moment the delay
    /// ended as cutoff; the final step drains without a cutoff. A failed
    /// action adds an error row and the sequence goes on.
    pub async fn run(&mut self, sequence: &Sequence, receiver: &mut EventReceiver) -> Vec<LogRow> {
        let mut rows = Vec::new();
        log::info!("=== Starting sequence execution: {} ===", sequence.name);

        for (index, step) in sequence.steps.iter().enumerate() {
            let is_final = index + 1 == sequence.steps.len();
            self.run_step(index, step, is_final, receiver, &mut rows).await;
        }
        rows
    }

    async fn run_step(
        &mut self,
        index: usize,
        step: &Step,
        is_final: bool,
        receiver: &mut EventReceiver,
        rows: &mut Vec<LogRow>,
    ) {
        let started = Instant::now();
        log::info!("=== Starting step: {} ===", step.name);
        self.emitter.emit(RunEvent::StepStarted {
            index,
            step: step.name.clone(),
            kind: step.action.kind().to_string(),
        });

        inject_css(self.driver.as_ref(), &self.options.css_elements_to_hide).await;

        let result = {
            let mut ctx = ActionContext {
                driver: self.driver.as_ref(),
                resolver: &mut self.resolver,
                options: &self.options,
                settings: &self.settings,
                rng: &mut self.rng,
            };
            perform_action(&mut ctx, step).await
        };

        match result {
            Ok(message) => {
                log::info!("{}", message);

                let delay = step.delay_after.unwrap_or(self.options.default_delay);
                if is_final {
                    log::info!("Final step - waiting {:.1} seconds for events...", delay.as_secs_f64());
                } else {
                    log::info!(
                        "Waiting {:.1} seconds after {} step...",
                        delay.as_secs_f64(),
                        step.action.kind()
                    );
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                let cutoff = Local::now();
                let records = receiver.drain(if is_final { None } else { Some(cutoff) });
                rows.extend(records.iter().map(|r| LogRow::from_record(&step.name, r)));
                log::info!(
                    "Step {} completed successfully ({} events)",
                    step.name,
                    records.len()
                );

                self.emitter.emit(RunEvent::StepPassed {
                    index,
                    message,
                    events: records.len(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
            Err(e) => {
                let message = clean_message(&e.to_string());
                log::error!("Error in step {}: {}", step.name, message);
                let url = self.driver.current_url().await.unwrap_or_default();
                rows.push(LogRow::error(&step.name, &url, &message, Local::now()));

                if is_final {
                    let records = receiver.drain(None);
                    rows.extend(records.iter().map(|r| LogRow::from_record(&step.name, r)));
                }

                self.emitter.emit(RunEvent::StepFailed {
                    index,
                    error: message,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
    }
}
