pub mod actions;
pub mod events;
pub mod log;
pub mod sequencer;

use crate::capture::{event_channel, Monitor, StopSignal};
use crate::driver::BrowserDriver;
use crate::parser::RunConfig;
use crate::rules::{RuleSet, Validator};
use crate::utils::config::Settings;
use std::sync::Arc;
use std::time::Instant;

pub use self::log::{LogRow, RunLog, RunSummary, SequenceLog, Validity};
pub use events::*;
pub use sequencer::Sequencer;

/// Run every configured sequence against one browser.
///
/// Each sequence gets its own monitor, queue and dedup state. Sequences run in
/// configuration order and their rows are returned in that order.
pub async fn run_sequences(
    driver: Arc<dyn BrowserDriver>,
    config: &RunConfig,
    rules: Arc<RuleSet>,
    settings: &Settings,
    emitter: &EventEmitter,
) -> RunLog {
    let mut sequencer = Sequencer::new(
        Arc::clone(&driver),
        config.options.clone(),
        settings,
        emitter.clone(),
    );
    run_with(&mut sequencer, driver, config, rules, settings, emitter).await
}

async fn run_with(
    sequencer: &mut Sequencer,
    driver: Arc<dyn BrowserDriver>,
    config: &RunConfig,
    rules: Arc<RuleSet>,
    settings: &Settings,
    emitter: &EventEmitter,
) -> RunLog {
    let mut run_log = RunLog::default();
    emitter.emit(RunEvent::RunStarted {
        sequence_count: config.sequences.len(),
    });

    for sequence in &config.sequences {
        let started = Instant::now();
        ::log::info!("=== Starting sequence: {} ===", sequence.name);
        emitter.emit(RunEvent::SequenceStarted {
            name: sequence.name.clone(),
            step_count: sequence.steps.len(),
        });

        let (sender, mut receiver) = event_channel();
        let monitor = Monitor::new(
            Arc::clone(&driver),
            sender,
            Validator::new(Arc::clone(&rules)),
            settings.monitor.clone(),
        )
        .with_track_filter(config.options.track_events.as_deref())
        .with_fallback_url(sequence.first_visit_url().map(|u| u.to_string()));
        let handle = monitor.spawn(StopSignal::new());

        let mut rows = sequencer.run(sequence, &mut receiver).await;

        let stats = handle.stop().await;
        ::log::debug!(
            "Monitor for '{}': {} cycles, {} enqueued, {} duplicates, {} filtered, {} cycle errors",
            sequence.name,
            stats.cycles,
            stats.enqueued,
            stats.duplicates,
            stats.filtered,
            stats.cycle_errors
        );

        // Events captured between the final drain and the monitor stopping
        if let Some(last) = sequence.steps.last() {
            let trailing = receiver.drain(None);
            if !trailing.is_empty() {
                ::log::debug!("{} trailing events attributed to {}", trailing.len(), last.name);
            }
            rows.extend(trailing.iter().map(|r| LogRow::from_record(&last.name, r)));
        }

        let sequence_log = SequenceLog {
            name: sequence.name.clone(),
            rows,
        };
        emitter.emit(RunEvent::SequenceFinished {
            name: sequence.name.clone(),
            rows: sequence_log.rows.len(),
            invalid: sequence_log.count(Validity::Invalid),
            errors: sequence_log.error_count(),
            duration_ms: started.elapsed().as_millis() as u64,
        });
        run_log.sequences.push(sequence_log);
    }

    emitter.emit(RunEvent::RunFinished {
        summary: run_log.summary(),
    });
    run_log
}
