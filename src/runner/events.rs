use super::log::RunSummary;
use tokio::sync::broadcast;

/// Run progress events for real-time console output
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        sequence_count: usize,
    },
    RunFinished {
        summary: RunSummary,
    },

    SequenceStarted {
        name: String,
        step_count: usize,
    },
    SequenceFinished {
        name: String,
        rows: usize,
        invalid: usize,
        errors: usize,
        duration_ms: u64,
    },

    StepStarted {
        index: usize,
        step: String,
        kind: String,
    },
    StepPassed {
        index: usize,
        message: String,
        events: usize,
        duration_ms: u64,
    },
    StepFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },
}

/// Event emitter for broadcasting run events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut step_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                RunEvent::RunStarted { sequence_count } => {
                    multi
                        .println(format!(
                            "\n{} Run started: {} sequence(s)",
                            "▶".green().bold(),
                            sequence_count.to_string().cyan()
                        ))
                        .ok();
                }

                RunEvent::RunFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish();
                    }
                    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

                    println!("\n{} Run finished", "■".blue().bold());
                    println!("  Sequences: {}", summary.sequences);
                    println!("  Events captured: {}", summary.events);
                    println!(
                        "  {} valid, {} invalid, {} not validated",
                        summary.valid.to_string().green(),
                        summary.invalid.to_string().red(),
                        summary.not_validated.to_string().yellow()
                    );
                    if summary.step_errors > 0 {
                        println!("  Step errors: {}", summary.step_errors.to_string().red());
                    }
                }

                RunEvent::SequenceStarted { name, step_count } => {
                    println!(
                        "\n  {} Sequence: {} ({} steps)",
                        "→".blue(),
                        name.white().bold(),
                        step_count
                    );
                }

                RunEvent::SequenceFinished {
                    name,
                    rows,
                    invalid,
                    errors,
                    duration_ms,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish();
                    }
                    let status = if errors > 0 {
                        format!("{} step error(s)", errors).red().bold()
                    } else if invalid > 0 {
                        format!("{} invalid event(s)", invalid).yellow().bold()
                    } else {
                        "OK".green().bold()
                    };
                    println!(
                        "  {} Sequence {} [{}] {} rows",
                        "←".blue(),
                        name,
                        status,
                        rows
                    );
                    println!("    Duration: {}ms", duration_ms);
                }

                RunEvent::StepStarted { index, step, kind } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    let style = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner());
                    pb.set_style(style);

                    step_text = format!("[{}] {} ({})... ", index, step, kind.dimmed());
                    pb.set_message(step_text.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                RunEvent::StepPassed {
                    message,
                    events,
                    duration_ms,
                    ..
                } => {
                    let done_msg = format!(
                        "    {} {}{} - {} event(s) ({}ms)",
                        "✓".green(),
                        step_text,
                        message.dimmed(),
                        events,
                        duration_ms
                    );
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                    }
                    println!("{}", done_msg);
                }

                RunEvent::StepFailed {
                    error, duration_ms, ..
                } => {
                    let failed_msg = format!(
                        "    {} {}{} ({}ms)",
                        "✗".red(),
                        step_text,
                        error.red(),
                        duration_ms
                    );
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                    }
                    println!("{}", failed_msg);
                }
            }
        }
    }
}
