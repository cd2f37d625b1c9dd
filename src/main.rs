use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use datalayer_tester::driver::web::{BrowserType, WebDriver, WebDriverConfig};
use datalayer_tester::parser::{load_config, RunConfig};
use datalayer_tester::report::{save_results, OutputFormat, ReportTarget};
use datalayer_tester::rules::{compile_rules, RuleSet};
use datalayer_tester::runner::{run_sequences, ConsoleEventListener, EventEmitter, RunLog};
use datalayer_tester::utils::config::Settings;
use datalayer_tester::utils::logging;

#[derive(Parser)]
#[command(name = "datalayer-tester")]
#[command(version = "0.1.0")]
#[command(about = "Capture, attribute and validate analytics data-layer events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every sequence of a configuration file
    Run {
        /// Path to the YAML configuration
        config: PathBuf,

        /// Result file format, overriding the configuration
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Result folder, overriding the configuration
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run the browser without a window
        #[arg(long, default_value = "false")]
        headless: bool,

        /// Write the debug log next to the results
        #[arg(long, default_value = "false")]
        debug: bool,
    },

    /// Validate a configuration and its rules without opening a browser
    Check {
        /// Path to the YAML configuration
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            format,
            output,
            headless,
            debug,
        } => {
            // Collect from the start: debug_mode is only known once the file is parsed
            let debug_log = logging::init(true);

            println!(
                "{} Running sequences from: {}",
                "▶".green().bold(),
                config.display()
            );

            let run_config = match load_config(&config) {
                Ok(run_config) => run_config,
                Err(e) => {
                    eprintln!("{} {}", "✗".red().bold(), e);
                    std::process::exit(1);
                }
            };

            let debug = debug || run_config.options.debug_mode;
            let format = format.unwrap_or(run_config.options.output_format);
            let folder = output
                .map(|p| p.to_string_lossy().into_owned())
                .or_else(|| run_config.options.output_folder.clone());
            let target = ReportTarget::resolve(
                Some(&config),
                folder.as_deref(),
                &run_config.options.title,
                format,
            );

            println!("  Sequences: {}", run_config.sequences.len().to_string().cyan());
            println!("  Output: {}", target.folder.display().to_string().cyan());
            println!("  Format: {}", format!("{:?}", format).to_lowercase().cyan());
            if debug {
                println!("  Debug log: {}", "Enabled".yellow());
            }

            let rules = Arc::new(compile_rules(&run_config.validation));
            print_rejected(&rules);

            let mut run_log = match run(&run_config, rules, headless).await {
                Ok(run_log) => run_log,
                Err(e) => {
                    let message = datalayer_tester::utils::errors::clean_error_message(&e);
                    log::error!("Fatal error: {}", message);
                    let mut run_log = RunLog::fatal(&message);
                    run_log.debug = debug_log.filter(|_| debug).map(|l| l.entries());
                    save_results(&run_log, &target)?;
                    anyhow::bail!("Run aborted: {}", message);
                }
            };

            run_log.debug = debug_log.filter(|_| debug).map(|l| l.entries());
            let written = save_results(&run_log, &target)?;

            println!("\n{} Results:", "📄".to_string().blue());
            for path in written {
                println!("  {}", path.display().to_string().cyan());
            }
        }

        Commands::Check { config } => {
            logging::init(false);
            check(&config)?;
        }
    }

    Ok(())
}

/// Launch the browser and run every sequence
async fn run(config: &RunConfig, rules: Arc<RuleSet>, headless: bool) -> anyhow::Result<RunLog> {
    let options = &config.options;
    let mut driver_config = WebDriverConfig {
        include_automation_info: options.include_automation_info,
        ..WebDriverConfig::default()
    };
    if !options.user_agents.is_empty() {
        driver_config.user_agents = options.user_agents.clone();
    }
    if let Some(name) = options.browser.as_deref() {
        driver_config.browser_type = BrowserType::from_name(name).unwrap_or_else(|| {
            log::warn!("Unknown browser '{}', using chromium", name);
            BrowserType::Chromium
        });
    }
    driver_config.headless = headless || options.headless.unwrap_or(driver_config.headless);

    let driver = Arc::new(WebDriver::new(driver_config).await?);
    let settings = Settings::from_options(options.default_timeout, &options.data_layer);

    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let run_log = run_sequences(driver, config, rules, &settings, &emitter).await;

    // Closing the channel ends the listener once it has printed the summary
    drop(emitter);
    let _ = listener.await;

    Ok(run_log)
}

fn check(path: &Path) -> anyhow::Result<()> {
    println!("{} Checking: {}", "🔍".to_string().blue(), path.display());

    let config = load_config(path)?;
    let rules = compile_rules(&config.validation);

    println!("  Steps: {}", config.steps.len().to_string().cyan());
    for sequence in &config.sequences {
        println!("  {} {} ({} steps)", "→".blue(), sequence.name.white().bold(), sequence.steps.len());
    }
    println!(
        "  Rules: {} compiled, {} rejected",
        rules.len().to_string().green(),
        rules.rejected().len().to_string().red()
    );
    print_rejected(&rules);

    if !rules.rejected().is_empty() {
        anyhow::bail!("{} validation rule(s) could not be compiled", rules.rejected().len());
    }

    println!("{} Configuration is valid", "✓".green().bold());
    Ok(())
}

fn print_rejected(rules: &RuleSet) {
    for (event, error) in rules.rejected() {
        println!("    {} rule for '{}': {}", "✗".red(), event.yellow(), error);
    }
}
