//! Boardcheck CLI - Main Entry Point
//!
//! Runs the task board E2E suite, or a slice of it, against the app at
//! `BASE_URL`, and shows the results of the last run.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing::info;

use boardcheck_e2e::config::{base_url_from_env, Credentials, Settings, CONFIG_FILE};
use boardcheck_e2e::playwright::{check_playwright_installed, Browser, PlaywrightConfig, PlaywrightLauncher};
use boardcheck_e2e::runner::{read_results, write_results};
use boardcheck_e2e::server::{AppServer, AppServerConfig};
use boardcheck_e2e::{
    CardDeck, CardFilter, Expect, FeatureArea, RunSettings, ScenarioDispatcher, ScenarioEnv, Strictness, TestRunner,
};

mod output;

use output::{print_error, print_info, print_suite, print_warning, OutputFormat};

/// Slow-motion delay used by `debug` when none is configured
const DEBUG_SLOW_MO_MS: u64 = 250;

/// Boardcheck - data-driven browser tests for the task board
#[derive(Parser)]
#[command(name = "boardcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all tests
    All(RunArgs),

    /// Run the generic tag checks only (cards without a scenario)
    Ui(RunArgs),

    /// Run the payment and API documentation scenarios
    ///
    /// Both areas run against fixture responses; no request reaches a live
    /// backend API.
    Api(RunArgs),

    /// Run the authentication scenarios
    Auth(RunArgs),

    /// Run the mobile navigation scenarios
    Mobile(RunArgs),

    /// Run the design system scenarios
    Design(RunArgs),

    /// Run the payment gateway scenarios
    Payment(RunArgs),

    /// Run the API documentation scenarios
    Docs(RunArgs),

    /// Run all tests with a visible browser
    Headed(RunArgs),

    /// Run all tests headed, slowed down, one card at a time
    Debug(RunArgs),

    /// Show the results of the last run
    Report,

    /// Install Playwright browsers
    Install {
        /// Passed through to `npx playwright install`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Browser to use
    #[arg(long, value_enum)]
    browser: Option<Browser>,

    /// Cards verified concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Only run cards whose title contains these words
    #[arg(trailing_var_arg = true)]
    filter: Vec<String>,
}

/// How a test subcommand changes the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Headed,
    Debug,
}

impl Commands {
    /// Card selection, mode and arguments for a test subcommand
    fn plan(self) -> Option<(CardFilter, Mode, RunArgs)> {
        use FeatureArea::*;
        let (filter, mode, args) = match self {
            Commands::All(args) => (CardFilter::all(), Mode::Normal, args),
            Commands::Ui(args) => (CardFilter::generic_only(), Mode::Normal, args),
            Commands::Api(args) => (CardFilter::areas(&[Payment, Docs]), Mode::Normal, args),
            Commands::Auth(args) => (CardFilter::areas(&[Auth]), Mode::Normal, args),
            Commands::Mobile(args) => (CardFilter::areas(&[Navigation]), Mode::Normal, args),
            Commands::Design(args) => (CardFilter::areas(&[Design]), Mode::Normal, args),
            Commands::Payment(args) => (CardFilter::areas(&[Payment]), Mode::Normal, args),
            Commands::Docs(args) => (CardFilter::areas(&[Docs]), Mode::Normal, args),
            Commands::Headed(args) => (CardFilter::all(), Mode::Headed, args),
            Commands::Debug(args) => (CardFilter::all(), Mode::Debug, args),
            Commands::Report | Commands::Install { .. } => return None,
        };
        let filter = filter.with_title(args.filter.join(" "));
        Some((filter, mode, args))
    }
}

/// Apply command-line overrides on top of the configuration file
fn apply_overrides(settings: &mut Settings, mode: Mode, args: &RunArgs) {
    if let Some(browser) = args.browser {
        settings.browser.name = browser;
    }
    if let Some(workers) = args.workers {
        settings.workers = workers.max(1);
    }
    match mode {
        Mode::Normal => {}
        Mode::Headed => settings.browser.headless = false,
        Mode::Debug => {
            settings.browser.headless = false;
            settings.workers = 1;
            if settings.browser.slow_mo_ms == 0 {
                settings.browser.slow_mo_ms = DEBUG_SLOW_MO_MS;
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    tokio::select! {
        outcome = execute(cli) => match outcome {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                print_error(&format!("{:#}", e));
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            print_warning("\n\nTest execution interrupted by user");
            ExitCode::SUCCESS
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<bool> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(true);
    };

    let settings = Settings::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;

    match command {
        Commands::Report => {
            let suite = read_results(&settings.output_dir)?;
            print_info(&format!("Last run started {}", suite.started_at.to_rfc3339()));
            print_suite(&suite, cli.format);
            Ok(true)
        }
        Commands::Install { args } => install(&settings, &args).await,
        command => {
            let Some((filter, mode, args)) = command.plan() else {
                return Ok(true);
            };
            let mut settings = settings;
            apply_overrides(&mut settings, mode, &args);
            run_suite(settings, filter, cli.format).await
        }
    }
}

async fn install(settings: &Settings, args: &[String]) -> anyhow::Result<bool> {
    print_info("Installing Playwright browsers");
    let status = tokio::process::Command::new("npx")
        .args(["playwright", "install"])
        .args(args)
        .current_dir(&settings.project_dir)
        .status()
        .await
        .context("running npx playwright install")?;
    Ok(status.success())
}

async fn run_suite(settings: Settings, filter: CardFilter, format: OutputFormat) -> anyhow::Result<bool> {
    let base_url = base_url_from_env()?;
    check_playwright_installed(&settings.project_dir)
        .context("Playwright is not installed; run `npm install` and `boardcheck install`")?;

    let deck = CardDeck::from_file(&settings.data_file)?;
    let env = ScenarioEnv {
        credentials: Credentials::from_env()?,
        design: deck.ui.clone(),
        expect: Expect::new(settings.timeouts.expect_config()),
    };
    let strictness = Strictness::from_env();
    let runner = TestRunner::new(
        ScenarioDispatcher::builtin(),
        env,
        RunSettings::from_settings(&settings, strictness),
    );
    runner.preflight(&deck, &filter)?;

    let mut app = match AppServerConfig::from_settings(&settings.app, &base_url) {
        Some(config) => Some(AppServer::spawn(config).await?),
        None => None,
    };

    info!("Testing {} with {}", base_url, settings.browser.name);
    let launcher = PlaywrightLauncher::new(PlaywrightConfig::from_settings(&settings, base_url))?;
    let suite = runner.run(&deck, &filter, &launcher).await;

    if let Some(app) = app.as_mut() {
        app.stop().await;
    }

    write_results(&settings.output_dir, &suite)?;
    print_suite(&suite, format);
    Ok(suite.success())
}
