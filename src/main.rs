// SPDX-License-Identifier: PMPL-1.0-or-later

//! waf-assay: scenario-driven WAF effectiveness testing
//!
//! Replays declarative attack scenarios against one authorized target and
//! reports whether each pattern was blocked, allowed or challenged.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use waf_assay::audit::AuditLog;
use waf_assay::campaign::{self, Campaign, CampaignOutcome};
use waf_assay::classify::ResultClassifier;
use waf_assay::config::{RunConfig, Settings, DEFAULT_OUTPUT_DIR, EVIDENCE_DIR_NAME};
use waf_assay::config::{REPORT_JSON_NAME, REPORT_MARKDOWN_NAME};
use waf_assay::types::RunMetadata;
use waf_assay::{interrupt, recover, report, scenario};

#[derive(Parser)]
#[command(name = "waf-assay")]
#[command(version)]
#[command(about = "Scenario-driven WAF effectiveness testing with auditable evidence")]
#[command(long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every scenario against the target and write reports
    Run {
        /// Scenario file or directory of scenario files
        #[arg(long, default_value = "scenarios", env = "WAF_ASSAY_SCENARIOS")]
        scenarios: PathBuf,

        /// Descend into subdirectories when discovering scenarios
        #[arg(long)]
        recursive: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Parse scenarios without sending anything; scope-check step URLs
    /// when a target and scope are given
    Validate {
        /// Scenario file or directory of scenario files
        #[arg(long, default_value = "scenarios", env = "WAF_ASSAY_SCENARIOS")]
        scenarios: PathBuf,

        #[arg(long)]
        recursive: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Rebuild both reports from an evidence directory after an abnormal exit
    Recover {
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(Args, Debug, Default)]
struct SettingsArgs {
    /// Settings file (YAML or JSON); command-line values take precedence
    #[arg(long, env = "WAF_ASSAY_CONFIG")]
    config: Option<PathBuf>,

    /// Target base URL
    #[arg(short, long, env = "WAF_ASSAY_TARGET")]
    target: Option<String>,

    /// Scope pattern (regex, anchored at the start of the URL)
    #[arg(short, long, env = "WAF_ASSAY_SCOPE")]
    scope: Option<String>,

    /// Maximum requests per second (0 = unlimited)
    #[arg(short, long, env = "WAF_ASSAY_RATE_LIMIT")]
    rate_limit: Option<u32>,

    /// Worker count (accepted; execution is always sequential)
    #[arg(long, env = "WAF_ASSAY_CONCURRENCY")]
    concurrency: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, env = "WAF_ASSAY_TIMEOUT")]
    timeout: Option<u64>,

    /// Output directory for reports, evidence and the audit log
    #[arg(short, long, env = "WAF_ASSAY_OUTPUT")]
    output: Option<PathBuf>,

    /// Additional block-page signature (repeatable)
    #[arg(long = "signature", value_name = "TEXT")]
    signatures: Vec<String>,
}

impl SettingsArgs {
    fn into_settings(self) -> Result<Settings> {
        let base = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        Ok(base.merge(Settings {
            target: self.target,
            scope: self.scope,
            rate_limit: self.rate_limit,
            concurrency: self.concurrency,
            timeout_secs: self.timeout,
            output_dir: self.output,
            extra_signatures: self.signatures,
        }))
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_secs()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn execute(command: Commands) -> Result<i32> {
    match command {
        Commands::Run {
            scenarios,
            recursive,
            settings,
        } => run(scenarios, recursive, settings),
        Commands::Validate {
            scenarios,
            recursive,
            settings,
        } => validate(scenarios, recursive, settings),
        Commands::Recover { settings } => recover_reports(settings),
    }
}

fn run(scenarios: PathBuf, recursive: bool, args: SettingsArgs) -> Result<i32> {
    let config = RunConfig::resolve(args.into_settings()?)?;
    let paths = scenario::discover(&scenarios, recursive)?;
    if paths.is_empty() {
        log::warn!("no scenario files found in {}", scenarios.display());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("starting signal listener runtime")?;
    let interrupt = interrupt::start_signal_listener(&runtime);

    let mut audit = AuditLog::open(&config.audit_log_path())?;
    let outcome = Campaign::new(&config, interrupt).run(&paths, &mut audit)?;

    if let Some(summary) = outcome.summary() {
        report::print_report(&summary.report);
        for failed in &summary.failed_scenarios {
            println!("  {} {}", "skipped (invalid):".yellow(), failed.display());
        }
        println!("Structured report: {}", summary.json_path.display());
        println!("Narrative report:  {}", summary.markdown_path.display());
        println!("Audit log:         {}", audit.path().display());
    }
    if let CampaignOutcome::Interrupted { signal, .. } = &outcome {
        eprintln!("{} interrupted by signal {}", "warning:".yellow().bold(), signal);
    }

    Ok(outcome.exit_code())
}

fn validate(scenarios: PathBuf, recursive: bool, args: SettingsArgs) -> Result<i32> {
    let settings = args.into_settings()?;
    let config = if settings.target.is_some() || settings.scope.is_some() {
        Some(RunConfig::resolve(settings)?)
    } else {
        None
    };

    let paths = scenario::discover(&scenarios, recursive)?;
    let entries = campaign::validate_files(&paths, config.as_ref());
    let mut problems = 0;

    for entry in &entries {
        match &entry.scenario {
            Ok(s) if entry.out_of_scope.is_empty() => println!(
                "{} {} ({} steps, {} requests)",
                "ok".green(),
                entry.path.display(),
                s.steps.len(),
                s.planned_requests()
            ),
            Ok(_) => {
                problems += 1;
                println!("{} {}", "out of scope".red().bold(), entry.path.display());
                for url in &entry.out_of_scope {
                    println!("    {}", url);
                }
            }
            Err(e) => {
                problems += 1;
                println!("{} {}", "invalid".red().bold(), e);
            }
        }
    }

    println!("\n{} files checked, {} with problems", entries.len(), problems);
    Ok(if problems == 0 { 0 } else { 1 })
}

fn recover_reports(args: SettingsArgs) -> Result<i32> {
    let settings = args.into_settings()?;
    let output = settings
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let evidence_dir = output.join(EVIDENCE_DIR_NAME);
    if !evidence_dir.is_dir() {
        anyhow::bail!("evidence directory not found: {}", evidence_dir.display());
    }

    let classifier = ResultClassifier::with_extra_signatures(&settings.extra_signatures);
    let recovered = recover::recover_results(&evidence_dir, &classifier)?;
    if recovered.unanswered > 0 {
        log::warn!(
            "{} request records have no response and were not counted",
            recovered.unanswered
        );
    }

    let target = settings
        .target
        .or(recovered.target)
        .unwrap_or_else(|| "unknown".to_string());
    let run_report =
        report::build_report(recovered.results, &RunMetadata::now(target), &evidence_dir)?;
    let json_path = output.join(REPORT_JSON_NAME);
    let markdown_path = output.join(REPORT_MARKDOWN_NAME);
    report::save_reports(&run_report, &json_path, &markdown_path, &evidence_dir)?;

    report::print_report(&run_report);
    println!("Structured report: {}", json_path.display());
    println!("Narrative report:  {}", markdown_path.display());
    Ok(0)
}
