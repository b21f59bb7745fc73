//! Field lock CLI
//!
//! Command-line diagnostics for field lock rule snapshots.
//!
//! ## Usage
//!
//! ```bash
//! # Is user 8 allowed to edit the monthly actual of objective 42?
//! fieldlock check --rules locks.yaml --user 8 --kpi K1 --objective 42 --field monthly_actual
//!
//! # Same, with every rule's outcome
//! fieldlock check --rules locks.yaml --user 8 --kpi K1 --objective 42 --field target --explain
//!
//! # Batch check request (JSON)
//! fieldlock batch --rules locks.json --requests checks.json --format json
//!
//! # Validate or list a snapshot
//! fieldlock rules validate locks.yaml
//! fieldlock rules show locks.yaml
//! ```
//!
//! ## Exit Codes
//!
//! - 0: Unlocked (check), success (batch, show), no warnings (validate)
//! - 1: Snapshot loaded with warnings (validate)
//! - 2: Locked (check)
//! - 3: Error

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use fieldlock_bindings_core::{check_batch, IRBatchLockCheckRequest, IRBatchLockCheckResponse, IRId};
use fieldlock_core::{
    EngineConfig, EvaluationContext, Explanation, FieldCategory, LockDecision, LockEngine, RuleSet,
    TraceOutcome,
};

/// fieldlock: field lock rule diagnostics
#[derive(Parser)]
#[command(name = "fieldlock")]
#[command(version)]
#[command(about = "Evaluate and inspect KPI objective field lock rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether one field is locked for one user
    Check {
        /// Rule snapshot (YAML or JSON)
        #[arg(short, long)]
        rules: PathBuf,

        /// User attempting the edit
        #[arg(short, long)]
        user: u64,

        /// KPI of the objective
        #[arg(short, long)]
        kpi: String,

        /// Department objective id
        #[arg(short, long)]
        objective: u64,

        /// Field category (annual_target, monthly_target, monthly_actual,
        /// other_fields, add_objective, delete_objective)
        #[arg(long)]
        field: String,

        /// Month (YYYY-MM) for monthly fields
        #[arg(short, long)]
        month: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Show every rule's outcome
        #[arg(long)]
        explain: bool,

        /// Engine configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Answer a batch lock-check request
    Batch {
        /// Rule snapshot (YAML or JSON)
        #[arg(short, long)]
        rules: PathBuf,

        /// Batch request document (JSON)
        #[arg(long)]
        requests: PathBuf,

        /// User for checks that do not name one
        #[arg(short, long)]
        user: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Engine configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Rule snapshot commands
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// Load a snapshot and report normalization warnings
    Validate {
        /// Path to the snapshot
        path: PathBuf,

        /// Engine configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List the rules in a snapshot
    Show {
        /// Path to the snapshot
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Engine configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

fn run() -> Result<u8> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            rules,
            user,
            kpi,
            objective,
            field,
            month,
            format,
            explain,
            config,
        } => {
            let engine = load_engine(config.as_deref())?;
            let rules = load_rules(&engine, &rules)?;
            let field: FieldCategory = field.parse()?;
            let mut context = EvaluationContext::new(user, kpi, objective, field);
            if let Some(month) = month {
                context = context.with_month(month);
            }
            check_command(&engine, &rules, &context, format, explain)
        }

        Commands::Batch {
            rules,
            requests,
            user,
            format,
            config,
        } => {
            let engine = load_engine(config.as_deref())?;
            let rules = load_rules(&engine, &rules)?;
            batch_command(&engine, &rules, &requests, user, format)
        }

        Commands::Rules { action } => match action {
            RulesAction::Validate { path, config } => {
                let engine = load_engine(config.as_deref())?;
                validate_rules(&engine, &path)
            }
            RulesAction::Show {
                path,
                format,
                config,
            } => {
                let engine = load_engine(config.as_deref())?;
                show_rules(&engine, &path, format)
            }
        },
    }
}

fn load_engine(config: Option<&Path>) -> Result<LockEngine> {
    let config = match config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => EngineConfig::default(),
    };
    Ok(LockEngine::new(config))
}

fn load_rules(engine: &LockEngine, path: &Path) -> Result<RuleSet> {
    engine
        .load_rules(path)
        .with_context(|| format!("Failed to load rules from {:?}", path))
}

fn check_command(
    engine: &LockEngine,
    rules: &RuleSet,
    context: &EvaluationContext,
    format: OutputFormat,
    explain: bool,
) -> Result<u8> {
    let decision = if explain {
        let explanation = engine.explain(rules, context);
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&explanation)?),
            OutputFormat::Text => {
                print_decision(&explanation.decision);
                print_explanation(rules, &explanation);
            }
        }
        explanation.decision
    } else {
        let decision = engine.evaluate(rules, context);
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decision)?),
            OutputFormat::Text => print_decision(&decision),
        }
        decision
    };

    Ok(decision_code(&decision))
}

fn decision_code(decision: &LockDecision) -> u8 {
    if decision.is_locked {
        2
    } else {
        0
    }
}

fn print_decision(decision: &LockDecision) {
    if decision.is_locked {
        println!("LOCKED");
    } else {
        println!("UNLOCKED");
    }
    println!();
    println!("{}", decision.reason);
}

fn print_explanation(rules: &RuleSet, explanation: &Explanation) {
    println!();
    println!("--- Rules ---");
    println!();

    if explanation.traces.is_empty() {
        println!("(no rules)");
        return;
    }

    for trace in &explanation.traces {
        let marker = match trace.outcome {
            TraceOutcome::Locks => "*",
            _ => " ",
        };
        let cited = explanation.decision.matched_rule_id == Some(trace.rule_id);
        println!(
            "{} #{} [specificity {}] {}{}",
            marker,
            trace.rule_id,
            trace.specificity,
            trace.outcome.as_str(),
            if cited { " (reported)" } else { "" }
        );
        if let Some(rule) = rules.get(trace.rule_id) {
            println!("    {}", rule.describe());
        }
    }
}

fn batch_command(
    engine: &LockEngine,
    rules: &RuleSet,
    requests: &Path,
    user: Option<u64>,
    format: OutputFormat,
) -> Result<u8> {
    let contents = std::fs::read_to_string(requests)
        .with_context(|| format!("Failed to read requests from {:?}", requests))?;
    let mut request: IRBatchLockCheckRequest = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse requests from {:?}", requests))?;
    if let Some(user) = user {
        request.user_id = Some(IRId::Number(user));
    }

    let response = check_batch(engine, rules, &request).context("Batch check failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Text => print_batch(&response),
    }
    Ok(0)
}

fn print_batch(response: &IRBatchLockCheckResponse) {
    for (i, result) in response.results.iter().enumerate() {
        let month = result
            .month
            .as_deref()
            .map(|m| format!(" [{}]", m))
            .unwrap_or_default();
        let status = match result.response.lock_id {
            Some(id) if result.response.is_locked => format!("LOCKED (rule #{})", id),
            _ if result.response.is_locked => "LOCKED".to_string(),
            _ => "unlocked".to_string(),
        };
        println!(
            "{}. {} on objective {}{}: {}",
            i + 1,
            result.field_type,
            result.department_objective_id,
            month,
            status
        );
    }
    println!();
    println!(
        "{} of {} checks locked",
        response.locked_count(),
        response.results.len()
    );
}

fn validate_rules(engine: &LockEngine, path: &Path) -> Result<u8> {
    let rules = load_rules(engine, path)?;

    println!("Rules loaded: {}", rules.len());
    println!("Active: {}", rules.active().count());
    println!("Warnings: {}", rules.warnings().len());

    if rules.warnings().is_empty() {
        return Ok(0);
    }

    println!();
    for warning in rules.warnings() {
        println!("  - {}", warning);
    }
    Ok(1)
}

fn show_rules(engine: &LockEngine, path: &Path, format: OutputFormat) -> Result<u8> {
    let rules = load_rules(engine, path)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rules)?),
        OutputFormat::Text => {
            if rules.is_empty() {
                println!("No rules in {:?}", path);
            }
            for rule in rules.rules() {
                println!("#{}: {}", rule.id, rule.describe());
            }
        }
    }
    Ok(0)
}
