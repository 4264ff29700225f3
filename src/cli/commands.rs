//! CLI command implementations
//!
//! Commands only expose optimizer decisions. There is no storage backend, so
//! nothing is executed; each command builds a JSON report and prints it.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;

use serde_json::{json, Value};

use crate::observability::{log_event_with_fields, Event};
use crate::optimizer::{
    CandidatePlan, Optimizer, OptimizerConfig, PlanSelector, Row, StorageBackend, StoreError,
};

use super::args::{Command, CommonOptions};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Backend for decision-only commands
pub struct NoBackend;

impl StorageBackend for NoBackend {
    fn execute(&self, _query: &str, _args: &[Value]) -> Result<Vec<Row>, StoreError> {
        Err(StoreError::new("no storage backend configured"))
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command. A failure is
/// reported once, as a JSON error object on stdout; stderr is used only when
/// stdout itself cannot be written.
pub fn run() -> ExitCode {
    let cli = super::args::Cli::parse_args();
    finish(run_command(cli.command))
}

/// Turn a command result into the process exit code, reporting any error
pub fn finish(result: CliResult<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if write_error(e.code_str(), e.message()).is_err() {
                eprintln!("{}", e);
            }
            ExitCode::FAILURE
        }
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let report = match cmd {
        Command::Optimize {
            query,
            tables,
            common,
        } => optimize(&query, &tables, &common)?,
        Command::Entangle {
            query_a,
            tables_a,
            query_b,
            tables_b,
            common,
        } => entangle(&query_a, &tables_a, &query_b, &tables_b, &common)?,
        Command::Sample {
            query,
            tables,
            draws,
            common,
        } => sample(&query, &tables, draws, &common)?,
    };
    write_response(report)
}

/// Load the config file (if any) and apply the seed override
pub fn load_config(common: &CommonOptions) -> CliResult<OptimizerConfig> {
    let mut config = match &common.config {
        Some(path) => load_file(path)?,
        None => OptimizerConfig::default(),
    };
    if common.seed.is_some() {
        config.rng_seed = common.seed;
    }
    Ok(config)
}

fn load_file(path: &Path) -> CliResult<OptimizerConfig> {
    let config = OptimizerConfig::load(path)?;
    if config.log_decisions {
        log_event_with_fields(Event::ConfigLoaded, &[("path", &path.display().to_string())]);
    }
    Ok(config)
}

fn build(common: &CommonOptions) -> CliResult<Optimizer<NoBackend>> {
    Ok(Optimizer::new(load_config(common)?, NoBackend)?)
}

fn candidate_rows(plans: &[CandidatePlan]) -> Vec<Value> {
    let probabilities = PlanSelector::new().probabilities(plans);
    plans
        .iter()
        .zip(probabilities)
        .map(|(plan, probability)| {
            json!({
                "id": plan.id,
                "strategy": plan.strategy_name(),
                "text": plan.text,
                "estimated_cost": plan.estimated_cost,
                "probability": probability,
            })
        })
        .collect()
}

/// Select a plan for one query
pub fn optimize(query: &str, tables: &[String], common: &CommonOptions) -> CliResult<Value> {
    let optimizer = build(common)?;
    let candidates = optimizer.candidates(query, tables)?;
    let decision = optimizer.optimize(query, tables)?;

    Ok(json!({
        "selected": decision,
        "candidates": candidate_rows(&candidates),
    }))
}

/// Resolve two queries together
pub fn entangle(
    query_a: &str,
    tables_a: &[String],
    query_b: &str,
    tables_b: &[String],
    common: &CommonOptions,
) -> CliResult<Value> {
    let optimizer = build(common)?;
    let outcome = optimizer.entangle_plans(query_a, tables_a, query_b, tables_b)?;

    Ok(json!({
        "query_a": outcome.plan_a.text,
        "strategy_a": outcome.plan_a.strategy_name(),
        "query_b": outcome.plan_b.text,
        "strategy_b": outcome.plan_b.strategy_name(),
        "shared_table": outcome.recorded,
        "hint_propagated": outcome.hint_propagated,
    }))
}

/// Draw `draws` selections and compare observed frequency with probability
pub fn sample(
    query: &str,
    tables: &[String],
    draws: u64,
    common: &CommonOptions,
) -> CliResult<Value> {
    if draws == 0 {
        return Err(CliError::invalid_argument("draws must be > 0"));
    }
    let optimizer = build(common)?;
    let candidates = optimizer.candidates(query, tables)?;

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for _ in 0..draws {
        let decision = optimizer.optimize(query, tables)?;
        *counts.entry(decision.strategy_name).or_insert(0) += 1;
    }

    let rows: Vec<Value> = candidate_rows(&candidates)
        .into_iter()
        .map(|mut row| {
            let strategy = row["strategy"].as_str().unwrap_or_default().to_string();
            let observed = counts.get(&strategy).copied().unwrap_or(0);
            row["draws"] = json!(observed);
            row["observed_frequency"] = json!(observed as f64 / draws as f64);
            row
        })
        .collect();

    Ok(json!({
        "draws": draws,
        "candidates": rows,
    }))
}
