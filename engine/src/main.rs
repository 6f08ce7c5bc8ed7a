//! chain-etl CLI - run rule-driven transform chains over JSON records
//!
//! # Commands
//!
//! ```bash
//! chain-etl run chain.json input.json          # Run a full chain
//! chain-etl transform rules.json input.json    # One rule-transform, concurrent
//! chain-etl validate chain.json                # Check a chain configuration
//! chain-etl operations                         # Show available value operations
//! chain-etl example-chain                      # Show an example chain
//! ```
//!
//! Context parameters come from `ETL_CONTEXT_*` variables (a `.env` file is
//! loaded when present) and from `--param key=value`, which wins.

use chain_etl::{
    example_chain, operations_description, process_concurrently, ChainConfig, ExecutionContext, Item,
    OperationRegistry, RuleApplier, RuleTransformConfig, RuleTransformOperation,
};
use chain_etl::logs::{log_info, log_success, log_warning};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chain-etl")]
#[command(about = "Rule-driven transform chains for nested JSON records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a chain over a JSON array of records
    Run {
        /// Chain configuration file
        chain: PathBuf,

        /// Input JSON file (array of records)
        input: PathBuf,

        /// Context parameter, repeatable (value parsed as JSON when possible)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply one rule-transform to every record, concurrently
    Transform {
        /// rule-transform options file (`{"rules": {...}, "add": false}`)
        rules: PathBuf,

        /// Input JSON file (array of records)
        input: PathBuf,

        /// Context parameter, repeatable
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Number of worker tasks
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a chain configuration
    Validate {
        /// Chain configuration file
        chain: PathBuf,
    },

    /// Show available value operations
    Operations,

    /// Show an example chain configuration
    ExampleChain,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { chain, input, params, output } => {
            cmd_run(&chain, &input, params, output.as_deref())
        }

        Commands::Transform { rules, input, params, workers, output } => {
            cmd_transform(&rules, &input, params, workers, output.as_deref()).await
        }

        Commands::Validate { chain } => cmd_validate(&chain),

        Commands::Operations => cmd_operations(),

        Commands::ExampleChain => cmd_example_chain(),
    };

    if let Err(e) = result {
        chain_etl::logs::log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

fn cmd_run(
    chain_path: &Path,
    input: &Path,
    params: Vec<(String, Value)>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    log_info(format!("Loading chain: {}", chain_path.display()));
    let config = ChainConfig::from_file(chain_path)?;
    let mut processor = config.build(&OperationRegistry::with_defaults())?;

    let records = read_records(input)?;
    let context = build_context(params);

    let result = processor.process(records, &context)?;
    log_info(format!(
        "{} chain break(s), {} item(s) flushed at end of input",
        result.stats.chain_breaks, result.stats.flushed
    ));

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;
    Ok(())
}

async fn cmd_transform(
    rules_path: &Path,
    input: &Path,
    params: Vec<(String, Value)>,
    workers: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = OperationRegistry::with_defaults();
    let options: Value = serde_json::from_str(&fs::read_to_string(rules_path)?)?;
    registry.validate(chain_etl::RULE_TRANSFORM, &options)?;

    let config: RuleTransformConfig = serde_json::from_value(options)?;
    let operation = RuleTransformOperation::from_config(Arc::new(RuleApplier::new()), &config)?;
    log_info(format!("{} rule(s), {} worker(s)", operation.rules().len(), workers.max(1)));

    let items: Vec<Item> = read_records(input)?.into_iter().map(Item::data).collect();
    let count = items.len();
    let context = Arc::new(build_context(params));

    let transformed = process_concurrently(Arc::new(operation), items, context, workers).await?;
    log_success(format!("Transformed {} record(s)", count));

    let records: Vec<Value> = transformed.into_iter().filter_map(Item::into_data).collect();
    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)?;
    Ok(())
}

fn cmd_validate(chain_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log_info(format!("Validating: {}", chain_path.display()));

    let config = ChainConfig::from_file(chain_path)?;
    let problems = config.check(&OperationRegistry::with_defaults());

    if problems.is_empty() {
        log_success(format!("{} operation(s), all valid", config.chain.len()));
        return Ok(());
    }

    for problem in &problems {
        log_warning(problem.clone());
    }
    Err(format!("{} invalid operation(s)", problems.len()).into())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", operations_description());
    Ok(())
}

fn cmd_example_chain() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&example_chain())?);
    Ok(())
}

fn read_records(input: &Path) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    log_info(format!("Reading: {}", input.display()));
    let content = fs::read_to_string(input)?;
    let records = match serde_json::from_str::<Value>(&content)? {
        Value::Array(records) => records,
        single => vec![single],
    };
    log_info(format!("{} record(s)", records.len()));
    Ok(records)
}

/// Environment parameters, overridden by `--param`.
fn build_context(params: Vec<(String, Value)>) -> ExecutionContext {
    params
        .into_iter()
        .fold(ExecutionContext::from_env(), |context, (key, value)| context.with_parameter(key, value))
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), chain_etl::context::parse_parameter(value)))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            log_success(format!("Output written to: {}", p.display()));
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
