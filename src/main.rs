mod builtins;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use autoflow_config::FlowDef;
use autoflow_runtime::{EventPattern, Flow, FlowConfig, FlowEvent};
use autoflow_task::InvocationContext;

/// Autoflow - run asynchronous task flows described as JSON
#[derive(Parser)]
#[command(name = "autoflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log filter used when RUST_LOG is not set
  #[arg(long, global = true, default_value = "warn")]
  log_level: String,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a flow file and print its canonical graph
  Validate {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,
  },

  /// Run a flow and print its outputs
  Run {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,

    /// Arguments as a JSON array; read from stdin when omitted
    #[arg(long)]
    args: Option<String>,

    /// Print lifecycle events matching this pattern to stderr (e.g. "task.*")
    #[arg(long, num_args = 0..=1, default_missing_value = "*")]
    events: Option<String>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
    )
    .with_writer(io::stderr)
    .init();

  match cli.command {
    Some(Commands::Validate { flow_file }) => validate_flow(&flow_file)?,
    Some(Commands::Run {
      flow_file,
      args,
      events,
    }) => run_flow(&flow_file, args, events)?,
    None => {
      println!("autoflow - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_flow(flow_file: &Path) -> Result<FlowDef> {
  let content = std::fs::read_to_string(flow_file)
    .with_context(|| format!("failed to read flow file: {}", flow_file.display()))?;

  let mut def: FlowDef = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse flow file: {}", flow_file.display()))?;

  if def.name.is_none() {
    def.name = flow_file
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned());
  }
  Ok(def)
}

fn validate_flow(flow_file: &Path) -> Result<()> {
  let def = load_flow(flow_file)?;
  let (graph, errors) = autoflow_graph::validate(def);

  if !errors.is_empty() {
    for error in &errors {
      eprintln!("error: {}", error);
    }
    bail!("flow '{}' has {} validation error(s)", graph.name, errors.len());
  }

  println!("{}", serde_json::to_string_pretty(&graph)?);
  Ok(())
}

fn run_flow(flow_file: &Path, args: Option<String>, events: Option<String>) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_flow_async(flow_file, args, events).await })
}

async fn run_flow_async(
  flow_file: &Path,
  args: Option<String>,
  events: Option<String>,
) -> Result<()> {
  let def = load_flow(flow_file)?;
  let config = FlowConfig::new().with_resolver(builtins::builtins());
  let flow = Flow::build_with_config(def, config).context("invalid flow")?;

  eprintln!("Loaded flow: {}", flow.name());

  let args = match args {
    Some(raw) => parse_args(&raw).context("failed to parse --args")?,
    None => read_args_from_stdin()?,
  };

  if let Some(pattern) = events {
    flow
      .events()
      .subscribe(EventPattern::parse(&pattern), |event: &FlowEvent| {
        if let Ok(line) = serde_json::to_string(event) {
          eprintln!("{}", line);
        }
      });
  }

  let result = flow
    .execute(InvocationContext::empty(), args)
    .wait()
    .await
    .context("flow execution failed")?;

  eprintln!("Execution completed: {}", result.execution_id);
  println!("{}", serde_json::to_string_pretty(&result.values)?);

  Ok(())
}

/// A JSON array is the argument list; any other value is the single argument.
fn parse_args(raw: &str) -> Result<Vec<Value>> {
  Ok(match serde_json::from_str(raw)? {
    Value::Array(values) => values,
    value => vec![value],
  })
}

fn read_args_from_stdin() -> Result<Vec<Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, run without arguments
    Ok(Vec::new())
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read arguments from stdin")?;

    if input.trim().is_empty() {
      Ok(Vec::new())
    } else {
      parse_args(&input).context("failed to parse arguments JSON from stdin")
    }
  }
}
