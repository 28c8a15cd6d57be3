use std::path::PathBuf;

use agentcore::cli::{
    describe_tool_file, explain_planning_file, flow_models, inspect_flow, offline_environment,
    read_flow,
};
use agentcore::config::RuntimeConfig;
use agentcore::flow::{Flow, FlowNodeRegistry};
use agentcore::node::{Node, RunOutcome, Variables};
use agentcore::utils::LoggingConfig;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "agentcore", version, about = "Agent runtime CLI", author)]
struct Cli {
    /// Runtime configuration file (JSON); AGENTCORE_* variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Flow {
        #[command(subcommand)]
        command: FlowCommand,
    },
    Planning {
        #[command(subcommand)]
        command: PlanningCommand,
    },
    Tool {
        #[command(subcommand)]
        command: ToolCommand,
    },
}

#[derive(Subcommand)]
enum FlowCommand {
    /// Check a serialized flow document.
    Validate { file: PathBuf },
    /// Print nodes, settings and edges of a flow document.
    Inspect {
        file: PathBuf,
        #[arg(long, default_value_t = true)]
        pretty: bool,
    },
    /// Dry-run a flow with offline echo models.
    Run {
        file: PathBuf,
        #[arg(long)]
        input: String,
        #[arg(long)]
        start: Option<String>,
    },
    /// Store a flow document with the configured persistence provider.
    Save {
        file: PathBuf,
        #[arg(long)]
        id: Option<String>,
    },
    /// Print a stored flow document.
    Load {
        id: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PlanningCommand {
    /// Parse captured planning output without calling a model.
    Explain { file: PathBuf },
}

#[derive(Subcommand)]
enum ToolCommand {
    /// Render the model-facing schema of a tool definition.
    Describe { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = RuntimeConfig::load(cli.config.as_deref())?;
    LoggingConfig::init_with_fallback(config.log_filter.as_deref());

    let registry = FlowNodeRegistry::with_builtins();
    match cli.command {
        Command::Flow { command } => match command {
            FlowCommand::Validate { file } => {
                let flow = read_flow(&file, &registry).await?;
                println!("flow `{}` is valid", flow_id(&flow));
            }
            FlowCommand::Inspect { file, pretty } => {
                let flow = read_flow(&file, &registry).await?;
                print_json(&inspect_flow(&flow), pretty)?;
            }
            FlowCommand::Run { file, input, start } => {
                handle_flow_run(&config, &registry, file, input, start).await?
            }
            FlowCommand::Save { file, id } => {
                let flow = read_flow(&file, &registry).await?;
                let id = id.unwrap_or_else(|| flow_id(&flow));
                let provider = config.persistence_provider()?;
                flow.save(provider.as_ref(), &id).await?;
                println!("flow saved as `{id}` ({})", config.persistence.kind);
            }
            FlowCommand::Load { id, output } => {
                let provider = config.persistence_provider()?;
                let flow = Flow::load(provider.as_ref(), &id, &registry).await?;
                let content = flow.serialization()?;
                match output {
                    Some(path) => {
                        tokio::fs::write(&path, content).await?;
                        println!("flow `{id}` written to `{}`", path.display());
                    }
                    None => println!("{content}"),
                }
            }
        },
        Command::Planning { command } => match command {
            PlanningCommand::Explain { file } => {
                print_json(&explain_planning_file(&file).await?, true)?;
            }
        },
        Command::Tool { command } => match command {
            ToolCommand::Describe { file } => {
                print_json(&describe_tool_file(&file).await?, true)?;
            }
        },
    }
    Ok(())
}

async fn handle_flow_run(
    config: &RuntimeConfig,
    registry: &FlowNodeRegistry,
    file: PathBuf,
    input: String,
    start: Option<String>,
) -> anyhow::Result<()> {
    let flow = read_flow(&file, registry).await?;
    let env = offline_environment(config, &flow_models(&flow)?);
    let mut flow = flow.with_max_steps(config.flow_max_steps);
    let start = match start {
        Some(start) => start,
        None => flow.entry_node()?,
    };

    let mut variables = Variables::new();
    match flow.run(&start, &input, &mut variables, &env).await? {
        RunOutcome::Completed { output } => println!("{output}"),
        RunOutcome::Suspended { node, output } => {
            println!("{output}");
            println!("flow suspended at `{node}` waiting for a manual handoff");
        }
    }
    Ok(())
}

fn flow_id(flow: &Flow) -> String {
    flow.id().to_string()
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let content = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{content}");
    Ok(())
}
