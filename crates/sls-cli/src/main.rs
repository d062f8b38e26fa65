// crates/sls-cli/src/main.rs
// ============================================================================
// Module: SLS MCP CLI Entry Point
// Description: Command dispatcher for the SLS MCP server and local tool calls.
// Purpose: Run the server, inspect configuration, and call tools from a shell.
// Dependencies: clap, serde_json, sls-config, sls-mcp, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The CLI starts the MCP server and offers local equivalents of its tool
//! surface: `tools list`, `tools call`, and `systems list` run against the same
//! router the server uses. Tool input files are size-limited before parsing.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde_json::Value;
use sls_config::ServerTransport;
use sls_config::SlsConfig;
use sls_mcp::McpServer;
use sls_mcp::ToolRouter;
use sls_mcp::catalog::tool_definitions;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a tool input payload.
const MAX_TOOL_INPUT_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "sls-mcp",
    version,
    arg_required_else_help = true,
    disable_help_subcommand = true
)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the SLS MCP server.
    Serve(ConfigArgs),
    /// Local tool utilities.
    Tools {
        /// Selected tools subcommand.
        #[command(subcommand)]
        command: ToolsCommand,
    },
    /// Configured system utilities.
    Systems {
        /// Selected systems subcommand.
        #[command(subcommand)]
        command: SystemsCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config file selection shared by commands.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to sls-mcp.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Tools subcommands.
#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List tool definitions as JSON.
    List,
    /// Call one tool locally and print its JSON result.
    Call(ToolCallCommand),
}

/// Systems subcommands.
#[derive(Subcommand, Debug)]
enum SystemsCommand {
    /// List configured systems and aliases.
    List(ConfigArgs),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigArgs),
}

/// Arguments for `tools call`.
#[derive(Args, Debug)]
struct ToolCallCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Tool name to invoke.
    #[arg(value_name = "TOOL")]
    tool: String,
    /// Inline JSON arguments.
    #[arg(long, value_name = "JSON", conflicts_with = "input_file")]
    input: Option<String>,
    /// Path to a JSON arguments file.
    #[arg(long, value_name = "PATH")]
    input_file: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors from bounded file reads.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// File I/O failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// File size exceeds the configured limit.
    #[error("{size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            let _ = print_stderr(&err.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Dispatches a parsed command line.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Tools {
            command,
        } => command_tools(command).await,
        Commands::Systems {
            command: SystemsCommand::List(command),
        } => command_systems_list(&command),
        Commands::Config {
            command: ConfigCommand::Validate(command),
        } => command_config_validate(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let label = match config.server.transport {
        ServerTransport::Stdio => "stdio".to_string(),
        ServerTransport::Http => {
            format!("http on {}", config.server.bind.as_deref().unwrap_or_default())
        }
    };
    let server = tokio::task::spawn_blocking(move || McpServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    print_stderr(&format!("sls-mcp: serving over {label}"))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Tools Commands
// ============================================================================

/// Dispatches tools subcommands.
async fn command_tools(command: ToolsCommand) -> CliResult<ExitCode> {
    match command {
        ToolsCommand::List => {
            let value = serde_json::to_value(tool_definitions())
                .map_err(|err| CliError::new(format!("tool list serialization failed: {err}")))?;
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        ToolsCommand::Call(command) => command_tools_call(command).await,
    }
}

/// Executes one tool call through a local router.
async fn command_tools_call(command: ToolCallCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let arguments = read_tool_input(command.input.as_deref(), command.input_file.as_deref())?;
    let tool = command.tool;
    let output = tokio::task::spawn_blocking(move || {
        let router =
            ToolRouter::from_config(config).map_err(|err| CliError::new(err.to_string()))?;
        router.invoke(&tool, arguments).map_err(|err| CliError::new(err.to_string()))
    })
    .await
    .map_err(|err| CliError::new(format!("tool call join failed: {err}")))??;
    print_json(&output.value)?;
    Ok(if output.is_error { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Reads tool arguments from an inline string, a file, or defaults to `{}`.
fn read_tool_input(inline: Option<&str>, path: Option<&Path>) -> CliResult<Value> {
    let bytes = match (inline, path) {
        (Some(text), _) if text.len() > MAX_TOOL_INPUT_BYTES => {
            return Err(CliError::new(format!("tool input exceeds {MAX_TOOL_INPUT_BYTES} bytes")));
        }
        (Some(text), _) => text.as_bytes().to_vec(),
        (None, Some(path)) => read_bytes_with_limit(path, MAX_TOOL_INPUT_BYTES)
            .map_err(|err| CliError::new(format!("tool input {}: {err}", path.display())))?,
        (None, None) => return Ok(Value::Object(serde_json::Map::new())),
    };
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("tool input is not valid JSON: {err}")))?;
    if !value.is_object() {
        return Err(CliError::new("tool input must be a JSON object"));
    }
    Ok(value)
}

// ============================================================================
// SECTION: Systems and Config Commands
// ============================================================================

/// Lists configured systems as JSON.
fn command_systems_list(command: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let value = serde_json::to_value(config.system_list())
        .map_err(|err| CliError::new(format!("system list serialization failed: {err}")))?;
    print_json(&value)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    config.client_credentials().map_err(|err| CliError::new(format!("config invalid: {err}")))?;
    print_stdout(&format!("config ok: {} system(s)", config.systems.len()))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<SlsConfig> {
    SlsConfig::load(path).map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

// ============================================================================
// SECTION: I/O Helpers
// ============================================================================

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    // The file may grow between stat and read; read one byte past the limit.
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Writes pretty JSON to stdout.
fn print_json(value: &Value) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("json rendering failed: {err}")))?;
    print_stdout(&rendered)
}

/// Writes a line to stdout.
fn print_stdout(message: &str) -> CliResult<()> {
    writeln!(std::io::stdout(), "{message}")
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a line to stderr.
fn print_stderr(message: &str) -> CliResult<()> {
    writeln!(std::io::stderr(), "{message}")
        .map_err(|err| CliError::new(format!("failed to write stderr: {err}")))
}
