//! shepherdctl - inspect and exercise database connection resolution
//!
//! Provides:
//! - Resolution of connection parameters for core, application, challenge and lesson schemas
//! - Connectivity checks (open then close a connection)
//! - Single property lookups with the flat or the standard reader
//! - The effective deployment configuration

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shepherd_core::{
    read_property, read_standard_property, ConnectionParameters, DeploymentConfig, ResourceName,
};
use tracing::info;

mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "shepherdctl",
    author,
    version,
    about = "Resolve and check database connections for a training platform deployment",
    long_about = "Layer the global database properties with per-challenge and per-lesson \
                  properties, then inspect the result or open a connection with it."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the connection parameters for a resource (password redacted)
    Resolve(ResolveArgs),
    /// Open and close a connection for a resource
    Check(CheckArgs),
    /// Read one property from a properties file
    Get(GetArgs),
    /// Show the effective deployment configuration
    Config,
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct ResolveArgs {
    /// Resource: core, application, challenge:<path> or lesson:<name>
    resource: ResourceName,

    /// Deployment root; overrides the configured root, including `${root}` in the global properties path
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Allow multiple statements per query
    #[arg(long)]
    multi: bool,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Resource: core, application, challenge:<path> or lesson:<name>
    resource: ResourceName,

    /// Deployment root; overrides the configured root, including `${root}` in the global properties path
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Allow multiple statements per query
    #[arg(long)]
    multi: bool,
}

#[derive(Parser, Debug)]
struct GetArgs {
    /// Properties file to read
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Property key
    key: String,

    /// Use the standard properties format (comments, escapes) instead of the flat reader
    #[arg(long)]
    standard: bool,
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Resolve(args) => run_resolve(args)?,
        Commands::Check(args) => run_check(args).await?,
        Commands::Get(args) => run_get(args)?,
        Commands::Config => run_config()?,
        Commands::Completions(args) => run_completions(args)?,
    }
    Ok(())
}

fn load_config(root: Option<PathBuf>) -> Result<DeploymentConfig> {
    DeploymentConfig::load_with_root(root).context("failed to load deployment config")
}

fn run_resolve(args: ResolveArgs) -> Result<()> {
    let config = load_config(args.root)?;

    let params = config
        .resolver()
        .resolve(&args.resource, &config.root, args.multi)
        .with_context(|| format!("failed to resolve {}", args.resource))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&params)?);
    } else {
        print_parameters(&params);
    }
    Ok(())
}

fn print_parameters(params: &ConnectionParameters) {
    println!("driverType:    {}", params.driver_type);
    println!("connectionURL: {}", params.connection_url);
    println!("options:       {}", params.options);
    println!("username:      {}", params.username);
    println!("password:      [REDACTED]");
}

async fn run_check(args: CheckArgs) -> Result<()> {
    let config = load_config(args.root)?;

    info!("checking connection for {}", args.resource);
    let handle = shepherd_db::connect(&config.resolver(), &args.resource, &config.root, args.multi)
        .await
        .with_context(|| format!("failed to connect to {}", args.resource))?;

    let driver = handle.driver();
    handle.close().await.context("failed to close connection")?;

    println!("✓ {} reachable ({:?})", args.resource, driver);
    Ok(())
}

fn run_get(args: GetArgs) -> Result<()> {
    let value = if args.standard {
        read_standard_property(&args.file, &args.key)?.ok_or_else(|| {
            anyhow!(
                "Property '{}' not found in {}",
                args.key,
                args.file.display()
            )
        })?
    } else {
        read_property(&args.file, &args.key)?
    };

    println!("{value}");
    Ok(())
}

fn run_config() -> Result<()> {
    let config = load_config(None)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
