//! Celesto - deploy agents to the Celesto service
//!
//! Usage:
//!   celesto deploy ./my-agent --name my-agent
//!   celesto projects

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use celesto_core::api::{ApiClient, Connection, PROJECT_PAGE_SIZE};
use celesto_core::config::ConfigSources;
use celesto_core::deploy::{DeployOptions, DeployReport, Deployment, DeploymentStatus};
use celesto_core::projects::ProjectRef;

#[derive(Parser)]
#[command(name = "celesto")]
#[command(about = "Deploy agents to the Celesto service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy an agent folder
    Deploy(Box<DeployArgs>),

    /// List the projects visible to this API key
    Projects {
        /// API key (overrides CELESTO_API_KEY and the config file)
        #[arg(long)]
        api_key: Option<String>,

        /// Base URL of the Celesto service
        #[arg(long)]
        base_url: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct DeployArgs {
    /// Path to the agent folder (defaults to the current directory)
    folder: Option<PathBuf>,

    /// Agent name (defaults to the folder name)
    #[arg(long)]
    name: Option<String>,

    /// Agent description
    #[arg(long, default_value = "")]
    description: String,

    /// Environment variable shipped with the agent (KEY=VALUE)
    #[arg(long, value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Project to deploy into (defaults to your first project)
    #[arg(long)]
    project: Option<String>,

    /// Ignore-file override (defaults to .celestoignore in the folder)
    #[arg(long)]
    ignore_file: Option<PathBuf>,

    /// API key (overrides CELESTO_API_KEY and the config file)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL of the Celesto service
    #[arg(long)]
    base_url: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "celesto=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy(args) => run_deploy(*args),
        Commands::Projects {
            api_key,
            base_url,
            format,
        } => run_projects(api_key, base_url, format),
    }
}

fn run_deploy(args: DeployArgs) -> Result<()> {
    let folder = match args.folder {
        Some(folder) => folder,
        None => std::env::current_dir()?,
    };
    let name = match args.name {
        Some(name) => name,
        None => folder_name(&folder)?,
    };

    let mut options = DeployOptions::new(name).with_description(args.description);
    for pair in &args.env {
        let (key, value) = parse_env_pair(pair)?;
        options = options.with_env(key, value);
    }
    if let Some(project) = args.project {
        options = options.with_project(project);
    }
    if let Some(path) = args.ignore_file {
        options = options.with_ignore_file(path);
    }

    let connection = connect(args.api_key, args.base_url)?;
    let deployment = Deployment::new(connection);

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(deployment.deploy(&folder, options))?;

    print_deploy_report(&report, args.format)?;
    Ok(())
}

fn run_projects(
    api_key: Option<String>,
    base_url: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let connection = connect(api_key, base_url)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let projects = runtime.block_on(fetch_all_projects(&connection))?;

    match format {
        OutputFormat::Table => print_projects_table(&projects),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&projects)?),
    }
    Ok(())
}

/// Walk the paginated listing to the end; the CLI shows everything.
async fn fetch_all_projects(connection: &Connection) -> Result<Vec<ProjectRef>> {
    let mut projects = Vec::new();
    let mut page = 1u32;
    loop {
        let batch = connection.list_projects_page(page, PROJECT_PAGE_SIZE).await?;
        let last = (batch.len() as u32) < PROJECT_PAGE_SIZE;
        projects.extend(batch);
        if last {
            return Ok(projects);
        }
        page += 1;
    }
}

fn connect(api_key: Option<String>, base_url: Option<String>) -> Result<Connection> {
    let mut sources = ConfigSources::from_env();
    if let Some(api_key) = api_key {
        sources = sources.with_api_key(api_key);
    }
    if let Some(base_url) = base_url {
        sources = sources.with_base_url(base_url);
    }
    let config = sources.resolve()?;
    Ok(Connection::new(&config)?)
}

fn folder_name(folder: &Path) -> Result<String> {
    folder
        .canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(folder)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("cannot derive an agent name from {}", folder.display()))
}

fn parse_env_pair(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        anyhow::bail!("invalid --env '{raw}': expected KEY=VALUE");
    };
    if key.is_empty() {
        anyhow::bail!("invalid --env '{raw}': key must not be empty");
    }
    Ok((key.to_string(), value.to_string()))
}

fn print_deploy_report(report: &DeployReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let status = match report.result.status {
                DeploymentStatus::Ready => "READY",
                DeploymentStatus::Building => "BUILDING",
            };
            println!(
                "{} Deployed to project '{}' (deployment {})",
                style("✓").green(),
                report.project.name,
                report.result.deployment_id
            );
            println!("  Status: {status}");
            if let Some(ref message) = report.result.message {
                println!("  {message}");
            }
            for warning in &report.warnings {
                println!("  {} {warning}", style("⚠").yellow());
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "deployment_id": report.result.deployment_id,
                "status": report.result.status,
                "message": report.result.message,
                "project": report.project,
                "warnings": report.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_projects_table(projects: &[ProjectRef]) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }

    println!("{:<24} Name", "ID");
    println!("{}", "-".repeat(50));
    for project in projects {
        println!("{:<24} {}", project.id, project.name);
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, parse_env_pair};
    use clap::Parser;

    #[test]
    fn deploy_with_flags_parses() {
        let args = [
            "celesto",
            "deploy",
            "./agent",
            "--name",
            "demo",
            "--project",
            "Prod",
            "--env",
            "A=1",
            "--env",
            "B=2",
        ];

        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok(), "CLI parsing should succeed");
    }

    #[test]
    fn deploy_without_folder_parses() {
        let args = ["celesto", "deploy"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn deploy_with_format_json_parses() {
        let args = ["celesto", "deploy", ".", "--format", "json"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn deploy_with_ignore_file_parses() {
        let args = ["celesto", "deploy", ".", "--ignore-file", "../shared.ignore"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn projects_parses() {
        let args = ["celesto", "projects"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn projects_with_base_url_parses() {
        let args = [
            "celesto",
            "projects",
            "--base-url",
            "https://staging.celesto.test",
        ];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn env_pair_splits_on_first_equals() {
        let (key, value) = parse_env_pair("TOKEN=abc=def").unwrap();
        assert_eq!(key, "TOKEN");
        assert_eq!(value, "abc=def");
    }

    #[test]
    fn env_pair_without_equals_is_rejected() {
        assert!(parse_env_pair("TOKEN").is_err());
    }

    #[test]
    fn env_pair_with_empty_key_is_rejected() {
        assert!(parse_env_pair("=value").is_err());
    }
}
