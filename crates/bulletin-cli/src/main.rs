mod cmd;
mod output;
mod root;

use bulletin_core::DeployError;
use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, db::DbSubcommand};
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[derive(Parser)]
#[command(
    name = "bulletin-deploy",
    about = "Provision, deploy and test the bulletin generator stack",
    version,
    propagate_version = true
)]
struct Cli {
    /// Install root (default: auto-detect from bulletin-deploy.yaml or docker-compose.yml)
    #[arg(long, global = true, env = "BULLETIN_ROOT")]
    root: Option<PathBuf>,

    /// Config file (default: <root>/bulletin-deploy.yaml)
    #[arg(long, global = true, env = "BULLETIN_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision directories, verify files and build/start the containers
    Deploy {
        /// 1 = base install, 2 = calendar and lectionary modules
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
        phase: u8,

        /// Don't rebuild the images
        #[arg(long)]
        skip_build: bool,

        /// Don't start the containers
        #[arg(long)]
        skip_deploy: bool,

        /// Smoke-test the backend modules locally, then stop
        #[arg(long)]
        local_test: bool,
    },

    /// Run the API test suite
    Test {
        /// Only the smoke tests
        #[arg(long)]
        smoke: bool,

        /// Everything except the HTTP endpoint tests
        #[arg(long)]
        unit: bool,

        /// Only the HTTP endpoint tests
        #[arg(long)]
        integration: bool,

        /// Only tests for one feature phase (1-4)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        phase: Option<u8>,

        /// Collect coverage for the backend modules
        #[arg(long)]
        coverage: bool,

        /// Start a local API server for the run and stop it afterwards
        #[arg(long)]
        start_server: bool,

        /// Port for --start-server (default: from config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Add the calendar and lectionary routes to the API application file
    PatchRoutes {
        /// Path to the FastAPI app.py
        app: PathBuf,
    },

    /// Manage the bulletin database
    Db {
        #[command(subcommand)]
        subcommand: DbSubcommand,
    },

    /// Show or create the deploy configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Deploy { .. } | Commands::Test { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    // JSON output owns stdout; logs go to stderr
    let writer = if cli.json {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(writer)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(bulletin_core::paths::CONFIG_FILE));

    let result = match cli.command {
        Commands::Deploy {
            phase,
            skip_build,
            skip_deploy,
            local_test,
        } => cmd::deploy::run(
            &root,
            &config_path,
            cmd::deploy::DeployArgs {
                phase,
                skip_build,
                skip_deploy,
                local_test,
            },
            cli.json,
        )
        .map(|()| 0),
        Commands::Test {
            smoke,
            unit,
            integration,
            phase,
            coverage,
            start_server,
            port,
        } => cmd::test::run(
            &root,
            &config_path,
            cmd::test::TestArgs {
                smoke,
                unit,
                integration,
                phase,
                coverage,
                start_server,
                port,
            },
            cli.json,
        )
        .map(|outcome| outcome.exit_code()),
        Commands::PatchRoutes { app } => cmd::patch::run(&app, cli.json).map(|()| 0),
        Commands::Db { subcommand } => cmd::db::run(&root, subcommand, cli.json).map(|()| 0),
        Commands::Config { subcommand } => {
            cmd::config::run(&config_path, subcommand, cli.json).map(|()| 0)
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if let Some(output) = e
                .downcast_ref::<DeployError>()
                .and_then(DeployError::command_output)
            {
                eprintln!("{output}");
            }
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
