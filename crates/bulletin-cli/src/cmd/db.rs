use crate::output::print_json;
use anyhow::Context;
use bulletin_core::{io, paths::Layout, schema};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum DbSubcommand {
    /// Create the bulletin tables if they don't exist
    Init {
        /// Database file (default: <root>/bulletin-backend/data/bulletins.db)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: DbSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DbSubcommand::Init { path } => init(root, path, json),
    }
}

fn init(root: &Path, path: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(|| Layout::new(root).database_file());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        io::ensure_dir(parent)?;
    }
    let existed = path.exists();
    schema::open(&path).with_context(|| format!("failed to initialise {}", path.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "path": path,
            "created": !existed,
        }));
    }
    if existed {
        println!("  exists:  {} (schema up to date)", path.display());
    } else {
        println!("  created: {}", path.display());
    }
    Ok(())
}
