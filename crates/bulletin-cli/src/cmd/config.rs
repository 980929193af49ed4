use crate::cmd::load_config;
use crate::output::{print_json, print_pairs};
use anyhow::Context;
use bulletin_core::config::DeployConfig;
use clap::Subcommand;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration (file values over defaults)
    Show,

    /// Write the default configuration if no config file exists
    Init,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config_path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(config_path, json),
        ConfigSubcommand::Init => init(config_path, json),
    }
}

fn show(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    if json {
        return print_json(&config);
    }

    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", config_path.display())
    };
    print_pairs(&[
        ("config", source),
        ("compose_command", config.compose_command.join(" ")),
        ("compose_file", config.compose_file.display().to_string()),
        ("build_services", config.build_services.join(" ")),
        ("settle_delay_secs", config.settle_delay_secs.to_string()),
        ("python", config.python.clone()),
        ("api_url", config.api_url.clone()),
        ("port", config.port.to_string()),
        ("startup_delay_secs", config.startup_delay_secs.to_string()),
        ("health_attempts", config.health_attempts.to_string()),
        ("health_interval_secs", config.health_interval_secs.to_string()),
        ("staging_dir", config.staging_dir.display().to_string()),
        (
            "route_patcher",
            config
                .route_patcher
                .as_ref()
                .map_or_else(|| "(built-in)".to_string(), |argv| argv.join(" ")),
        ),
        ("phase2_requirements", config.phase2_requirements.join(" ")),
        ("smoke_packages", config.smoke_packages.join(" ")),
        ("calendar_remediation", config.calendar_remediation.join(" ")),
    ]);
    Ok(())
}

fn init(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let written = DeployConfig::default()
        .init(config_path)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "path": config_path,
            "created": written,
        }));
    }
    if written {
        println!("  created: {}", config_path.display());
    } else {
        println!("  exists:  {}", config_path.display());
    }
    Ok(())
}
