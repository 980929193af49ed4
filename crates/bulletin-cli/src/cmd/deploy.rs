use crate::cmd::{load_config, rel};
use crate::output::{indented, print_json};
use anyhow::Context;
use bulletin_core::{
    deploy::{DeployEvent, DeployOptions, Deployer},
    manifest::FileCheck,
    paths::Layout,
    provision::{DirReport, DirStatus},
    runner::SystemRunner,
    smoke::SmokeResult,
    types::DeployPhase,
};
use serde::Serialize;
use std::path::Path;

pub struct DeployArgs {
    pub phase: u8,
    pub skip_build: bool,
    pub skip_deploy: bool,
    pub local_test: bool,
}

#[derive(Default, Serialize)]
struct DeployReport {
    phase: u8,
    directories: Vec<DirReport>,
    files: Vec<FileCheck>,
    requirements_added: Vec<String>,
    smoke: Vec<SmokeResult>,
    status: Option<String>,
}

pub fn run(root: &Path, config_path: &Path, args: DeployArgs, json: bool) -> anyhow::Result<()> {
    let phase = DeployPhase::from_number(args.phase)
        .with_context(|| format!("unsupported deploy phase {}", args.phase))?;
    let config = load_config(config_path)?;
    let layout = Layout::new(root);
    let opts = DeployOptions {
        phase,
        skip_build: args.skip_build,
        skip_deploy: args.skip_deploy,
        local_test_only: args.local_test,
    };

    if !json {
        println!("Deploying {phase} in: {}", root.display());
    }

    let mut report = DeployReport {
        phase: phase.number(),
        ..DeployReport::default()
    };
    let mut section = "";
    // keep stdout clean for the JSON report
    let runner = SystemRunner::new().echo_to_stderr(json);
    let result = Deployer::new(&layout, &config, &runner).run(&opts, &mut |event| {
        if !json {
            let title = heading(&event);
            if !title.is_empty() && title != section {
                println!("\n{title}");
                section = title;
            }
            print_event(root, &event);
        }
        record(&mut report, event);
    });

    if json {
        // report what happened up to a failure too
        print_json(&report)?;
    }
    result.context("deploy failed")?;

    if !json {
        if opts.local_test_only {
            println!("\nLocal test passed. Re-run without --local-test to build and start the stack.");
        } else {
            println!("\nDeploy complete.");
        }
    }
    Ok(())
}

fn heading(event: &DeployEvent) -> &'static str {
    match event {
        DeployEvent::Directory(_) => "Directories:",
        DeployEvent::File(_) => "Required files:",
        DeployEvent::ModuleCopied { .. }
        | DeployEvent::RequirementsAppended(_)
        | DeployEvent::RoutesPatched(_) => "Phase 2 modules:",
        DeployEvent::SmokePassed(_) => "Local smoke test:",
        DeployEvent::BuildStarted(_) | DeployEvent::ImagesBuilt => "Build:",
        DeployEvent::StackStarted | DeployEvent::Settling(_) | DeployEvent::Status(_) => {
            "Containers:"
        }
        DeployEvent::Skipped(_) => "",
    }
}

fn print_event(root: &Path, event: &DeployEvent) {
    match event {
        DeployEvent::Directory(r) => match r.status {
            DirStatus::Created => println!("  created: {}", rel(root, &r.path).display()),
            DirStatus::Exists => println!("  exists:  {}", rel(root, &r.path).display()),
        },
        DeployEvent::File(c) if c.present => println!("  ok:      {}", rel(root, &c.path).display()),
        DeployEvent::File(c) => println!("  missing: {}", rel(root, &c.path).display()),
        DeployEvent::ModuleCopied { source, dest } => println!(
            "  copied:  {} -> {}",
            rel(root, source).display(),
            rel(root, dest).display()
        ),
        DeployEvent::RequirementsAppended(added) if added.is_empty() => {
            println!("  requirements already listed")
        }
        DeployEvent::RequirementsAppended(added) => {
            println!("  requirements added: {}", added.join(", "))
        }
        DeployEvent::RoutesPatched(output) => {
            println!("  routes patched");
            if !output.is_empty() {
                println!("{}", indented(output));
            }
        }
        DeployEvent::SmokePassed(r) => {
            let note = if r.remediated {
                " (after installing missing packages)"
            } else {
                ""
            };
            println!("  {}: ok{note}", r.name);
            if !r.output.is_empty() {
                println!("{}", indented(&r.output));
            }
        }
        DeployEvent::BuildStarted(services) => println!("  building: {}", services.join(" ")),
        DeployEvent::ImagesBuilt => println!("  images built"),
        DeployEvent::StackStarted => println!("  started"),
        DeployEvent::Settling(delay) => {
            println!("  waiting {}s for services to settle", delay.as_secs())
        }
        DeployEvent::Status(ps) => println!("{}", ps.trim_end()),
        DeployEvent::Skipped(step) => println!("  skipped: {step}"),
    }
}

fn record(report: &mut DeployReport, event: DeployEvent) {
    match event {
        DeployEvent::Directory(r) => report.directories.push(r),
        DeployEvent::File(c) => report.files.push(c),
        DeployEvent::RequirementsAppended(added) => report.requirements_added = added,
        DeployEvent::SmokePassed(r) => report.smoke.push(r),
        DeployEvent::Status(ps) => report.status = Some(ps),
        _ => {}
    }
}
