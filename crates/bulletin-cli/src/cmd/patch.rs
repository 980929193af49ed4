use crate::output::print_json;
use anyhow::Context;
use bulletin_core::routes::{self, PatchOutcome};
use std::path::Path;

pub fn run(app: &Path, json: bool) -> anyhow::Result<()> {
    let outcome =
        routes::patch_app(app).with_context(|| format!("failed to patch {}", app.display()))?;

    if json {
        let patched = outcome == PatchOutcome::Patched;
        return print_json(&serde_json::json!({
            "path": app,
            "patched": patched,
        }));
    }
    match outcome {
        PatchOutcome::Patched => println!("patched: {}", app.display()),
        PatchOutcome::AlreadyPatched => println!("already patched: {}", app.display()),
    }
    Ok(())
}
