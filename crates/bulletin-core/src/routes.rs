//! Native route-table patch for the bulletin API application file.
//!
//! Adds the calendar/lectionary imports and the `/api/lectionary/{date}` and
//! `/api/calendar/{date}` endpoints to `app.py`. Running it against an
//! already patched file changes nothing.

use crate::error::Result;
use crate::io;
use std::path::Path;

/// Presence of this text means the file is already patched.
const PATCH_MARKER: &str = "calendar_service";

const IMPORT_BLOCK: &str = r#"
# Phase 2: Liturgical Calendar + Lectionary
from modules.calendar_service import get_calendar_info
from modules.lectionary_service import LectionaryService
import os

# Initialize lectionary service (offline-first)
_lectionary = LectionaryService(
    redis_url=os.getenv("REDIS_URL", "redis://redis:6379"),
    daily_office_path=os.getenv("DAILY_OFFICE_PATH", "/app/data/daily-office"),
    lectserve_base=os.getenv("LECTSERVE_URL", "https://lectserve.com"),
)
"#;

const ENDPOINT_BLOCK: &str = r#"

# =====================================================================
# PHASE 2: LECTIONARY ENDPOINTS
# =====================================================================

@app.get("/api/lectionary/{date_str}")
async def get_lectionary(date_str: str):
    """Get liturgical calendar info and RCL readings for a date (YYYY-MM-DD)."""
    from datetime import datetime
    try:
        dt = datetime.strptime(date_str, "%Y-%m-%d").date()
    except ValueError:
        from fastapi import HTTPException
        raise HTTPException(status_code=400, detail="Invalid date. Use YYYY-MM-DD.")
    cal = get_calendar_info(dt)
    readings = _lectionary.get_readings(dt, day_name=cal.get("day_name"))
    return {"date": dt.isoformat(), "calendar": cal, "readings": readings}


@app.get("/api/calendar/{date_str}")
async def get_calendar(date_str: str):
    """Get liturgical calendar info only (YYYY-MM-DD)."""
    from datetime import datetime
    try:
        dt = datetime.strptime(date_str, "%Y-%m-%d").date()
    except ValueError:
        from fastapi import HTTPException
        raise HTTPException(status_code=400, detail="Invalid date. Use YYYY-MM-DD.")
    return get_calendar_info(dt)
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Patched,
    AlreadyPatched,
}

/// Patch the application file at `path` in place.
pub fn patch_app(path: &Path) -> Result<PatchOutcome> {
    let content = io::read_text(path)?;
    match patch_source(&content) {
        Some(patched) => {
            io::atomic_write(path, patched.as_bytes())?;
            tracing::info!(path = %path.display(), "app patched with lectionary endpoints");
            Ok(PatchOutcome::Patched)
        }
        None => Ok(PatchOutcome::AlreadyPatched),
    }
}

/// Patched source text, or `None` if `content` is already patched.
pub fn patch_source(content: &str) -> Option<String> {
    if content.contains(PATCH_MARKER) {
        return None;
    }

    let mut lines: Vec<&str> = content.split('\n').collect();
    let insert_at = lines
        .iter()
        .rposition(|l| l.starts_with("from modules."))
        .map(|i| i + 1)
        .or_else(|| lines.iter().position(|l| l.starts_with("app = FastAPI")))
        .unwrap_or(0);
    lines.insert(insert_at, IMPORT_BLOCK);
    let with_imports = lines.join("\n");

    let patched = match with_imports.find("if __name__") {
        Some(pos) => {
            let (head, tail) = with_imports.split_at(pos);
            format!("{head}{ENDPOINT_BLOCK}\n{tail}")
        }
        None => format!("{with_imports}{ENDPOINT_BLOCK}"),
    };
    Some(patched)
}
