//! Repair of hand-exported candidate log files that are not quite JSON, e.g.
//! `activityLog: [ {...}, {...},` with no braces and a missing `]`.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\],\s*$").unwrap());
static RE_TRAILING_COMMA_BRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\],\s*\}$").unwrap());

/// Best-effort textual fix-up; the result is not guaranteed to parse.
pub fn fix_json_content(content: &str) -> String {
    let mut out = content.replace('\u{feff}', "").trim().to_string();

    if out.starts_with("activityLog") {
        out = format!("\"activityLog\"{}", &out["activityLog".len()..]);
    } else if !out.starts_with("\"activityLog") && !out.starts_with('{') {
        warn!("content does not start with activityLog");
    }

    let open = out.matches('[').count();
    let close = out.matches(']').count();
    if open > close {
        out.push_str(&"]".repeat(open - close));
    }

    out = RE_TRAILING_COMMA.replace(&out, "]").into_owned();
    out = RE_TRAILING_COMMA_BRACE.replace(&out, "]}").into_owned();

    if !out.starts_with('{') {
        out.insert(0, '{');
    }
    if !out.ends_with('}') {
        out.push('}');
    }
    out
}

/// Parse `content` as-is, or after `fix_json_content`.
pub fn parse_lenient(content: &str) -> Result<serde_json::Value> {
    match serde_json::from_str(content) {
        Ok(v) => Ok(v),
        Err(_) => serde_json::from_str(&fix_json_content(content))
            .context("content is not valid JSON even after repair"),
    }
}

/// Repair a file in place. Returns `Ok(true)` when the file was rewritten,
/// `Ok(false)` when it was already valid. A `.backup` copy is kept while
/// working and restored if the repaired text still does not parse.
pub fn repair_file(path: &Path) -> Result<bool> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if serde_json::from_str::<serde_json::Value>(&content).is_ok() {
        return Ok(false);
    }

    let backup = path.with_extension("json.backup");
    fs::write(&backup, &content).with_context(|| format!("writing {}", backup.display()))?;

    let fixed = fix_json_content(&content);
    match serde_json::from_str::<serde_json::Value>(&fixed) {
        Ok(v) => {
            let pretty = serde_json::to_string_pretty(&v)?;
            fs::write(path, pretty).with_context(|| format!("writing {}", path.display()))?;
            let _ = fs::remove_file(&backup);
            info!(path = %path.display(), "repaired log file");
            Ok(true)
        }
        Err(e) => {
            fs::rename(&backup, path)
                .with_context(|| format!("restoring {}", path.display()))?;
            Err(anyhow::Error::new(e).context(format!("unrepairable JSON in {}", path.display())))
        }
    }
}

/// Run `repair_file` over every `candidate*.json` in `dir`.
/// Returns (repaired, failed); failures are logged and skipped.
pub fn repair_dir(dir: &Path) -> Result<(usize, usize)> {
    let mut repaired = 0;
    let mut failed = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_candidate = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("candidate") && n.ends_with(".json"));
        if !is_candidate {
            continue;
        }
        match repair_file(&path) {
            Ok(true) => repaired += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "repair failed");
                failed += 1;
            }
        }
    }
    Ok((repaired, failed))
}
