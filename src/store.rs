//! File I/O: roster, ML scores and activity logs in; processed batch out.
//!
//! The batch file is a bare JSON array written atomically (temp file + rename).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::activity::{ActivityEvent, ActivityLogFile};
use crate::fusion::Fused;
use crate::record::{
    AlgorithmScore, CandidateId, CandidateInfo, CandidateResult, LlmVerdict, MlScore,
    DEFAULT_CANDIDATE_NAME, DEFAULT_EXAM_DATE, DEFAULT_EXAM_NAME, NO_ANALYSIS,
};
use crate::repair::parse_lenient;

/// Write the whole batch or nothing.
pub fn save_results(path: &Path, results: &[CandidateResult]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(results).context("serializing results")?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// Copy an existing batch file to `<stem>.<UTC timestamp>.json` before it is
/// overwritten. `Ok(None)` when there is nothing to keep.
pub fn backup_previous_results(path: &Path, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("processed_candidates");
    let backup = path.with_file_name(format!("{stem}.{}.json", now.format("%Y%m%dT%H%M%SZ")));
    fs::copy(path, &backup)
        .with_context(|| format!("backing up {} to {}", path.display(), backup.display()))?;
    Ok(Some(backup))
}

/// Persisted record with every field optional except `id`.
#[derive(Deserialize)]
struct StoredCandidate {
    id: CandidateId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    overall_score: f64,
    #[serde(default)]
    overall_analysis: Option<String>,
    #[serde(default)]
    exam_name: Option<String>,
    #[serde(default)]
    exam_date: Option<String>,
    #[serde(default)]
    ai_based_proctoring: Option<LlmVerdict>,
    #[serde(default)]
    algorithm_based_proctoring: Option<AlgorithmScore>,
    #[serde(default)]
    ml_based_proctoring: Option<MlScore>,
}

impl From<StoredCandidate> for CandidateResult {
    fn from(s: StoredCandidate) -> Self {
        let info = CandidateInfo {
            id: s.id,
            name: s.name.unwrap_or_else(|| DEFAULT_CANDIDATE_NAME.to_string()),
            exam_name: s.exam_name.unwrap_or_else(|| DEFAULT_EXAM_NAME.to_string()),
            exam_date: s.exam_date.unwrap_or_else(|| DEFAULT_EXAM_DATE.to_string()),
        };
        let llm = s.ai_based_proctoring.unwrap_or(LlmVerdict {
            score: 0,
            analysis: NO_ANALYSIS.to_string(),
            source: None,
        });
        let overall_score = if s.overall_score.is_finite() {
            s.overall_score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let mut r = CandidateResult::assemble(
            &info,
            // status/color are derived, never trusted from disk
            Fused::from_score(overall_score),
            llm,
            s.algorithm_based_proctoring
                .unwrap_or_else(AlgorithmScore::unavailable),
            s.ml_based_proctoring.unwrap_or_default(),
        );
        if let Some(a) = s.overall_analysis {
            r.overall_analysis = a;
        }
        r
    }
}

/// Reload a processed batch, defaulting missing fields.
pub fn load_results(path: &Path) -> Result<Vec<CandidateResult>> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let stored: Vec<StoredCandidate> =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(stored.into_iter().map(CandidateResult::from).collect())
}

pub fn load_roster(path: &Path) -> Result<Vec<CandidateInfo>> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing roster {}", path.display()))
}

#[derive(Deserialize)]
struct MlScoresFile {
    candidates: Vec<MlEntry>,
}

#[derive(Deserialize)]
struct MlEntry {
    id: CandidateId,
    score: f64,
}

/// `{"candidates": [{"id": .., "score": ..}]}` → id (as string) → score.
pub fn load_ml_scores(path: &Path) -> Result<HashMap<String, f64>> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file: MlScoresFile =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(file
        .candidates
        .into_iter()
        .map(|e| (e.id.to_string(), e.score))
        .collect())
}

pub fn activity_log_path(data_dir: &Path, id: &CandidateId) -> PathBuf {
    data_dir.join(format!("candidate{id}.json"))
}

/// Load `<data_dir>/candidate<id>.json`. Missing or unreadable logs (even after
/// a repair attempt) yield an empty log.
pub fn load_activity_log(data_dir: &Path, id: &CandidateId) -> Vec<ActivityEvent> {
    let path = activity_log_path(data_dir, id);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!(candidate = %id, path = %path.display(), error = %e, "activity log not found");
            return Vec::new();
        }
    };
    let parsed = parse_lenient(&content)
        .and_then(|v| serde_json::from_value::<ActivityLogFile>(v).map_err(Into::into));
    match parsed {
        Ok(f) => f.activity_log,
        Err(e) => {
            warn!(candidate = %id, error = ?e, "invalid activity log");
            Vec::new()
        }
    }
}
