use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::activity::ActivityEvent;
use crate::fusion::RiskTier;
use crate::pipeline::{analyze_isolated, CandidateAnalyzer};
use crate::record::{CandidateInfo, CandidateResult};
use crate::store;

#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<CandidateAnalyzer>,
    results: Arc<RwLock<Vec<CandidateResult>>>,
    results_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(analyzer: Arc<CandidateAnalyzer>, results: Vec<CandidateResult>) -> Self {
        Self {
            analyzer,
            results: Arc::new(RwLock::new(results)),
            results_path: None,
        }
    }

    /// Seed from a processed batch file; a missing/broken file starts empty.
    pub fn from_results_file(analyzer: Arc<CandidateAnalyzer>, path: PathBuf) -> Self {
        let results = match store::load_results(&path) {
            Ok(r) => {
                info!(path = %path.display(), count = r.len(), "loaded processed candidates");
                r
            }
            Err(e) => {
                warn!(error = ?e, "no processed candidates loaded");
                Vec::new()
            }
        };
        let mut s = Self::new(analyzer, results);
        s.results_path = Some(path);
        s
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze))
        .route("/candidates", get(list_candidates))
        .route("/candidates/{id}", get(get_candidate))
        .route("/summary", get(summary))
        .route("/admin/reload", post(admin_reload))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct AnalyzeReq {
    #[serde(default)]
    candidate: Option<CandidateInfo>,
    #[serde(rename = "activityLog", default)]
    activity_log: Vec<ActivityEvent>,
    #[serde(default)]
    ml_score: Option<f64>,
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeReq>,
) -> Json<CandidateResult> {
    // Anonymous requests are answered but not added to the served batch.
    let keep = body.candidate.is_some();
    let info = body
        .candidate
        .unwrap_or_else(|| CandidateInfo::new("adhoc", "Unknown Candidate"));
    let result = analyze_isolated(
        Arc::clone(&state.analyzer),
        info,
        body.activity_log,
        body.ml_score,
    )
    .await;

    if keep {
        let mut guard = state.results.write().expect("rwlock poisoned");
        match guard.iter_mut().find(|r| r.id == result.id) {
            Some(slot) => *slot = result.clone(),
            None => guard.push(result.clone()),
        }
    }
    Json(result)
}

async fn list_candidates(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Vec<CandidateResult>>, (StatusCode, String)> {
    let wanted = match q.get("status").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => None,
        Some(s) if s.eq_ignore_ascii_case("all") => None,
        Some(s) => Some(
            RiskTier::parse(s)
                .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("unknown status '{s}'")))?,
        ),
    };
    let guard = state.results.read().expect("rwlock poisoned");
    let out = guard
        .iter()
        .filter(|r| wanted.map_or(true, |t| r.status == t))
        .cloned()
        .collect();
    Ok(Json(out))
}

async fn get_candidate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CandidateResult>, StatusCode> {
    let guard = state.results.read().expect("rwlock poisoned");
    guard
        .iter()
        .find(|r| r.id.to_string() == id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub total: usize,
    /// Count per tier label; every tier is present.
    pub counts: BTreeMap<String, usize>,
    /// Mean overall score (2 decimals), 0 for an empty batch.
    pub mean_overall_score: f64,
}

pub fn summarize(results: &[CandidateResult]) -> Summary {
    let mut counts: BTreeMap<String, usize> = RiskTier::ALL
        .iter()
        .map(|t| (t.label().to_string(), 0))
        .collect();
    for r in results {
        *counts.entry(r.status.label().to_string()).or_default() += 1;
    }
    let mean = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.overall_score).sum::<f64>() / results.len() as f64
    };
    Summary {
        total: results.len(),
        counts,
        mean_overall_score: (mean * 100.0).round() / 100.0,
    }
}

async fn summary(State(state): State<AppState>) -> Json<Summary> {
    let guard = state.results.read().expect("rwlock poisoned");
    Json(summarize(&guard))
}

async fn admin_reload(State(state): State<AppState>) -> (StatusCode, String) {
    let Some(path) = state.results_path.as_ref() else {
        return (StatusCode::CONFLICT, "no results file configured".to_string());
    };
    match store::load_results(path) {
        Ok(fresh) => {
            let n = fresh.len();
            match state.results.write() {
                Ok(mut w) => {
                    *w = fresh;
                    (StatusCode::OK, format!("reloaded {n}"))
                }
                Err(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed: lock poisoned".to_string(),
                ),
            }
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("failed: {e:#}")),
    }
}
