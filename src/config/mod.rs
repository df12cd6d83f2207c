// src/config/mod.rs
//! Application configuration, loaded from TOML with env overrides.
//!
//! Lookup order:
//! 1) `$PROCTOR_CONFIG_PATH` (must exist)
//! 2) `config/proctor.toml`
//! 3) built-in defaults

pub mod judges;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub use judges::{default_judges, JudgeConfig};

use crate::rules::{RuleParams, DEFAULT_EARLY_MULTIPLIER, DEFAULT_EARLY_WINDOW_SECS, DEFAULT_SCALE};

pub const DEFAULT_CONFIG_PATH: &str = "config/proctor.toml";
pub const ENV_CONFIG_PATH: &str = "PROCTOR_CONFIG_PATH";
pub const ENV_LLM_TIMEOUT_SECS: &str = "PROCTOR_LLM_TIMEOUT_SECS";
pub const ENV_BATCH_DELAY_SECS: &str = "PROCTOR_BATCH_DELAY_SECS";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scoring: ScoringConfig,
    pub llm: LlmConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub scale: f64,
    pub early_window_secs: u32,
    pub early_multiplier: f64,
    /// Optional JSON/TOML weight table replacing the built-in one.
    pub weights_path: Option<PathBuf>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            early_window_secs: DEFAULT_EARLY_WINDOW_SECS,
            early_multiplier: DEFAULT_EARLY_MULTIPLIER,
            weights_path: None,
        }
    }
}

impl ScoringConfig {
    pub fn rule_params(&self) -> RuleParams {
        RuleParams {
            scale: self.scale,
            early_window_secs: self.early_window_secs,
            early_multiplier: self.early_multiplier,
        }
        .sanitized()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Per-call timeout for every judge and the synthesis call.
    pub timeout_secs: u64,
    /// Name of the judge (from `judges`) that performs synthesis.
    pub synthesis_judge: String,
    /// Model override for the synthesis call.
    pub synthesis_model: Option<String>,
    pub judges: Vec<JudgeConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            synthesis_judge: "google".to_string(),
            synthesis_model: Some("gemini-2.0-flash-thinking-exp-01-21".to_string()),
            judges: default_judges(),
        }
    }
}

impl LlmConfig {
    pub fn synthesis_judge_config(&self) -> Option<&JudgeConfig> {
        self.judges
            .iter()
            .find(|j| j.name.eq_ignore_ascii_case(&self.synthesis_judge))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Directory holding `candidate<id>.json` logs.
    pub data_dir: PathBuf,
    pub candidates_path: PathBuf,
    pub ml_scores_path: PathBuf,
    pub output_path: PathBuf,
    /// Pause between candidates (provider rate limits).
    pub delay_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            candidates_path: PathBuf::from("candidates.json"),
            ml_scores_path: PathBuf::from("ml_based_proctoring.json"),
            output_path: PathBuf::from("processed_candidates.json"),
            delay_secs: 60,
        }
    }
}

impl AppConfig {
    /// Parse a TOML file, then apply env overrides and sanitization.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg.finish())
    }

    /// Resolve using env var + fallbacks (see module docs).
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            info!(path = %pb.display(), "loading config");
            return Self::load_from_file(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            info!(path = %default.display(), "loading config");
            return Self::load_from_file(&default);
        }
        info!("no config file, using built-in defaults");
        Ok(Self::default().finish())
    }

    fn finish(mut self) -> Self {
        if let Some(v) = env_u64(ENV_LLM_TIMEOUT_SECS) {
            self.llm.timeout_secs = v;
        }
        if let Some(v) = env_u64(ENV_BATCH_DELAY_SECS) {
            self.batch.delay_secs = v;
        }
        if self.llm.timeout_secs == 0 {
            self.llm.timeout_secs = LlmConfig::default().timeout_secs;
        }
        let params = self.scoring.rule_params();
        self.scoring.scale = params.scale;
        self.scoring.early_multiplier = params.early_multiplier;
        for j in &mut self.llm.judges {
            j.resolve_api_key();
        }
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
