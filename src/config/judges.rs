// src/config/judges.rs
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_enabled() -> bool {
    true
}
fn default_request_timeout_secs() -> u64 {
    60
}

/// One OpenAI-compatible judge backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Short name: "google" | "groq" | "mistral" | custom.
    pub name: String,
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    pub model: String,
    /// "ENV" means: read from `<NAME>_API_KEY` (e.g. GOOGLE_API_KEY).
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// HTTP-level timeout; the synthesizer applies its own per-call timeout too.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl JudgeConfig {
    /// Env var holding the key when `api_key == "ENV"`.
    pub fn api_key_env_var(&self) -> String {
        let name: String = self
            .name
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{name}_API_KEY")
    }

    /// Resolve an "ENV" key. A missing variable leaves the key empty: the judge
    /// then fails per call instead of aborting startup.
    pub(crate) fn resolve_api_key(&mut self) {
        if !self.api_key.trim().eq_ignore_ascii_case("env") {
            return;
        }
        let var = self.api_key_env_var();
        self.api_key = match env::var(&var) {
            Ok(k) => k.trim().to_string(),
            Err(_) => {
                if self.enabled {
                    warn!(judge = %self.name, env = %var, "API key env var missing");
                }
                String::new()
            }
        };
    }
}

/// Google (enabled), Groq (disabled), Mistral (enabled).
pub fn default_judges() -> Vec<JudgeConfig> {
    vec![
        JudgeConfig {
            name: "google".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            model: "gemini-2.0-pro-exp-02-05".into(),
            api_key: default_api_key(),
            temperature: Some(0.6),
            enabled: true,
            request_timeout_secs: default_request_timeout_secs(),
        },
        JudgeConfig {
            name: "groq".into(),
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "deepseek-r1-distill-llama-70b-specdec".into(),
            api_key: default_api_key(),
            temperature: None,
            enabled: false,
            request_timeout_secs: default_request_timeout_secs(),
        },
        JudgeConfig {
            name: "mistral".into(),
            base_url: "https://api.mistral.ai/v1".into(),
            model: "mistral-large-latest".into(),
            api_key: default_api_key(),
            temperature: Some(0.6),
            enabled: true,
            request_timeout_secs: default_request_timeout_secs(),
        },
    ]
}
