//! LLM judge capability: one async call "system prompt + user prompt (+ model) → text".
//!
//! Concrete backends: any OpenAI-compatible Chat Completions endpoint (Google, Groq,
//! Mistral all expose one), a disabled judge and a fixed-response mock. Callers only
//! see `DynJudge`, so tests can plug in their own doubles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::JudgeConfig;

/// Env switch that replaces every configured backend with `MockJudge`.
pub const ENV_AI_TEST_MODE: &str = "AI_TEST_MODE";

const MOCK_RESPONSE: &str =
    r#"{"score": 0, "analysis": "Neutral assessment: no suspicious pattern (mock)."}"#;

#[async_trait]
pub trait LlmJudge: Send + Sync {
    /// Submit the prompt pair; `model` overrides the backend's default model.
    /// The returned text is expected (not guaranteed) to be a JSON object.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: Option<&str>,
    ) -> Result<String>;

    /// Backend name for logs/metrics.
    fn name(&self) -> &str;
}

pub type DynJudge = Arc<dyn LlmJudge>;

/// True when `AI_TEST_MODE=mock`.
pub fn mock_mode() -> bool {
    std::env::var(ENV_AI_TEST_MODE)
        .map(|v| v == "mock")
        .unwrap_or(false)
}

/// Factory: build a judge from config.
///
/// * `AI_TEST_MODE=mock` → `MockJudge`.
/// * `enabled == false` → `DisabledJudge`.
/// * otherwise an OpenAI-compatible backend; a client build failure degrades to
///   `DisabledJudge` with a warning.
pub fn build_judge(cfg: &JudgeConfig) -> DynJudge {
    if mock_mode() {
        return Arc::new(MockJudge::new(&cfg.name, MOCK_RESPONSE));
    }
    if !cfg.enabled {
        return Arc::new(DisabledJudge::new(&cfg.name));
    }
    match OpenAiCompatJudge::from_config(cfg) {
        Ok(j) => Arc::new(j),
        Err(e) => {
            warn!(judge = %cfg.name, error = ?e, "judge backend unavailable, disabling");
            Arc::new(DisabledJudge::new(&cfg.name))
        }
    }
}

// ------------------------------------------------------------
// OpenAI-compatible backend
// ------------------------------------------------------------

pub struct OpenAiCompatJudge {
    name: String,
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiCompatJudge {
    pub fn from_config(cfg: &JudgeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("proctor-risk-fusion/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.request_timeout_secs.max(1)))
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            name: cfg.name.clone(),
            http,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

#[async_trait]
impl LlmJudge for OpenAiCompatJudge {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: Option<&str>,
    ) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("judge {} has no API key", self.name);
        }

        let req = ChatReq {
            model: model.unwrap_or(&self.model),
            messages: vec![
                Msg {
                    role: "system",
                    content: system_prompt,
                },
                Msg {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.name))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", self.name))?;

        let body: ChatResp = resp
            .json()
            .await
            .with_context(|| format!("{} response is not a chat completion", self.name))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("{} returned no content", self.name))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Always fails; stands in for a backend switched off in config.
pub struct DisabledJudge {
    name: String,
}

impl DisabledJudge {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl LlmJudge for DisabledJudge {
    async fn complete(&self, _: &str, _: &str, _: Option<&str>) -> Result<String> {
        bail!("judge {} is disabled", self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Returns the same text for every call.
#[derive(Clone)]
pub struct MockJudge {
    name: String,
    fixed: String,
}

impl MockJudge {
    pub fn new(name: impl Into<String>, fixed: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed: fixed.into(),
        }
    }
}

#[async_trait]
impl LlmJudge for MockJudge {
    async fn complete(&self, _: &str, _: &str, _: Option<&str>) -> Result<String> {
        Ok(self.fixed.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ------------------------------------------------------------
// Sanitization
// ------------------------------------------------------------

/// Trim and drop a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return t;
    };
    // Drop the info string ("json") on the opening line.
    match body.find('\n') {
        Some(nl) => body[nl + 1..].trim(),
        None => body.trim(),
    }
}
