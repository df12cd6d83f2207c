// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod activity;
pub mod api;
pub mod config;
pub mod consensus;
pub mod fusion;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod repair;
pub mod rules;
pub mod store;
pub mod weights;

// ---- Re-exports for stable public API ----
pub use crate::activity::ActivityEvent;
pub use crate::api::router;
pub use crate::consensus::{ConsensusSynthesizer, Judgment};
pub use crate::fusion::{fuse, ComponentScores, RiskTier};
pub use crate::llm::{DynJudge, LlmJudge};
pub use crate::pipeline::CandidateAnalyzer;
pub use crate::record::{CandidateInfo, CandidateResult};
