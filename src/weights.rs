//! # Activity Weights
//!
//! Immutable mapping from an activity description (as emitted by the proctoring
//! recorder, e.g. "Cell phone detected") to an a-priori suspicion weight.
//!
//! - Lookup is exact and case-sensitive after trimming surrounding whitespace.
//! - Unknown descriptions weigh `0.0`; they never produce an error.
//! - Loads from a JSON or TOML file; falls back to `default_seed()`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};
use tracing::warn;

/// Description → suspicion weight table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivityWeightTable {
    #[serde(default)]
    weights: HashMap<String, f64>,
}

impl ActivityWeightTable {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let weights = pairs
            .into_iter()
            .map(|(k, v)| (k.into().trim().to_string(), v.max(0.0)))
            .collect();
        Self { weights }
    }

    /// Parse a table from a file. Format is picked by extension (`.toml` or JSON).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading activity weights from {}", path.display()))?;
        let is_toml = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        let parsed: Self = if is_toml {
            toml::from_str(&content)
                .with_context(|| format!("parsing TOML weights {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON weights {}", path.display()))?
        };
        Ok(Self::from_pairs(parsed.weights))
    }

    /// Load from `path` if given, otherwise (or on error) use the built-in seed.
    pub fn load_or_seed(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                warn!(error = ?e, "activity weights unreadable, using built-in table");
                Self::default_seed()
            }),
            None => Self::default_seed(),
        }
    }

    /// Suspicion weight for a description; `0.0` when unknown.
    pub fn weight_for(&self, description: &str) -> f64 {
        self.weights
            .get(description.trim())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Built-in table used when no weights file is configured.
    pub fn default_seed() -> Self {
        Self::from_pairs([
            // High suspicion
            ("Cell phone detected", 10.0),
            ("Browser window swapped", 9.0),
            ("Copy", 7.0),
            ("Cut", 7.0),
            ("Paste", 10.0),
            ("Laptop detected", 10.0),
            ("No face detected", 8.0),
            ("Tab change detected", 8.0),
            ("Window change detected", 8.0),
            // Medium-high
            ("Display change detected", 5.0),
            // Medium
            ("Window focus changed", 2.0),
            ("Candidate looking left", 2.0),
            // Low
            ("Candidate looking right", 1.0),
            ("Candidate looking down", 1.0),
            ("Candidate looking up", 1.0),
            ("Candidate iris looking left", 1.0),
            ("Candidate iris looking right", 1.0),
        ])
    }
}

impl Default for ActivityWeightTable {
    fn default() -> Self {
        Self::default_seed()
    }
}
