//! Per-model token rates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compiled-in rate table, see `defaults.toml`.
const DEFAULT_TABLE: &str = include_str!("defaults.toml");

/// Prefix of the environment variables that override individual rates.
pub const PRICE_OVERRIDE_PREFIX: &str = "MODELLAB_PRICE";

/// Input/output rates in USD per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PricingEntry {
    pub input: f64,
    pub output: f64,
}

impl PricingEntry {
    pub fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    /// The all-zero rate attached to degraded responses.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Errors raised while building the pricing table.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Failed to parse pricing table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Default pricing model '{0}' has no entry in the table")]
    MissingDefault(String),

    #[error("Invalid rate for '{model}': {message}")]
    InvalidRate { model: String, message: String },
}

#[derive(Deserialize)]
struct RawTable {
    default: String,
    models: BTreeMap<String, PricingEntry>,
}

/// Which rate of an entry an override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKind {
    Input,
    Output,
}

impl RateKind {
    fn suffix(self) -> &'static str {
        match self {
            RateKind::Input => "INPUT",
            RateKind::Output => "OUTPUT",
        }
    }
}

/// Model identifier to rate mapping with a designated fallback entry.
///
/// Built once at startup and shared read-only afterwards. The default entry
/// is checked at construction, so [`PricingTable::lookup`] never fails.
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: BTreeMap<String, PricingEntry>,
    default_model: String,
}

impl PricingTable {
    /// Load the compiled-in table.
    pub fn builtin() -> Result<Self, PricingError> {
        Self::from_toml(DEFAULT_TABLE)
    }

    /// Parse a table from TOML with a top-level `default` key and a
    /// `[models."<provider>/<model>"]` section per entry.
    pub fn from_toml(content: &str) -> Result<Self, PricingError> {
        let raw: RawTable = toml::from_str(content)?;
        for (model, entry) in &raw.models {
            validate_entry(model, entry)?;
        }
        if !raw.models.contains_key(&raw.default) {
            return Err(PricingError::MissingDefault(raw.default));
        }
        Ok(Self {
            entries: raw.models,
            default_model: raw.default,
        })
    }

    /// Layer extra entries over the table, replacing any with the same key.
    pub fn merge(
        &mut self,
        extra: &BTreeMap<String, PricingEntry>,
    ) -> Result<(), PricingError> {
        for (model, entry) in extra {
            validate_entry(model, entry)?;
            self.entries.insert(model.clone(), *entry);
        }
        Ok(())
    }

    /// Apply per-entry rate overrides using a custom lookup function.
    ///
    /// For every entry, `MODELLAB_PRICE_<NORMALIZED>_INPUT` and `_OUTPUT` are
    /// looked up. Values that do not parse as a finite, non-negative number
    /// are ignored with a warning and the existing rate is kept.
    pub fn apply_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (model, entry) in self.entries.iter_mut() {
            for kind in [RateKind::Input, RateKind::Output] {
                let var = override_env_var_name(model, kind);
                let Some(raw) = lookup(&var) else {
                    continue;
                };
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                match raw.parse::<f64>() {
                    Ok(rate) if rate.is_finite() && rate >= 0.0 => {
                        tracing::info!(model = %model, var = %var, rate, "Applied pricing override");
                        match kind {
                            RateKind::Input => entry.input = rate,
                            RateKind::Output => entry.output = rate,
                        }
                    }
                    _ => {
                        tracing::warn!(
                            model = %model,
                            var = %var,
                            value = %raw,
                            "Ignoring invalid pricing override"
                        );
                    }
                }
            }
        }
    }

    /// Find the rates for a model.
    ///
    /// Tries the full identifier, then the segment after the last `/` against
    /// the same segment of every key (first key in sorted order wins), then
    /// falls back to the default entry.
    pub fn lookup(&self, model: &str) -> &PricingEntry {
        if let Some(entry) = self.entries.get(model) {
            return entry;
        }

        let wanted = trailing_segment(model);
        if let Some((_, entry)) = self
            .entries
            .iter()
            .find(|(key, _)| trailing_segment(key) == wanted)
        {
            return entry;
        }

        self.default_entry()
    }

    pub fn default_entry(&self) -> &PricingEntry {
        // Presence is checked by every constructor and entries are never removed.
        &self.entries[&self.default_model]
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// All entries in key order.
    pub fn entries(&self) -> &BTreeMap<String, PricingEntry> {
        &self.entries
    }
}

fn validate_entry(model: &str, entry: &PricingEntry) -> Result<(), PricingError> {
    for (name, rate) in [("input", entry.input), ("output", entry.output)] {
        if !rate.is_finite() || rate < 0.0 {
            return Err(PricingError::InvalidRate {
                model: model.to_string(),
                message: format!("{} rate must be a non-negative number, got {}", name, rate),
            });
        }
    }
    Ok(())
}

/// The part of a model identifier after its last `/`.
pub fn trailing_segment(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

/// Environment variable name overriding one rate of an entry.
///
/// - "openai/gpt-4o", input -> "MODELLAB_PRICE_GPT4O_INPUT"
/// - "anthropic/claude-3.5-sonnet", output -> "MODELLAB_PRICE_CLAUDE35SONNET_OUTPUT"
pub fn override_env_var_name(model: &str, kind: RateKind) -> String {
    let normalized: String = trailing_segment(model)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    format!("{}_{}_{}", PRICE_OVERRIDE_PREFIX, normalized, kind.suffix())
}
