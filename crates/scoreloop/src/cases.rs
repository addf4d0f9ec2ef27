//! Batch input: several prompts, each with its own complexity tier.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use scoreloop_core::{ComplexityTier, Outcome, Policy, PolicyError, Prompt, REJECTED_EXIT_CODE};

/// A cases file: a list of `[[case]]` tables
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseFile {
    #[serde(rename = "case", default)]
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Case {
    pub id: String,
    /// Complexity tier name; checked per case so one bad entry does not sink the batch
    pub tier: String,
    pub prompt: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    pub max_attempts: Option<usize>,
}

/// Result of one case for reporting
#[derive(Debug, Serialize)]
pub struct CaseReport {
    pub case_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaseReport {
    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            Some(outcome) => outcome.exit_code(),
            None => REJECTED_EXIT_CODE,
        }
    }
}

impl CaseFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: CaseFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if file.cases.is_empty() {
            anyhow::bail!("{} contains no [[case]] entries", path.display());
        }
        Ok(file)
    }
}

impl Case {
    /// A fresh policy for this case only
    pub fn policy(&self, default_max_attempts: usize) -> Result<Policy, PolicyError> {
        let tier: ComplexityTier = self.tier.parse()?;
        Ok(
            Policy::for_tier(tier, self.max_attempts.unwrap_or(default_max_attempts))?
                .with_metadata("case_id", self.id.clone()),
        )
    }

    pub fn prompt(&self) -> Prompt {
        Prompt {
            text: self.prompt.clone(),
            context: self.context.clone(),
        }
    }
}
