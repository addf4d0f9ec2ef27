use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Max attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(usize),

    #[error("Unknown complexity tier '{0}' (expected one of: low, medium, high)")]
    UnknownComplexityTier(String),
}

/// How demanding a task is; decides the pass threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
}

impl ComplexityTier {
    pub const ALL: [ComplexityTier; 3] = [Self::Low, Self::Medium, Self::High];

    /// Minimum acceptable score for this tier
    pub fn threshold(self) -> f64 {
        match self {
            Self::Low => 0.7,
            Self::Medium => 0.8,
            Self::High => 0.9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexityTier {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(PolicyError::UnknownComplexityTier(s.to_string())),
        }
    }
}

/// Threshold for a tier given by name. Names outside the closed set fail.
pub fn resolve_threshold(tier: &str) -> Result<f64, PolicyError> {
    tier.parse::<ComplexityTier>().map(ComplexityTier::threshold)
}

/// Pass threshold and attempt budget for one run.
///
/// A run takes its policy by value, so nothing can change it mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    threshold: f64,
    max_attempts: usize,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl Policy {
    pub fn new(threshold: f64, max_attempts: usize) -> Result<Self, PolicyError> {
        let policy = Self {
            threshold,
            max_attempts,
            metadata: BTreeMap::new(),
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn for_tier(tier: ComplexityTier, max_attempts: usize) -> Result<Self, PolicyError> {
        Ok(Self::new(tier.threshold(), max_attempts)?.with_metadata("complexity", tier.as_str()))
    }

    /// Attach an annotation carried through to the outcome
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the invariants. Needed for policies built through deserialization.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            // NaN fails the range check too
            return Err(PolicyError::InvalidThreshold(self.threshold));
        }
        if self.max_attempts == 0 {
            return Err(PolicyError::InvalidMaxAttempts(self.max_attempts));
        }
        Ok(())
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn is_met_by(&self, score: f64) -> bool {
        score >= self.threshold
    }
}
