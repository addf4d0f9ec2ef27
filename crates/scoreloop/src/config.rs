//! Project configuration file support for scoreloop.
//!
//! Loads configuration from `scoreloop.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use scoreloop_core::{ComplexityTier, Policy, PolicyError};

/// Attempt budget when neither the CLI nor the config file sets one
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Tier used when no threshold or tier is given anywhere
pub const DEFAULT_TIER: ComplexityTier = ComplexityTier::Medium;

/// Project-level configuration loaded from `scoreloop.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub generator: CommandSection,
    #[serde(default)]
    pub scorer: ScorerSection,
}

/// Default pass policy for runs started from this project
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Complexity tier name (low, medium, high)
    pub tier: Option<String>,
    /// Explicit threshold; wins over `tier`
    pub threshold: Option<f64>,
    pub max_attempts: Option<usize>,
}

/// An external command used as a collaborator
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CommandSection {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-call limit, e.g. "45s" or "2m"
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ScorerSection {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// Rubric text handed to the judge
    pub rubric: Option<String>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "scoreloop.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }
}

impl PolicyConfig {
    /// Build the policy for one run.
    /// Priority: CLI threshold > CLI tier > file threshold > file tier > default tier
    pub fn resolve(
        &self,
        cli_threshold: Option<f64>,
        cli_tier: Option<ComplexityTier>,
        cli_max_attempts: Option<usize>,
    ) -> Result<Policy, PolicyError> {
        let max_attempts = cli_max_attempts
            .or(self.max_attempts)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        if let Some(threshold) = cli_threshold {
            return Policy::new(threshold, max_attempts);
        }
        if let Some(tier) = cli_tier {
            return Policy::for_tier(tier, max_attempts);
        }
        if let Some(threshold) = self.threshold {
            return Policy::new(threshold, max_attempts);
        }
        let tier = match self.tier.as_deref() {
            Some(name) => name.parse::<ComplexityTier>()?,
            None => DEFAULT_TIER,
        };
        Policy::for_tier(tier, max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
[policy]
tier = "high"
max_attempts = 5

[generator]
command = "llm"
args = ["-m", "gpt-4o", "{prompt}"]
timeout = "45s"

[scorer]
command = "judge"
timeout = "2m"
rubric = "Clinical accuracy"
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.policy.tier.as_deref(), Some("high"));
        assert_eq!(config.generator.command.as_deref(), Some("llm"));
        assert_eq!(config.generator.args.len(), 3);
        assert_eq!(config.generator.timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.scorer.timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.scorer.rubric.as_deref(), Some("Clinical accuracy"));

        let policy = config.policy.resolve(None, None, None).unwrap();
        assert_eq!(policy.threshold(), 0.9);
        assert_eq!(policy.max_attempts(), 5);
    }

    #[test]
    fn test_unknown_field_is_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[generator]\nbinary = \"llm\"\n",
        )
        .unwrap();
        assert!(ProjectConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_resolve_priority() {
        let config = PolicyConfig {
            tier: Some("low".into()),
            threshold: Some(0.75),
            max_attempts: Some(4),
        };

        let policy = config.resolve(Some(0.6), Some(ComplexityTier::High), None).unwrap();
        assert_eq!(policy.threshold(), 0.6);
        assert_eq!(policy.max_attempts(), 4);

        let policy = config.resolve(None, Some(ComplexityTier::High), Some(2)).unwrap();
        assert_eq!(policy.threshold(), 0.9);
        assert_eq!(policy.max_attempts(), 2);

        let policy = config.resolve(None, None, None).unwrap();
        assert_eq!(policy.threshold(), 0.75);
    }

    #[test]
    fn test_resolve_defaults() {
        let policy = PolicyConfig::default().resolve(None, None, None).unwrap();
        assert_eq!(policy.threshold(), DEFAULT_TIER.threshold());
        assert_eq!(policy.max_attempts(), DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_resolve_unknown_tier_in_file() {
        let config = PolicyConfig {
            tier: Some("extreme".into()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve(None, None, None),
            Err(PolicyError::UnknownComplexityTier("extreme".into()))
        );
    }
}
