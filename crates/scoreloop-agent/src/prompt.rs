use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Task text plus the structured context the generator needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// True when there is no task text to send
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Short single-line preview for logs
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() > max_chars {
            let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", cut)
        } else {
            flat
        }
    }

    /// Render the text sent to the generator.
    /// Retries carry the previous attempt's feedback.
    pub fn render(&self, prior_feedback: Option<&str>) -> String {
        let mut out = self.text.trim().to_string();

        if !self.context.is_empty() {
            out.push_str("\n\n## Context\n");
            for (key, value) in &self.context {
                out.push_str(&format!("{}: {}\n", key.to_uppercase(), value));
            }
        }

        if let Some(feedback) = prior_feedback {
            out.push_str(&format!(
                r#"

## Previous Attempt Feedback
{feedback}

Your previous answer did not reach the required quality. Address the feedback above and produce a complete, improved answer."#,
                feedback = feedback.trim(),
            ));
        }

        out
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
