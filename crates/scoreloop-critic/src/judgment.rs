use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The judge's verdict on one candidate response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Judgment {
    /// Quality score in [0, 1]
    score: f64,
    /// Why the response scored as it did
    feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    score: f64,
    #[serde(default)]
    feedback: Option<String>,
}

#[derive(Error, Debug)]
pub enum JudgmentParseError {
    #[error("No judgment found in judge output")]
    NoJudgmentFound,

    #[error("Failed to parse judgment JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Invalid judgment format: {0}")]
    InvalidFormat(String),

    #[error("Score {0} is outside [0, 1]")]
    ScoreOutOfRange(f64),
}

impl Judgment {
    pub fn new(score: f64, feedback: Option<String>) -> Result<Self, JudgmentParseError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(JudgmentParseError::ScoreOutOfRange(score));
        }
        let feedback = feedback
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        Ok(Self { score, feedback })
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn into_parts(self) -> (f64, Option<String>) {
        (self.score, self.feedback)
    }

    /// Parse a judgment from the judge's output text
    ///
    /// Expected format in judge output:
    /// ```text
    /// <judgment>
    /// {"score": 0.82, "feedback": "..."}
    /// </judgment>
    /// ```
    /// or plain marker lines:
    /// ```text
    /// SCORE: 0.82
    /// FEEDBACK: ...
    /// ```
    pub fn parse(judge_output: &str) -> Result<Self, JudgmentParseError> {
        debug!(output_len = judge_output.len(), "Parsing judgment");

        if let Some(judgment) = Self::parse_judgment_block(judge_output)? {
            return Ok(judgment);
        }

        Self::parse_markers(judge_output)
    }

    fn parse_judgment_block(output: &str) -> Result<Option<Self>, JudgmentParseError> {
        const OPEN: &str = "<judgment>";
        const CLOSE: &str = "</judgment>";

        // The last block wins: judges may echo the format example before their verdict
        let Some(start) = output.rfind(OPEN) else {
            return Ok(None);
        };
        let body_start = start + OPEN.len();

        match output[body_start..].find(CLOSE) {
            Some(len) => {
                let json_str = output[body_start..body_start + len].trim();
                debug!(json = json_str, "Found judgment block");
                let raw: RawJudgment = serde_json::from_str(json_str)?;
                Self::new(raw.score, raw.feedback).map(Some)
            }
            None if output.contains(CLOSE) => Err(JudgmentParseError::InvalidFormat(
                "Malformed judgment block".to_string(),
            )),
            None => Ok(None),
        }
    }

    fn parse_markers(output: &str) -> Result<Self, JudgmentParseError> {
        let score_line = output.lines().find_map(|line| {
            let trimmed = line.trim();
            let (key, value) = trimmed.split_once(':')?;
            key.trim().eq_ignore_ascii_case("score").then(|| value.trim())
        });

        let Some(raw_score) = score_line else {
            return Err(JudgmentParseError::NoJudgmentFound);
        };

        let score = Self::parse_score(raw_score)?;
        debug!(score, "Parsed judgment via markers");
        Self::new(score, Self::extract_feedback(output))
    }

    fn parse_score(raw: &str) -> Result<f64, JudgmentParseError> {
        let invalid = || JudgmentParseError::InvalidFormat(format!("Unreadable score: {}", raw));
        match raw.strip_suffix('%') {
            Some(percent) => percent
                .trim()
                .parse::<f64>()
                .map(|p| p / 100.0)
                .map_err(|_| invalid()),
            None => raw.parse::<f64>().map_err(|_| invalid()),
        }
    }

    fn extract_feedback(output: &str) -> Option<String> {
        let feedback_markers = ["Feedback:", "FEEDBACK:", "feedback:"];

        feedback_markers.iter().find_map(|marker| {
            let start = output.find(marker)? + marker.len();
            let end = output[start..]
                .find("\n\n")
                .map(|p| start + p)
                .unwrap_or(output.len());
            Some(output[start..end].trim().to_string())
        })
    }
}
