mod judgment;
mod prompts;
pub mod scorer;

pub use judgment::{Judgment, JudgmentParseError};
pub use prompts::CriticPrompts;
pub use scorer::{CommandScorer, Scorer, ScoringError, ScoringInput};
