/// Prompt templates for the judge
pub struct CriticPrompts;

/// Rubric used when none is configured
pub const DEFAULT_RUBRIC: &str = "Accuracy, completeness, safety and clarity of the answer for the task as stated.";

impl CriticPrompts {
    /// Build the prompt asking the judge to score one response
    pub fn build_scoring_prompt(
        task: &str,
        response: &str,
        rubric: Option<&str>,
        attempt_number: usize,
    ) -> String {
        format!(
            r#"You are a strict evaluator. Score the response below against the rubric.

## Task
{task}

## Rubric
{rubric}

## Response (attempt {attempt})
```
{response}
```

---

Score from 0.0 (unusable) to 1.0 (fully meets the rubric). Be specific in your feedback: it is handed to the author of the next attempt.

End your answer with a judgment block:

<judgment>
{{"score": 0.0, "feedback": "What is missing or wrong, and how to fix it"}}
</judgment>"#,
            task = task,
            rubric = rubric.unwrap_or(DEFAULT_RUBRIC),
            attempt = attempt_number,
            response = truncate_output(response, 20000),
        )
    }
}

fn truncate_output(output: &str, max_len: usize) -> &str {
    if output.len() <= max_len {
        return output;
    }
    let mut cut = max_len;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    // Prefer a line boundary
    match output[..cut].rfind('\n') {
        Some(pos) => &output[..pos],
        None => &output[..cut],
    }
}
