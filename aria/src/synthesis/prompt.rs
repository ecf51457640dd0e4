//! Prompt construction for code generation
//!
//! The constraints here are load-bearing: the structural normalizer assumes
//! imports at the top, a single top-level error-handling block and four-space
//! indentation, so the prompt spells those out explicitly.

use super::outcome::ErrorClass;

/// Context for a prior failed attempt, fed back into the retry prompt
#[derive(Debug, Clone)]
pub struct AttemptContext {
    /// The code that failed
    pub code: String,
    /// The error message or classification
    pub error: String,
    /// The attempt number (1-based)
    pub attempt: u32,
    /// Classified error type for targeted fix guidance
    pub error_class: Option<ErrorClass>,
}

/// Build the generation prompt for a fresh task
pub fn build_prompt(task: &str) -> String {
    format!(
        "Generate a Python script to: {task}\n\
         \n\
         Requirements:\n\
         - Respond with Python code only, no explanations or prose\n\
         - Put all imports at the top of the script\n\
         - Wrap the top-level logic in a single try/except block\n\
         - Indent with 4 spaces and write one statement per line\n\
         - Print the final result to stdout\n"
    )
}

/// Build the retry prompt embedding the failure history
pub fn build_retry_prompt(task: &str, prior_attempts: &[AttemptContext]) -> String {
    let mut prompt = format!(
        "You previously attempted the following task but it failed. Review the \
         failure history, fix the code, and try again.\n\n\
         Task: {task}\n\nFailure history:\n"
    );

    for attempt in prior_attempts {
        prompt.push_str(&format!(
            "\n--- Attempt #{} ---\nFailed code:\n```python\n{}\n```\nError:\n{}\n",
            attempt.attempt, attempt.code, attempt.error
        ));
        if let Some(ref class) = attempt.error_class {
            let guidance = class.guidance();
            if !guidance.is_empty() {
                prompt.push_str(&format!("Fix guidance: {}\n", guidance));
            }
        }
    }

    prompt.push_str(
        "\nGenerate a corrected version that completes the task.\n\
         \n\
         Requirements:\n\
         - Respond with Python code only, no explanations or prose\n\
         - Put all imports at the top of the script\n\
         - Wrap the top-level logic in a single try/except block\n\
         - Indent with 4 spaces and write one statement per line\n\
         - Print the final result to stdout\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_contains_constraints() {
        let prompt = build_prompt("calculate the factorial of a number");
        assert!(prompt.contains("calculate the factorial of a number"));
        assert!(prompt.contains("Python code only"));
        assert!(prompt.contains("imports at the top"));
        assert!(prompt.contains("try/except"));
        assert!(prompt.contains("4 spaces"));
    }

    #[test]
    fn test_retry_prompt_embeds_history_and_guidance() {
        let attempts = vec![AttemptContext {
            code: "print(1/0)".to_string(),
            error: "ZeroDivisionError: division by zero".to_string(),
            attempt: 1,
            error_class: Some(ErrorClass::Runtime("ZeroDivisionError".to_string())),
        }];
        let prompt = build_retry_prompt("divide numbers", &attempts);
        assert!(prompt.contains("Attempt #1"));
        assert!(prompt.contains("print(1/0)"));
        assert!(prompt.contains("ZeroDivisionError"));
        assert!(prompt.contains("Fix guidance:"));
        assert!(prompt.contains("try/except"));
    }
}
