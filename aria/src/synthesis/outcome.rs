//! Execution outcome classification
//!
//! Turns a raw `ExecutionOutcome` into a short, speech-ready status message,
//! and classifies stderr so the refinement loop can inject targeted fix
//! guidance into the retry prompt.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::executor::{ExecutionOutcome, TerminalState};

/// How much stdout/stderr is surfaced to the user
const OUTPUT_LIMIT: usize = 300;

/// Classification of an execution error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ErrorClass {
    /// No error detected
    None,
    /// Syntax error (e.g. invalid syntax, indentation)
    Syntax,
    /// Missing dependency (e.g. ModuleNotFoundError)
    MissingDependency(String),
    /// Runtime error (e.g. ValueError, TypeError, KeyError)
    Runtime(String),
    /// Execution exceeded the allowed time
    Timeout,
    /// Unknown error
    Unknown,
}

impl ErrorClass {
    /// Targeted fix guidance injected into the retry prompt
    pub fn guidance(&self) -> &'static str {
        match self {
            ErrorClass::None => "",
            ErrorClass::Syntax => {
                "The code had a syntax error. Check indentation, colons after block \
                 headers, and balanced quotes and parentheses."
            }
            ErrorClass::MissingDependency(_) => {
                "A module import failed. Prefer the standard library where possible, \
                 and make sure every imported package name is spelled correctly."
            }
            ErrorClass::Runtime(_) => {
                "The code raised an unhandled exception. Add try/except around the \
                 critical section, log the error, and handle the edge cases."
            }
            ErrorClass::Timeout => {
                "Execution timed out. Avoid blocking calls without a deadline and \
                 reduce the amount of work per run."
            }
            ErrorClass::Unknown => "Review the code carefully and simplify it.",
        }
    }
}

/// Classifies interpreter stderr and renders user-facing result messages
pub struct OutcomeClassifier {
    module_not_found_re: Regex,
    syntax_error_re: Regex,
    generic_exception_re: Regex,
}

impl Default for OutcomeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeClassifier {
    pub fn new() -> Self {
        Self {
            module_not_found_re: Regex::new(r"ModuleNotFoundError: No module named '([^']+)'")
                .unwrap(),
            syntax_error_re: Regex::new(r"(?:SyntaxError|IndentationError|TabError): (.+)")
                .unwrap(),
            generic_exception_re: Regex::new(r"^(\w+(?:Error|Exception)): (.+)").unwrap(),
        }
    }

    /// Classify interpreter stderr
    pub fn classify_stderr(&self, stderr: &str) -> ErrorClass {
        if stderr.trim().is_empty() {
            return ErrorClass::None;
        }

        if let Some(caps) = self.module_not_found_re.captures(stderr) {
            let module = caps.get(1).map_or("", |m| m.as_str()).to_string();
            return ErrorClass::MissingDependency(module);
        }

        if self.syntax_error_re.is_match(stderr) {
            return ErrorClass::Syntax;
        }

        // Last matching line wins: tracebacks end with the raised exception
        for line in stderr.lines().rev() {
            if let Some(caps) = self.generic_exception_re.captures(line.trim()) {
                let error_type = caps.get(1).map_or("", |m| m.as_str()).to_string();
                return ErrorClass::Runtime(error_type);
            }
        }

        ErrorClass::Unknown
    }

    /// Classify a full outcome, folding in the terminal state
    pub fn classify_outcome(&self, outcome: &ExecutionOutcome) -> ErrorClass {
        match outcome.state {
            TerminalState::TimedOut => ErrorClass::Timeout,
            TerminalState::FailedToStart => ErrorClass::Unknown,
            TerminalState::Completed => {
                if outcome.exit_code == Some(0) {
                    ErrorClass::None
                } else {
                    match self.classify_stderr(&outcome.stderr) {
                        // Non-zero exit is a failure even with silent stderr
                        ErrorClass::None => ErrorClass::Unknown,
                        class => class,
                    }
                }
            }
        }
    }

    /// Render the speech-ready status message for an outcome
    pub fn render(&self, outcome: &ExecutionOutcome) -> String {
        match outcome.state {
            TerminalState::TimedOut => {
                "The task took too long to finish, so I stopped it.".to_string()
            }
            TerminalState::FailedToStart => format!(
                "I couldn't start the program: {}",
                truncate(outcome.stderr.trim(), OUTPUT_LIMIT)
            ),
            TerminalState::Completed => {
                if outcome.exit_code == Some(0) {
                    let stdout = outcome.stdout.trim();
                    if stdout.is_empty() {
                        "Task completed successfully.".to_string()
                    } else {
                        format!(
                            "Task completed successfully. Output: {}",
                            truncate(stdout, OUTPUT_LIMIT)
                        )
                    }
                } else {
                    format!(
                        "The task failed: {}",
                        truncate(outcome.stderr.trim(), OUTPUT_LIMIT)
                    )
                }
            }
        }
    }
}

/// Truncate at a word boundary with an ellipsis
fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let cut = &text[..text
        .char_indices()
        .take_while(|(i, _)| *i < max_len)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0)];
    match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => format!("{}...", &cut[..pos]),
        _ => format!("{}...", cut),
    }
}
