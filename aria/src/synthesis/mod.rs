//! Ad-hoc code synthesis and execution
//!
//! The fallback path for utterances no canned intent covers: ask the language
//! model for a throwaway program, repair its structure, install whatever it
//! imports, run it under a time bound and fold the result into one
//! speech-ready sentence. Every stage failure is recovered into a user-facing
//! message; nothing here can crash the voice loop.

pub mod deps;
pub mod executor;
pub mod extract;
pub mod normalize;
pub mod outcome;
pub mod prompt;

pub use deps::{scan_imports, DependencyResolver};
pub use executor::{ExecutionOutcome, Executor, TerminalState};
pub use extract::extract_code;
pub use normalize::normalize;
pub use outcome::{ErrorClass, OutcomeClassifier};
pub use prompt::{build_prompt, build_retry_prompt, AttemptContext};

use std::collections::BTreeSet;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::SynthesisConfig;
use crate::llm::{LlmError, LlmProvider};

/// Error type for synthesis failures
///
/// Each variant maps onto one user-facing failure message; none of them
/// escapes the pipeline.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Code generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("No code could be extracted from the model response")]
    EmptyExtraction,

    #[error("Package manager invocation failed: {0}")]
    PackageManager(String),

    #[error("Failed to install module '{module}': {detail}")]
    DependencyInstall { module: String, detail: String },

    #[error("Timed out installing module '{module}'")]
    InstallTimeout { module: String },

    #[error("Formatter command failed: {0}")]
    Formatter(String),

    #[error("Scratch file error: {0}")]
    Scratch(#[source] std::io::Error),
}

/// The evolving state of one synthesis request.
///
/// Created and owned entirely within a single request; the scratch file it
/// eventually produces lives only inside the executor call.
#[derive(Debug, Clone, Default)]
pub struct CodeArtifact {
    pub task: String,
    pub raw_response: String,
    pub extracted: String,
    pub normalized: String,
    pub imports: BTreeSet<String>,
}

/// Prompt -> extract -> normalize -> deps -> execute -> classify
pub struct SynthesisPipeline {
    llm: Arc<dyn LlmProvider>,
    resolver: DependencyResolver,
    executor: Executor,
    classifier: OutcomeClassifier,
    exec_timeout: Duration,
    max_attempts: u32,
    formatter: Option<String>,
}

impl SynthesisPipeline {
    pub fn new(config: &SynthesisConfig, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            resolver: DependencyResolver::new(
                config.interpreter.clone(),
                Duration::from_secs(config.install_timeout_secs),
            ),
            executor: Executor::new(config.interpreter.clone(), config.scratch_dir.clone()),
            classifier: OutcomeClassifier::new(),
            exec_timeout: Duration::from_secs(config.exec_timeout_secs),
            max_attempts: config.max_attempts.max(1),
            formatter: config.formatter.clone(),
        }
    }

    /// Run one synthesis request to completion and fold everything into a
    /// user-facing reply.
    pub async fn run(&self, task: &str) -> String {
        let mut attempts: Vec<AttemptContext> = Vec::new();

        let mut last_reply = String::new();
        for attempt in 1..=self.max_attempts {
            debug!(attempt, %task, "Starting synthesis attempt");
            let (artifact, outcome) = match self.attempt(task, &attempts).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Synthesis attempt aborted");
                    return failure_message(&e);
                }
            };

            let class = self.classifier.classify_outcome(&outcome);
            if class == ErrorClass::None {
                info!(attempt, "Synthesized program succeeded");
                return self.classifier.render(&outcome);
            }

            last_reply = self.classifier.render(&outcome);
            if attempt < self.max_attempts {
                info!(attempt, ?class, "Synthesized program failed, refining");
                attempts.push(AttemptContext {
                    code: artifact.normalized.clone(),
                    error: attempt_error_text(&outcome),
                    attempt,
                    error_class: Some(class),
                });
            }
        }
        last_reply
    }

    /// One generate-and-run attempt
    async fn attempt(
        &self,
        task: &str,
        prior: &[AttemptContext],
    ) -> Result<(CodeArtifact, ExecutionOutcome), SynthesisError> {
        let mut artifact = CodeArtifact {
            task: task.to_string(),
            ..Default::default()
        };

        let prompt = if prior.is_empty() {
            build_prompt(task)
        } else {
            build_retry_prompt(task, prior)
        };
        artifact.raw_response = self.llm.generate_text(&prompt).await?;

        artifact.extracted = extract_code(&artifact.raw_response);
        if artifact.extracted.trim().is_empty() {
            return Err(SynthesisError::EmptyExtraction);
        }

        artifact.normalized = normalize(&artifact.extracted);
        if let Some(cmd) = &self.formatter {
            artifact.normalized = run_formatter(cmd, &artifact.normalized).await?;
        }

        artifact.imports = scan_imports(&artifact.normalized);
        let missing = self.resolver.missing_modules(&artifact.imports).await?;
        if !missing.is_empty() {
            info!(?missing, "Installing missing modules");
            self.resolver.ensure_installed(&missing).await?;
        }

        let outcome = self
            .executor
            .execute(&artifact.normalized, self.exec_timeout)
            .await?;
        Ok((artifact, outcome))
    }
}

/// Pipe code through an external formatter command (stdin -> stdout)
async fn run_formatter(cmd: &str, code: &str) -> Result<String, SynthesisError> {
    use tokio::io::AsyncWriteExt;

    let mut parts = cmd.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| SynthesisError::Formatter("empty formatter command".to_string()))?;

    let mut child = tokio::process::Command::new(program)
        .args(parts)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SynthesisError::Formatter(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(code.as_bytes())
            .await
            .map_err(|e| SynthesisError::Formatter(e.to_string()))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| SynthesisError::Formatter(e.to_string()))?;
    if !output.status.success() {
        return Err(SynthesisError::Formatter(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Short error text for the retry prompt
fn attempt_error_text(outcome: &ExecutionOutcome) -> String {
    match outcome.state {
        TerminalState::TimedOut => "execution timed out".to_string(),
        TerminalState::FailedToStart => outcome.stderr.clone(),
        TerminalState::Completed => {
            let stderr = outcome.stderr.trim();
            if stderr.is_empty() {
                format!("exit code {:?}", outcome.exit_code)
            } else {
                stderr.to_string()
            }
        }
    }
}

/// Fold a pipeline error into the user-facing reply
fn failure_message(error: &SynthesisError) -> String {
    match error {
        SynthesisError::Generation(_) => {
            "I couldn't reach the language model to write that program.".to_string()
        }
        SynthesisError::EmptyExtraction => {
            "I couldn't come up with a program for that, sorry.".to_string()
        }
        SynthesisError::DependencyInstall { module, .. } => {
            format!("I couldn't install the {} module needed for this task.", module)
        }
        SynthesisError::InstallTimeout { module } => {
            format!("Installing the {} module took too long, so I gave up.", module)
        }
        SynthesisError::PackageManager(_)
        | SynthesisError::Formatter(_)
        | SynthesisError::Scratch(_) => {
            "Something went wrong while preparing the program, sorry.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubLlmProvider;

    fn pipeline_with(responses: Vec<&str>, max_attempts: u32) -> SynthesisPipeline {
        let config = SynthesisConfig {
            // `sh` keeps the test suite independent of a python install
            interpreter: "sh".to_string(),
            scratch_dir: std::env::temp_dir().join(format!("aria-test-{}", uuid::Uuid::new_v4())),
            exec_timeout_secs: 5,
            install_timeout_secs: 5,
            max_attempts,
            formatter: None,
        };
        SynthesisPipeline::new(&config, Arc::new(StubLlmProvider::with_responses(responses)))
    }

    #[tokio::test]
    async fn test_successful_run_embeds_output() {
        let pipeline = pipeline_with(vec!["```python\necho 120\n```"], 1);
        let reply = pipeline.run("calculate the factorial of five").await;
        assert_eq!(reply, "Task completed successfully. Output: 120");
    }

    #[tokio::test]
    async fn test_empty_response_is_extraction_failure() {
        let pipeline = pipeline_with(vec!["```python\n```"], 1);
        let reply = pipeline.run("do nothing").await;
        assert_eq!(reply, "I couldn't come up with a program for that, sorry.");
    }

    #[tokio::test]
    async fn test_failure_surfaces_stderr() {
        let pipeline = pipeline_with(vec!["echo broken >&2\nexit 2"], 1);
        let reply = pipeline.run("fail on purpose").await;
        assert!(reply.starts_with("The task failed:"), "got: {reply}");
        assert!(reply.contains("broken"));
    }

    #[tokio::test]
    async fn test_retry_uses_second_response() {
        let pipeline = pipeline_with(vec!["exit 1", "echo recovered"], 2);
        let reply = pipeline.run("recover after one failure").await;
        assert_eq!(reply, "Task completed successfully. Output: recovered");
    }

    #[tokio::test]
    async fn test_timeout_reply_is_fixed() {
        let config = SynthesisConfig {
            interpreter: "sh".to_string(),
            scratch_dir: std::env::temp_dir().join(format!("aria-test-{}", uuid::Uuid::new_v4())),
            exec_timeout_secs: 1,
            install_timeout_secs: 5,
            max_attempts: 1,
            formatter: None,
        };
        let pipeline = SynthesisPipeline::new(
            &config,
            Arc::new(StubLlmProvider::with_responses(vec!["sleep 30"])),
        );
        let reply = pipeline.run("loop forever").await;
        assert_eq!(reply, "The task took too long to finish, so I stopped it.");
    }
}
