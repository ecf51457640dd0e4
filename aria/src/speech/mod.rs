//! Speech-facing text utilities and the narrow synthesis interface
//!
//! Speech synthesis itself is an external program (piper). This module only
//! cleans replies so they read well aloud, and pipes them to the configured
//! synthesizer when speech output is enabled.

use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech synthesizer failed: {0}")]
    Synthesizer(String),
}

static MARKDOWN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_`#>\[\](){}]").unwrap());
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip emojis, non-ASCII characters and markdown artifacts so the reply
/// sounds natural when spoken. Whitespace runs collapse to single spaces.
pub fn clean_text_for_speech(text: &str) -> String {
    let ascii: String = text.chars().filter(|c| c.is_ascii()).collect();
    let stripped = MARKDOWN_RE.replace_all(&ascii, "");
    SPACES_RE.replace_all(stripped.trim(), " ").into_owned()
}

/// Trim a reply to at most `max_length` characters, cutting at a word
/// boundary and appending an ellipsis.
pub fn trim_response(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }
    let boundary = text[..max_length]
        .char_indices()
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let cut = &text[..boundary];
    match cut.rfind(' ') {
        Some(pos) if pos > 0 => format!("{}...", &cut[..pos]),
        _ => format!("{}...", cut),
    }
}

/// Where spoken replies go
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str, voice_model: &std::path::Path) -> Result<(), SpeechError>;
}

/// Pipes text through `piper --model <voice> --output-raw` into `aplay`.
pub struct PiperSink;

#[async_trait]
impl SpeechSink for PiperSink {
    async fn speak(&self, text: &str, voice_model: &std::path::Path) -> Result<(), SpeechError> {
        use tokio::io::AsyncWriteExt;
        use tokio::process::Command;

        let mut piper = Command::new("piper")
            .arg("--model")
            .arg(voice_model)
            .arg("--output-raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SpeechError::Synthesizer(format!("piper: {e}")))?;

        if let Some(mut stdin) = piper.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| SpeechError::Synthesizer(e.to_string()))?;
        }

        let piper_stdout = piper
            .stdout
            .take()
            .ok_or_else(|| SpeechError::Synthesizer("piper produced no output".to_string()))?;

        let mut player = Command::new("aplay")
            .args(["-r", "22050", "-f", "S16_LE", "-t", "raw", "-"])
            .stdin(child_stdout_to_stdio(piper_stdout))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SpeechError::Synthesizer(format!("aplay: {e}")))?;

        if let Err(e) = piper.wait().await {
            warn!("piper did not exit cleanly: {e}");
        }
        player
            .wait()
            .await
            .map_err(|e| SpeechError::Synthesizer(e.to_string()))?;
        Ok(())
    }
}

fn child_stdout_to_stdio(stdout: tokio::process::ChildStdout) -> Stdio {
    stdout.try_into().unwrap_or_else(|_| Stdio::null())
}
