//! Configuration for the assistant runtime
//!
//! All knobs live in one TOML file. Every section has a workable default so
//! the assistant starts with no config file at all; API keys are resolved
//! through environment variable names (`api_key_env`), never stored inline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::llm::LlmConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssistantConfig {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
}

impl AssistantConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load configuration from a file if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

/// Intent routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Minimum cosine similarity for an utterance to match an intent
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Minimum similarity against the task anchor phrases for an utterance
    /// to be considered a programmatic task
    #[serde(default = "default_worthiness_threshold")]
    pub worthiness_threshold: f32,
    /// Dimensionality of the hashed phrase embeddings
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    /// Optional JSON file overriding the built-in intent catalog
    #[serde(default)]
    pub intents_path: Option<PathBuf>,
}

fn default_confidence_threshold() -> f32 {
    0.55
}

fn default_worthiness_threshold() -> f32 {
    0.5
}

fn default_embedding_dimension() -> usize {
    256
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            worthiness_threshold: default_worthiness_threshold(),
            embedding_dimension: default_embedding_dimension(),
            intents_path: None,
        }
    }
}

/// Code synthesis and execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Interpreter executable used to run generated programs
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Directory for generated scratch files
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Wall-clock limit for one generated program
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
    /// Per-module limit for a package install
    #[serde(default = "default_install_timeout_secs")]
    pub install_timeout_secs: u64,
    /// Total generate-and-run attempts per request (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Optional external formatter command applied to normalized code.
    /// Receives the code on stdin, must emit the formatted code on stdout.
    #[serde(default)]
    pub formatter: Option<String>,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("aria")
}

fn default_exec_timeout_secs() -> u64 {
    30
}

fn default_install_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            scratch_dir: default_scratch_dir(),
            exec_timeout_secs: default_exec_timeout_secs(),
            install_timeout_secs: default_install_timeout_secs(),
            max_attempts: default_max_attempts(),
            formatter: None,
        }
    }
}

/// Speech output configuration
///
/// Transcription and synthesis are external programs; this only names them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Whether replies are piped to the speech synthesizer
    #[serde(default)]
    pub enabled: bool,
    /// Voice models the session can cycle through
    #[serde(default = "default_voices")]
    pub voices: Vec<VoiceModel>,
    /// Maximum spoken reply length in characters
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
}

fn default_max_reply_chars() -> usize {
    300
}

fn default_voices() -> Vec<VoiceModel> {
    vec![
        VoiceModel {
            name: "amy".to_string(),
            model_path: PathBuf::from("voice_models/en_US-amy-medium.onnx"),
        },
        VoiceModel {
            name: "john".to_string(),
            model_path: PathBuf::from("voice_models/en_US-john-medium.onnx"),
        },
        VoiceModel {
            name: "lessac".to_string(),
            model_path: PathBuf::from("voice_models/en_US-lessac-medium.onnx"),
        },
    ]
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            voices: default_voices(),
            max_reply_chars: default_max_reply_chars(),
        }
    }
}

/// One installed text-to-speech voice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceModel {
    pub name: String,
    pub model_path: PathBuf,
}

/// Paths of the external effector scripts
///
/// Unset entries simply leave the matching intents unhandled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    #[serde(default)]
    pub volume: Option<PathBuf>,
    #[serde(default)]
    pub brightness: Option<PathBuf>,
    #[serde(default)]
    pub screenshot: Option<PathBuf>,
    #[serde(default)]
    pub wallpaper: Option<PathBuf>,
    #[serde(default)]
    pub music: Option<PathBuf>,
    /// Limit for one effector script invocation
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,
}

fn default_script_timeout_secs() -> u64 {
    15
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            volume: None,
            brightness: None,
            screenshot: None,
            wallpaper: None,
            music: None,
            script_timeout_secs: default_script_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AssistantConfig::default();
        assert_eq!(config.router.confidence_threshold, 0.55);
        assert_eq!(config.synthesis.interpreter, "python3");
        assert_eq!(config.synthesis.exec_timeout_secs, 30);
        assert_eq!(config.synthesis.max_attempts, 1);
        assert!(!config.speech.enabled);
    }

    #[test]
    fn test_partial_toml() {
        let raw = r#"
[router]
confidence_threshold = 0.7

[synthesis]
interpreter = "python3.12"
exec_timeout_secs = 5
"#;
        let config: AssistantConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.router.confidence_threshold, 0.7);
        assert_eq!(config.synthesis.interpreter, "python3.12");
        assert_eq!(config.synthesis.exec_timeout_secs, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.synthesis.install_timeout_secs, 120);
        assert_eq!(config.router.embedding_dimension, 256);
    }
}
