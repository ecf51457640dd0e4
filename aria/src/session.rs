//! Assistant session: one object owning the whole turn pipeline
//!
//! A session is created at startup, handles one transcript at a time
//! (single-flight - the next voice turn is not accepted until the current
//! one finishes) and folds every failure into a user-facing reply. The loop
//! driving it never sees an error; it only decides what to do with the
//! returned `TurnReply`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::AssistantConfig;
use crate::handlers::{builtin_registry, HandlerRegistry, SessionState, TurnContext};
use crate::llm::{create_provider, LlmError, LlmProvider};
use crate::router::{
    default_catalog, CodeWorthinessClassifier, HashEmbedder, IntentCatalog, IntentMatcher,
    RouterError,
};
use crate::speech::{clean_text_for_speech, trim_response};
use crate::synthesis::SynthesisPipeline;

/// Error type for session construction; turns themselves never fail
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// What the driver loop should do with a finished turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnReply {
    /// Speak/print the reply and keep listening
    Say(String),
    /// Nothing to say this turn
    Silent,
    /// Acknowledge and doze until the wake intent
    Sleep(String),
    /// Acknowledge and end the session
    Exit(String),
}

/// The assistant session
pub struct AssistantSession {
    config: AssistantConfig,
    matcher: IntentMatcher,
    worthiness: CodeWorthinessClassifier,
    registry: HandlerRegistry,
    pipeline: SynthesisPipeline,
    llm: Arc<dyn LlmProvider>,
    state: SessionState,
    asleep: bool,
}

impl AssistantSession {
    /// Build a session, creating the model provider from configuration
    pub fn new(config: AssistantConfig) -> Result<Self, SessionError> {
        let llm = create_provider(&config.llm)?;
        Self::with_provider(config, llm)
    }

    /// Build a session around an existing model provider
    pub fn with_provider(
        config: AssistantConfig,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self, SessionError> {
        let embedder = Arc::new(HashEmbedder::new(config.router.embedding_dimension));

        let catalog = match &config.router.intents_path {
            Some(path) => IntentCatalog::from_json_file(path)?,
            None => default_catalog(),
        };
        info!(
            phrases = catalog.phrase_count(),
            model = %llm.info().model,
            "Initializing assistant session"
        );

        let matcher = IntentMatcher::new(
            &catalog,
            embedder.clone(),
            config.router.confidence_threshold,
        )?;
        let worthiness =
            CodeWorthinessClassifier::new(embedder, config.router.worthiness_threshold)?;
        let registry = builtin_registry(&config);
        let pipeline = SynthesisPipeline::new(&config.synthesis, llm.clone());
        let state = SessionState::new(config.speech.voices.clone());

        Ok(Self {
            config,
            matcher,
            worthiness,
            registry,
            pipeline,
            llm,
            state,
            asleep: false,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handle one transcribed utterance to completion.
    ///
    /// Single-flight by construction (`&mut self`), and total: every failure
    /// on the way is folded into a reply so the voice loop always continues.
    pub async fn handle_turn(&mut self, transcript: &str) -> TurnReply {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return TurnReply::Silent;
        }

        let matched = match self.matcher.match_utterance(transcript) {
            Ok(result) => result,
            Err(e) => {
                // Classification failure is fatal to the turn, not the loop
                error!("Intent classification failed: {e}");
                return TurnReply::Say("I couldn't understand that right now.".to_string());
            }
        };
        debug!(label = ?matched.label, score = matched.score, "Routed utterance");

        if self.asleep {
            if matched.label.as_deref() == Some("wake_up") {
                self.asleep = false;
                return TurnReply::Say("I'm here!".to_string());
            }
            return TurnReply::Silent;
        }

        match matched.label.as_deref() {
            Some("exit") => TurnReply::Exit("Okay, take care.".to_string()),
            Some("sleep") => {
                self.asleep = true;
                TurnReply::Sleep("Okay.".to_string())
            }
            Some("wake_up") => TurnReply::Say("I'm listening.".to_string()),
            Some(label) => {
                let label = label.to_string();
                let mut ctx = TurnContext {
                    utterance: transcript,
                    state: &mut self.state,
                };
                match self.registry.dispatch(&label, &mut ctx).await {
                    Ok(Some(reply)) => TurnReply::Say(reply),
                    // Matched but unwired (e.g. bare yes/no): let the
                    // responder make something of it
                    Ok(None) => self.fallback_reply(transcript).await,
                    Err(e) => {
                        warn!(%label, "Handler failed: {e}");
                        TurnReply::Say("Sorry, I couldn't do that right now.".to_string())
                    }
                }
            }
            None => match self.worthiness.is_code_worthy(transcript) {
                Ok(true) => {
                    info!("Writing a program for: {transcript}");
                    TurnReply::Say(self.pipeline.run(transcript).await)
                }
                Ok(false) => self.fallback_reply(transcript).await,
                Err(e) => {
                    error!("Code-worthiness classification failed: {e}");
                    TurnReply::Say("I couldn't understand that right now.".to_string())
                }
            },
        }
    }

    /// Conversational fallback: one model call, cleaned up for speech
    async fn fallback_reply(&self, transcript: &str) -> TurnReply {
        match self.llm.generate_text(transcript).await {
            Ok(text) => {
                let cleaned = clean_text_for_speech(&text);
                TurnReply::Say(trim_response(&cleaned, self.config.speech.max_reply_chars))
            }
            Err(e) => {
                warn!("Fallback responder failed: {e}");
                TurnReply::Say("Sorry, I couldn't process that request.".to_string())
            }
        }
    }
}
