//! Intent handler registry
//!
//! Every recognized intent label maps to a handler implementing one common
//! capability: `handle(context) -> optional reply`. Handlers are registered
//! once at startup; an unregistered label (or a handler that declines) falls
//! through to the conversational responder. This keeps each canned action
//! testable in isolation and means new intents never touch a central
//! dispatch function.

pub mod builtin;

pub use builtin::builtin_registry;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::VoiceModel;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Effector script failed: {0}")]
    Script(String),

    #[error("Effector script timed out")]
    ScriptTimeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One scheduled reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task: String,
    pub at: String,
}

/// Mutable session state handlers are allowed to touch.
///
/// Owned by the assistant session; mutated only through handler dispatch and
/// torn down with the session.
#[derive(Debug, Default)]
pub struct SessionState {
    pub reminders: Vec<Reminder>,
    pub voices: Vec<VoiceModel>,
    pub voice_index: usize,
}

impl SessionState {
    pub fn new(voices: Vec<VoiceModel>) -> Self {
        Self {
            reminders: Vec::new(),
            voices,
            voice_index: 0,
        }
    }

    pub fn current_voice(&self) -> Option<&VoiceModel> {
        self.voices.get(self.voice_index)
    }

    /// Advance to the next voice model, wrapping around
    pub fn cycle_voice(&mut self) -> Option<&VoiceModel> {
        if self.voices.is_empty() {
            return None;
        }
        self.voice_index = (self.voice_index + 1) % self.voices.len();
        self.current_voice()
    }
}

/// Per-turn context passed to handlers
pub struct TurnContext<'a> {
    pub utterance: &'a str,
    pub state: &'a mut SessionState,
}

/// A canned action bound to one intent label
#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Produce a reply for the turn, or `None` to decline and let the turn
    /// fall through to the conversational responder.
    async fn handle(&self, ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError>;
}

/// Label -> handler registry
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn IntentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, label: impl Into<String>, handler: Box<dyn IntentHandler>) {
        self.handlers.insert(label.into(), handler);
    }

    pub fn contains(&self, label: &str) -> bool {
        self.handlers.contains_key(label)
    }

    /// Dispatch a matched intent. `Ok(None)` means nothing here handles the
    /// label and the caller should fall through.
    pub async fn dispatch(
        &self,
        label: &str,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<String>, HandlerError> {
        match self.handlers.get(label) {
            Some(handler) => handler.handle(ctx).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl IntentHandler for Fixed {
        async fn handle(&self, _ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError> {
            Ok(Some(self.0.to_string()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_registered_label() {
        let mut registry = HandlerRegistry::new();
        registry.register("ping", Box::new(Fixed("pong")));

        let mut state = SessionState::default();
        let mut ctx = TurnContext {
            utterance: "ping",
            state: &mut state,
        };
        let reply = registry.dispatch("ping", &mut ctx).await.unwrap();
        assert_eq!(reply.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_unregistered_label_falls_through() {
        let registry = HandlerRegistry::new();
        let mut state = SessionState::default();
        let mut ctx = TurnContext {
            utterance: "anything",
            state: &mut state,
        };
        let reply = registry.dispatch("nothing_here", &mut ctx).await.unwrap();
        assert_eq!(reply, None);
    }

    #[test]
    fn test_cycle_voice_wraps() {
        let voices = vec![
            VoiceModel {
                name: "a".into(),
                model_path: "a.onnx".into(),
            },
            VoiceModel {
                name: "b".into(),
                model_path: "b.onnx".into(),
            },
        ];
        let mut state = SessionState::new(voices);
        assert_eq!(state.current_voice().unwrap().name, "a");
        assert_eq!(state.cycle_voice().unwrap().name, "b");
        assert_eq!(state.cycle_voice().unwrap().name, "a");
    }
}
