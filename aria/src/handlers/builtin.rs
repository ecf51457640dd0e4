//! Built-in intent handlers
//!
//! Thin wrappers: each either formats local state or makes one call across a
//! narrow boundary (an external effector script). Anything richer belongs in
//! its own service, not here.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use regex::Regex;
use tokio::process::Command;
use tracing::warn;

use crate::config::AssistantConfig;
use crate::utils::spoken_duration;

use super::{HandlerError, HandlerRegistry, IntentHandler, Reminder, TurnContext};

/// Wire up every built-in handler the configuration supports
pub fn builtin_registry(config: &AssistantConfig) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    let timeout = Duration::from_secs(config.scripts.script_timeout_secs);

    registry.register("current_datetime", Box::new(CurrentDateTimeHandler));
    registry.register("greeting", Box::new(GreetingHandler));
    registry.register("uptime", Box::new(UptimeHandler));
    registry.register("add_reminder", Box::new(AddReminderHandler::new()));
    registry.register("list_reminders", Box::new(ListRemindersHandler));
    registry.register("change_voice", Box::new(CycleVoiceHandler));
    registry.register("motivation", Box::new(MotivationHandler));

    if let Some(script) = &config.scripts.volume {
        registry.register(
            "increase_volume",
            Box::new(ScriptHandler::new(
                script.clone(),
                vec!["increase".into(), "5".into()],
                "Volume increased by 5 percent",
                timeout,
            )),
        );
        registry.register(
            "decrease_volume",
            Box::new(ScriptHandler::new(
                script.clone(),
                vec!["decrease".into(), "5".into()],
                "Volume decreased by 5 percent",
                timeout,
            )),
        );
    }
    if let Some(script) = &config.scripts.brightness {
        registry.register(
            "increase_brightness",
            Box::new(ScriptHandler::new(
                script.clone(),
                vec!["increase".into(), "100".into()],
                "Brightness increased",
                timeout,
            )),
        );
        registry.register(
            "decrease_brightness",
            Box::new(ScriptHandler::new(
                script.clone(),
                vec!["decrease".into(), "100".into()],
                "Brightness decreased",
                timeout,
            )),
        );
    }
    if let Some(script) = &config.scripts.screenshot {
        registry.register(
            "take_screenshot",
            Box::new(ScriptHandler::new(
                script.clone(),
                vec!["area".into()],
                "Screenshot saved",
                timeout,
            )),
        );
    }
    if let Some(script) = &config.scripts.wallpaper {
        registry.register(
            "change_wallpaper",
            Box::new(ScriptHandler::new(
                script.clone(),
                vec!["select".into()],
                "Applying your selected wallpaper",
                timeout,
            )),
        );
    }
    if let Some(script) = &config.scripts.music {
        registry.register(
            "play_music",
            Box::new(ScriptHandler::new(
                script.clone(),
                vec!["play".into()],
                "Launching your music player now",
                timeout,
            )),
        );
        registry.register(
            "stop_music",
            Box::new(ScriptHandler::new(
                script.clone(),
                vec!["stop".into()],
                "Music stopped",
                timeout,
            )),
        );
    }

    registry
}

/// Current date and time, phrased for speech
pub struct CurrentDateTimeHandler;

#[async_trait]
impl IntentHandler for CurrentDateTimeHandler {
    async fn handle(&self, _ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError> {
        let now = chrono::Local::now();
        Ok(Some(
            now.format("It's %A, %B %d, %Y and the time is %I:%M %p")
                .to_string(),
        ))
    }
}

/// Greeting picked by the hour of day
pub struct GreetingHandler;

pub fn greeting_for_hour(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning!",
        12..=17 => "Good afternoon!",
        18..=21 => "Good evening!",
        _ => "Working late? Good night!",
    }
}

#[async_trait]
impl IntentHandler for GreetingHandler {
    async fn handle(&self, _ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError> {
        use chrono::Timelike;
        Ok(Some(
            greeting_for_hour(chrono::Local::now().hour()).to_string(),
        ))
    }
}

/// System uptime from /proc/uptime
pub struct UptimeHandler;

#[async_trait]
impl IntentHandler for UptimeHandler {
    async fn handle(&self, _ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError> {
        let raw = tokio::fs::read_to_string("/proc/uptime").await?;
        let seconds = raw
            .split_whitespace()
            .next()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);
        Ok(Some(format!(
            "System has been up for {}",
            spoken_duration(seconds as u64)
        )))
    }
}

/// Parses "remind me to <task> at <HH:MM>" and stores it on the session
pub struct AddReminderHandler {
    pattern: Regex,
}

impl AddReminderHandler {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"remind me (?:to |about )?(.+?) at (\d{1,2}:\d{2})").unwrap(),
        }
    }
}

impl Default for AddReminderHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentHandler for AddReminderHandler {
    async fn handle(&self, ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError> {
        match self.pattern.captures(ctx.utterance) {
            Some(caps) => {
                let task = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
                let at = caps.get(2).map_or("", |m| m.as_str()).to_string();
                let reply = format!("Reminder set for {}: {}", at, task);
                ctx.state.reminders.push(Reminder { task, at });
                Ok(Some(reply))
            }
            None => Ok(Some(
                "Tell me what to remind you about and when, like: remind me to stretch at 14:30"
                    .to_string(),
            )),
        }
    }
}

/// Lists the reminders stored on the session
pub struct ListRemindersHandler;

#[async_trait]
impl IntentHandler for ListRemindersHandler {
    async fn handle(&self, ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError> {
        if ctx.state.reminders.is_empty() {
            return Ok(Some("No reminders set.".to_string()));
        }
        let listing = ctx
            .state
            .reminders
            .iter()
            .map(|r| format!("{} at {}", r.task, r.at))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Some(listing))
    }
}

/// Cycles the session to the next configured voice model
pub struct CycleVoiceHandler;

#[async_trait]
impl IntentHandler for CycleVoiceHandler {
    async fn handle(&self, ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError> {
        match ctx.state.cycle_voice() {
            Some(voice) => Ok(Some(format!("Voice changed to {}", voice.name))),
            None => Ok(Some("No voice models are configured.".to_string())),
        }
    }
}

const AFFIRMATIONS: &[&str] = &[
    "You are capable of achieving amazing things.",
    "Keep pushing forward, no matter what.",
    "Today is full of opportunities waiting for you.",
    "You are stronger than you think.",
    "Your potential is limitless.",
];

/// One random affirmation
pub struct MotivationHandler;

#[async_trait]
impl IntentHandler for MotivationHandler {
    async fn handle(&self, _ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError> {
        let line = AFFIRMATIONS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(AFFIRMATIONS[0]);
        Ok(Some(line.to_string()))
    }
}

/// Invokes one external effector script with fixed arguments.
///
/// The script is the whole interface: no output parsing, just exit status,
/// with a bounded wait so a wedged effector cannot stall the turn.
pub struct ScriptHandler {
    script: PathBuf,
    args: Vec<String>,
    reply: String,
    timeout: Duration,
}

impl ScriptHandler {
    pub fn new(
        script: PathBuf,
        args: Vec<String>,
        reply: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            script,
            args,
            reply: reply.into(),
            timeout,
        }
    }
}

#[async_trait]
impl IntentHandler for ScriptHandler {
    async fn handle(&self, _ctx: &mut TurnContext<'_>) -> Result<Option<String>, HandlerError> {
        let result = tokio::time::timeout(
            self.timeout,
            Command::new(&self.script)
                .args(&self.args)
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output(),
        )
        .await;

        let output = match result {
            Err(_) => {
                warn!(script = %self.script.display(), "Effector script timed out");
                return Err(HandlerError::ScriptTimeout);
            }
            Ok(Err(e)) => return Err(HandlerError::Script(e.to_string())),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HandlerError::Script(stderr.trim().to_string()));
        }
        Ok(Some(self.reply.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::SessionState;

    fn ctx_on<'a>(state: &'a mut SessionState, utterance: &'a str) -> TurnContext<'a> {
        TurnContext { utterance, state }
    }

    #[test]
    fn test_greeting_brackets() {
        assert_eq!(greeting_for_hour(6), "Good morning!");
        assert_eq!(greeting_for_hour(13), "Good afternoon!");
        assert_eq!(greeting_for_hour(19), "Good evening!");
        assert_eq!(greeting_for_hour(23), "Working late? Good night!");
        assert_eq!(greeting_for_hour(2), "Working late? Good night!");
    }

    #[tokio::test]
    async fn test_add_and_list_reminders() {
        let mut state = SessionState::default();

        let add = AddReminderHandler::new();
        let reply = add
            .handle(&mut ctx_on(&mut state, "remind me to stretch at 14:30"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, "Reminder set for 14:30: stretch");
        assert_eq!(
            state.reminders,
            vec![Reminder {
                task: "stretch".into(),
                at: "14:30".into()
            }]
        );

        let list = ListRemindersHandler;
        let reply = list
            .handle(&mut ctx_on(&mut state, "list my reminders"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, "stretch at 14:30");
    }

    #[tokio::test]
    async fn test_add_reminder_without_time_prompts() {
        let mut state = SessionState::default();
        let add = AddReminderHandler::new();
        let reply = add
            .handle(&mut ctx_on(&mut state, "set a reminder"))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("remind me to"));
        assert!(state.reminders.is_empty());
    }

    #[tokio::test]
    async fn test_script_handler_success_and_failure() {
        let timeout = Duration::from_secs(5);

        let ok = ScriptHandler::new("/bin/true".into(), vec![], "done", timeout);
        let mut state = SessionState::default();
        let reply = ok.handle(&mut ctx_on(&mut state, "x")).await.unwrap();
        assert_eq!(reply.as_deref(), Some("done"));

        let bad = ScriptHandler::new("/bin/false".into(), vec![], "done", timeout);
        let err = bad.handle(&mut ctx_on(&mut state, "x")).await;
        assert!(matches!(err, Err(HandlerError::Script(_))));
    }

    #[test]
    fn test_builtin_registry_wiring() {
        let mut config = AssistantConfig::default();
        config.scripts.volume = Some("/opt/scripts/volume.sh".into());
        let registry = builtin_registry(&config);

        assert!(registry.contains("current_datetime"));
        assert!(registry.contains("increase_volume"));
        assert!(registry.contains("decrease_volume"));
        // No brightness script configured, so no handler
        assert!(!registry.contains("increase_brightness"));
    }
}
