//! End-to-end turn handling against a stubbed language model.
//!
//! The synthesis pipeline runs with `sh` as the interpreter so the suite has
//! no python dependency; generated "programs" are plain shell lines.

use std::sync::Arc;

use aria::config::AssistantConfig;
use aria::llm::StubLlmProvider;
use aria::{AssistantSession, TurnReply};

fn test_config(scratch: &std::path::Path) -> AssistantConfig {
    let mut config = AssistantConfig::default();
    config.synthesis.interpreter = "sh".to_string();
    config.synthesis.scratch_dir = scratch.to_path_buf();
    config.synthesis.exec_timeout_secs = 5;
    config
}

fn session(config: AssistantConfig, responses: Vec<&str>) -> AssistantSession {
    AssistantSession::with_provider(config, Arc::new(StubLlmProvider::with_responses(responses)))
        .unwrap()
}

#[tokio::test]
async fn unmatched_code_worthy_task_runs_generated_program() {
    let scratch = tempfile::tempdir().unwrap();
    let mut session = session(
        test_config(scratch.path()),
        vec!["```python\necho 120\n```"],
    );

    let reply = session.handle_turn("calculate the factorial of a number").await;
    assert_eq!(
        reply,
        TurnReply::Say("Task completed successfully. Output: 120".to_string())
    );
    // The scratch file is gone once the turn is over
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn failed_program_reports_stderr() {
    let scratch = tempfile::tempdir().unwrap();
    let mut session = session(
        test_config(scratch.path()),
        vec!["echo no such table >&2\nexit 1"],
    );

    let reply = session.handle_turn("create a simple sqlite database").await;
    match reply {
        TurnReply::Say(text) => {
            assert!(text.starts_with("The task failed:"), "got: {text}");
            assert!(text.contains("no such table"));
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn matched_intent_dispatches_to_script_handler() {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config(scratch.path());
    config.scripts.volume = Some("/bin/true".into());
    let mut session = session(config, vec![]);

    let reply = session.handle_turn("turn the volume up").await;
    assert_eq!(
        reply,
        TurnReply::Say("Volume increased by 5 percent".to_string())
    );
}

#[tokio::test]
async fn conversational_turn_goes_to_fallback_responder() {
    let scratch = tempfile::tempdir().unwrap();
    let mut session = session(
        test_config(scratch.path()),
        vec!["I don't eat, but pizza seems popular."],
    );

    let reply = session.handle_turn("what do you think about pizza").await;
    assert_eq!(
        reply,
        TurnReply::Say("I don't eat, but pizza seems popular.".to_string())
    );
}

#[tokio::test]
async fn custom_intent_catalog_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let intents_path = dir.path().join("intents.json");
    std::fs::write(
        &intents_path,
        r#"{"current_datetime": ["what time is it right now"]}"#,
    )
    .unwrap();

    let mut config = test_config(dir.path());
    config.router.intents_path = Some(intents_path);
    let mut session = session(config, vec![]);

    match session.handle_turn("what time is it right now").await {
        TurnReply::Say(text) => assert!(text.contains("the time is")),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn turn_loop_survives_a_failing_handler() {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config(scratch.path());
    config.scripts.volume = Some("/bin/false".into());
    let mut session = session(config, vec!["still here"]);

    let reply = session.handle_turn("turn the volume up").await;
    assert_eq!(
        reply,
        TurnReply::Say("Sorry, I couldn't do that right now.".to_string())
    );

    // The next turn proceeds normally
    let reply = session.handle_turn("what do you think about pizza").await;
    assert_eq!(reply, TurnReply::Say("still here".to_string()));
}
