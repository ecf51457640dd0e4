//! Transcript-driven assistant loop
//!
//! Speech capture and transcription are external; this binary consumes one
//! transcript per line on stdin (or a single `--once` utterance) and prints
//! the assistant's replies. With speech enabled in the config, replies are
//! also piped to the synthesizer.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use aria::speech::{PiperSink, SpeechSink};
use aria::{AssistantConfig, AssistantSession, TurnReply};

#[derive(Parser, Debug)]
#[command(name = "aria", about = "Voice assistant core: transcript in, reply out")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "ARIA_CONFIG")]
    config: Option<PathBuf>,

    /// Handle a single utterance and exit
    #[arg(long)]
    once: Option<String>,

    /// Override the intent catalog JSON file
    #[arg(long)]
    intents: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = AssistantConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(intents) = args.intents {
        config.router.intents_path = Some(intents);
    }
    let speech_enabled = config.speech.enabled;

    let mut session = AssistantSession::new(config).context("failed to start session")?;

    if let Some(utterance) = args.once {
        let reply = session.handle_turn(&utterance).await;
        emit_reply(&session, &reply, speech_enabled).await?;
        return Ok(());
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let reply = session.handle_turn(&line).await;
        emit_reply(&session, &reply, speech_enabled).await?;
        if matches!(reply, TurnReply::Exit(_)) {
            break;
        }
    }
    debug!("Session ended");
    Ok(())
}

async fn emit_reply(
    session: &AssistantSession,
    reply: &TurnReply,
    speech_enabled: bool,
) -> anyhow::Result<()> {
    let text = match reply {
        TurnReply::Say(text) | TurnReply::Sleep(text) | TurnReply::Exit(text) => text,
        TurnReply::Silent => return Ok(()),
    };

    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;

    if speech_enabled {
        if let Some(voice) = session.state().current_voice() {
            if let Err(e) = PiperSink.speak(text, &voice.model_path).await {
                warn!("Speech synthesis failed: {e}");
            }
        }
    }
    Ok(())
}
