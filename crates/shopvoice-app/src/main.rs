//! ShopVoice console client - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Install the tracing subscriber
//! 3. Build the backend gateway and the speech providers
//! 4. Run the console loop until /quit, EOF or Ctrl-C

mod cli;
mod console;

use std::sync::Arc;

use clap::Parser;
use shopvoice_chat::{ChatError, TurnController, TurnOutcome};
use shopvoice_core::config::SpeechConfig;
use shopvoice_core::{SessionEvent, ShopVoiceConfig};
use shopvoice_gateway::HttpGateway;
use shopvoice_speech::command::program_on_path;
use shopvoice_speech::{
    CaptureProvider, CommandCaptureProvider, CommandPlaybackProvider, PlaybackProvider,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use cli::CliArgs;
use console::ConsoleCommand;

/// Synthesizers tried, in order, when none is configured.
const DEFAULT_SYNTHESIZERS: &[&str] = &["say", "espeak-ng", "espeak"];

fn capture_provider(speech: &SpeechConfig, args: &CliArgs) -> Option<Arc<dyn CaptureProvider>> {
    if args.no_voice || !speech.enabled {
        tracing::info!("Speech input disabled");
        return None;
    }
    let argv = speech.capture_command.clone().filter(|a| !a.is_empty())?;
    let provider = CommandCaptureProvider::new(argv);
    if !provider.is_available() {
        tracing::warn!("Configured recognizer command was not found");
    }
    Some(Arc::new(provider))
}

fn playback_provider(speech: &SpeechConfig, args: &CliArgs) -> Option<Arc<dyn PlaybackProvider>> {
    if args.mute || !speech.enabled {
        tracing::info!("Speech output disabled");
        return None;
    }
    let argv = match speech.playback_command.clone().filter(|a| !a.is_empty()) {
        Some(argv) => argv,
        None => {
            let program = DEFAULT_SYNTHESIZERS
                .iter()
                .find(|p| program_on_path(p))?;
            tracing::debug!(program, "Using default synthesizer");
            vec![program.to_string()]
        }
    };
    Some(Arc::new(CommandPlaybackProvider::new(argv)))
}

/// Print session events as console lines until the session goes away.
async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = console::render_event(&event) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Console fell behind session events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn report_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Rejected => println!("(still waiting for the previous reply)"),
        TurnOutcome::Failed { turn_id, error } => {
            tracing::debug!(turn_id = %turn_id, error = %error, "Turn ended with fallback");
        }
        TurnOutcome::Ignored | TurnOutcome::Replied { .. } => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ShopVoiceConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    if let Some(ref url) = args.api_base_url {
        config.backend.api_base_url = url.clone();
    }

    // Tracing. Logs go to stderr so they stay out of the transcript.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting ShopVoice v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Backend.
    let gateway = HttpGateway::new(&config.backend.api_base_url)?;
    if let Err(e) = gateway.health().await {
        tracing::warn!(
            base_url = gateway.base_url(),
            error = %e,
            "Backend health check failed; turns may fail"
        );
    }

    // Speech + turn controller.
    let capture = capture_provider(&config.speech, &args);
    let playback = playback_provider(&config.speech, &args);
    let controller = Arc::new(TurnController::new(
        &config,
        Arc::new(gateway),
        capture,
        playback,
    ));

    let printer = tokio::spawn(print_events(controller.session().subscribe()));

    for message in controller.session().messages() {
        println!("{}", console::render_message(&message));
    }
    if !controller.capture().is_available() {
        tracing::info!("Speech input unavailable; /voice will show a notice");
    }
    controller.greet();

    // Console loop.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match console::parse_command(&line) {
            ConsoleCommand::Say(text) => match controller.accept(&text) {
                Ok(ticket) => {
                    let controller = Arc::clone(&controller);
                    tokio::spawn(async move {
                        report_outcome(&controller.dispatch(ticket).await);
                    });
                }
                Err(outcome) => report_outcome(&outcome),
            },
            ConsoleCommand::Voice => {
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    match controller.start_voice_turn().await {
                        Ok(Some(outcome)) => report_outcome(&outcome),
                        Ok(None) => {}
                        // Shown through the session event.
                        Err(ChatError::CaptureUnsupported) => {}
                        Err(e) => tracing::warn!(error = %e, "Voice turn failed"),
                    }
                });
            }
            ConsoleCommand::Stop => {
                controller.stop_speaking();
                controller.stop_listening();
            }
            ConsoleCommand::Panel => {
                print!("{}", console::render_panel(&controller.session().snapshot()));
            }
            ConsoleCommand::Help => println!("{}", console::HELP),
            ConsoleCommand::Quit => break,
            ConsoleCommand::Empty => {}
            ConsoleCommand::Unknown(cmd) => println!("Unknown command {cmd}; type /help"),
        }
    }

    controller.stop_speaking();
    controller.stop_listening();
    printer.abort();
    tracing::info!("ShopVoice stopped");
    Ok(())
}
