//! Turn controller: the conversational turn state machine.
//!
//! A turn is accepted (user message appended, `loading` raised), dispatched
//! to the backend, and resolved either with the assistant reply, which is
//! then spoken, or with the fallback message. Typed and spoken input enter
//! through the same `submit`.

use std::sync::Arc;

use shopvoice_core::config::SessionConfig;
use shopvoice_core::{SessionEvent, SharedSession, ShopVoiceConfig, TurnRejection, TurnTicket};
use shopvoice_gateway::RemoteGateway;
use shopvoice_speech::{
    CaptureChannel, CaptureProvider, PlaybackChannel, PlaybackProvider, RecognitionSettings,
    SpeechError, VoiceSettings,
};
use uuid::Uuid;

use crate::error::ChatError;

/// How a submission ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// Another turn is still awaiting its reply.
    Rejected,
    /// The backend answered; the reply is in the log and being spoken.
    Replied { turn_id: Uuid, reply: String },
    /// The exchange failed; the fallback message is in the log.
    Failed { turn_id: Uuid, error: ChatError },
}

/// Orchestrates turns over one session.
pub struct TurnController {
    session: SharedSession,
    gateway: Arc<dyn RemoteGateway>,
    playback: Arc<PlaybackChannel>,
    capture: CaptureChannel,
    config: SessionConfig,
}

impl std::fmt::Debug for TurnController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnController")
            .field("playback", &self.playback)
            .field("capture", &self.capture)
            .field("config", &self.config)
            .finish()
    }
}

impl TurnController {
    /// Start a session and wire both speech channels to it.
    ///
    /// A `None` provider means the platform lacks that capability.
    pub fn new(
        config: &ShopVoiceConfig,
        gateway: Arc<dyn RemoteGateway>,
        capture: Option<Arc<dyn CaptureProvider>>,
        playback: Option<Arc<dyn PlaybackProvider>>,
    ) -> Self {
        let session = SharedSession::new(&config.session.greeting);
        let voice = VoiceSettings {
            language: config.speech.language.clone(),
            rate: config.speech.rate,
            pitch: config.speech.pitch,
        };
        let playback = Arc::new(PlaybackChannel::new(playback, session.clone(), voice));
        let capture = CaptureChannel::new(
            capture,
            Arc::clone(&playback),
            session.clone(),
            RecognitionSettings {
                language: config.speech.language.clone(),
            },
        );

        Self {
            session,
            gateway,
            playback,
            capture,
            config: config.session.clone(),
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn playback(&self) -> &PlaybackChannel {
        &self.playback
    }

    pub fn capture(&self) -> &CaptureChannel {
        &self.capture
    }

    /// Speak the greeting when configured to. Call once after start-up.
    pub fn greet(&self) {
        if self.config.speak_greeting {
            self.playback.speak(&self.config.greeting);
        }
    }

    /// Submit the text input.
    pub async fn submit_draft(&self) -> TurnOutcome {
        let text = self.session.draft_text();
        self.submit(&text).await
    }

    /// Run one turn with `text`, whatever its origin.
    ///
    /// The user message is in the log before the backend is contacted.
    pub async fn submit(&self, text: &str) -> TurnOutcome {
        match self.accept(text) {
            Ok(ticket) => self.dispatch(ticket).await,
            Err(outcome) => outcome,
        }
    }

    /// First half of `submit`, without suspending: append the user message
    /// and raise `loading`. `Err` carries `Ignored` or `Rejected`.
    ///
    /// Front-ends that hand the exchange to a task call this inline so
    /// input arriving in a burst is accepted in order.
    pub fn accept(&self, text: &str) -> Result<TurnTicket, TurnOutcome> {
        match self
            .session
            .begin_turn(text, self.config.reject_while_loading)
        {
            Ok(ticket) => Ok(ticket),
            Err(TurnRejection::Blank) => Err(TurnOutcome::Ignored),
            Err(TurnRejection::TurnInFlight) => {
                tracing::info!("Submission rejected: a turn is awaiting its reply");
                Err(TurnOutcome::Rejected)
            }
        }
    }

    /// Second half of `submit`: exchange an accepted turn with the backend
    /// and resolve it.
    pub async fn dispatch(&self, ticket: TurnTicket) -> TurnOutcome {
        let turn_id = ticket.turn_id;
        tracing::info!(turn_id = %turn_id, text_len = ticket.text.len(), "Turn dispatched");

        match self.gateway.send_turn(&ticket.text).await {
            Ok(response) => {
                self.session.complete_turn(&response);
                tracing::info!(
                    turn_id = %turn_id,
                    reply_len = response.reply.len(),
                    "Turn completed"
                );
                self.playback.speak(&response.reply);
                TurnOutcome::Replied {
                    turn_id,
                    reply: response.reply,
                }
            }
            Err(e) => {
                tracing::warn!(turn_id = %turn_id, error = %e, "Turn failed");
                self.session.fail_turn(&self.config.fallback_reply);
                TurnOutcome::Failed {
                    turn_id,
                    error: e.into(),
                }
            }
        }
    }

    /// Capture one spoken utterance and submit it.
    ///
    /// `Ok(None)` when a capture session was already open or nothing was
    /// recognized. Without speech input a `CaptureUnsupported` event is
    /// published and `ChatError::CaptureUnsupported` returned.
    pub async fn start_voice_turn(&self) -> Result<Option<TurnOutcome>, ChatError> {
        let capture = match self.capture.start_capture() {
            Ok(Some(capture)) => capture,
            Ok(None) => return Ok(None),
            Err(SpeechError::Unsupported(_)) => {
                self.session.notify(SessionEvent::CaptureUnsupported);
                return Err(ChatError::CaptureUnsupported);
            }
            Err(e) => return Err(e.into()),
        };
        let capture_id = capture.id();

        match capture.transcript().await {
            Some(text) => {
                tracing::debug!(capture_id = %capture_id, "Submitting transcript");
                Ok(Some(self.submit(&text).await))
            }
            None => Ok(None),
        }
    }

    /// End the open capture session without a transcript.
    pub fn stop_listening(&self) {
        self.capture.stop_capture();
    }

    /// Silence the current utterance.
    pub fn stop_speaking(&self) {
        self.playback.cancel();
    }
}
