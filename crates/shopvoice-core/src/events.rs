use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Changes to a conversation session, published after the state mutation
/// has been applied.
///
/// Consumed by the front-end to re-render the transcript and indicators,
/// and by tests to observe lifecycle ordering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SessionEvent {
    /// A message was appended to the log. `index` is its position.
    MessageAppended { index: usize, message: Message },

    /// A turn started or finished waiting on the backend.
    LoadingChanged { loading: bool },

    /// A capture session opened or closed.
    ListeningChanged { listening: bool },

    /// An utterance started or stopped.
    SpeakingChanged { speaking: bool },

    /// Last tool and retrieved documents were replaced.
    SidePanelUpdated {
        tool_name: Option<String>,
        doc_count: usize,
    },

    /// Capture was requested but the platform has no speech input.
    CaptureUnsupported,
}

impl SessionEvent {
    /// Returns a short event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::MessageAppended { .. } => "message_appended",
            SessionEvent::LoadingChanged { .. } => "loading_changed",
            SessionEvent::ListeningChanged { .. } => "listening_changed",
            SessionEvent::SpeakingChanged { .. } => "speaking_changed",
            SessionEvent::SidePanelUpdated { .. } => "side_panel_updated",
            SessionEvent::CaptureUnsupported => "capture_unsupported",
        }
    }
}
