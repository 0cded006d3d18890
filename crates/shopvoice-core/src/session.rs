//! Shared conversation session state.
//!
//! `SessionState` is the record every collaborator reads; `SharedSession` is
//! the cloneable handle through which it is mutated. Each mutation is applied
//! under one lock and followed by a `SessionEvent` broadcast, so subscribers
//! observe changes in the order they happened.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::events::SessionEvent;
use crate::types::{Message, RetrievedDoc, ToolInfo, TurnResponse};

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// State of one conversation session. Lives only as long as the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    messages: Vec<Message>,
    draft: String,
    loading: bool,
    listening: bool,
    speaking: bool,
    last_tool: Option<ToolInfo>,
    retrieved_docs: Vec<RetrievedDoc>,
    /// Accepted turns still awaiting their reply; `loading` mirrors `> 0`.
    in_flight: usize,
}

impl SessionState {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current contents of the text input.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn listening(&self) -> bool {
        self.listening
    }

    pub fn speaking(&self) -> bool {
        self.speaking
    }

    pub fn last_tool(&self) -> Option<&ToolInfo> {
        self.last_tool.as_ref()
    }

    pub fn retrieved_docs(&self) -> &[RetrievedDoc] {
        &self.retrieved_docs
    }

    fn push(&mut self, message: Message, events: &broadcast::Sender<SessionEvent>) {
        let index = self.messages.len();
        self.messages.push(message.clone());
        let _ = events.send(SessionEvent::MessageAppended { index, message });
    }

    fn start_turn(&mut self, events: &broadcast::Sender<SessionEvent>) {
        self.in_flight += 1;
        self.set_loading(true, events);
    }

    fn finish_turn(&mut self, events: &broadcast::Sender<SessionEvent>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let loading = self.in_flight > 0;
        self.set_loading(loading, events);
    }

    fn set_loading(&mut self, loading: bool, events: &broadcast::Sender<SessionEvent>) {
        if self.loading != loading {
            self.loading = loading;
            let _ = events.send(SessionEvent::LoadingChanged { loading });
        }
    }
}

/// Why a submission did not start a turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnRejection {
    #[error("message is empty")]
    Blank,
    #[error("a turn is already awaiting its reply")]
    TurnInFlight,
}

/// Handle for a turn that has been accepted and is awaiting its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTicket {
    pub turn_id: Uuid,
    /// Trimmed text that was appended as the user message.
    pub text: String,
}

/// Cloneable handle to a session's state and event stream.
#[derive(Debug, Clone)]
pub struct SharedSession {
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SharedSession {
    /// Start a session with `greeting` as the first assistant message.
    pub fn new(greeting: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut state = SessionState::default();
        if !greeting.trim().is_empty() {
            state.messages.push(Message::assistant(greeting));
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Session mutex poisoned; continuing with inner state");
            poisoned.into_inner()
        })
    }

    /// Subscribe to session events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Publish an event that carries no state change.
    pub fn notify(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn set_draft(&self, text: &str) {
        self.lock().draft = text.to_string();
    }

    /// Trimmed contents of the text input. The input itself is left as is;
    /// it is cleared when a turn is accepted.
    pub fn draft_text(&self) -> String {
        self.lock().draft.trim().to_string()
    }

    // -- Turn lifecycle --

    /// Accept a submission: append the user message, clear the input and
    /// raise `loading`.
    ///
    /// Blank text is rejected without any change. With `reject_while_loading`
    /// set, a submission while another turn is awaiting its reply is
    /// rejected as well and the input is kept.
    pub fn begin_turn(
        &self,
        text: &str,
        reject_while_loading: bool,
    ) -> Result<TurnTicket, TurnRejection> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TurnRejection::Blank);
        }

        let mut state = self.lock();
        if reject_while_loading && state.loading {
            return Err(TurnRejection::TurnInFlight);
        }

        state.push(Message::user(text), &self.events);
        state.draft.clear();
        state.start_turn(&self.events);

        Ok(TurnTicket {
            turn_id: Uuid::new_v4(),
            text: text.to_string(),
        })
    }

    /// Apply a successful reply: assistant message, side panel replaced
    /// (absent fields clear it), `loading` lowered once no other accepted
    /// turn is still awaiting its reply.
    pub fn complete_turn(&self, response: &TurnResponse) {
        let mut state = self.lock();
        state.push(Message::assistant(response.reply.as_str()), &self.events);
        state.last_tool = response.last_tool.clone();
        state.retrieved_docs = response.retrieved_docs.clone().unwrap_or_default();
        let _ = self.events.send(SessionEvent::SidePanelUpdated {
            tool_name: state
                .last_tool
                .as_ref()
                .and_then(ToolInfo::name)
                .map(str::to_string),
            doc_count: state.retrieved_docs.len(),
        });
        state.finish_turn(&self.events);
    }

    /// Apply a failed turn: fallback message, `loading` lowered as in
    /// `complete_turn`, side panel left as the previous turn set it.
    pub fn fail_turn(&self, fallback: &str) {
        let mut state = self.lock();
        state.push(Message::assistant(fallback), &self.events);
        state.finish_turn(&self.events);
    }

    // -- Audio resource --

    /// Mark a capture session as open. Returns `false` if one already is.
    pub fn begin_listening(&self) -> bool {
        let mut state = self.lock();
        if state.listening {
            return false;
        }
        if state.speaking {
            // Capture owns the audio resource from here on.
            state.speaking = false;
            let _ = self.events.send(SessionEvent::SpeakingChanged { speaking: false });
        }
        state.listening = true;
        let _ = self.events.send(SessionEvent::ListeningChanged { listening: true });
        true
    }

    pub fn end_listening(&self) {
        let mut state = self.lock();
        if state.listening {
            state.listening = false;
            let _ = self
                .events
                .send(SessionEvent::ListeningChanged { listening: false });
        }
    }

    /// Mark an utterance as audible. Refused while a capture session is open.
    pub fn begin_speaking(&self) -> bool {
        let mut state = self.lock();
        if state.listening {
            return false;
        }
        if !state.speaking {
            state.speaking = true;
            let _ = self.events.send(SessionEvent::SpeakingChanged { speaking: true });
        }
        true
    }

    pub fn end_speaking(&self) {
        let mut state = self.lock();
        if state.speaking {
            state.speaking = false;
            let _ = self
                .events
                .send(SessionEvent::SpeakingChanged { speaking: false });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use serde_json::json;

    fn session() -> SharedSession {
        SharedSession::new("Hi, how can I help?")
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_new_session_has_greeting() {
        let s = session();
        let snap = s.snapshot();
        assert_eq!(snap.messages().len(), 1);
        assert_eq!(snap.messages()[0].role, Role::Assistant);
        assert_eq!(snap.messages()[0].text, "Hi, how can I help?");
        assert!(!snap.loading());
        assert!(!snap.listening());
        assert!(!snap.speaking());
        assert!(snap.last_tool().is_none());
        assert!(snap.retrieved_docs().is_empty());
    }

    #[test]
    fn test_blank_greeting_is_skipped() {
        assert!(SharedSession::new("  ").messages().is_empty());
    }

    #[test]
    fn test_begin_turn_appends_and_clears_draft() {
        let s = session();
        s.set_draft("  Where is my order?  ");
        let ticket = s.begin_turn(&s.draft_text(), true).unwrap();
        assert_eq!(ticket.text, "Where is my order?");

        let snap = s.snapshot();
        assert_eq!(snap.messages().len(), 2);
        assert_eq!(snap.messages()[1], Message::user("Where is my order?"));
        assert_eq!(snap.draft(), "");
        assert!(snap.loading());
    }

    #[test]
    fn test_blank_turn_is_rejected_without_changes() {
        let s = session();
        s.set_draft(" \t ");
        assert_eq!(s.begin_turn(" \t\n", true), Err(TurnRejection::Blank));
        let snap = s.snapshot();
        assert_eq!(snap.messages().len(), 1);
        assert!(!snap.loading());
        assert_eq!(snap.draft(), " \t ");
    }

    #[test]
    fn test_turn_in_flight_is_rejected() {
        let s = session();
        s.begin_turn("first", true).unwrap();
        s.set_draft("second");
        assert_eq!(s.begin_turn("second", true), Err(TurnRejection::TurnInFlight));
        let snap = s.snapshot();
        assert_eq!(snap.messages().len(), 2);
        assert_eq!(snap.draft(), "second");
    }

    #[test]
    fn test_overlapping_turns_allowed_when_not_rejecting() {
        let s = session();
        s.begin_turn("first", false).unwrap();
        s.begin_turn("second", false).unwrap();
        assert_eq!(s.messages().len(), 3);
    }

    #[test]
    fn test_overlapping_turns_keep_loading_until_last_resolves() {
        let s = session();
        let mut rx = s.subscribe();
        s.begin_turn("first", false).unwrap();
        s.begin_turn("second", false).unwrap();

        s.complete_turn(&TurnResponse::reply("first answer"));
        assert!(s.snapshot().loading());

        s.fail_turn("Sorry, something went wrong.");
        assert!(!s.snapshot().loading());

        let loading: Vec<SessionEvent> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::LoadingChanged { .. }))
            .collect();
        assert_eq!(
            loading,
            vec![
                SessionEvent::LoadingChanged { loading: true },
                SessionEvent::LoadingChanged { loading: false },
            ]
        );
    }

    #[test]
    fn test_complete_turn_replaces_side_panel() {
        let s = session();
        s.begin_turn("shoes", true).unwrap();
        let first: TurnResponse = serde_json::from_value(json!({
            "reply": "Here are some shoes.",
            "last_tool": {"name": "product_search"},
            "retrieved_docs": [{"title": "Runner", "final_price": "50"}]
        }))
        .unwrap();
        s.complete_turn(&first);

        let snap = s.snapshot();
        assert_eq!(snap.messages()[2], Message::assistant("Here are some shoes."));
        assert_eq!(snap.last_tool().and_then(ToolInfo::name), Some("product_search"));
        assert_eq!(snap.retrieved_docs().len(), 1);
        assert!(!snap.loading());

        s.begin_turn("thanks", true).unwrap();
        s.complete_turn(&TurnResponse::reply("You're welcome."));
        let snap = s.snapshot();
        assert!(snap.last_tool().is_none());
        assert!(snap.retrieved_docs().is_empty());
    }

    #[test]
    fn test_fail_turn_keeps_side_panel() {
        let s = session();
        s.begin_turn("shoes", true).unwrap();
        let first: TurnResponse = serde_json::from_value(json!({
            "reply": "Found one.",
            "last_tool": {"name": "product_search"},
            "retrieved_docs": [{"title": "Runner"}]
        }))
        .unwrap();
        s.complete_turn(&first);

        s.begin_turn("more", true).unwrap();
        s.fail_turn("Sorry, something went wrong.");

        let snap = s.snapshot();
        assert_eq!(
            snap.messages().last().unwrap(),
            &Message::assistant("Sorry, something went wrong.")
        );
        assert_eq!(snap.last_tool().and_then(ToolInfo::name), Some("product_search"));
        assert_eq!(snap.retrieved_docs().len(), 1);
        assert!(!snap.loading());
    }

    #[test]
    fn test_listening_is_idempotent() {
        let s = session();
        assert!(s.begin_listening());
        assert!(!s.begin_listening());
        s.end_listening();
        assert!(!s.snapshot().listening());
        assert!(s.begin_listening());
    }

    #[test]
    fn test_speaking_refused_while_listening() {
        let s = session();
        assert!(s.begin_listening());
        assert!(!s.begin_speaking());
        let snap = s.snapshot();
        assert!(snap.listening());
        assert!(!snap.speaking());
    }

    #[test]
    fn test_listening_takes_over_from_speaking() {
        let s = session();
        assert!(s.begin_speaking());
        assert!(s.begin_listening());
        let snap = s.snapshot();
        assert!(snap.listening());
        assert!(!snap.speaking());
    }

    #[test]
    fn test_events_follow_mutation_order() {
        let s = session();
        let mut rx = s.subscribe();
        s.begin_turn("hello", true).unwrap();
        s.complete_turn(&TurnResponse::reply("hi there"));

        let names: Vec<&str> = drain(&mut rx).iter().map(SessionEvent::event_name).collect();
        assert_eq!(
            names,
            vec![
                "message_appended",
                "loading_changed",
                "message_appended",
                "side_panel_updated",
                "loading_changed",
            ]
        );
    }

    #[test]
    fn test_speaking_events_only_on_change() {
        let s = session();
        let mut rx = s.subscribe();
        s.begin_speaking();
        s.begin_speaking();
        s.end_speaking();
        s.end_speaking();
        assert_eq!(
            drain(&mut rx),
            vec![
                SessionEvent::SpeakingChanged { speaking: true },
                SessionEvent::SpeakingChanged { speaking: false },
            ]
        );
    }

    #[test]
    fn test_clones_share_state() {
        let a = session();
        let b = a.clone();
        a.begin_turn("hello", true).unwrap();
        assert!(b.snapshot().loading());
    }
}
