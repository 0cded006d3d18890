//! Speech playback channel.
//!
//! Renders assistant replies as speech through an injected
//! `PlaybackProvider` and mirrors each utterance's lifecycle into the
//! session's `speaking` flag. There is no queue: `speak` always pre-empts
//! the utterance in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use shopvoice_core::SharedSession;
use tokio_util::sync::CancellationToken;

use crate::error::SpeechError;

/// Identifier of one utterance, unique per channel.
pub type UtteranceId = u64;

/// Voice parameters handed to the synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    /// BCP-47 language tag, e.g. "en-US".
    pub language: String,
    /// Speaking rate, 1.0 = normal.
    pub rate: f32,
    /// Pitch, 1.0 = normal.
    pub pitch: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

/// A text-to-speech capability.
#[async_trait]
pub trait PlaybackProvider: Send + Sync {
    /// Whether speech output can be produced at all.
    fn is_available(&self) -> bool;

    /// Begin rendering `text`. Resolves once audio output has started.
    async fn start(
        &self,
        text: &str,
        voice: &VoiceSettings,
    ) -> Result<Box<dyn UtteranceHandle>, SpeechError>;
}

/// An utterance that is currently audible.
#[async_trait]
pub trait UtteranceHandle: Send {
    /// Resolves when the utterance has finished, or with an error if
    /// playback broke off.
    async fn finished(&mut self) -> Result<(), SpeechError>;

    /// Silence the utterance immediately.
    async fn stop(&mut self);
}

struct ActiveUtterance {
    id: UtteranceId,
    cancel: CancellationToken,
}

/// Single-utterance speech output bound to a session.
pub struct PlaybackChannel {
    provider: Option<Arc<dyn PlaybackProvider>>,
    session: SharedSession,
    voice: VoiceSettings,
    active: Arc<Mutex<Option<ActiveUtterance>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for PlaybackChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackChannel")
            .field("has_provider", &self.provider.is_some())
            .field("voice", &self.voice)
            .finish()
    }
}

fn lock_active(
    active: &Mutex<Option<ActiveUtterance>>,
) -> MutexGuard<'_, Option<ActiveUtterance>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PlaybackChannel {
    /// Create a channel. `None` means the platform has no speech output;
    /// every `speak` is then a silent no-op.
    pub fn new(
        provider: Option<Arc<dyn PlaybackProvider>>,
        session: SharedSession,
        voice: VoiceSettings,
    ) -> Self {
        Self {
            provider,
            session,
            voice,
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Whether speech output is usable.
    pub fn is_available(&self) -> bool {
        self.provider.as_ref().is_some_and(|p| p.is_available())
    }

    /// Speak `text`, cutting off whatever is currently playing.
    ///
    /// Returns the new utterance's id, or `None` when nothing was started
    /// (no speech output, blank text, or no async runtime).
    pub fn speak(&self, text: &str) -> Option<UtteranceId> {
        self.cancel();

        let provider = match &self.provider {
            Some(p) if p.is_available() => Arc::clone(p),
            _ => {
                tracing::debug!("Speech output unavailable; skipping playback");
                return None;
            }
        };
        if text.trim().is_empty() {
            return None;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Playback requested outside an async runtime");
                return None;
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        {
            let mut active = lock_active(&self.active);
            if let Some(previous) = active.replace(ActiveUtterance {
                id,
                cancel: cancel.clone(),
            }) {
                // A concurrent speak slipped in after our cancel.
                previous.cancel.cancel();
                self.session.end_speaking();
            }
        }

        tracing::debug!(utterance_id = id, text_len = text.len(), "Playback requested");
        runtime.spawn(run_utterance(
            provider,
            Arc::clone(&self.active),
            self.session.clone(),
            self.voice.clone(),
            id,
            cancel,
            text.to_string(),
        ));
        Some(id)
    }

    /// Stop the utterance in flight, if any. `speaking` is cleared before
    /// this returns.
    pub fn cancel(&self) {
        let mut active = lock_active(&self.active);
        if let Some(current) = active.take() {
            current.cancel.cancel();
            tracing::debug!(utterance_id = current.id, "Playback cancelled");
        }
        self.session.end_speaking();
    }

    /// Id of the utterance currently owning the channel.
    pub fn current(&self) -> Option<UtteranceId> {
        lock_active(&self.active).as_ref().map(|a| a.id)
    }
}

/// Drive one utterance from start to end, publishing its lifecycle unless
/// it has been superseded.
async fn run_utterance(
    provider: Arc<dyn PlaybackProvider>,
    active: Arc<Mutex<Option<ActiveUtterance>>>,
    session: SharedSession,
    voice: VoiceSettings,
    id: UtteranceId,
    cancel: CancellationToken,
    text: String,
) {
    let started = tokio::select! {
        _ = cancel.cancelled() => return,
        result = provider.start(&text, &voice) => result,
    };

    let mut handle = match started {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(utterance_id = id, error = %e, "Playback failed to start");
            release_if_current(&active, id);
            return;
        }
    };

    // Start event: only the current utterance may raise `speaking`.
    let audible = {
        let mut guard = lock_active(&active);
        match guard.as_ref() {
            Some(current) if current.id == id && !cancel.is_cancelled() => {
                if session.begin_speaking() {
                    true
                } else {
                    tracing::debug!(utterance_id = id, "Capture is active; dropping utterance");
                    guard.take();
                    false
                }
            }
            _ => false,
        }
    };
    if !audible {
        handle.stop().await;
        return;
    }
    tracing::debug!(utterance_id = id, "Playback started");

    let finished = tokio::select! {
        _ = cancel.cancelled() => None,
        result = handle.finished() => Some(result),
    };

    match finished {
        None => handle.stop().await,
        Some(result) => {
            if let Err(e) = result {
                tracing::warn!(utterance_id = id, error = %e, "Playback ended with an error");
            } else {
                tracing::debug!(utterance_id = id, "Playback finished");
            }
            let mut guard = lock_active(&active);
            if guard.as_ref().is_some_and(|current| current.id == id) {
                guard.take();
                session.end_speaking();
            }
        }
    }
}

fn release_if_current(active: &Mutex<Option<ActiveUtterance>>, id: UtteranceId) {
    let mut guard = lock_active(active);
    if guard.as_ref().is_some_and(|current| current.id == id) {
        guard.take();
    }
}
