//! Speech capture channel.
//!
//! Wraps a single-shot speech-to-text capability. One capture session is
//! open at a time; it yields at most one transcript through a oneshot
//! channel and then closes itself. Recognition errors are logged and
//! swallowed so they never reach the conversation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shopvoice_core::SharedSession;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::SpeechError;
use crate::playback::PlaybackChannel;

/// Parameters for one recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSettings {
    /// BCP-47 language tag, e.g. "en-US".
    pub language: String,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
        }
    }
}

/// A single-shot speech-to-text capability.
///
/// Recognition is non-continuous and reports final results only.
/// Dropping the future returned by `recognize` aborts the recognition.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Whether speech input can be captured at all.
    fn is_available(&self) -> bool;

    /// Listen for one utterance. `Ok(None)` when nothing was recognized.
    async fn recognize(&self, settings: &RecognitionSettings)
        -> Result<Option<String>, SpeechError>;
}

/// An open capture session.
#[derive(Debug)]
pub struct CaptureSession {
    id: Uuid,
    transcript: oneshot::Receiver<String>,
    cancel: CancellationToken,
}

impl CaptureSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// End the session early; no transcript will be produced.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session to close. Yields the transcript, or `None` if
    /// the session ended without one (silence, error, or stop).
    pub async fn transcript(self) -> Option<String> {
        self.transcript.await.ok()
    }
}

/// Speech input bound to a session and its playback channel.
pub struct CaptureChannel {
    provider: Option<Arc<dyn CaptureProvider>>,
    playback: Arc<PlaybackChannel>,
    session: SharedSession,
    settings: RecognitionSettings,
    current: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for CaptureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureChannel")
            .field("has_provider", &self.provider.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl CaptureChannel {
    /// Create a channel. `None` means the platform has no speech input.
    pub fn new(
        provider: Option<Arc<dyn CaptureProvider>>,
        playback: Arc<PlaybackChannel>,
        session: SharedSession,
        settings: RecognitionSettings,
    ) -> Self {
        Self {
            provider,
            playback,
            session,
            settings,
            current: Mutex::new(None),
        }
    }

    /// Whether speech input is usable.
    pub fn is_available(&self) -> bool {
        self.provider.as_ref().is_some_and(|p| p.is_available())
    }

    /// Open a capture session.
    ///
    /// Playback is cancelled first. Returns `Err(SpeechError::Unsupported)`
    /// without touching the session when there is no speech input, and
    /// `Ok(None)` when a session is already open.
    pub fn start_capture(&self) -> Result<Option<CaptureSession>, SpeechError> {
        self.playback.cancel();

        let provider = match &self.provider {
            Some(p) if p.is_available() => Arc::clone(p),
            _ => return Err(SpeechError::Unsupported("speech recognition".to_string())),
        };
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SpeechError::Failed(format!("no async runtime: {e}")))?;

        if !self.session.begin_listening() {
            tracing::debug!("Capture already active; ignoring start request");
            return Ok(None);
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(cancel.clone());

        tracing::info!(capture_id = %id, language = %self.settings.language, "Capture started");
        runtime.spawn(run_capture(
            provider,
            self.session.clone(),
            self.settings.clone(),
            id,
            cancel.clone(),
            tx,
        ));

        Ok(Some(CaptureSession {
            id,
            transcript: rx,
            cancel,
        }))
    }

    /// Stop the open capture session, if any.
    pub fn stop_capture(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(cancel) = current {
            cancel.cancel();
        }
    }
}

async fn run_capture(
    provider: Arc<dyn CaptureProvider>,
    session: SharedSession,
    settings: RecognitionSettings,
    id: Uuid,
    cancel: CancellationToken,
    tx: oneshot::Sender<String>,
) {
    let result = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!(capture_id = %id, "Capture stopped");
            Ok(None)
        }
        result = provider.recognize(&settings) => result,
    };

    // Close the window before handing the transcript on, so the turn it
    // starts finds the audio resource free.
    session.end_listening();

    match result {
        Ok(Some(text)) if !text.trim().is_empty() => {
            tracing::info!(capture_id = %id, text_len = text.len(), "Speech recognized");
            let _ = tx.send(text.trim().to_string());
        }
        Ok(_) => tracing::debug!(capture_id = %id, "Capture ended without a transcript"),
        Err(e) => tracing::warn!(capture_id = %id, error = %e, "Speech recognition failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCaptureProvider, MockPlaybackProvider};
    use crate::playback::{PlaybackProvider, VoiceSettings};
    use std::time::Duration;

    struct Fixture {
        capture: CaptureChannel,
        playback: Arc<PlaybackChannel>,
        session: SharedSession,
    }

    fn fixture(capture: Option<MockCaptureProvider>, playback: MockPlaybackProvider) -> Fixture {
        let session = SharedSession::new("hello");
        let playback = Arc::new(PlaybackChannel::new(
            Some(Arc::new(playback) as Arc<dyn PlaybackProvider>),
            session.clone(),
            VoiceSettings::default(),
        ));
        let capture = CaptureChannel::new(
            capture.map(|c| Arc::new(c) as Arc<dyn CaptureProvider>),
            Arc::clone(&playback),
            session.clone(),
            RecognitionSettings::default(),
        );
        Fixture {
            capture,
            playback,
            session,
        }
    }

    #[tokio::test]
    async fn test_capture_yields_one_transcript() {
        let mock = MockCaptureProvider::new().with_transcript("track order 123");
        let f = fixture(Some(mock.clone()), MockPlaybackProvider::new());

        let session = f.capture.start_capture().unwrap().unwrap();
        assert_eq!(session.transcript().await.as_deref(), Some("track order 123"));
        assert!(!f.session.snapshot().listening());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_capture_changes_nothing() {
        let f = fixture(None, MockPlaybackProvider::new());
        let before = f.session.snapshot();

        let err = f.capture.start_capture().unwrap_err();
        assert!(matches!(err, SpeechError::Unsupported(_)));
        assert_eq!(f.session.snapshot(), before);
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_unsupported() {
        let f = fixture(
            Some(MockCaptureProvider::unavailable()),
            MockPlaybackProvider::new(),
        );
        assert!(!f.capture.is_available());
        assert!(matches!(
            f.capture.start_capture(),
            Err(SpeechError::Unsupported(_))
        ));
        assert!(!f.session.snapshot().listening());
    }

    #[tokio::test]
    async fn test_second_start_while_listening_is_noop() {
        let mock = MockCaptureProvider::held().with_transcript("where is my order");
        let f = fixture(Some(mock.clone()), MockPlaybackProvider::new());

        let first = f.capture.start_capture().unwrap().unwrap();
        assert!(f.session.snapshot().listening());
        assert!(f.capture.start_capture().unwrap().is_none());

        mock.release();
        assert_eq!(first.transcript().await.as_deref(), Some("where is my order"));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_recognition_error_is_swallowed() {
        let mock = MockCaptureProvider::new().with_error("network");
        let f = fixture(Some(mock), MockPlaybackProvider::new());

        let session = f.capture.start_capture().unwrap().unwrap();
        assert!(session.transcript().await.is_none());
        assert!(!f.session.snapshot().listening());
        assert_eq!(f.session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_transcript_is_dropped() {
        let mock = MockCaptureProvider::new().with_transcript("   ");
        let f = fixture(Some(mock), MockPlaybackProvider::new());
        let session = f.capture.start_capture().unwrap().unwrap();
        assert!(session.transcript().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_ends_session_without_transcript() {
        let mock = MockCaptureProvider::held().with_transcript("never delivered");
        let f = fixture(Some(mock), MockPlaybackProvider::new());

        let session = f.capture.start_capture().unwrap().unwrap();
        f.capture.stop_capture();
        assert!(session.transcript().await.is_none());
        assert!(!f.session.snapshot().listening());
    }

    #[tokio::test]
    async fn test_capture_cancels_playback_first() {
        let playback_mock = MockPlaybackProvider::held();
        let f = fixture(
            Some(MockCaptureProvider::held()),
            playback_mock.clone(),
        );

        f.playback.speak("a long reply").unwrap();
        for _ in 0..200 {
            if f.session.snapshot().speaking() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(f.session.snapshot().speaking());

        let _session = f.capture.start_capture().unwrap().unwrap();
        let snap = f.session.snapshot();
        assert!(snap.listening());
        assert!(!snap.speaking());
        assert_eq!(f.playback.current(), None);
    }
}
