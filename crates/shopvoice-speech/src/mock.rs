//! Mock speech providers for testing without audio hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::capture::{CaptureProvider, RecognitionSettings};
use crate::error::SpeechError;
use crate::playback::{PlaybackProvider, UtteranceHandle, VoiceSettings};

// =============================================================================
// Capture
// =============================================================================

#[derive(Debug, Default)]
struct CaptureInner {
    available: bool,
    held: bool,
    results: Mutex<VecDeque<Result<Option<String>, String>>>,
    release: Notify,
    calls: AtomicUsize,
}

/// Scripted speech recognizer.
///
/// Each `recognize` call pops the next scripted result; an empty script
/// recognizes nothing. A held recognizer blocks until `release` is called.
#[derive(Debug, Clone)]
pub struct MockCaptureProvider {
    inner: Arc<CaptureInner>,
}

impl Default for MockCaptureProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCaptureProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CaptureInner {
                available: true,
                ..CaptureInner::default()
            }),
        }
    }

    /// A recognizer that waits for `release` before answering.
    pub fn held() -> Self {
        Self {
            inner: Arc::new(CaptureInner {
                available: true,
                held: true,
                ..CaptureInner::default()
            }),
        }
    }

    /// A platform without speech input.
    pub fn unavailable() -> Self {
        Self {
            inner: Arc::new(CaptureInner::default()),
        }
    }

    pub fn with_transcript(self, text: &str) -> Self {
        self.push(Ok(Some(text.to_string())));
        self
    }

    pub fn with_error(self, reason: &str) -> Self {
        self.push(Err(reason.to_string()));
        self
    }

    fn push(&self, result: Result<Option<String>, String>) {
        self.inner
            .results
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(result);
    }

    /// Let a held recognition answer.
    pub fn release(&self) {
        self.inner.release.notify_one();
    }

    /// Number of recognitions started.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureProvider for MockCaptureProvider {
    fn is_available(&self) -> bool {
        self.inner.available
    }

    async fn recognize(
        &self,
        _settings: &RecognitionSettings,
    ) -> Result<Option<String>, SpeechError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.held {
            self.inner.release.notified().await;
        }
        let next = self
            .inner
            .results
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(SpeechError::Failed(reason)),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Playback
// =============================================================================

#[derive(Debug, Default)]
struct PlaybackInner {
    available: bool,
    held: bool,
    fail_start: bool,
    spoken: Mutex<Vec<String>>,
    finish: Notify,
    stops: AtomicUsize,
}

/// Recording speech synthesizer.
///
/// Utterances finish immediately unless the provider is held, in which
/// case each one plays until `finish_current` or until it is stopped.
#[derive(Debug, Clone)]
pub struct MockPlaybackProvider {
    inner: Arc<PlaybackInner>,
}

impl Default for MockPlaybackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlaybackProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PlaybackInner {
                available: true,
                ..PlaybackInner::default()
            }),
        }
    }

    /// A synthesizer whose utterances play until told to finish.
    pub fn held() -> Self {
        Self {
            inner: Arc::new(PlaybackInner {
                available: true,
                held: true,
                ..PlaybackInner::default()
            }),
        }
    }

    /// A synthesizer that errors when asked to start.
    pub fn failing() -> Self {
        Self {
            inner: Arc::new(PlaybackInner {
                available: true,
                fail_start: true,
                ..PlaybackInner::default()
            }),
        }
    }

    /// A platform without speech output.
    pub fn unavailable() -> Self {
        Self {
            inner: Arc::new(PlaybackInner::default()),
        }
    }

    /// Texts handed to `start`, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.inner
            .spoken
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Number of utterances silenced via `stop`.
    pub fn stop_count(&self) -> usize {
        self.inner.stops.load(Ordering::SeqCst)
    }

    /// Let the held utterance reach its natural end.
    pub fn finish_current(&self) {
        self.inner.finish.notify_one();
    }
}

#[async_trait]
impl PlaybackProvider for MockPlaybackProvider {
    fn is_available(&self) -> bool {
        self.inner.available
    }

    async fn start(
        &self,
        text: &str,
        _voice: &VoiceSettings,
    ) -> Result<Box<dyn UtteranceHandle>, SpeechError> {
        if self.inner.fail_start {
            return Err(SpeechError::Failed("synthesis-failed".to_string()));
        }
        self.inner
            .spoken
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(text.to_string());
        Ok(Box::new(MockUtterance {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MockUtterance {
    inner: Arc<PlaybackInner>,
}

#[async_trait]
impl UtteranceHandle for MockUtterance {
    async fn finished(&mut self) -> Result<(), SpeechError> {
        if self.inner.held {
            self.inner.finish.notified().await;
        }
        Ok(())
    }

    async fn stop(&mut self) {
        self.inner.stops.fetch_add(1, Ordering::SeqCst);
    }
}
