//! ShopVoice speech crate - speech capture and playback channels.
//!
//! Platform speech services are injected as capability traits
//! (`CaptureProvider`, `PlaybackProvider`). The channels wrap them with the
//! session rules: one capture session at a time, one audible utterance at a
//! time, and capture pre-empting playback. Command-line providers drive
//! external recognizer/synthesizer programs; mock providers are included for
//! testing without audio hardware.

pub mod capture;
pub mod command;
pub mod error;
pub mod mock;
pub mod playback;

pub use capture::{CaptureChannel, CaptureProvider, CaptureSession, RecognitionSettings};
pub use command::{CommandCaptureProvider, CommandPlaybackProvider};
pub use error::SpeechError;
pub use mock::{MockCaptureProvider, MockPlaybackProvider};
pub use playback::{PlaybackChannel, PlaybackProvider, UtteranceHandle, UtteranceId, VoiceSettings};
