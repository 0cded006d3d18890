//! Speech providers backed by external programs.
//!
//! A recognizer command listens once and prints the transcript on stdout
//! (e.g. a whisper.cpp wrapper). A synthesizer command speaks the text it
//! is given (e.g. `espeak-ng`, `say`). Both are killed when the channel
//! stops them.
//!
//! Argument placeholders: `{text}` (synthesizer only) and `{lang}`. When no
//! argument contains `{text}`, the utterance is appended as the last one.
//! Rate and pitch are exported as `SHOPVOICE_RATE` / `SHOPVOICE_PITCH`.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::capture::{CaptureProvider, RecognitionSettings};
use crate::error::SpeechError;
use crate::playback::{PlaybackProvider, UtteranceHandle, VoiceSettings};

/// Whether `program` resolves to an existing file, either as a path or
/// through `PATH`.
pub fn program_on_path(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return Path::new(program).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(program);
                candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
            })
        })
        .unwrap_or(false)
}

fn expand_args(args: &[String], text: Option<&str>, language: &str) -> Vec<String> {
    let mut has_text = false;
    let mut expanded: Vec<String> = args
        .iter()
        .map(|arg| {
            let mut arg = arg.replace("{lang}", language);
            if let Some(text) = text {
                if arg.contains("{text}") {
                    has_text = true;
                    arg = arg.replace("{text}", text);
                }
            }
            arg
        })
        .collect();
    if let (Some(text), false) = (text, has_text) {
        expanded.push(text.to_string());
    }
    expanded
}

// =============================================================================
// Capture
// =============================================================================

/// Recognizer that runs a command and reads one transcript line from it.
#[derive(Debug, Clone)]
pub struct CommandCaptureProvider {
    argv: Vec<String>,
}

impl CommandCaptureProvider {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl CaptureProvider for CommandCaptureProvider {
    fn is_available(&self) -> bool {
        self.argv.first().is_some_and(|p| program_on_path(p))
    }

    async fn recognize(
        &self,
        settings: &RecognitionSettings,
    ) -> Result<Option<String>, SpeechError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| SpeechError::Unsupported("speech recognition".to_string()))?;

        let output = Command::new(program)
            .args(expand_args(args, None, &settings.language))
            .env("SHOPVOICE_LANG", &settings.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(SpeechError::Failed(format!(
                "recognizer exited with {}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }
}

// =============================================================================
// Playback
// =============================================================================

/// Synthesizer that runs a command per utterance.
#[derive(Debug, Clone)]
pub struct CommandPlaybackProvider {
    argv: Vec<String>,
}

impl CommandPlaybackProvider {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl PlaybackProvider for CommandPlaybackProvider {
    fn is_available(&self) -> bool {
        self.argv.first().is_some_and(|p| program_on_path(p))
    }

    async fn start(
        &self,
        text: &str,
        voice: &VoiceSettings,
    ) -> Result<Box<dyn UtteranceHandle>, SpeechError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| SpeechError::Unsupported("speech output".to_string()))?;

        let child = Command::new(program)
            .args(expand_args(args, Some(text), &voice.language))
            .env("SHOPVOICE_LANG", &voice.language)
            .env("SHOPVOICE_RATE", voice.rate.to_string())
            .env("SHOPVOICE_PITCH", voice.pitch.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        Ok(Box::new(ChildUtterance { child }))
    }
}

struct ChildUtterance {
    child: Child,
}

#[async_trait]
impl UtteranceHandle for ChildUtterance {
    async fn finished(&mut self) -> Result<(), SpeechError> {
        let status = self.child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Failed(format!("synthesizer exited with {status}")))
        }
    }

    async fn stop(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "Synthesizer already exited");
        }
    }
}
