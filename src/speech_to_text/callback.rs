//! Session events and the callback seam.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::messages::SpeechRecognitionResults;
use crate::errors::RecognitionError;

/// Everything a session reports to its caller.
///
/// `Connected` fires at most once and, when it does, comes first. A session
/// that never connects reports `Error` instead. `Disconnected` fires exactly
/// once and always last.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Connected,
    Listening,
    Transcription(SpeechRecognitionResults),
    TranscriptionComplete,
    Error(RecognitionError),
    InactivityTimeout(RecognitionError),
    Disconnected,
}

impl RecognitionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Listening => "listening",
            Self::Transcription(_) => "transcription",
            Self::TranscriptionComplete => "transcription_complete",
            Self::Error(_) => "error",
            Self::InactivityTimeout(_) => "inactivity_timeout",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Receives session events, one at a time, in order.
#[async_trait]
pub trait RecognizeCallback: Send + Sync {
    async fn handle(&self, event: RecognitionEvent);
}

#[async_trait]
impl RecognizeCallback for mpsc::UnboundedSender<RecognitionEvent> {
    async fn handle(&self, event: RecognitionEvent) {
        if self.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

#[async_trait]
impl RecognizeCallback for mpsc::Sender<RecognitionEvent> {
    async fn handle(&self, event: RecognitionEvent) {
        if self.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }
}

/// Adapter for a plain closure, see [`callback_fn`].
pub struct FnCallback<F>(F);

#[async_trait]
impl<F> RecognizeCallback for FnCallback<F>
where
    F: Fn(RecognitionEvent) + Send + Sync,
{
    async fn handle(&self, event: RecognitionEvent) {
        (self.0)(event)
    }
}

/// Wrap a synchronous closure as a [`RecognizeCallback`].
pub fn callback_fn<F>(f: F) -> FnCallback<F>
where
    F: Fn(RecognitionEvent) + Send + Sync,
{
    FnCallback(f)
}
