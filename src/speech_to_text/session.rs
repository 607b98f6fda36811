//! Streaming recognition session.
//!
//! Each session runs as one actor task that owns the connection and all
//! session state. A second task pumps the audio source into a bounded
//! channel; the actor multiplexes that channel, the inbound frame stream and
//! the inactivity timer with `tokio::select!`, so every outbound frame and
//! every state change happens in one place.
//!
//! ```text
//! Idle -> Connecting -> Listening -> Transcribing -> Stopping -> Closed
//!                 \            \              \           \
//!                  +------------+--------------+-----------+--> Failed
//! ```

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::audio::AudioSource;
use super::callback::{RecognitionEvent, RecognizeCallback};
use super::messages::{IncomingEvent, SpeechRecognitionResults, StopMessage, is_no_speech_error};
use super::options::RecognizeOptions;
use super::transport::{CloseReason, ConnectRequest, Connection, Frame, FrameSink, Transport};
use crate::errors::{RecognitionError, RecognizeResult};

/// Default time allowed for the transport to open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of audio chunks buffered between the pump and the actor.
pub const DEFAULT_AUDIO_BUFFER: usize = 32;

const NORMAL_CLOSURE: u16 = 1000;

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Listening,
    Transcribing,
    Stopping,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// Audio may still be sent.
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Listening | Self::Transcribing)
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Connecting) => true,
            (Connecting, Listening) => true,
            (Listening, Transcribing) => true,
            (Listening | Transcribing, Stopping) => true,
            (Connecting | Listening | Transcribing | Stopping, Closed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Listening => "listening",
            Self::Transcribing => "transcribing",
            Self::Stopping => "stopping",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Settings
// =============================================================================

/// What to do with an inbound text frame that cannot be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedFramePolicy {
    /// Report a protocol error and fail the session.
    #[default]
    Abort,
    /// Log a warning and drop the frame.
    Skip,
}

impl FromStr for MalformedFramePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "Unknown malformed frame policy '{other}', expected 'abort' or 'skip'"
            )),
        }
    }
}

/// Client-side session behaviour, independent of the recognition options.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    /// Fail the session when no inbound frame arrives within this window.
    pub inactivity_timeout: Option<Duration>,
    pub malformed_frames: MalformedFramePolicy,
    pub audio_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            inactivity_timeout: None,
            malformed_frames: MalformedFramePolicy::default(),
            audio_buffer: DEFAULT_AUDIO_BUFFER,
        }
    }
}

// =============================================================================
// Result Index Tracking
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Fresh,
    /// Below the pending index; already delivered.
    Stale,
}

/// Tracks the next expected result index. Never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultIndexTracker {
    pending: i64,
}

impl ResultIndexTracker {
    pub fn pending(&self) -> i64 {
        self.pending
    }

    pub fn observe(&mut self, index: i64, is_final: bool) -> IndexStatus {
        let status = if index < self.pending {
            IndexStatus::Stale
        } else {
            IndexStatus::Fresh
        };
        let next = if is_final {
            index.saturating_add(1)
        } else {
            index
        };
        self.pending = self.pending.max(next);
        status
    }
}

// =============================================================================
// Builder and Handle
// =============================================================================

/// Assembles a session. Nothing touches the network until [`start`](Self::start).
pub struct SessionBuilder {
    transport: Arc<dyn Transport>,
    request: ConnectRequest,
    options: RecognizeOptions,
    settings: SessionSettings,
    audio: Option<Box<dyn AudioSource>>,
    callback: Option<Arc<dyn RecognizeCallback>>,
}

impl SessionBuilder {
    pub fn new(transport: Arc<dyn Transport>, request: ConnectRequest) -> Self {
        Self {
            transport,
            request,
            options: RecognizeOptions::default(),
            settings: SessionSettings::default(),
            audio: None,
            callback: None,
        }
    }

    pub fn options(mut self, options: RecognizeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn audio<A: AudioSource + 'static>(mut self, audio: A) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }

    pub fn callback(mut self, callback: Arc<dyn RecognizeCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Validate the request and spawn the session on the current Tokio
    /// runtime.
    ///
    /// Every failure here is a [`RecognitionError::Configuration`] and no
    /// event is delivered for it. Later failures arrive through the callback.
    pub fn start(self) -> RecognizeResult<RecognitionHandle> {
        let audio = self.audio.ok_or_else(|| {
            RecognitionError::Configuration("An audio source is required".to_string())
        })?;
        let callback = self.callback.ok_or_else(|| {
            RecognitionError::Configuration("A recognition callback is required".to_string())
        })?;
        self.options.validate()?;
        let start_message = self.options.start_message().to_json()?;
        let stop_message = StopMessage::new().to_json()?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            RecognitionError::Configuration(
                "Recognition sessions must be started inside a Tokio runtime".to_string(),
            )
        })?;

        let id = Uuid::new_v4();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let mut driver = SessionDriver::new(callback, self.settings, state_tx);
        driver.transition(SessionState::Connecting);

        let span = info_span!("recognition", session_id = %id);
        let task = runtime.spawn(
            driver
                .run(
                    self.transport,
                    self.request,
                    start_message,
                    stop_message,
                    audio,
                )
                .instrument(span),
        );

        Ok(RecognitionHandle {
            id,
            state: state_rx,
            task,
        })
    }
}

/// Handle to a running session.
///
/// Dropping it does not stop the session; close the audio source for that.
#[derive(Debug)]
pub struct RecognitionHandle {
    id: Uuid,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl RecognitionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end, after `Disconnected` has been delivered.
    pub async fn wait(self) -> SessionState {
        if let Err(e) = self.task.await {
            error!(session_id = %self.id, "Recognition task ended abnormally: {e}");
            return SessionState::Failed;
        }
        *self.state.borrow()
    }
}

// =============================================================================
// Audio Pump
// =============================================================================

#[derive(Debug)]
enum AudioEvent {
    Chunk(Bytes),
    End(AudioEnd),
}

#[derive(Debug)]
enum AudioEnd {
    Exhausted,
    Failed(io::Error),
}

/// Reads the source until it ends, errors or the session cancels it.
async fn pump_audio(
    mut audio: Box<dyn AudioSource>,
    tx: mpsc::Sender<AudioEvent>,
    cancel: CancellationToken,
) {
    let mut chunks: u64 = 0;
    let end = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(chunks, "Audio pump cancelled");
                return;
            }
            next = audio.next_chunk() => next,
        };

        match next {
            Ok(Some(chunk)) if chunk.is_empty() => continue,
            Ok(Some(chunk)) => {
                chunks += 1;
                if tx.send(AudioEvent::Chunk(chunk)).await.is_err() {
                    return;
                }
            }
            Ok(None) => break AudioEnd::Exhausted,
            Err(e) => break AudioEnd::Failed(e),
        }
    };

    debug!(chunks, "Audio source finished");
    let _ = tx.send(AudioEvent::End(end)).await;
}

// =============================================================================
// Session Actor
// =============================================================================

struct SessionDriver {
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    callback: Arc<dyn RecognizeCallback>,
    settings: SessionSettings,
    sink: Option<FrameSink>,
    close_reason: CloseReason,
    peer_closed: bool,
    stop_sent: bool,
    listening_seen: bool,
    final_received: bool,
    results: ResultIndexTracker,
    disconnected: bool,
}

impl SessionDriver {
    fn new(
        callback: Arc<dyn RecognizeCallback>,
        settings: SessionSettings,
        state_tx: watch::Sender<SessionState>,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            state_tx,
            callback,
            settings,
            sink: None,
            close_reason: CloseReason::new(NORMAL_CLOSURE, "Recognition finished"),
            peer_closed: false,
            stop_sent: false,
            listening_seen: false,
            final_received: false,
            results: ResultIndexTracker::default(),
            disconnected: false,
        }
    }

    async fn run(
        mut self,
        transport: Arc<dyn Transport>,
        request: ConnectRequest,
        start_message: String,
        stop_message: String,
        audio: Box<dyn AudioSource>,
    ) {
        info!(url = %request.url, "Opening recognition session");

        let connect_timeout = self.settings.connect_timeout;
        let connection = match timeout(connect_timeout, transport.open(request)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                self.fail(e).await;
                self.finish().await;
                return;
            }
            Err(_) => {
                self.fail(RecognitionError::Connect(format!(
                    "Connection timed out after {} seconds",
                    connect_timeout.as_secs_f64()
                )))
                .await;
                self.finish().await;
                return;
            }
        };

        let Connection { sink, mut stream } = connection;
        self.sink = Some(sink);
        self.emit(RecognitionEvent::Connected).await;

        if let Err(e) = self.send(Frame::Text(start_message)).await {
            self.fail(e).await;
            self.finish().await;
            return;
        }
        debug!("Sent start message");
        self.transition(SessionState::Listening);

        let cancel = CancellationToken::new();
        let (audio_tx, mut audio_rx) = mpsc::channel(self.settings.audio_buffer.max(1));
        tokio::spawn(pump_audio(audio, audio_tx, cancel.clone()).in_current_span());

        let inactivity = self.settings.inactivity_timeout;
        let idle = sleep(inactivity.unwrap_or(Duration::MAX));
        tokio::pin!(idle);
        let mut audio_open = true;

        while !self.state.is_terminal() {
            tokio::select! {
                biased;

                frame = stream.next() => {
                    // A window too large to add to `now` leaves the current deadline in place.
                    if let Some(deadline) = inactivity.and_then(|w| Instant::now().checked_add(w)) {
                        idle.as_mut().reset(deadline);
                    }
                    self.on_frame(frame).await;
                }

                event = audio_rx.recv(), if audio_open => match event {
                    Some(AudioEvent::Chunk(chunk)) => self.on_audio(chunk).await,
                    Some(AudioEvent::End(end)) => {
                        audio_open = false;
                        self.on_audio_end(end, &stop_message).await;
                    }
                    None => {
                        audio_open = false;
                        self.on_audio_end(AudioEnd::Exhausted, &stop_message).await;
                    }
                },

                () = &mut idle, if inactivity.is_some() => {
                    let window = inactivity.unwrap_or_default();
                    self.fail(RecognitionError::InactivityTimeout(format!(
                        "No message received for {} seconds",
                        window.as_secs_f64()
                    )))
                    .await;
                }
            }
        }

        cancel.cancel();
        drop(stream);
        self.finish().await;
    }

    async fn on_frame(&mut self, frame: Option<RecognizeResult<Frame>>) {
        match frame {
            Some(Ok(Frame::Text(text))) => self.on_text(&text).await,
            Some(Ok(Frame::Binary(data))) => {
                debug!(len = data.len(), "Ignoring binary frame");
            }
            Some(Ok(Frame::Close(reason))) => {
                info!(?reason, "Server closed the connection");
                self.peer_closed = true;
                self.transition(SessionState::Closed);
            }
            Some(Err(e)) => self.fail(e).await,
            None => {
                info!("Connection stream ended");
                self.peer_closed = true;
                self.transition(SessionState::Closed);
            }
        }
    }

    async fn on_text(&mut self, text: &str) {
        debug!(frame = %text, "Received frame");

        let event = match IncomingEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                match self.settings.malformed_frames {
                    MalformedFramePolicy::Abort => self.fail(e).await,
                    MalformedFramePolicy::Skip => warn!("Skipping malformed frame: {e}"),
                }
                return;
            }
        };

        match event {
            IncomingEvent::Error { error } => {
                let err = if is_no_speech_error(&error) {
                    RecognitionError::InactivityTimeout(error)
                } else {
                    RecognitionError::Service(error)
                };
                self.fail(err).await;
            }
            IncomingEvent::Results(results) => self.on_results(*results).await,
            IncomingEvent::StateUpdate { state } => self.on_state(state).await,
            IncomingEvent::RegistrationAck { status, .. } => {
                debug!(%status, "Ignoring registration acknowledgement");
            }
            IncomingEvent::Unrecognized(_) => debug!("Ignoring unrecognized message"),
        }
    }

    async fn on_results(&mut self, results: SpeechRecognitionResults) {
        let index = results.result_index.unwrap_or(self.results.pending());
        if self.results.observe(index, results.has_final()) == IndexStatus::Stale {
            debug!(
                index,
                pending = self.results.pending(),
                "Result index already delivered"
            );
        }

        if self.state == SessionState::Listening {
            self.transition(SessionState::Transcribing);
        }
        self.emit(RecognitionEvent::Transcription(results)).await;
    }

    async fn on_state(&mut self, state: Option<String>) {
        if !self.listening_seen {
            self.listening_seen = true;
            info!(state = state.as_deref().unwrap_or_default(), "Service is listening");
            self.emit(RecognitionEvent::Listening).await;
            return;
        }

        self.final_received = true;
        info!("Transcription complete");
        self.emit(RecognitionEvent::TranscriptionComplete).await;

        if self.stop_sent {
            self.close_reason = CloseReason::new(NORMAL_CLOSURE, "Transcription completed");
            self.transition(SessionState::Closed);
        }
    }

    async fn on_audio(&mut self, chunk: Bytes) {
        if !self.state.is_streaming() || self.stop_sent {
            debug!(len = chunk.len(), state = %self.state, "Dropping audio chunk");
            return;
        }
        if let Err(e) = self.send(Frame::Binary(chunk)).await {
            self.fail(e).await;
        }
    }

    async fn on_audio_end(&mut self, end: AudioEnd, stop_message: &str) {
        match end {
            AudioEnd::Exhausted => debug!("End of audio"),
            AudioEnd::Failed(e) => warn!("Audio source failed, stopping recognition: {e}"),
        }

        if self.stop_sent || !self.state.is_streaming() {
            return;
        }
        self.stop_sent = true;
        match self.send(Frame::Text(stop_message.to_string())).await {
            Ok(()) => {
                debug!("Sent stop message");
                self.transition(SessionState::Stopping);
            }
            Err(e) => self.fail(e).await,
        }
    }

    /// Move to `Failed` and report `err`. No-op once terminal.
    async fn fail(&mut self, err: RecognitionError) {
        if self.state.is_terminal() {
            debug!("Ignoring error after session end: {err}");
            return;
        }

        match &err {
            RecognitionError::InactivityTimeout(_) => warn!("Recognition session timed out: {err}"),
            _ => error!("Recognition session failed: {err}"),
        }
        self.close_reason = CloseReason::new(err.close_code(), "Recognition failed");
        self.transition(SessionState::Failed);

        let event = match err {
            RecognitionError::InactivityTimeout(_) => RecognitionEvent::InactivityTimeout(err),
            _ => RecognitionEvent::Error(err),
        };
        self.emit(event).await;
    }

    /// Close the connection (once) and deliver `Disconnected` (once).
    async fn finish(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if !self.peer_closed {
                let close = Frame::Close(Some(self.close_reason.clone()));
                if let Err(e) = sink.send(close).await {
                    debug!("Close frame not delivered: {e}");
                }
            }
            if let Err(e) = sink.close().await {
                debug!("Error closing connection: {e}");
            }
            info!(
                code = self.close_reason.code,
                state = %self.state,
                final_received = self.final_received,
                "Recognition session closed"
            );
        }

        self.emit(RecognitionEvent::Disconnected).await;
        self.disconnected = true;
    }

    async fn send(&mut self, frame: Frame) -> RecognizeResult<()> {
        let sink = self.sink.as_mut().ok_or_else(|| {
            RecognitionError::Transport("Connection is already closed".to_string())
        })?;
        sink.send(frame).await
    }

    async fn emit(&mut self, event: RecognitionEvent) {
        if self.disconnected {
            return;
        }
        debug!(event = event.name(), "Dispatching event");
        self.callback.handle(event).await;
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            debug!(from = %self.state, to = %next, "Ignoring state transition");
            return;
        }
        debug!(from = %self.state, to = %next, "Session state changed");
        self.state = next;
        self.state_tx.send_replace(next);
    }
}
