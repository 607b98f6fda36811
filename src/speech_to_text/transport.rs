//! Duplex message transport used by a recognition session.
//!
//! The session only sees [`Frame`]s through a boxed sink and stream, so tests
//! can drive it with in-memory channels while production code goes through
//! [`WebSocketTransport`].

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future;
use futures::{Sink, SinkExt, Stream, StreamExt};
use http::HeaderMap;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tracing::{debug, info};
use url::Url;

use crate::errors::{RecognitionError, RecognizeResult};

/// A single message on the duplex channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Close(Option<CloseReason>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = RecognitionError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = RecognizeResult<Frame>> + Send>>;

/// An open connection, split into its outbound and inbound halves.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

/// Opens duplex connections for recognition sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolves once the connection is open. Failures are reported as
    /// [`RecognitionError::Connect`].
    async fn open(&self, request: ConnectRequest) -> RecognizeResult<Connection>;
}

// =============================================================================
// WebSocket Transport
// =============================================================================

/// [`Transport`] over `tokio-tungstenite`. Ping and pong frames are answered
/// by the library and never surface as [`Frame`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, request: ConnectRequest) -> RecognizeResult<Connection> {
        let mut ws_request = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RecognitionError::Connect(format!("Invalid WebSocket request: {e}")))?;
        ws_request.headers_mut().extend(request.headers);

        let (ws_stream, _response) = connect_async(ws_request)
            .await
            .map_err(|e| classify_connect_error(e.to_string()))?;

        info!("Connected to Speech to Text WebSocket");

        let (sink, stream) = ws_stream.split();

        let sink = sink
            .sink_map_err(|e| RecognitionError::Transport(format!("WebSocket send failed: {e}")))
            .with(|frame: Frame| future::ready(Ok::<_, RecognitionError>(Message::from(frame))));

        let stream = stream.filter_map(|message| {
            future::ready(match message {
                Ok(message) => frame_from_message(message).map(Ok),
                Err(e) => Some(Err(RecognitionError::Transport(format!(
                    "WebSocket receive failed: {e}"
                )))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

fn classify_connect_error(error_msg: String) -> RecognitionError {
    if error_msg.contains("401") || error_msg.contains("Unauthorized") {
        RecognitionError::Connect(format!(
            "Authentication failed, check the credentials: {error_msg}"
        ))
    } else if error_msg.contains("403") || error_msg.contains("Forbidden") {
        RecognitionError::Connect(format!(
            "Access forbidden, check the service permissions: {error_msg}"
        ))
    } else {
        RecognitionError::Connect(error_msg)
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Close(reason) => Message::Close(reason.map(|r| CloseFrame {
                code: CloseCode::from(r.code),
                reason: r.reason.into(),
            })),
        }
    }
}

fn frame_from_message(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.as_str().to_string())),
        Message::Binary(data) => Some(Frame::Binary(data)),
        Message::Close(frame) => Some(Frame::Close(frame.map(|f| CloseReason {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_string(),
        }))),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
            debug!("Ignoring control frame");
            None
        }
    }
}
