//! Streaming recognition over the Speech to Text WebSocket interface.
//!
//! A session opens `wss://<service>/v1/recognize`, sends a JSON start
//! message, streams audio as binary frames and finishes with
//! `{"action":"stop"}`. The service answers with a `{"state":"listening"}`
//! control message, any number of results messages, and a second state
//! message once the audio has been transcribed.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use watson_stt::{
//!     Authenticator, ClientConfig, RecognitionEvent, RecognizeOptions, ReaderSource, SpeechToText,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(
//!         "https://api.us-south.speech-to-text.watson.cloud.ibm.com/instances/my-instance",
//!         Authenticator::api_key(std::env::var("IBM_WATSON_API_KEY")?),
//!     );
//!     let stt = SpeechToText::new(config);
//!
//!     let audio = ReaderSource::open("sample.wav").await?;
//!     let options = RecognizeOptions::new("audio/wav").with_interim_results(true);
//!     let (handle, mut events) = stt.recognize_with_events(options, audio)?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let RecognitionEvent::Transcription(results) = event {
//!             if let Some(text) = results.best_transcript() {
//!                 println!("{text}");
//!             }
//!         }
//!     }
//!
//!     println!("session ended: {}", handle.wait().await);
//!     Ok(())
//! }
//! ```
//!
//! # Events
//!
//! `Connected` is delivered once the connection opens, before the start
//! message goes out. `Disconnected` is always the last event, including when
//! the connection could not be opened. Errors arrive as `Error` or, for the
//! client inactivity timer and the service's "No speech detected" message,
//! as `InactivityTimeout`.

pub mod audio;
pub mod callback;
mod client;
pub mod messages;
pub mod options;
pub mod session;
pub mod transport;


pub use audio::{
    AudioCloser, AudioSender, AudioSource, ChannelSource, DEFAULT_CHUNK_SIZE, MemorySource,
    ReaderSource,
};
pub use callback::{FnCallback, RecognitionEvent, RecognizeCallback, callback_fn};
pub use client::{RECOGNIZE_PATH, SpeechToText};
pub use messages::{
    IncomingEvent, SpeechRecognitionAlternative, SpeechRecognitionResult,
    SpeechRecognitionResults, StartMessage, StopMessage,
};
pub use options::RecognizeOptions;
pub use session::{
    MalformedFramePolicy, RecognitionHandle, SessionBuilder, SessionSettings, SessionState,
};
pub use transport::{
    CloseReason, ConnectRequest, Connection, Frame, Transport, WebSocketTransport,
};
