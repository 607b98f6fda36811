//! End-to-end recognition against a local WebSocket server that answers like
//! the Speech to Text service.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use watson_stt::{
    Authenticator, ClientConfig, MemorySource, RecognitionError, RecognitionEvent,
    RecognizeOptions, SessionState, SpeechToText,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What the server saw during one connection.
#[derive(Debug, Default)]
struct Observed {
    uri: String,
    authorization: Option<String>,
    learning_opt_out: Option<String>,
    texts: Vec<String>,
    binary_frames: usize,
    binary_bytes: usize,
    close_code: Option<u16>,
}

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Accept one connection and play the service side of a recognition.
async fn serve_recognition(listener: TcpListener) -> Result<Observed, BoxError> {
    let (stream, _) = listener.accept().await?;
    let mut observed = Observed::default();

    let mut ws = accept_hdr_async(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            observed.uri = req.uri().to_string();
            observed.authorization = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            observed.learning_opt_out = req
                .headers()
                .get("x-watson-learning-opt-out")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok(resp)
        },
    )
    .await?;

    let mut index = 0;
    while let Some(message) = ws.next().await {
        match message? {
            Message::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(text.as_str())?;
                observed.texts.push(text.as_str().to_string());
                match value["action"].as_str() {
                    Some("start") => {
                        ws.send(Message::Text(json!({"state": "listening"}).to_string().into()))
                            .await?;
                    }
                    Some("stop") => {
                        let result = json!({
                            "result_index": index,
                            "results": [{
                                "final": true,
                                "alternatives": [{"transcript": "thunderstorms could produce large hail ", "confidence": 0.96}]
                            }]
                        });
                        ws.send(Message::Text(result.to_string().into())).await?;
                        ws.send(Message::Text(json!({"state": "listening"}).to_string().into()))
                            .await?;
                    }
                    _ => {}
                }
            }
            Message::Binary(data) => {
                observed.binary_frames += 1;
                observed.binary_bytes += data.len();
                let interim = json!({
                    "result_index": index,
                    "results": [{"final": false, "alternatives": [{"transcript": "thunder"}]}]
                });
                ws.send(Message::Text(interim.to_string().into())).await?;
                if observed.binary_frames % 2 == 0 {
                    index += 1;
                }
            }
            Message::Close(frame) => {
                observed.close_code = frame.map(|f| u16::from(f.code));
                break;
            }
            _ => {}
        }
    }

    Ok(observed)
}

fn spawn_service(listener: TcpListener) -> JoinHandle<Observed> {
    tokio::spawn(async move {
        match serve_recognition(listener).await {
            Ok(observed) => observed,
            Err(e) => panic!("mock service failed: {e}"),
        }
    })
}

fn client(addr: SocketAddr) -> SpeechToText {
    let mut config = ClientConfig::new(
        format!("http://{addr}/instances/test-instance"),
        Authenticator::api_key("integration-key"),
    );
    config.learning_opt_out = true;
    config.session.connect_timeout = Duration::from_secs(5);
    SpeechToText::new(config)
}

#[tokio::test]
async fn test_recognition_over_websocket() {
    let (listener, addr) = bind().await;
    let service = spawn_service(listener);

    let options = RecognizeOptions::new("audio/l16; rate=16000")
        .with_model("en-US_Multimedia")
        .with_interim_results(true);
    let audio = MemorySource::new(vec![0u8; 4000]);

    let (handle, mut events) = client(addr).recognize_with_events(options, audio).unwrap();

    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        received.push(event);
    }
    assert_eq!(handle.wait().await, SessionState::Closed);

    let observed = service.await.unwrap();
    assert_eq!(
        observed.uri,
        "/instances/test-instance/v1/recognize?model=en-US_Multimedia"
    );
    // base64("apikey:integration-key")
    assert_eq!(
        observed.authorization.as_deref(),
        Some("Basic YXBpa2V5OmludGVncmF0aW9uLWtleQ==")
    );
    assert_eq!(observed.learning_opt_out.as_deref(), Some("true"));

    assert_eq!(
        observed.texts[0],
        r#"{"content-type":"audio/l16; rate=16000","interim_results":true,"action":"start"}"#
    );
    assert_eq!(observed.texts.last().unwrap(), r#"{"action":"stop"}"#);
    assert_eq!(observed.texts.len(), 2);
    assert_eq!(observed.binary_frames, 4);
    assert_eq!(observed.binary_bytes, 4000);
    assert_eq!(observed.close_code, Some(1000));

    assert_eq!(received.first(), Some(&RecognitionEvent::Connected));
    assert_eq!(received.get(1), Some(&RecognitionEvent::Listening));
    assert_eq!(received.last(), Some(&RecognitionEvent::Disconnected));
    assert!(received.contains(&RecognitionEvent::TranscriptionComplete));

    let transcriptions: Vec<_> = received
        .iter()
        .filter_map(|e| match e {
            RecognitionEvent::Transcription(results) => Some(results),
            _ => None,
        })
        .collect();
    assert_eq!(transcriptions.len(), 5);
    let last = transcriptions.last().unwrap();
    assert!(last.has_final());
    assert_eq!(
        last.best_transcript(),
        Some("thunderstorms could produce large hail ")
    );
}

#[tokio::test]
async fn test_rejected_handshake_reports_authentication_error() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ = accept_hdr_async(
            stream,
            |_req: &Request, _resp: Response| -> Result<Response, ErrorResponse> {
                let mut rejection = ErrorResponse::new(Some("Unauthorized".to_string()));
                *rejection.status_mut() = http::StatusCode::UNAUTHORIZED;
                Err(rejection)
            },
        )
        .await;
    });

    let (handle, mut events) = client(addr)
        .recognize_with_events(
            RecognizeOptions::new("audio/wav"),
            MemorySource::new(vec![0u8; 10]),
        )
        .unwrap();

    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        received.push(event);
    }
    assert_eq!(handle.wait().await, SessionState::Failed);
    server.await.unwrap();

    assert_eq!(received.len(), 2);
    match &received[0] {
        RecognitionEvent::Error(RecognitionError::Connect(message)) => {
            assert!(message.contains("Authentication failed"), "{message}");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(received[1], RecognitionEvent::Disconnected);
}

#[tokio::test]
async fn test_connection_refused() {
    let (listener, addr) = bind().await;
    drop(listener);

    let (handle, mut events) = client(addr)
        .recognize_with_events(
            RecognizeOptions::new("audio/wav"),
            MemorySource::new(vec![0u8; 10]),
        )
        .unwrap();

    assert!(matches!(
        events.recv().await,
        Some(RecognitionEvent::Error(RecognitionError::Connect(_)))
    ));
    assert_eq!(events.recv().await, Some(RecognitionEvent::Disconnected));
    assert_eq!(events.recv().await, None);
    assert_eq!(handle.wait().await, SessionState::Failed);
}
