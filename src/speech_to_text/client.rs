//! Service-level entry point.

use std::sync::Arc;

use http::header::{AUTHORIZATION, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::mpsc;
use url::Url;

use super::audio::AudioSource;
use super::callback::{RecognitionEvent, RecognizeCallback};
use super::options::RecognizeOptions;
use super::session::{RecognitionHandle, SessionBuilder};
use super::transport::{ConnectRequest, Transport, WebSocketTransport};
use crate::config::ClientConfig;
use crate::errors::{RecognitionError, RecognizeResult};

/// Path of the streaming recognition endpoint, relative to the service URL.
pub const RECOGNIZE_PATH: &str = "/v1/recognize";

const USER_AGENT_VALUE: &str = concat!("watson-stt/", env!("CARGO_PKG_VERSION"));
const LEARNING_OPT_OUT_HEADER: &str = "x-watson-learning-opt-out";

/// Speech to Text client. Cheap to share; every call to
/// [`recognize_using_websocket`](Self::recognize_using_websocket) starts an
/// independent session.
#[derive(Clone)]
pub struct SpeechToText {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl SpeechToText {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(WebSocketTransport))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `<service_url>/v1/recognize` with the scheme switched to `ws`/`wss`
    /// and connection-level options in the query.
    pub fn recognize_url(&self, options: &RecognizeOptions) -> RecognizeResult<Url> {
        let base = self.config.service_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{RECOGNIZE_PATH}")).map_err(|e| {
            RecognitionError::Configuration(format!(
                "Invalid service URL '{}': {e}",
                self.config.service_url
            ))
        })?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(RecognitionError::Configuration(format!(
                    "Unsupported service URL scheme '{other}'"
                )));
            }
        };
        url.set_scheme(scheme).map_err(|()| {
            RecognitionError::Configuration(format!("Cannot use scheme '{scheme}' for {url}"))
        })?;

        let params = options.query_parameters();
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// Handshake headers for every session.
    pub fn headers(&self) -> RecognizeResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        if let Some(value) = self.config.authenticator.authorization_header() {
            let mut value = header_value("Authorization", &value)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if self.config.learning_opt_out {
            headers.insert(
                HeaderName::from_static(LEARNING_OPT_OUT_HEADER),
                HeaderValue::from_static("true"),
            );
        }

        for (name, value) in &self.config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                RecognitionError::Configuration(format!("Invalid header name '{name}': {e}"))
            })?;
            headers.insert(header_name, header_value(name, value)?);
        }

        Ok(headers)
    }

    /// A session builder preloaded with this client's URL, headers and
    /// session settings.
    pub fn session(&self, options: RecognizeOptions) -> RecognizeResult<SessionBuilder> {
        self.config.authenticator.validate()?;
        let request = ConnectRequest {
            url: self.recognize_url(&options)?,
            headers: self.headers()?,
        };
        Ok(SessionBuilder::new(self.transport.clone(), request)
            .options(options)
            .settings(self.config.session.clone()))
    }

    /// Start a streaming recognition session that reports to `callback`.
    pub fn recognize_using_websocket<A>(
        &self,
        options: RecognizeOptions,
        audio: A,
        callback: Arc<dyn RecognizeCallback>,
    ) -> RecognizeResult<RecognitionHandle>
    where
        A: AudioSource + 'static,
    {
        self.session(options)?.audio(audio).callback(callback).start()
    }

    /// Like [`recognize_using_websocket`](Self::recognize_using_websocket),
    /// with events delivered through a channel. The channel closes after
    /// `Disconnected`.
    pub fn recognize_with_events<A>(
        &self,
        options: RecognizeOptions,
        audio: A,
    ) -> RecognizeResult<(RecognitionHandle, mpsc::UnboundedReceiver<RecognitionEvent>)>
    where
        A: AudioSource + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.recognize_using_websocket(options, audio, Arc::new(tx))?;
        Ok((handle, rx))
    }
}

fn header_value(name: &str, value: &str) -> RecognizeResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        RecognitionError::Configuration(format!("Invalid value for header '{name}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;

    fn client(service_url: &str) -> SpeechToText {
        let mut config = ClientConfig::new(service_url, Authenticator::api_key("secret"));
        config
            .headers
            .insert("X-Custom".to_string(), "yes".to_string());
        SpeechToText::new(config)
    }

    #[test]
    fn test_recognize_url_switches_scheme() {
        let stt = client("https://stream.example.com/instances/abc/");
        let url = stt.recognize_url(&RecognizeOptions::default()).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://stream.example.com/instances/abc/v1/recognize"
        );

        let stt = client("http://localhost:9000");
        let url = stt.recognize_url(&RecognizeOptions::default()).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:9000/v1/recognize");
    }

    #[test]
    fn test_recognize_url_query_parameters() {
        let stt = client("https://stream.example.com");
        let options = RecognizeOptions {
            model: Some("en-US_Telephony".to_string()),
            language_customization_id: Some("lang 1".to_string()),
            ..Default::default()
        };
        let url = stt.recognize_url(&options).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://stream.example.com/v1/recognize?model=en-US_Telephony&language_customization_id=lang+1"
        );
    }

    #[test]
    fn test_recognize_url_rejects_unknown_scheme() {
        let stt = client("ftp://stream.example.com");
        assert!(matches!(
            stt.recognize_url(&RecognizeOptions::default()),
            Err(RecognitionError::Configuration(_))
        ));
    }

    #[test]
    fn test_headers() {
        let mut stt = client("https://stream.example.com");
        stt.config.learning_opt_out = true;

        let headers = stt.headers().unwrap();
        assert_eq!(
            headers.get(AUTHORIZATION).unwrap(),
            "Basic YXBpa2V5OnNlY3JldA=="
        );
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(headers.get(LEARNING_OPT_OUT_HEADER).unwrap(), "true");
        assert_eq!(headers.get("x-custom").unwrap(), "yes");
        assert!(
            headers
                .get(USER_AGENT)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("watson-stt/")
        );
    }

    #[test]
    fn test_session_rejects_bad_credentials() {
        let stt = SpeechToText::new(ClientConfig::new(
            "https://stream.example.com",
            Authenticator::api_key("{pasted}"),
        ));
        assert!(matches!(
            stt.session(RecognizeOptions::default()),
            Err(RecognitionError::Configuration(_))
        ));
    }
}
