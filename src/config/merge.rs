use std::collections::HashMap;
use std::time::Duration;

use zeroize::Zeroizing;

use super::{ClientConfig, Region};
use crate::auth::Authenticator;
use crate::speech_to_text::{MalformedFramePolicy, SessionSettings};

/// Configuration values from one source; `None` means "not set here".
#[derive(Debug, Clone, Default)]
pub(crate) struct PartialConfig {
    pub service_url: Option<String>,
    pub instance_id: Option<String>,
    pub region: Option<String>,
    pub api_key: Option<Zeroizing<String>>,
    pub username: Option<String>,
    pub password: Option<Zeroizing<String>>,
    pub bearer_token: Option<Zeroizing<String>>,
    pub learning_opt_out: Option<bool>,
    pub headers: Option<HashMap<String, String>>,
    pub connect_timeout_secs: Option<u64>,
    pub inactivity_timeout_secs: Option<u64>,
    pub malformed_frames: Option<String>,
    pub audio_chunk_size: Option<usize>,
    pub audio_buffer: Option<usize>,
}

fn pick<T>(preferred: &mut Option<T>, fallback: &mut Option<T>) -> Option<T> {
    preferred.take().or_else(|| fallback.take())
}

impl PartialConfig {
    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
            || self.username.is_some()
            || self.password.is_some()
            || self.bearer_token.is_some()
    }

    /// Layer `overrides` on top of `self`.
    ///
    /// Credentials and the service location are replaced as a unit, so a
    /// higher-priority source never ends up mixed with a stale bearer token
    /// or URL from a lower one.
    pub fn overridden_by(mut self, mut overrides: PartialConfig) -> PartialConfig {
        if overrides.has_credentials() {
            self.api_key.take();
            self.username.take();
            self.password.take();
            self.bearer_token.take();
        }
        if overrides.instance_id.is_some() && overrides.service_url.is_none() {
            self.service_url.take();
        }

        PartialConfig {
            service_url: pick(&mut overrides.service_url, &mut self.service_url),
            instance_id: pick(&mut overrides.instance_id, &mut self.instance_id),
            region: pick(&mut overrides.region, &mut self.region),
            api_key: pick(&mut overrides.api_key, &mut self.api_key),
            username: pick(&mut overrides.username, &mut self.username),
            password: pick(&mut overrides.password, &mut self.password),
            bearer_token: pick(&mut overrides.bearer_token, &mut self.bearer_token),
            learning_opt_out: pick(&mut overrides.learning_opt_out, &mut self.learning_opt_out),
            headers: pick(&mut overrides.headers, &mut self.headers),
            connect_timeout_secs: pick(
                &mut overrides.connect_timeout_secs,
                &mut self.connect_timeout_secs,
            ),
            inactivity_timeout_secs: pick(
                &mut overrides.inactivity_timeout_secs,
                &mut self.inactivity_timeout_secs,
            ),
            malformed_frames: pick(&mut overrides.malformed_frames, &mut self.malformed_frames),
            audio_chunk_size: pick(&mut overrides.audio_chunk_size, &mut self.audio_chunk_size),
            audio_buffer: pick(&mut overrides.audio_buffer, &mut self.audio_buffer),
        }
    }

    /// Apply defaults and validate.
    pub fn resolve(mut self) -> Result<ClientConfig, Box<dyn std::error::Error>> {
        let region = match self.region.as_deref() {
            Some(region) => region.parse::<Region>()?,
            None => Region::default(),
        };

        let service_url = match (self.service_url.take(), self.instance_id.as_deref()) {
            (Some(url), _) => url,
            (None, Some(instance_id)) => region.instance_url(instance_id),
            (None, None) => format!("https://{}", region.hostname()),
        };

        let authenticator = if let Some(token) = self.bearer_token.take() {
            Authenticator::bearer(token.as_str())
        } else if let Some(key) = self.api_key.take() {
            Authenticator::api_key(key.as_str())
        } else {
            match (self.username.take(), self.password.take()) {
                (Some(username), Some(password)) => {
                    Authenticator::basic(username, password.as_str())
                }
                (None, None) => Authenticator::NoAuth,
                _ => {
                    return Err("A username and a password must be configured together".into());
                }
            }
        };

        let mut session = SessionSettings::default();
        if let Some(secs) = self.connect_timeout_secs {
            if secs == 0 {
                return Err("Connect timeout must be at least one second".into());
            }
            session.connect_timeout = Duration::from_secs(secs);
        }
        // Zero disables the client-side inactivity timer.
        session.inactivity_timeout = self
            .inactivity_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        if let Some(policy) = self.malformed_frames.as_deref() {
            session.malformed_frames = policy.parse::<MalformedFramePolicy>()?;
        }
        if let Some(buffer) = self.audio_buffer {
            if buffer == 0 {
                return Err("Audio buffer must hold at least one chunk".into());
            }
            session.audio_buffer = buffer;
        }

        let mut config = ClientConfig::new(service_url, authenticator);
        if let Some(chunk_size) = self.audio_chunk_size {
            if chunk_size == 0 {
                return Err("Audio chunk size must be greater than zero".into());
            }
            config.audio_chunk_size = chunk_size;
        }
        config.learning_opt_out = self.learning_opt_out.unwrap_or(false);
        config.headers = self.headers.take().unwrap_or_default();
        config.session = session;

        Ok(config)
    }
}
