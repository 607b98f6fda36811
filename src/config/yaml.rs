use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use zeroize::Zeroizing;

use super::merge::PartialConfig;

/// Configuration file layout.
///
/// Every field is optional; anything missing falls back to the environment.
///
/// # Example YAML structure
/// ```yaml
/// service:
///   instance_id: "your-instance-id"
///   region: "eu-de"
///   learning_opt_out: true
///   headers:
///     X-Watson-Metadata: "customer_id=1234"
///
/// auth:
///   api_key: "your-api-key"
///
/// session:
///   connect_timeout_secs: 10
///   inactivity_timeout_secs: 60
///   malformed_frames: "skip"
///
/// audio:
///   chunk_size: 2048
///   buffer: 32
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub service: Option<ServiceYaml>,
    pub auth: Option<AuthYaml>,
    pub session: Option<SessionYaml>,
    pub audio: Option<AudioYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceYaml {
    pub url: Option<String>,
    pub instance_id: Option<String>,
    pub region: Option<String>,
    pub learning_opt_out: Option<bool>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthYaml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("AuthYaml")
            .field("api_key", &redact(&self.api_key))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("bearer_token", &redact(&self.bearer_token))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub connect_timeout_secs: Option<u64>,
    /// Zero disables the client-side timer.
    pub inactivity_timeout_secs: Option<u64>,
    /// `abort` or `skip`.
    pub malformed_frames: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub chunk_size: Option<usize>,
    pub buffer: Option<usize>,
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }

    pub(crate) fn into_partial(self) -> PartialConfig {
        let service = self.service.unwrap_or_default();
        let auth = self.auth.unwrap_or_default();
        let session = self.session.unwrap_or_default();
        let audio = self.audio.unwrap_or_default();

        PartialConfig {
            service_url: service.url,
            instance_id: service.instance_id,
            region: service.region,
            api_key: auth.api_key.map(Zeroizing::new),
            username: auth.username,
            password: auth.password.map(Zeroizing::new),
            bearer_token: auth.bearer_token.map(Zeroizing::new),
            learning_opt_out: service.learning_opt_out,
            headers: service.headers,
            connect_timeout_secs: session.connect_timeout_secs,
            inactivity_timeout_secs: session.inactivity_timeout_secs,
            malformed_frames: session.malformed_frames,
            audio_chunk_size: audio.chunk_size,
            audio_buffer: audio.buffer,
        }
    }
}
