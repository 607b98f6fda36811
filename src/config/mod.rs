//! Client configuration.
//!
//! Values come from environment variables (a `.env` file is loaded into the
//! environment by the binary at startup) and optionally a YAML file.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Layering sources and applying defaults
//! - `region`: IBM Cloud regions and their hostnames
//!
//! # Example
//! ```rust,no_run
//! use watson_stt::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variables as the base
//! let config_path = PathBuf::from("watson-stt.yaml");
//! let config = ClientConfig::from_file(&config_path)?;
//!
//! println!("Recognizing against {}", config.service_url);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

pub mod env;
mod merge;
mod region;
mod yaml;

pub use region::Region;
pub use yaml::{AudioYaml, AuthYaml, ServiceYaml, SessionYaml, YamlConfig};

use crate::auth::Authenticator;
use crate::speech_to_text::{DEFAULT_CHUNK_SIZE, SessionSettings};

/// Everything a [`SpeechToText`](crate::SpeechToText) client needs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base service URL, e.g.
    /// `https://api.us-south.speech-to-text.watson.cloud.ibm.com/instances/<id>`.
    pub service_url: String,
    pub authenticator: Authenticator,
    /// Send `X-Watson-Learning-Opt-Out: true` with every request.
    pub learning_opt_out: bool,
    /// Extra handshake headers.
    pub headers: HashMap<String, String>,
    /// Read size when streaming audio from files or stdin.
    pub audio_chunk_size: usize,
    pub session: SessionSettings,
}

impl ClientConfig {
    pub fn new(service_url: impl Into<String>, authenticator: Authenticator) -> Self {
        Self {
            service_url: service_url.into(),
            authenticator,
            learning_opt_out: false,
            headers: HashMap::new(),
            audio_chunk_size: DEFAULT_CHUNK_SIZE,
            session: SessionSettings::default(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or the values do
    /// not combine into a usable configuration.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        env::from_env()?.resolve()
    }

    /// Load configuration from a YAML file, with environment variables as
    /// the base layer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if the
    /// merged values are invalid.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;
        env::from_env()?
            .overridden_by(yaml_config.into_partial())
            .resolve()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(
            format!("https://{}", Region::default().hostname()),
            Authenticator::NoAuth,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech_to_text::MalformedFramePolicy;
    use serial_test::serial;
    use std::env as std_env;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn cleanup_env_vars() {
        unsafe {
            for name in env::ALL_VARS {
                std_env::remove_var(name);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(
            config.service_url,
            "https://api.us-south.speech-to-text.watson.cloud.ibm.com"
        );
        assert_eq!(config.authenticator, Authenticator::NoAuth);
        assert_eq!(config.session.inactivity_timeout, None);
        assert_eq!(config.audio_chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();

        unsafe {
            std_env::set_var(env::ENV_INSTANCE_ID, "env-instance");
            std_env::set_var(env::ENV_REGION, "au-syd");
            std_env::set_var(env::ENV_API_KEY, "env-key");
            std_env::set_var(env::ENV_INACTIVITY_TIMEOUT_SECS, "30");
        }

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(
            config.service_url,
            "https://api.au-syd.speech-to-text.watson.cloud.ibm.com/instances/env-instance"
        );
        assert_eq!(config.authenticator, Authenticator::api_key("env-key"));
        assert_eq!(
            config.session.inactivity_timeout,
            Some(Duration::from_secs(30))
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_region() {
        cleanup_env_vars();
        unsafe {
            std_env::set_var(env::ENV_REGION, "moon-base");
        }

        assert!(ClientConfig::from_env().is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("watson-stt.yaml");

        let yaml_content = r#"
service:
  url: "https://yaml.example.com"

auth:
  api_key: "yaml-key"

session:
  malformed_frames: "skip"
"#;
        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            std_env::set_var(env::ENV_SERVICE_URL, "https://env.example.com");
            std_env::set_var(env::ENV_BEARER_TOKEN, "env-token");
            std_env::set_var(env::ENV_CONNECT_TIMEOUT_SECS, "7");
        }

        let config = ClientConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.service_url, "https://yaml.example.com");
        assert_eq!(config.authenticator, Authenticator::api_key("yaml-key"));
        assert_eq!(config.session.malformed_frames, MalformedFramePolicy::Skip);
        // ENV value
        assert_eq!(config.session.connect_timeout, Duration::from_secs(7));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing() {
        cleanup_env_vars();
        let result = ClientConfig::from_file(&PathBuf::from("/nonexistent/watson-stt.yaml"));
        assert!(result.is_err());
    }
}
