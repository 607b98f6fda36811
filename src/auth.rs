//! Authentication headers for the Speech to Text service.
//!
//! Only static credentials are supported: HTTP basic auth (including the
//! `apikey` pseudo-user accepted by IBM Cloud) and a caller-supplied bearer
//! token. Token exchange and refresh are left to the caller.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::RecognitionError;

/// Username used when authenticating with an IBM Cloud API key.
pub const APIKEY_USERNAME: &str = "apikey";

/// Credentials attached to the WebSocket handshake.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub enum Authenticator {
    /// No `Authorization` header.
    #[default]
    NoAuth,
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// Pre-acquired bearer token.
    BearerToken(String),
}

impl Authenticator {
    /// Basic authentication with the `apikey` pseudo-user.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::Basic {
            username: APIKEY_USERNAME.to_string(),
            password: key.into(),
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::BearerToken(token.into())
    }

    /// Reject empty credentials and values wrapped in braces or quotes, which
    /// usually means a credentials file was pasted verbatim.
    pub fn validate(&self) -> Result<(), RecognitionError> {
        match self {
            Self::NoAuth => Ok(()),
            Self::Basic { username, password } => {
                check_credential("username", username)?;
                check_credential("password", password)
            }
            Self::BearerToken(token) => check_credential("bearer token", token),
        }
    }

    /// Value for the `Authorization` header, if any.
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Self::NoAuth => None,
            Self::Basic { username, password } => {
                let encoded = BASE64.encode(format!("{username}:{password}"));
                Some(format!("Basic {encoded}"))
            }
            Self::BearerToken(token) => Some(format!("Bearer {token}")),
        }
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuth => write!(f, "NoAuth"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::BearerToken(_) => write!(f, "BearerToken(<redacted>)"),
        }
    }
}

fn check_credential(name: &str, value: &str) -> Result<(), RecognitionError> {
    if value.is_empty() {
        return Err(RecognitionError::Configuration(format!(
            "The {name} must not be empty"
        )));
    }
    let bad_edge = |c: char| matches!(c, '{' | '}' | '"');
    if value.starts_with(bad_edge) || value.ends_with(bad_edge) {
        return Err(RecognitionError::Configuration(format!(
            "The {name} must not start or end with curly brackets or quotes. \
             Remove any surrounding {{, }}, or \" characters"
        )));
    }
    Ok(())
}
