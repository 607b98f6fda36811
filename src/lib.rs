pub mod auth;
pub mod config;
pub mod errors;
pub mod speech_to_text;

// Re-export commonly used items for convenience
pub use auth::Authenticator;
pub use config::ClientConfig;
pub use errors::recognition_error::{RecognitionError, RecognizeResult};
pub use speech_to_text::*;
