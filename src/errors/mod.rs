pub mod recognition_error;

pub use recognition_error::{RecognitionError, RecognizeResult};
