//! Wire models for the `/v1/recognize` WebSocket interface.
//!
//! Outbound control messages are text frames carrying JSON objects with an
//! `action` field. Inbound text frames are classified into an
//! [`IncomingEvent`] before the session acts on them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{RecognitionError, RecognizeResult};

/// Prefix of the service error sent when its own inactivity timer expires.
pub const NO_SPEECH_PREFIX: &str = "No speech detected for";

/// Keys whose presence marks an inbound object as a recognition result.
const RESULT_KEYS: [&str; 4] = [
    "results",
    "speaker_labels",
    "processing_metrics",
    "audio_metrics",
];

// =============================================================================
// Outbound Messages
// =============================================================================

/// First text frame of a session.
///
/// Unset parameters are omitted from the JSON and `action` is always
/// serialized last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartMessage {
    #[serde(rename = "content-type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customization_weight: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_timeout: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords_threshold: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_alternatives: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_alternatives_threshold: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_confidence: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profanity_filter: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_formatting: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_labels: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grammar_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redaction: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_metrics: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_of_phrase_silence_time: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_transcript_at_phrase_end: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_detector_sensitivity: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_audio_suppression: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub interim_results: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_metrics: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_metrics_interval: Option<f32>,

    /// Always `"start"`.
    pub action: String,
}

impl StartMessage {
    pub fn to_json(&self) -> RecognizeResult<String> {
        serde_json::to_string(self).map_err(|e| {
            RecognitionError::Configuration(format!("Failed to serialize start message: {e}"))
        })
    }
}

/// Signals the end of audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopMessage {
    pub action: String,
}

impl StopMessage {
    pub fn new() -> Self {
        Self {
            action: "stop".to_string(),
        }
    }

    pub fn to_json(&self) -> RecognizeResult<String> {
        serde_json::to_string(self).map_err(|e| {
            RecognitionError::Configuration(format!("Failed to serialize stop message: {e}"))
        })
    }
}

impl Default for StopMessage {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Recognition Results
// =============================================================================

/// Word timestamp: `[word, start_time, end_time]`.
pub type WordTimestamp = (String, f64, f64);

/// Word confidence: `[word, confidence]`.
pub type WordConfidence = (String, f64);

/// Payload of one results message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRecognitionResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SpeechRecognitionResult>>,

    /// Index of the first result in `results`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_index: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_labels: Option<Vec<SpeakerLabelsResult>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_metrics: Option<ProcessingMetrics>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_metrics: Option<AudioMetrics>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl SpeechRecognitionResults {
    pub fn results(&self) -> &[SpeechRecognitionResult] {
        self.results.as_deref().unwrap_or_default()
    }

    /// True when any result in this message is final.
    pub fn has_final(&self) -> bool {
        self.results().iter().any(|r| r.is_final)
    }

    /// Top alternative of the last result, if any.
    pub fn best_transcript(&self) -> Option<&str> {
        self.results()
            .last()
            .and_then(|r| r.alternatives.first())
            .map(|a| a.transcript.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRecognitionResult {
    #[serde(rename = "final", default)]
    pub is_final: bool,

    #[serde(default)]
    pub alternatives: Vec<SpeechRecognitionAlternative>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords_result: Option<HashMap<String, Vec<KeywordResult>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_alternatives: Option<Vec<WordAlternativeResults>>,

    /// Why the service ended the utterance (`end_of_data`, `full_stop`,
    /// `reset`, `silence`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_of_utterance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRecognitionAlternative {
    #[serde(default)]
    pub transcript: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<WordTimestamp>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_confidence: Option<Vec<WordConfidence>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordResult {
    pub normalized_text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordAlternativeResults {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub alternatives: Vec<WordAlternativeResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordAlternativeResult {
    pub confidence: f64,
    pub word: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakerLabelsResult {
    pub from: f64,
    pub to: f64,
    pub speaker: i64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(rename = "final", default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    pub processed_audio: ProcessedAudio,
    pub wall_clock_since_first_byte_received: f64,
    #[serde(default)]
    pub periodic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedAudio {
    pub received: f64,
    pub seen_by_engine: f64,
    pub transcription: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_labels: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioMetrics {
    pub sampling_interval: f64,
    pub accumulated: AudioMetricsDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioMetricsDetails {
    #[serde(rename = "final", default)]
    pub is_final: bool,
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_to_noise_ratio: Option<f64>,
    #[serde(default)]
    pub speech_ratio: f64,
    #[serde(default)]
    pub high_frequency_loss: f64,
    #[serde(default)]
    pub direct_current_offset: Vec<AudioMetricsHistogramBin>,
    #[serde(default)]
    pub clipping_rate: Vec<AudioMetricsHistogramBin>,
    #[serde(default)]
    pub speech_level: Vec<AudioMetricsHistogramBin>,
    #[serde(default)]
    pub non_speech_level: Vec<AudioMetricsHistogramBin>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioMetricsHistogramBin {
    pub begin: f64,
    pub end: f64,
    pub count: i64,
}

// =============================================================================
// Inbound Classification
// =============================================================================

/// A classified inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingEvent {
    /// `{"state": "listening"}` control message.
    StateUpdate { state: Option<String> },
    /// Recognition results, speaker labels or metrics.
    Results(Box<SpeechRecognitionResults>),
    /// `{"error": ...}`; always terminal.
    Error { error: String },
    /// Callback registration acknowledgement from the asynchronous interface.
    RegistrationAck { status: String, url: String },
    /// Valid JSON object with no known keys.
    Unrecognized(Value),
}

impl IncomingEvent {
    /// Classify a text frame.
    ///
    /// Errors with [`RecognitionError::Protocol`] when the frame is not a
    /// JSON object or a results payload does not match the result schema.
    pub fn parse(text: &str) -> RecognizeResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RecognitionError::Protocol(format!("Frame is not valid JSON: {e}")))?;

        let Value::Object(map) = &value else {
            return Err(RecognitionError::Protocol(
                "Frame is not a JSON object".to_string(),
            ));
        };

        if let Some(error) = map.get("error") {
            let error = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(Self::Error { error });
        }

        if RESULT_KEYS.iter().any(|key| map.contains_key(*key)) {
            let results = serde_json::from_value::<SpeechRecognitionResults>(value)
                .map_err(|e| RecognitionError::Protocol(format!("Invalid results message: {e}")))?;
            if let Some(index) = results.result_index.filter(|index| *index < 0) {
                return Err(RecognitionError::Protocol(format!(
                    "Negative result_index {index}"
                )));
            }
            return Ok(Self::Results(Box::new(results)));
        }

        if let Some(state) = map.get("state") {
            return Ok(Self::StateUpdate {
                state: state.as_str().map(str::to_string),
            });
        }

        if let (Some(status), Some(url)) = (
            map.get("status").and_then(Value::as_str),
            map.get("url").and_then(Value::as_str),
        ) {
            return Ok(Self::RegistrationAck {
                status: status.to_string(),
                url: url.to_string(),
            });
        }

        Ok(Self::Unrecognized(value))
    }
}

/// True for the service's own "No speech detected for Ns" error.
pub fn is_no_speech_error(error: &str) -> bool {
    error.starts_with(NO_SPEECH_PREFIX)
}
