//! Recognition parameters for one session.

use serde::Deserialize;

use super::messages::StartMessage;
use crate::errors::{RecognitionError, RecognizeResult};

/// Parameters for a streaming recognition request.
///
/// `model`, the customization ids and `base_model_version` are sent as URL
/// query parameters; everything else goes into the [`StartMessage`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecognizeOptions {
    /// MIME type of the audio, e.g. `audio/l16; rate=16000`.
    pub content_type: Option<String>,
    pub model: Option<String>,
    pub language_customization_id: Option<String>,
    pub acoustic_customization_id: Option<String>,
    pub base_model_version: Option<String>,
    pub customization_weight: Option<f64>,
    /// Server-side silence limit in seconds; `-1` disables it.
    pub inactivity_timeout: Option<i64>,
    pub keywords: Option<Vec<String>>,
    pub keywords_threshold: Option<f32>,
    pub max_alternatives: Option<u32>,
    pub word_alternatives_threshold: Option<f32>,
    pub word_confidence: Option<bool>,
    pub timestamps: Option<bool>,
    pub profanity_filter: Option<bool>,
    pub smart_formatting: Option<bool>,
    pub speaker_labels: Option<bool>,
    pub grammar_name: Option<String>,
    pub redaction: Option<bool>,
    pub audio_metrics: Option<bool>,
    pub end_of_phrase_silence_time: Option<f64>,
    pub split_transcript_at_phrase_end: Option<bool>,
    pub speech_detector_sensitivity: Option<f32>,
    pub background_audio_suppression: Option<f32>,
    pub interim_results: Option<bool>,
    pub processing_metrics: Option<bool>,
    pub processing_metrics_interval: Option<f32>,
}

impl RecognizeOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_interim_results(mut self, enabled: bool) -> Self {
        self.interim_results = Some(enabled);
        self
    }

    /// Check value ranges before any network I/O.
    pub fn validate(&self) -> RecognizeResult<()> {
        check_unit("customization_weight", self.customization_weight)?;
        check_unit("keywords_threshold", self.keywords_threshold.map(f64::from))?;
        check_unit(
            "word_alternatives_threshold",
            self.word_alternatives_threshold.map(f64::from),
        )?;
        check_unit(
            "speech_detector_sensitivity",
            self.speech_detector_sensitivity.map(f64::from),
        )?;
        check_unit(
            "background_audio_suppression",
            self.background_audio_suppression.map(f64::from),
        )?;

        if let Some(timeout) = self.inactivity_timeout {
            if timeout < -1 {
                return Err(RecognitionError::Configuration(format!(
                    "inactivity_timeout must be -1 or a non-negative number of seconds, got {timeout}"
                )));
            }
        }

        if let Some(silence) = self.end_of_phrase_silence_time {
            if !(0.0..=120.0).contains(&silence) {
                return Err(RecognitionError::Configuration(format!(
                    "end_of_phrase_silence_time must be between 0.0 and 120.0, got {silence}"
                )));
            }
        }

        if let Some(interval) = self.processing_metrics_interval {
            if interval.is_nan() || interval <= 0.0 {
                return Err(RecognitionError::Configuration(format!(
                    "processing_metrics_interval must be positive, got {interval}"
                )));
            }
        }

        if self.max_alternatives == Some(0) {
            return Err(RecognitionError::Configuration(
                "max_alternatives must be at least 1".to_string(),
            ));
        }

        let has_keywords = self.keywords.as_ref().is_some_and(|k| !k.is_empty());
        if has_keywords != self.keywords_threshold.is_some() {
            return Err(RecognitionError::Configuration(
                "keywords and keywords_threshold must be specified together".to_string(),
            ));
        }

        Ok(())
    }

    /// Connection-level parameters, in the order they appear in the URL.
    pub fn query_parameters(&self) -> Vec<(&'static str, String)> {
        [
            ("model", &self.model),
            ("language_customization_id", &self.language_customization_id),
            ("acoustic_customization_id", &self.acoustic_customization_id),
            ("base_model_version", &self.base_model_version),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.clone().map(|v| (name, v)))
        .collect()
    }

    pub fn start_message(&self) -> StartMessage {
        StartMessage {
            content_type: self.content_type.clone(),
            customization_weight: self.customization_weight,
            inactivity_timeout: self.inactivity_timeout,
            keywords: self.keywords.clone(),
            keywords_threshold: self.keywords_threshold,
            max_alternatives: self.max_alternatives,
            word_alternatives_threshold: self.word_alternatives_threshold,
            word_confidence: self.word_confidence,
            timestamps: self.timestamps,
            profanity_filter: self.profanity_filter,
            smart_formatting: self.smart_formatting,
            speaker_labels: self.speaker_labels,
            grammar_name: self.grammar_name.clone(),
            redaction: self.redaction,
            audio_metrics: self.audio_metrics,
            end_of_phrase_silence_time: self.end_of_phrase_silence_time,
            split_transcript_at_phrase_end: self.split_transcript_at_phrase_end,
            speech_detector_sensitivity: self.speech_detector_sensitivity,
            background_audio_suppression: self.background_audio_suppression,
            interim_results: self.interim_results,
            processing_metrics: self.processing_metrics,
            processing_metrics_interval: self.processing_metrics_interval,
            action: "start".to_string(),
        }
    }
}

fn check_unit(name: &str, value: Option<f64>) -> RecognizeResult<()> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(RecognitionError::Configuration(format!(
            "{name} must be between 0.0 and 1.0, got {v}"
        ))),
        _ => Ok(()),
    }
}
