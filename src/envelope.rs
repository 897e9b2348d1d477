use log::debug;
use serde::{Deserialize, Serialize};

use crate::Method;
use crate::pipeline::Outcome;

/// Body of a transcript request
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRequest {
    pub video_url: Option<String>,
    pub video_id: Option<String>,
    /// Accepted for compatibility; language choice comes from the configured policy.
    pub lang: Option<String>,
}

impl TranscriptRequest {
    /// `videoUrl` wins over `videoId`; blank values count as absent.
    pub fn input(&self) -> &str {
        if let Some(lang) = &self.lang {
            debug!("Request lang={lang} (not used for track selection)");
        }
        [&self.video_url, &self.video_id]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

/// Uniform response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptResponse {
    pub success: bool,
    pub transcript: Option<String>,
    pub method: Option<Method>,
    pub error: Option<String>,
}

impl TranscriptResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            transcript: None,
            method: None,
            error: Some(message.into()),
        }
    }
}

impl From<&Outcome> for TranscriptResponse {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success { transcript, method } => Self {
                success: true,
                transcript: Some(transcript.clone()),
                method: Some(*method),
                error: None,
            },
            Outcome::Failure(failure) => Self::error(failure.to_string()),
        }
    }
}
