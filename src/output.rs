use eyre::Result;

use crate::envelope::TranscriptResponse;
use crate::pipeline::Outcome;

/// Render an outcome as plain text: the transcript, or the failure message
pub fn render_text(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success { transcript, .. } => transcript.clone(),
        Outcome::Failure(failure) => failure.to_string(),
    }
}

/// Render an outcome as the JSON response envelope
pub fn render_json(outcome: &Outcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(&TranscriptResponse::from(outcome))?)
}
