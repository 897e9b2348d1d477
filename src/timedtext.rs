use async_trait::async_trait;
use eyre::Result;
use log::{debug, warn};
use serde_json::Value;

use crate::caption::{self, LanguagePolicy};
use crate::fetch::{BROWSER_HEADERS, Fetch};
use crate::pipeline::Strategy;
use crate::{Method, VideoId};

pub fn timedtext_url(video_id: &VideoId, lang: &str) -> String {
    format!("https://www.youtube.com/api/timedtext?v={video_id}&lang={lang}&fmt=json3")
}

/// Queries the public timedtext endpoint once per preferred language.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimedText;

#[async_trait]
impl Strategy for TimedText {
    fn method(&self) -> Method {
        Method::TimedText
    }

    async fn attempt(&self, fetch: &dyn Fetch, video_id: &VideoId, policy: &LanguagePolicy) -> Option<String> {
        match extract(fetch, video_id, policy).await {
            Ok(text) => text,
            Err(e) => {
                warn!("timedtext failed for {video_id}: {e}");
                None
            }
        }
    }
}

async fn extract(fetch: &dyn Fetch, video_id: &VideoId, policy: &LanguagePolicy) -> Result<Option<String>> {
    for lang in policy.languages() {
        let resp = fetch.get(&timedtext_url(video_id, lang), BROWSER_HEADERS).await?;
        if !resp.is_success() || resp.body.trim().is_empty() {
            debug!("timedtext: nothing for lang={lang} (status {})", resp.status);
            continue;
        }

        if let Some(text) = parse_body(&resp.body) {
            debug!("timedtext: got transcript for lang={lang}");
            return Ok(Some(text));
        }
        debug!("timedtext: body for lang={lang} had no segments");
    }
    Ok(None)
}

fn parse_body(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(doc) => doc
            .get("events")
            .and_then(|e| e.as_array())
            .and_then(|events| caption::parse_json_events(events)),
        Err(_) => caption::parse_text_elements(body),
    }
}
