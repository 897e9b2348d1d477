use async_trait::async_trait;
use eyre::Result;
use log::{debug, info, warn};
use serde_json::Value;

use crate::caption::{self, CaptionTrack, LanguagePolicy};
use crate::fetch::{BROWSER_HEADERS, Fetch, WATCH_PAGE_HEADERS};
use crate::pipeline::Strategy;
use crate::{Method, VideoId};

const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse = {";
const CAPTCHA_MARKER: &str = "class=\"g-recaptcha\"";
const CAPTIONS_KEY: &str = "\"captions\":";

/// Sibling keys that follow `"captions"` in the page's player JSON
const CAPTIONS_TERMINATORS: &[&str] = &[
    ",\"videoDetails\"",
    ",\"microformat\"",
    ",\"cards\"",
    ",\"attestation\"",
    ",\"storyboards\"",
];

pub fn watch_url(video_id: &VideoId) -> String {
    format!("https://www.youtube.com/watch?v={video_id}&hl=en&gl=US")
}

/// Scrapes the watch page for the embedded player response and its caption tracks.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageCaptions;

#[async_trait]
impl Strategy for PageCaptions {
    fn method(&self) -> Method {
        Method::PageCaptions
    }

    async fn attempt(&self, fetch: &dyn Fetch, video_id: &VideoId, policy: &LanguagePolicy) -> Option<String> {
        match extract(fetch, video_id, policy).await {
            Ok(Some(text)) => Some(text),
            Ok(None) => None,
            Err(e) => {
                warn!("page-captions failed for {video_id}: {e}");
                None
            }
        }
    }
}

async fn extract(fetch: &dyn Fetch, video_id: &VideoId, policy: &LanguagePolicy) -> Result<Option<String>> {
    let url = watch_url(video_id);
    debug!("Fetching watch page: {url}");

    let resp = fetch.get(&url, WATCH_PAGE_HEADERS).await?;
    if !resp.is_success() {
        info!("Watch page returned {} for {video_id}", resp.status);
        return Ok(None);
    }
    let html = resp.body;

    if html.contains(CAPTCHA_MARKER) {
        info!("Watch page for {video_id} is behind a CAPTCHA");
        return Ok(None);
    }

    if let Some(player) = player_response(&html) {
        if let Some(status @ ("ERROR" | "UNPLAYABLE")) = playability_status(&player) {
            info!("Video {video_id} is not playable: {status}");
            return Ok(None);
        }

        let tracks = caption::tracks_in_player_response(&player);
        if !tracks.is_empty() {
            debug!("Player response lists tracks: {}", languages(&tracks));
            return fetch_caption_track(fetch, &tracks, policy).await;
        }
        debug!("Player response for {video_id} has no caption tracks");
    } else {
        debug!("No parsable ytInitialPlayerResponse for {video_id}");
    }

    let tracks = captions_fragment(&html)
        .map(|captions| caption::tracks_in_captions(&captions))
        .unwrap_or_default();
    if tracks.is_empty() {
        debug!("No caption tracks found in page for {video_id}");
        return Ok(None);
    }

    debug!("Captions fragment lists tracks: {}", languages(&tracks));
    fetch_caption_track(fetch, &tracks, policy).await
}

/// Select the preferred track and normalize its body.
pub async fn fetch_caption_track(
    fetch: &dyn Fetch,
    tracks: &[CaptionTrack],
    policy: &LanguagePolicy,
) -> Result<Option<String>> {
    let Some(track) = policy.select(tracks) else {
        return Ok(None);
    };
    if track.base_url.is_empty() {
        return Ok(None);
    }
    debug!("Using caption track: lang={} kind={:?}", track.language_code, track.kind());

    let resp = fetch.get(&track.base_url, BROWSER_HEADERS).await?;
    if !resp.is_success() {
        info!("Caption track returned {}", resp.status);
        return Ok(None);
    }

    Ok(caption::parse_caption_body(&resp.body))
}

fn languages(tracks: &[CaptionTrack]) -> String {
    tracks
        .iter()
        .map(|t| t.language_code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn playability_status(player: &Value) -> Option<&str> {
    player
        .get("playabilityStatus")
        .and_then(|p| p.get("status"))
        .and_then(|s| s.as_str())
}

/// Parse the `ytInitialPlayerResponse` object embedded in the watch page.
fn player_response(html: &str) -> Option<Value> {
    let start = html.find(PLAYER_RESPONSE_MARKER)? + PLAYER_RESPONSE_MARKER.len() - 1;
    let object = balanced_object(&html[start..])?;
    match serde_json::from_str(object) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("ytInitialPlayerResponse did not parse: {e}");
            None
        }
    }
}

/// Return the prefix of `s` holding one balanced `{...}` object, skipping braces
/// inside string literals. `None` if the object never closes.
pub fn balanced_object(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;
    for (i, ch) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Fallback for pages where the player response cannot be bounded: cut the
/// `"captions":` value out of the surrounding document at the next known sibling key.
fn captions_fragment(html: &str) -> Option<Value> {
    let (_, rest) = html.split_once(CAPTIONS_KEY)?;
    let end = CAPTIONS_TERMINATORS
        .iter()
        .filter_map(|t| rest.find(t))
        .min()
        .unwrap_or(rest.len());
    match serde_json::from_str(&rest[..end]) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Captions fragment did not parse: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FakeFetch;
    use crate::resolve_video_id;

    const ID: &str = "abcDEF12345";

    fn id() -> VideoId {
        resolve_video_id(ID).unwrap()
    }

    fn page_with_player(player: &str) -> String {
        format!("<html><script>var ytInitialPlayerResponse = {player};var meta = {{}};</script></html>")
    }

    #[test]
    fn test_balanced_object_nested() {
        assert_eq!(balanced_object(r#"{"a":{"b":1}};rest"#), Some(r#"{"a":{"b":1}}"#));
    }

    #[test]
    fn test_balanced_object_ignores_braces_in_strings() {
        let s = r#"{"text":"a } b \" { c"};{"#;
        assert_eq!(balanced_object(s), Some(r#"{"text":"a } b \" { c"}"#));
    }

    #[test]
    fn test_balanced_object_truncated() {
        assert_eq!(balanced_object(r#"{"a":{"b":1}"#), None);
        assert_eq!(balanced_object("nope"), None);
    }

    #[test]
    fn test_player_response_extraction() {
        let html = page_with_player(r#"{"playabilityStatus":{"status":"OK"}}"#);
        let player = player_response(&html).unwrap();
        assert_eq!(playability_status(&player), Some("OK"));
    }

    #[test]
    fn test_captions_fragment() {
        let html = r#"...,"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://t/en","languageCode":"en"}]}},"videoDetails":{"videoId":"x"}}"#;
        let captions = captions_fragment(html).unwrap();
        let tracks = caption::tracks_in_captions(&captions);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].base_url, "https://t/en");
    }

    #[test]
    fn test_captions_fragment_uses_earliest_terminator() {
        let html = r#""captions":{"a":1},"storyboards":{},"videoDetails":{}"#;
        assert_eq!(captions_fragment(html), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_captions_fragment_absent() {
        assert!(captions_fragment("<html></html>").is_none());
    }

    #[tokio::test]
    async fn test_player_response_track() {
        let player = r#"{"playabilityStatus":{"status":"OK"},"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://t/en","languageCode":"en"}]}}}"#;
        let fetch = FakeFetch::new()
            .route(watch_url(&id()), 200, page_with_player(player))
            .route("https://t/en", 200, "<text>Hello</text><text>there</text>");
        let text = PageCaptions.attempt(&fetch, &id(), &LanguagePolicy::default()).await;
        assert_eq!(text.as_deref(), Some("Hello there"));
    }

    #[tokio::test]
    async fn test_unplayable_skips_fallback() {
        let player = r#"{"playabilityStatus":{"status":"UNPLAYABLE"}}"#;
        let html = format!(
            r#"{},"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{{"baseUrl":"https://t/en","languageCode":"en"}}]}}}},"videoDetails":{{}}"#,
            page_with_player(player)
        );
        let fetch = FakeFetch::new()
            .route(watch_url(&id()), 200, html)
            .route("https://t/en", 200, "<text>never</text>");
        assert!(PageCaptions.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());
        assert_eq!(fetch.calls(), vec![watch_url(&id())]);
    }

    #[tokio::test]
    async fn test_captcha_short_circuits() {
        let html = format!(
            r#"<div class="g-recaptcha"></div>{}"#,
            page_with_player(r#"{"captions":{}}"#)
        );
        let fetch = FakeFetch::new().route(watch_url(&id()), 200, html);
        assert!(PageCaptions.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());
        assert_eq!(fetch.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_truncated_player_response_uses_fragment() {
        let html = r#"<script>var ytInitialPlayerResponse = {"responseContext":{},"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://t/it","languageCode":"it","kind":"asr"}]}},"videoDetails":{"title":"cut off"#;
        let fetch = FakeFetch::new()
            .route(watch_url(&id()), 200, html)
            .route("https://t/it", 200, r#"{"events":[{"segs":[{"utf8":"Ciao"}]}]}"#);
        let text = PageCaptions.attempt(&fetch, &id(), &LanguagePolicy::default()).await;
        assert_eq!(text.as_deref(), Some("Ciao"));
    }

    #[tokio::test]
    async fn test_truncated_without_captions_is_none() {
        let html = r#"<script>var ytInitialPlayerResponse = {"responseContext":{"#;
        let fetch = FakeFetch::new().route(watch_url(&id()), 200, html);
        assert!(PageCaptions.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_non_success_and_transport_errors() {
        let fetch = FakeFetch::new().route(watch_url(&id()), 429, "slow down");
        assert!(PageCaptions.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());

        let fetch = FakeFetch::new().fail(watch_url(&id()));
        assert!(PageCaptions.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_track_body_unusable() {
        let player = r#"{"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://t/en","languageCode":"en"}]}}}"#;
        let fetch = FakeFetch::new()
            .route(watch_url(&id()), 200, page_with_player(player))
            .route("https://t/en", 200, "");
        assert!(PageCaptions.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());
    }
}
