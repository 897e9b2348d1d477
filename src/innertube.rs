use std::sync::LazyLock;

use async_trait::async_trait;
use eyre::{Result, eyre};
use log::{debug, info, warn};
use regex::Regex;
use serde_json::Value;

use crate::caption::{self, LanguagePolicy};
use crate::fetch::{BROWSER_HEADERS, Fetch, WATCH_PAGE_HEADERS};
use crate::page::watch_url;
use crate::pipeline::Strategy;
use crate::{Method, VideoId};

const CLIENT_NAME: &str = "ANDROID";
const CLIENT_VERSION: &str = "20.10.38";

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY":"([^"]+)""#).expect("valid api key regex"));

pub fn player_url(api_key: &str) -> String {
    format!("https://www.youtube.com/youtubei/v1/player?key={api_key}")
}

/// Calls the InnerTube player endpoint posing as the Android app, which
/// exposes caption tracks the web client sometimes withholds.
#[derive(Debug, Default, Clone, Copy)]
pub struct Innertube;

#[async_trait]
impl Strategy for Innertube {
    fn method(&self) -> Method {
        Method::Innertube
    }

    async fn attempt(&self, fetch: &dyn Fetch, video_id: &VideoId, policy: &LanguagePolicy) -> Option<String> {
        match extract(fetch, video_id, policy).await {
            Ok(text) => text,
            Err(e) => {
                warn!("innertube failed for {video_id}: {e}");
                None
            }
        }
    }
}

async fn extract(fetch: &dyn Fetch, video_id: &VideoId, policy: &LanguagePolicy) -> Result<Option<String>> {
    // Step 1: Fetch the watch page to get the InnerTube API key
    let page = fetch.get(&watch_url(video_id), WATCH_PAGE_HEADERS).await?;
    let api_key = extract_api_key(&page.body)?;
    debug!("Extracted InnerTube API key: {api_key}");

    // Step 2: Call InnerTube player endpoint
    let body = serde_json::json!({
        "context": {
            "client": {
                "clientName": CLIENT_NAME,
                "clientVersion": CLIENT_VERSION
            }
        },
        "videoId": video_id.as_str()
    });

    let resp = fetch.post_json(&player_url(&api_key), BROWSER_HEADERS, &body).await?;
    if !resp.is_success() {
        info!("InnerTube player returned {} for {video_id}", resp.status);
        return Ok(None);
    }

    let player: Value = serde_json::from_str(&resp.body)?;
    let tracks = caption::tracks_in_player_response(&player);
    let Some(track) = policy.select(&tracks) else {
        info!("InnerTube lists no caption tracks for {video_id}");
        return Ok(None);
    };
    debug!("Using InnerTube caption track: lang={}", track.language_code);

    // Step 3: Fetch the caption XML
    let caption_xml = fetch.get(&track.base_url, BROWSER_HEADERS).await?;
    if !caption_xml.is_success() {
        info!("InnerTube caption track returned {}", caption_xml.status);
        return Ok(None);
    }

    Ok(caption::parse_innertube_body(&caption_xml.body))
}

fn extract_api_key(html: &str) -> Result<String> {
    API_KEY_RE
        .captures(html)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| eyre!("could not extract InnerTube API key from watch page"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FakeFetch;
    use crate::resolve_video_id;

    const KEY: &str = "AIzaSyYtcapFixtureKey_4dQw9WgXcQ";

    fn id() -> VideoId {
        resolve_video_id("abcDEF12345").unwrap()
    }

    fn watch_html() -> String {
        format!(r#"<script>ytcfg.set({{"INNERTUBE_API_KEY":"{KEY}","INNERTUBE_CONTEXT":{{}}}});</script>"#)
    }

    fn player_json(tracks: &str) -> String {
        format!(r#"{{"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":{tracks}}}}}}}"#)
    }

    #[test]
    fn test_api_key_from_ytcfg() {
        assert_eq!(extract_api_key(&watch_html()).unwrap(), KEY);
    }

    #[test]
    fn test_api_key_needs_exact_key_name() {
        let html = r#"<script>ytcfg.set({"INNERTUBE_API_VERSION":"v1","innertubeApiKey":"AIzaOther"});</script>"#;
        assert!(extract_api_key(html).is_err());
    }

    #[tokio::test]
    async fn test_android_client_request() {
        let tracks = r#"[{"baseUrl":"https://t/fr","languageCode":"fr"},{"baseUrl":"https://t/it","languageCode":"it","kind":"asr"}]"#;
        let fetch = FakeFetch::new()
            .route(watch_url(&id()), 200, watch_html())
            .route(player_url(KEY), 200, player_json(tracks))
            .route("https://t/it", 200, r#"<timedtext><body><p t="0">Ciao &amp; benvenuti</p></body></timedtext>"#);

        let text = Innertube.attempt(&fetch, &id(), &LanguagePolicy::default()).await;
        assert_eq!(text.as_deref(), Some("Ciao & benvenuti"));

        let posted = fetch.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["context"]["client"]["clientName"], "ANDROID");
        assert_eq!(posted[0]["context"]["client"]["clientVersion"], "20.10.38");
        assert_eq!(posted[0]["videoId"], "abcDEF12345");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let fetch = FakeFetch::new().route(watch_url(&id()), 200, "<html></html>");
        assert!(Innertube.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());
        assert!(fetch.posted().is_empty());
    }

    #[tokio::test]
    async fn test_player_rejected() {
        let fetch = FakeFetch::new()
            .route(watch_url(&id()), 200, watch_html())
            .route(player_url(KEY), 403, "{}");
        assert!(Innertube.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_no_tracks() {
        let fetch = FakeFetch::new()
            .route(watch_url(&id()), 200, watch_html())
            .route(player_url(KEY), 200, r#"{"playabilityStatus":{"status":"OK"}}"#);
        assert!(Innertube.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());
        assert_eq!(fetch.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_player_json() {
        let fetch = FakeFetch::new()
            .route(watch_url(&id()), 200, watch_html())
            .route(player_url(KEY), 200, "<html>not json</html>");
        assert!(Innertube.attempt(&fetch, &id(), &LanguagePolicy::default()).await.is_none());
    }
}
