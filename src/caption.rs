use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

static TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<text(?:\s[^>]*)?>(.*?)</text>").expect("valid <text> regex"));
static P_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<p(?:\s[^>]*)?>(.*?)</p>").expect("valid <p> regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Whether a track is human-authored or auto-generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Standard,
    Asr,
}

/// One caption track advertised by YouTube
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "languageCode")]
    pub language_code: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
}

impl CaptionTrack {
    pub fn new(language_code: &str, kind: TrackKind, base_url: &str) -> Self {
        Self {
            language_code: language_code.to_string(),
            kind: match kind {
                TrackKind::Asr => Some("asr".to_string()),
                TrackKind::Standard => None,
            },
            base_url: base_url.to_string(),
        }
    }

    pub fn kind(&self) -> TrackKind {
        match self.kind.as_deref() {
            Some("asr") => TrackKind::Asr,
            _ => TrackKind::Standard,
        }
    }
}

/// Ordered language preference shared by every strategy and the track selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePolicy {
    languages: Vec<String>,
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self::new(["it", "en", "en-US", "en-GB"])
    }
}

impl LanguagePolicy {
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let languages = languages
            .into_iter()
            .map(Into::into)
            .map(|l: String| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Self { languages }
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Primary subtags (`en` for `en-US`) in preference order, without repeats.
    fn primary_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for lang in &self.languages {
            let primary = lang.split('-').next().unwrap_or(lang);
            if !tags.contains(&primary) {
                tags.push(primary);
            }
        }
        tags
    }

    /// Primary subtags the policy also lists regional variants for. Only these
    /// accept any `<tag>-*` track as a fallback.
    fn regional_tags(&self) -> Vec<&str> {
        self.primary_tags()
            .into_iter()
            .filter(|tag| {
                self.languages
                    .iter()
                    .any(|l| l.strip_prefix(*tag).is_some_and(|rest| rest.starts_with('-')))
            })
            .collect()
    }

    /// Pick the best track: per primary language manual then ASR, then the first
    /// track in list order carrying a regional variant the policy names, then
    /// the first track.
    pub fn select<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        for tag in self.primary_tags() {
            for kind in [TrackKind::Standard, TrackKind::Asr] {
                if let Some(track) = tracks.iter().find(|t| t.language_code == tag && t.kind() == kind) {
                    return Some(track);
                }
            }
        }

        for tag in self.regional_tags() {
            if let Some(track) = tracks.iter().find(|t| t.language_code.starts_with(tag)) {
                return Some(track);
            }
        }

        tracks.first()
    }
}

/// Read `captions.playerCaptionsTracklistRenderer.captionTracks` from a player response.
pub fn tracks_in_player_response(player: &Value) -> Vec<CaptionTrack> {
    player
        .get("captions")
        .map(tracks_in_captions)
        .unwrap_or_default()
}

/// Read `playerCaptionsTracklistRenderer.captionTracks` from a bare captions object.
/// Entries missing a language code or URL are skipped.
pub fn tracks_in_captions(captions: &Value) -> Vec<CaptionTrack> {
    captions
        .get("playerCaptionsTracklistRenderer")
        .and_then(|r| r.get("captionTracks"))
        .and_then(|t| t.as_array())
        .map(|tracks| {
            tracks
                .iter()
                .filter_map(|t| serde_json::from_value::<CaptionTrack>(t.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn collapse_whitespace(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Decode the entities YouTube emits in caption XML. `&amp;` goes first so
/// doubly-escaped sequences like `&amp;#39;` end up fully decoded.
pub fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

/// The smaller entity set used for timedtext and innertube bodies.
pub fn decode_basic_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#39;", "'")
}

fn clean_segment(raw: &str, decode: fn(&str) -> String) -> String {
    let decoded = decode(raw);
    let stripped = TAG_RE.replace_all(&decoded, "");
    stripped.replace(['\r', '\n'], " ").trim().to_string()
}

fn xml_segments(body: &str, re: &Regex, decode: fn(&str) -> String) -> Vec<String> {
    re.captures_iter(body)
        .map(|caps| clean_segment(&caps[1], decode))
        .filter(|s| !s.is_empty())
        .collect()
}

fn join_segments(segments: &[String]) -> Option<String> {
    let text = collapse_whitespace(&segments.join(" "));
    (!text.is_empty()).then_some(text)
}

/// Flatten a json3 `events` array: each event with `segs` becomes the
/// concatenation of its `utf8` pieces.
pub fn parse_json_events(events: &[Value]) -> Option<String> {
    let pieces: Vec<String> = events
        .iter()
        .filter_map(|e| e.get("segs").and_then(|s| s.as_array()))
        .map(|segs| {
            segs.iter()
                .map(|seg| seg.get("utf8").and_then(|u| u.as_str()).unwrap_or(""))
                .collect::<String>()
        })
        .collect();
    let text = collapse_whitespace(&pieces.join(" "));
    (!text.is_empty()).then_some(text)
}

/// Normalize a caption track body (json3 or XML) into flat text.
pub fn parse_caption_body(body: &str) -> Option<String> {
    let trimmed = body.trim();

    if trimmed.starts_with('{') {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(doc) => {
                if let Some(text) = doc.get("events").and_then(|e| e.as_array()).and_then(|e| parse_json_events(e)) {
                    return Some(text);
                }
                debug!("Caption body is JSON without usable events, trying XML");
            }
            Err(e) => debug!("Caption body looked like JSON but did not parse: {e}"),
        }
    }

    let mut segments = xml_segments(trimmed, &TEXT_RE, decode_entities);
    if segments.is_empty() {
        segments = xml_segments(trimmed, &P_RE, decode_entities);
    }
    join_segments(&segments)
}

/// XML `<text>` extraction with the basic entity set, used by the timedtext fallback.
pub fn parse_text_elements(body: &str) -> Option<String> {
    join_segments(&xml_segments(body, &TEXT_RE, decode_basic_entities))
}

/// Innertube track bodies come as `<p>` (srv3) or `<text>` depending on the variant.
pub fn parse_innertube_body(body: &str) -> Option<String> {
    let mut segments = xml_segments(body, &P_RE, decode_basic_entities);
    if segments.is_empty() {
        segments = xml_segments(body, &TEXT_RE, decode_basic_entities);
    }
    join_segments(&segments)
}
