pub mod caption;
pub mod config;
pub mod envelope;
pub mod fetch;
pub mod innertube;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod server;
pub mod timedtext;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Opaque YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which strategy produced the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    #[serde(rename = "page-captions")]
    PageCaptions,
    #[serde(rename = "timedtext")]
    TimedText,
    #[serde(rename = "innertube")]
    Innertube,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::PageCaptions => write!(f, "page-captions"),
            Method::TimedText => write!(f, "timedtext"),
            Method::Innertube => write!(f, "innertube"),
        }
    }
}

static WATCH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]v=([^&]+)").expect("valid watch regex"));
static SHORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"youtu\.be/([^?&]+)").expect("valid short regex"));
static EMBED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtube\.com/embed/([^?&]+)").expect("valid embed regex"));

/// Resolve a bare video ID or a watch/short/embed URL into a `VideoId`.
///
/// Input without any of `http`, `/` or `.` is taken as a bare ID verbatim; no
/// length or charset check is applied, bad IDs simply fail later upstream.
pub fn resolve_video_id(input: &str) -> Option<VideoId> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if !input.contains("http") && !input.contains('/') && !input.contains('.') {
        return Some(VideoId(input.to_string()));
    }

    [&*WATCH_RE, &*SHORT_RE, &*EMBED_RE]
        .iter()
        .find_map(|re| re.captures(input))
        .map(|caps| VideoId(caps[1].to_string()))
}
