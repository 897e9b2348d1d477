use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::task::AbortHandle;

use crate::caption::LanguagePolicy;
use crate::fetch::Fetch;
use crate::innertube::Innertube;
use crate::page::PageCaptions;
use crate::timedtext::TimedText;
use crate::{Method, VideoId, resolve_video_id};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One independent way of getting a transcript for a video.
///
/// Implementations never fail outward: anything that goes wrong is logged and
/// reported as `None` so the pipeline can move on.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn method(&self) -> Method;

    async fn attempt(&self, fetch: &dyn Fetch, video_id: &VideoId, policy: &LanguagePolicy) -> Option<String>;
}

/// Why no transcript was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    InvalidVideoId,
    NoCaptions,
    Internal(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::InvalidVideoId => write!(f, "Invalid video ID"),
            Failure::NoCaptions => write!(f, "No captions available for this video"),
            Failure::Internal(msg) => write!(f, "{msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { transcript: String, method: Method },
    Failure(Failure),
}

impl Outcome {
    /// HTTP status the outcome maps to at the request boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Success { .. } => 200,
            Outcome::Failure(Failure::InvalidVideoId) => 400,
            Outcome::Failure(Failure::NoCaptions) => 200,
            Outcome::Failure(Failure::Internal(_)) => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

pub struct Pipeline {
    fetch: Arc<dyn Fetch>,
    policy: LanguagePolicy,
    strategies: Vec<Box<dyn Strategy>>,
    timeout: Duration,
}

impl Pipeline {
    /// Page captions first, then timedtext, then InnerTube.
    pub fn new(fetch: Arc<dyn Fetch>, policy: LanguagePolicy) -> Self {
        Self::with_strategies(
            fetch,
            policy,
            vec![Box::new(PageCaptions), Box::new(TimedText), Box::new(Innertube)],
        )
    }

    pub fn with_strategies(fetch: Arc<dyn Fetch>, policy: LanguagePolicy, strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self {
            fetch,
            policy,
            strategies,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `input` and run the strategies in order until one yields text.
    ///
    /// Runs on its own task so a panicking strategy becomes `Failure::Internal`
    /// instead of taking the caller down.
    pub async fn get_transcript(self: &Arc<Self>, input: &str) -> Outcome {
        let Some(video_id) = resolve_video_id(input) else {
            info!("Could not resolve a video ID from {input:?}");
            return Outcome::Failure(Failure::InvalidVideoId);
        };

        let pipeline = Arc::clone(self);
        let task = tokio::spawn(async move { pipeline.run(&video_id).await });
        let _guard = AbortOnDrop(task.abort_handle());

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                let msg = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                error!("Transcript pipeline aborted: {msg}");
                Outcome::Failure(Failure::Internal(msg))
            }
            Err(_) => {
                let msg = format!("transcript request timed out after {:?}", self.timeout);
                error!("{msg}");
                Outcome::Failure(Failure::Internal(msg))
            }
        }
    }

    async fn run(&self, video_id: &VideoId) -> Outcome {
        for strategy in &self.strategies {
            let method = strategy.method();
            debug!("Trying {method} for {video_id}");
            if let Some(transcript) = strategy.attempt(self.fetch.as_ref(), video_id, &self.policy).await {
                info!("Got transcript for {video_id} via {method} ({} chars)", transcript.len());
                return Outcome::Success { transcript, method };
            }
            debug!("{method} found nothing for {video_id}");
        }
        info!("No captions available for {video_id}");
        Outcome::Failure(Failure::NoCaptions)
    }
}

/// Cancels the strategy task once the request that spawned it goes away.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "strategy panicked".to_string()
    }
}
