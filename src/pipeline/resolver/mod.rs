// Resolver - turns a source URL into an ordered stream catalog
//
// Two probe backends sit behind the InfoBackend trait:
// - Python mode: `python3 -m yt_dlp` (survives provider countermeasures better)
// - CLI mode: native `yt-dlp` binary (faster, no Python dependency)
//
// The Resolver picks a mode (Auto prefers Python for YouTube URLs, with
// fallback to the other backend), then filters the raw format list down to
// the mp4 container family and sorts it best-first.

mod cli;
mod diagnostics;
mod python;
mod traits;

pub use cli::CliBackend;
pub use diagnostics::{diagnose, summarize, ResolveReason};
pub use python::PythonBackend;
pub use traits::{InfoBackend, ProbeConfig, ProbeMode, RawFormat, RawVideoInfo};

use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::errors::PipelineError;
use crate::pipeline::models::{MediaKind, StreamDescriptor, VideoDetails};

lazy_static! {
    static ref YOUTUBE_RE: Regex =
        Regex::new(r"(?i)^https?://(www\.|m\.|music\.)?(youtube\.com|youtu\.be)/").unwrap();
}

/// Whether a URL points at YouTube (player-client handling differs there).
pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_RE.is_match(url)
}

/// Reject anything that is not an http(s) URL before spawning a subprocess.
pub fn validate_url(url: &str) -> Result<(), PipelineError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| PipelineError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(PipelineError::InvalidUrl(url.to_string())),
    }
}

/// Wrap an extraction-tool failure string into the right error kind.
///
/// A spawn failure means the tool itself is missing; anything else is a
/// resolution failure classified from the tool's stderr.
pub(crate) fn classify_tool_failure(detail: String) -> PipelineError {
    if detail.contains("Failed to start") {
        return PipelineError::ToolNotFound(detail);
    }
    PipelineError::Resolve {
        reason: diagnose(&detail),
        detail: summarize(&detail),
    }
}

/// Resolver with automatic backend selection and fallback.
pub struct Resolver {
    python: PythonBackend,
    cli: CliBackend,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            python: PythonBackend::new(),
            cli: CliBackend::new(),
        }
    }

    /// Resolve a URL into metadata plus its ordered stream catalog.
    pub async fn resolve(
        &self,
        url: &str,
        config: &ProbeConfig,
    ) -> Result<VideoDetails, PipelineError> {
        validate_url(url)?;
        let raw = self.probe(url, config).await?;
        Ok(build_details(raw))
    }

    async fn probe(&self, url: &str, config: &ProbeConfig) -> Result<RawVideoInfo, PipelineError> {
        match config.mode {
            ProbeMode::Python => self.python.probe(url, config).await,
            ProbeMode::Cli => self.cli.probe(url, config).await,
            ProbeMode::Auto => self.probe_auto(url, config).await,
        }
    }

    /// Auto mode: pick a primary backend by URL, fall back to the other.
    async fn probe_auto(
        &self,
        url: &str,
        config: &ProbeConfig,
    ) -> Result<RawVideoInfo, PipelineError> {
        let (primary, fallback): (&dyn InfoBackend, &dyn InfoBackend) = if is_youtube_url(url) {
            (&self.python, &self.cli)
        } else {
            (&self.cli, &self.python)
        };

        if primary.is_available() {
            tracing::info!(backend = primary.name(), "trying primary backend");
            match primary.probe(url, config).await {
                Ok(info) => return Ok(info),
                Err(e) => tracing::warn!(backend = primary.name(), "primary backend failed: {}", e),
            }
        }

        if fallback.is_available() {
            tracing::info!(backend = fallback.name(), "trying fallback backend");
            return fallback.probe(url, config).await;
        }

        Err(PipelineError::ToolNotFound(
            "neither the Python yt_dlp module nor the yt-dlp binary is available".to_string(),
        ))
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Restrict raw formats to usable mp4-family streams and sort best-first.
pub fn build_details(raw: RawVideoInfo) -> VideoDetails {
    let mut streams: Vec<StreamDescriptor> =
        raw.formats.iter().filter_map(descriptor_from).collect();

    // Video-capable streams first, highest resolution down; audio-only
    // after, highest bitrate down. Equal values keep provider order.
    streams.sort_by(|a, b| {
        let a_video = a.has_video();
        let b_video = b.has_video();
        b_video.cmp(&a_video).then_with(|| {
            if a_video {
                b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0))
            } else {
                b.abr_kbps
                    .unwrap_or(0.0)
                    .total_cmp(&a.abr_kbps.unwrap_or(0.0))
            }
        })
    });

    VideoDetails {
        id: raw.id,
        title: raw.title,
        uploader: raw.uploader,
        duration_seconds: raw.duration_seconds,
        thumbnail: raw.thumbnail,
        streams,
    }
}

/// Convert one provider format into a pipeline descriptor.
///
/// Drops storyboard/manifest pseudo-formats (non-numeric ids), anything
/// outside the mp4 container family, and entries without a direct URL.
fn descriptor_from(raw: &RawFormat) -> Option<StreamDescriptor> {
    let itag: u32 = raw.format_id.parse().ok()?;

    if raw.ext != "mp4" && raw.ext != "m4a" {
        return None;
    }

    let url = raw.url.clone().filter(|u| !u.is_empty())?;

    let kind = match (raw.has_video_track(), raw.has_audio_track()) {
        (true, true) => MediaKind::Combined,
        (true, false) => MediaKind::VideoOnly,
        (false, true) => MediaKind::AudioOnly,
        (false, false) => return None,
    };

    Some(StreamDescriptor {
        itag,
        kind,
        container: raw.ext.clone(),
        height: raw.height,
        abr_kbps: raw.abr,
        filesize: raw.effective_size(),
        url,
    })
}
