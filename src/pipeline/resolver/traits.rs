// InfoBackend trait and provider-side format types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pipeline::errors::PipelineError;

/// Which extraction mode to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    /// Python module yt_dlp (better at surviving provider countermeasures)
    Python,
    /// Native yt-dlp binary (faster, no Python dependency)
    Cli,
    /// Auto-select: Python first for YouTube, with fallback
    #[default]
    Auto,
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Cli => write!(f, "cli"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// Configuration for one metadata probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub mode: ProbeMode,
    /// SOCKS5/HTTP proxy URL forwarded to the extraction tool
    pub proxy: Option<String>,
    /// Socket timeout in seconds, also bounds the whole subprocess
    pub timeout_seconds: u32,
    /// YouTube player client override (web, android, tv)
    pub player_client: Option<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            mode: ProbeMode::Auto,
            proxy: None,
            timeout_seconds: 30,
            player_client: None,
        }
    }
}

impl ProbeConfig {
    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_player_client(mut self, client: Option<String>) -> Self {
        self.player_client = client;
        self
    }
}

/// One format entry exactly as the provider reports it, before any
/// filtering. Kept separate from the pipeline's descriptor so provider
/// quirks stay on this side of the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    pub ext: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    pub abr: Option<f32>,
    pub url: Option<String>,
}

impl RawFormat {
    /// Exact size when known, provider estimate otherwise
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    pub fn has_video_track(&self) -> bool {
        self.vcodec
            .as_deref()
            .map_or(false, |v| v != "none" && !v.is_empty())
    }

    pub fn has_audio_track(&self) -> bool {
        self.acodec
            .as_deref()
            .map_or(false, |a| a != "none" && !a.is_empty())
    }
}

/// Unfiltered probe result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVideoInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub thumbnail: String,
    pub formats: Vec<RawFormat>,
}

impl RawVideoInfo {
    /// Parse the extraction tool's `--dump-json` output.
    pub fn from_json(stdout: &[u8]) -> Result<Self, PipelineError> {
        let json_str = String::from_utf8_lossy(stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str).map_err(|e| {
            PipelineError::Resolve {
                reason: super::diagnostics::ResolveReason::ProtocolDrift,
                detail: format!("invalid JSON from extractor: {}", e),
            }
        })?;

        let formats = json["formats"]
            .as_array()
            .map(|arr| arr.iter().map(Self::parse_format).collect())
            .unwrap_or_default();

        Ok(Self {
            id: json["id"].as_str().unwrap_or("unknown").to_string(),
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
            duration_seconds: json["duration"].as_f64().unwrap_or(0.0) as u64,
            thumbnail: json["thumbnail"].as_str().unwrap_or("").to_string(),
            formats,
        })
    }

    fn parse_format(f: &serde_json::Value) -> RawFormat {
        RawFormat {
            format_id: f["format_id"].as_str().unwrap_or("").to_string(),
            ext: f["ext"].as_str().unwrap_or("").to_string(),
            width: f["width"].as_u64().map(|w| w as u32),
            height: f["height"].as_u64().map(|h| h as u32),
            vcodec: f["vcodec"].as_str().map(|s| s.to_string()),
            acodec: f["acodec"].as_str().map(|s| s.to_string()),
            filesize: f["filesize"].as_u64(),
            filesize_approx: f["filesize_approx"].as_u64(),
            abr: f["abr"].as_f64().map(|a| a as f32),
            url: f["url"].as_str().map(|s| s.to_string()),
        }
    }
}

/// Trait for metadata extraction backends.
#[async_trait]
pub trait InfoBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Check if this backend can run on the host
    fn is_available(&self) -> bool;

    /// Probe a URL for metadata and the full format list
    async fn probe(&self, url: &str, config: &ProbeConfig)
        -> Result<RawVideoInfo, PipelineError>;
}
