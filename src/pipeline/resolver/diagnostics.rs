// Resolution diagnostics - classifies extraction-tool stderr
//
// The extraction tool reports every failure as free text on stderr. This
// module maps that text onto a closed set of reasons so callers can tell
// "the video is gone" apart from "the network hiccuped" without string
// matching of their own.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why resolving a source URL failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveReason {
    /// The provider does not recognize this URL
    UnsupportedUrl,

    /// Deleted, taken down, or otherwise permanently gone
    Unavailable,

    /// Private video requiring authorization
    Private,

    /// Not viewable from this region
    GeoBlocked,

    /// Sign-in required to confirm age
    AgeRestricted,

    /// Provider is throttling requests (429 and friends)
    RateLimited,

    /// Connection timed out or was refused
    NetworkTimeout,

    /// The provider changed its page/player format and the extractor
    /// can no longer parse it; an extractor update usually fixes this
    ProtocolDrift,

    /// Anything the patterns below did not recognize
    Unknown,
}

impl ResolveReason {
    /// True when the same request may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::NetworkTimeout | Self::Unknown
        )
    }

    /// True when the caller supplied something wrong, not the host or provider.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::UnsupportedUrl | Self::Unavailable | Self::Private)
    }

    /// Human-readable description, stable for display.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnsupportedUrl => "URL is not recognized by the extractor",
            Self::Unavailable => "video is unavailable or has been removed",
            Self::Private => "video is private",
            Self::GeoBlocked => "video is not available in this region",
            Self::AgeRestricted => "video is age-restricted",
            Self::RateLimited => "provider is rate-limiting requests",
            Self::NetworkTimeout => "network timeout while contacting the provider",
            Self::ProtocolDrift => "provider format changed; extractor needs an update",
            Self::Unknown => "unknown resolution failure",
        }
    }
}

impl fmt::Display for ResolveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Analyze stderr text and return the most specific matching reason.
///
/// Patterns are checked in order of specificity; the generic network
/// patterns come last so "timed out fetching geo check" still reads as
/// geo-blocked.
pub fn diagnose(stderr: &str) -> ResolveReason {
    let lower = stderr.to_lowercase();

    if lower.contains("unsupported url") || lower.contains("is not a valid url") {
        return ResolveReason::UnsupportedUrl;
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return ResolveReason::Private;
    }

    if lower.contains("video unavailable")
        || lower.contains("video is unavailable")
        || lower.contains("has been removed")
        || lower.contains("no longer available")
    {
        return ResolveReason::Unavailable;
    }

    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geographic restriction")
    {
        return ResolveReason::GeoBlocked;
    }

    if lower.contains("age-restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age_verification")
    {
        return ResolveReason::AgeRestricted;
    }

    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        return ResolveReason::RateLimited;
    }

    // Extractor-side parse failures mean the provider moved underneath us
    if lower.contains("unable to extract")
        || lower.contains("signature extraction failed")
        || lower.contains("nsig extraction failed")
        || lower.contains("please report this issue")
    {
        return ResolveReason::ProtocolDrift;
    }

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("network unreachable")
        || lower.contains("temporary failure in name resolution")
    {
        return ResolveReason::NetworkTimeout;
    }

    ResolveReason::Unknown
}

/// First stderr line worth showing to a user (the tool's ERROR line,
/// falling back to the last non-empty line).
pub fn summarize(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|l| l.to_lowercase().starts_with("error"))
        .or_else(|| stderr.lines().map(str::trim).rev().find(|l| !l.is_empty()))
        .unwrap_or("")
        .chars()
        .take(300)
        .collect()
}
