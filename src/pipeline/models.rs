// Common data models for the download pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a single encoded stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// Progressive stream: video and audio in one asset, playable as-is
    Combined,
    /// Adaptive video half, silent
    VideoOnly,
    /// Adaptive audio half
    AudioOnly,
}

impl MediaKind {
    pub fn has_video(&self) -> bool {
        matches!(self, Self::Combined | Self::VideoOnly)
    }

    pub fn has_audio(&self) -> bool {
        matches!(self, Self::Combined | Self::AudioOnly)
    }
}

/// Track role, used in precondition errors ("no audio stream available").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// One downloadable stream as reported by the metadata provider.
///
/// Descriptors are never mutated; the pipeline only filters and sorts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Opaque numeric key addressing this exact encoding variant
    pub itag: u32,
    pub kind: MediaKind,
    /// Container extension (mp4, m4a)
    pub container: String,
    /// Video height in pixels, absent for audio-only streams
    pub height: Option<u32>,
    /// Audio bitrate in kbps, absent for video-only streams
    pub abr_kbps: Option<f32>,
    /// Declared size in bytes (exact or provider-approximate)
    pub filesize: Option<u64>,
    /// Direct media URL the bytes can be fetched from
    pub url: String,
}

impl StreamDescriptor {
    pub fn has_video(&self) -> bool {
        self.kind.has_video()
    }

    pub fn is_audio_only(&self) -> bool {
        self.kind == MediaKind::AudioOnly
    }

    /// Declared size in megabytes, rounded to two decimals
    pub fn size_mb(&self) -> Option<f64> {
        self.filesize.map(super::utils::bytes_to_mb)
    }

    /// Short label for listings: "1080p", "160kbps"
    pub fn quality_label(&self) -> String {
        match self.kind {
            MediaKind::AudioOnly => match self.abr_kbps {
                Some(abr) => format!("{}kbps", abr.round() as u32),
                None => "audio".to_string(),
            },
            _ => match self.height {
                Some(h) => format!("{}p", h),
                None => "video".to_string(),
            },
        }
    }
}

/// Resolved video metadata plus its filtered, quality-ordered streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub thumbnail: String,
    pub streams: Vec<StreamDescriptor>,
}

impl VideoDetails {
    pub fn stream_by_itag(&self, itag: u32) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.itag == itag)
    }

    /// Duration formatted as M:SS
    pub fn duration_display(&self) -> String {
        format!("{}:{:02}", self.duration_seconds / 60, self.duration_seconds % 60)
    }
}

/// How the selector should pick from the stream list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Highest resolution video, highest bitrate audio
    Best,
    /// User-chosen itags; audio may be omitted when the video itag is progressive
    Explicit {
        video_itag: u32,
        audio_itag: Option<u32>,
    },
}

/// The selector's verdict: one progressive stream, or a video/audio pair
/// that needs the merge step.
#[derive(Debug, Clone)]
pub enum Selection {
    Combined(StreamDescriptor),
    Split {
        video: StreamDescriptor,
        audio: StreamDescriptor,
    },
}

impl Selection {
    pub fn requires_merge(&self) -> bool {
        matches!(self, Self::Split { .. })
    }

    /// Descriptor the final file takes its quality label from
    pub fn video_descriptor(&self) -> &StreamDescriptor {
        match self {
            Self::Combined(s) => s,
            Self::Split { video, .. } => video,
        }
    }
}

/// Advisory progress report passed to a caller-supplied callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub percent: f32,
    pub status: String,
}

/// Final artifact handed back to the caller, fully in memory.
/// The on-disk copy is gone by the time this exists.
#[derive(Debug)]
pub struct DeliveredVideo {
    /// Sanitized name suitable as a save-as suggestion
    pub file_name: String,
    pub bytes: Vec<u8>,
}
