// Selector - picks target stream(s) from a resolved catalog
//
// Pure functions over the descriptor list; no I/O. "Best" means highest
// resolution among video-capable streams paired with the highest-bitrate
// audio-only stream when the video half has no audio of its own. Ties keep
// the first descriptor in provider order; that ordering is
// provider-dependent and deliberately left as-is.

use super::errors::PipelineError;
use super::models::{Selection, SelectionPolicy, StreamDescriptor, TrackKind};

pub struct Selector;

impl Selector {
    /// Apply a policy to a catalog.
    pub fn select(
        streams: &[StreamDescriptor],
        policy: &SelectionPolicy,
    ) -> Result<Selection, PipelineError> {
        match policy {
            SelectionPolicy::Best => Self::select_best(streams),
            SelectionPolicy::Explicit {
                video_itag,
                audio_itag,
            } => Self::select_explicit(streams, *video_itag, *audio_itag),
        }
    }

    fn select_best(streams: &[StreamDescriptor]) -> Result<Selection, PipelineError> {
        let video = Self::best_video(streams).ok_or(PipelineError::MissingTrack(TrackKind::Video))?;

        if video.kind.has_audio() {
            return Ok(Selection::Combined(video.clone()));
        }

        let audio = Self::best_audio(streams).ok_or(PipelineError::MissingTrack(TrackKind::Audio))?;
        Ok(Selection::Split {
            video: video.clone(),
            audio: audio.clone(),
        })
    }

    fn select_explicit(
        streams: &[StreamDescriptor],
        video_itag: u32,
        audio_itag: Option<u32>,
    ) -> Result<Selection, PipelineError> {
        let target = streams
            .iter()
            .find(|s| s.itag == video_itag)
            .ok_or(PipelineError::UnknownStream(video_itag))?;

        // Anything that already carries audio (progressive, or an outright
        // audio-only pick) needs no second half; an explicit audio itag
        // alongside it is ignored rather than double-fetched.
        if target.kind.has_audio() {
            return Ok(Selection::Combined(target.clone()));
        }

        let audio = match audio_itag {
            Some(itag) => streams
                .iter()
                .find(|s| s.itag == itag)
                .ok_or(PipelineError::UnknownStream(itag))?,
            None => {
                Self::best_audio(streams).ok_or(PipelineError::MissingTrack(TrackKind::Audio))?
            }
        };

        if !audio.is_audio_only() {
            return Err(PipelineError::MissingTrack(TrackKind::Audio));
        }

        Ok(Selection::Split {
            video: target.clone(),
            audio: audio.clone(),
        })
    }

    /// Highest-resolution stream that carries video; first wins on ties.
    pub fn best_video(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
        let mut best: Option<&StreamDescriptor> = None;
        for s in streams.iter().filter(|s| s.has_video()) {
            match best {
                Some(b) if s.height.unwrap_or(0) <= b.height.unwrap_or(0) => {}
                _ => best = Some(s),
            }
        }
        best
    }

    /// Highest-bitrate audio-only stream; first wins on ties.
    pub fn best_audio(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
        let mut best: Option<&StreamDescriptor> = None;
        for s in streams.iter().filter(|s| s.is_audio_only()) {
            match best {
                Some(b) if s.abr_kbps.unwrap_or(0.0) <= b.abr_kbps.unwrap_or(0.0) => {}
                _ => best = Some(s),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::models::MediaKind;

    fn make_video(itag: u32, height: u32, kind: MediaKind) -> StreamDescriptor {
        StreamDescriptor {
            itag,
            kind,
            container: "mp4".to_string(),
            height: Some(height),
            abr_kbps: None,
            filesize: Some(1_000_000),
            url: format!("https://cdn.example/{}", itag),
        }
    }

    fn make_audio(itag: u32, abr: f32) -> StreamDescriptor {
        StreamDescriptor {
            itag,
            kind: MediaKind::AudioOnly,
            container: "m4a".to_string(),
            height: None,
            abr_kbps: Some(abr),
            filesize: Some(200_000),
            url: format!("https://cdn.example/{}", itag),
        }
    }

    #[test]
    fn test_best_video_dominates_all_others() {
        let streams = vec![
            make_video(135, 480, MediaKind::VideoOnly),
            make_video(137, 1080, MediaKind::VideoOnly),
            make_video(22, 720, MediaKind::Combined),
        ];

        let best = Selector::best_video(&streams).unwrap();
        for s in streams.iter().filter(|s| s.has_video()) {
            assert!(best.height.unwrap() >= s.height.unwrap());
        }
        assert_eq!(best.itag, 137);
    }

    #[test]
    fn test_best_pairs_split_halves() {
        // Adaptive 1080p beats the progressive 720p, so a merge pair comes back
        let streams = vec![
            make_video(137, 1080, MediaKind::VideoOnly),
            make_video(22, 720, MediaKind::Combined),
            make_audio(140, 160.0),
        ];

        let selection = Selector::select(&streams, &SelectionPolicy::Best).unwrap();
        match selection {
            Selection::Split { video, audio } => {
                assert_eq!(video.itag, 137);
                assert_eq!(audio.itag, 140);
            }
            other => panic!("expected split selection, got {:?}", other),
        }
    }

    #[test]
    fn test_best_prefers_combined_when_it_wins_outright() {
        let streams = vec![
            make_video(22, 720, MediaKind::Combined),
            make_video(135, 480, MediaKind::VideoOnly),
            make_audio(140, 128.0),
        ];

        let selection = Selector::select(&streams, &SelectionPolicy::Best).unwrap();
        assert!(matches!(selection, Selection::Combined(ref s) if s.itag == 22));
        assert!(!selection.requires_merge());
    }

    #[test]
    fn test_tie_keeps_provider_order() {
        let streams = vec![
            make_video(298, 720, MediaKind::VideoOnly),
            make_video(136, 720, MediaKind::VideoOnly),
        ];
        assert_eq!(Selector::best_video(&streams).unwrap().itag, 298);

        let audio = vec![make_audio(140, 128.0), make_audio(141, 128.0)];
        assert_eq!(Selector::best_audio(&audio).unwrap().itag, 140);
    }

    #[test]
    fn test_explicit_combined_ignores_audio_itag() {
        let streams = vec![
            make_video(22, 720, MediaKind::Combined),
            make_audio(140, 128.0),
        ];

        let policy = SelectionPolicy::Explicit {
            video_itag: 22,
            audio_itag: Some(140),
        };
        let selection = Selector::select(&streams, &policy).unwrap();
        assert!(!selection.requires_merge());
    }

    #[test]
    fn test_explicit_split_requires_both_halves() {
        let streams = vec![make_video(137, 1080, MediaKind::VideoOnly)];

        let policy = SelectionPolicy::Explicit {
            video_itag: 137,
            audio_itag: None,
        };
        let err = Selector::select(&streams, &policy).unwrap_err();
        assert!(matches!(err, PipelineError::MissingTrack(TrackKind::Audio)));
    }

    #[test]
    fn test_explicit_unknown_itag_is_an_error() {
        let streams = vec![make_video(22, 720, MediaKind::Combined)];

        let policy = SelectionPolicy::Explicit {
            video_itag: 999,
            audio_itag: None,
        };
        let err = Selector::select(&streams, &policy).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStream(999)));
    }

    #[test]
    fn test_explicit_rejects_video_itag_as_audio() {
        let streams = vec![
            make_video(137, 1080, MediaKind::VideoOnly),
            make_video(135, 480, MediaKind::VideoOnly),
        ];

        let policy = SelectionPolicy::Explicit {
            video_itag: 137,
            audio_itag: Some(135),
        };
        let err = Selector::select(&streams, &policy).unwrap_err();
        assert!(matches!(err, PipelineError::MissingTrack(TrackKind::Audio)));
    }

    #[test]
    fn test_best_on_empty_catalog() {
        let err = Selector::select(&[], &SelectionPolicy::Best).unwrap_err();
        assert!(matches!(err, PipelineError::MissingTrack(TrackKind::Video)));
    }

    // Catalog from the classic three-stream shape: adaptive 1080p video,
    // progressive 720p, 160kbps audio. Best must pair 1 + 3 and merge.
    #[test]
    fn test_split_scenario_picks_adaptive_pair() {
        let streams = vec![
            make_video(1, 1080, MediaKind::VideoOnly),
            make_video(2, 720, MediaKind::Combined),
            make_audio(3, 160.0),
        ];

        let selection = Selector::select(&streams, &SelectionPolicy::Best).unwrap();
        assert!(selection.requires_merge());
        match selection {
            Selection::Split { video, audio } => {
                assert_eq!(video.itag, 1);
                assert_eq!(audio.itag, 3);
            }
            _ => unreachable!(),
        }
    }
}
