// Workflow - wires resolve, select, fetch, merge and delivery together
//
// One Pipeline serves many requests, but every request gets its own
// RequestContext and no state survives a request. Steps run strictly in
// sequence; the only branch is progressive-vs-adaptive, decided once by the
// selector.

use std::path::PathBuf;

use super::context::RequestContext;
use super::errors::PipelineError;
use super::fetcher::{Fetcher, ProgressSink};
use super::merger::{LineSink, Merger};
use super::models::{DeliveredVideo, Selection, SelectionPolicy, VideoDetails};
use super::resolver::{ProbeConfig, ProbeMode, Resolver};
use super::selector::Selector;
use super::utils::sanitize_filename;

/// Pipeline-wide settings shared by all requests.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: ProbeMode,
    pub proxy: Option<String>,
    pub timeout_seconds: u32,
    /// Parent of the per-request working directories
    pub temp_root: PathBuf,
    /// Leave temp artifacts on disk after a request (manual recovery)
    pub keep_artifacts: bool,
    /// Encoder executable override; discovered from the host when None
    pub encoder_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ProbeMode::Auto,
            proxy: None,
            timeout_seconds: 30,
            temp_root: std::env::temp_dir().join("tubefetch"),
            keep_artifacts: false,
            encoder_path: None,
        }
    }
}

impl PipelineConfig {
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

    pub fn with_temp_root(mut self, root: PathBuf) -> Self {
        self.temp_root = root;
        self
    }

    pub fn with_keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    pub fn with_encoder(mut self, path: PathBuf) -> Self {
        self.encoder_path = Some(path);
        self
    }

    fn probe_config(&self) -> ProbeConfig {
        ProbeConfig::default()
            .with_mode(self.mode)
            .with_proxy(self.proxy.clone())
            .with_timeout(self.timeout_seconds)
    }
}

pub struct Pipeline {
    resolver: Resolver,
    fetcher: Fetcher,
    merger: Merger,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let merger = match &config.encoder_path {
            Some(path) => Merger::with_path(path.clone()),
            None => Merger::new(),
        };
        Ok(Self {
            resolver: Resolver::new(),
            fetcher: Fetcher::new(config.proxy.as_deref())?,
            merger,
            config,
        })
    }

    /// Resolve a URL without downloading anything.
    pub async fn probe(&self, url: &str) -> Result<VideoDetails, PipelineError> {
        self.resolver.resolve(url, &self.config.probe_config()).await
    }

    /// Run the whole pipeline: resolve, select, fetch, merge if needed,
    /// and hand the finished bytes back. Temp artifacts are gone by the
    /// time this returns, on every path, unless keep-artifacts is set.
    pub async fn download(
        &self,
        url: &str,
        policy: &SelectionPolicy,
        mut progress: Option<ProgressSink<'_>>,
        mut merge_log: Option<LineSink<'_>>,
    ) -> Result<DeliveredVideo, PipelineError> {
        let details = self.probe(url).await?;
        self.download_resolved(&details, policy, progress.take(), merge_log.take())
            .await
    }

    /// Same as `download`, for callers that already hold the catalog.
    pub async fn download_resolved(
        &self,
        details: &VideoDetails,
        policy: &SelectionPolicy,
        mut progress: Option<ProgressSink<'_>>,
        mut merge_log: Option<LineSink<'_>>,
    ) -> Result<DeliveredVideo, PipelineError> {
        let selection = Selector::select(&details.streams, policy)?;

        let mut ctx = RequestContext::create(&self.config.temp_root)?
            .with_keep_artifacts(self.config.keep_artifacts);
        tracing::info!(
            request = ctx.token(),
            title = %details.title,
            merge = selection.requires_merge(),
            "starting download"
        );

        let final_path = match &selection {
            Selection::Combined(stream) => {
                let path = ctx.stage("video", &stream.container);
                self.fetcher
                    .fetch(stream, &path, "downloading video", progress.take())
                    .await?;
                path
            }
            Selection::Split { video, audio } => {
                let video_path = ctx.stage("video", &video.container);
                self.fetcher
                    .fetch(video, &video_path, "downloading video", progress.as_deref_mut())
                    .await?;

                let audio_path = ctx.stage("audio", &audio.container);
                self.fetcher
                    .fetch(audio, &audio_path, "downloading audio", progress.take())
                    .await?;

                let merged = ctx.stage("merged", "mp4");
                self.merger
                    .merge(&video_path, &audio_path, &merged, merge_log.take())
                    .await?;
                merged
            }
        };

        // Delivery: whole file into memory, then the disk copy goes away
        let bytes = tokio::fs::read(&final_path).await?;
        let ext = match &selection {
            Selection::Combined(stream) => stream.container.as_str(),
            Selection::Split { .. } => "mp4",
        };
        let file_name = format!(
            "{} - {}.{}",
            sanitize_filename(&details.title),
            selection.video_descriptor().quality_label(),
            ext
        );
        ctx.cleanup();

        tracing::info!(request = ctx.token(), bytes = bytes.len(), "request complete");
        Ok(DeliveredVideo { file_name, bytes })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::pipeline::errors::PipelineError;
    use crate::pipeline::models::{MediaKind, StreamDescriptor};
    use axum::{routing::get, Router};
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// Serve fixed video/audio bodies on an ephemeral local port.
    async fn spawn_stream_server() -> String {
        let app = Router::new()
            .route("/video", get(|| async { vec![1u8; 1000] }))
            .route("/audio", get(|| async { vec![2u8; 500] }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Stand-in encoder: writes a marker payload to its output path (the
    /// last argument) so a merge is observable without a real ffmpeg.
    fn write_fake_encoder(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-encoder");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    const MERGE_OK: &str = r#"out=""; for a in "$@"; do out="$a"; done; printf merged > "$out""#;
    const MERGE_FAIL: &str = r#"echo "conversion failed" >&2; exit 1"#;

    fn make_details(base: &str) -> VideoDetails {
        let video = StreamDescriptor {
            itag: 1,
            kind: MediaKind::VideoOnly,
            container: "mp4".to_string(),
            height: Some(1080),
            abr_kbps: None,
            filesize: Some(1000),
            url: format!("{}/video", base),
        };
        let combined = StreamDescriptor {
            itag: 2,
            kind: MediaKind::Combined,
            container: "mp4".to_string(),
            height: Some(720),
            abr_kbps: None,
            filesize: Some(1000),
            url: format!("{}/video", base),
        };
        let audio = StreamDescriptor {
            itag: 3,
            kind: MediaKind::AudioOnly,
            container: "m4a".to_string(),
            height: None,
            abr_kbps: Some(160.0),
            filesize: Some(500),
            url: format!("{}/audio", base),
        };
        VideoDetails {
            id: "vid".to_string(),
            title: "Some: Test/Video".to_string(),
            uploader: "someone".to_string(),
            duration_seconds: 60,
            thumbnail: String::new(),
            streams: vec![video, combined, audio],
        }
    }

    fn pipeline_with(temp_root: &Path, encoder: PathBuf) -> Pipeline {
        let config = PipelineConfig::default()
            .with_temp_root(temp_root.to_path_buf())
            .with_encoder(encoder);
        Pipeline::new(config).unwrap()
    }

    fn leftover_entries(temp_root: &Path) -> usize {
        std::fs::read_dir(temp_root).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_best_split_request_fetches_both_and_merges() {
        let base = spawn_stream_server().await;
        let tmp = tempfile::tempdir().unwrap();
        let encoder = write_fake_encoder(tmp.path(), MERGE_OK);
        let pipeline = pipeline_with(tmp.path(), encoder);

        let details = make_details(&base);
        let mut reports = Vec::new();
        let mut progress = |p: crate::pipeline::models::DownloadProgress| reports.push(p);

        let delivered = pipeline
            .download_resolved(&details, &SelectionPolicy::Best, Some(&mut progress), None)
            .await
            .unwrap();

        // The adaptive 1080p + 160kbps pair won, so the encoder ran
        assert_eq!(delivered.bytes, b"merged");
        assert_eq!(delivered.file_name, "Some TestVideo - 1080p.mp4");

        // Both tracks reported completion, percents never went backwards
        assert!(reports.iter().any(|p| p.status.contains("video")));
        assert!(reports.iter().any(|p| p.status.contains("audio")));

        // Nothing left behind (the fake encoder binary is not an artifact)
        assert_eq!(leftover_entries(tmp.path()), 1);
    }

    #[tokio::test]
    async fn test_combined_selection_never_runs_encoder() {
        let base = spawn_stream_server().await;
        let tmp = tempfile::tempdir().unwrap();
        // An encoder that would blow up if invoked
        let encoder = write_fake_encoder(tmp.path(), "exit 99");
        let pipeline = pipeline_with(tmp.path(), encoder);

        let policy = SelectionPolicy::Explicit {
            video_itag: 2,
            audio_itag: None,
        };
        let delivered = pipeline
            .download_resolved(&make_details(&base), &policy, None, None)
            .await
            .unwrap();

        assert_eq!(delivered.bytes, vec![1u8; 1000]);
        assert_eq!(leftover_entries(tmp.path()), 1);
    }

    #[tokio::test]
    async fn test_missing_encoder_fails_before_delivery() {
        let base = spawn_stream_server().await;
        let tmp = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default()
            .with_temp_root(tmp.path().to_path_buf())
            .with_encoder(PathBuf::from("/nonexistent/bin/encoder"));
        let pipeline = Pipeline::new(config).unwrap();

        let err = pipeline
            .download_resolved(&make_details(&base), &SelectionPolicy::Best, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::EncoderNotFound(_)));
        // Delivery never ran and the downloaded halves are gone
        assert_eq!(leftover_entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_merge_still_cleans_artifacts() {
        let base = spawn_stream_server().await;
        let tmp = tempfile::tempdir().unwrap();
        let encoder = write_fake_encoder(tmp.path(), MERGE_FAIL);
        let pipeline = pipeline_with(tmp.path(), encoder);

        let err = pipeline
            .download_resolved(&make_details(&base), &SelectionPolicy::Best, None, None)
            .await
            .unwrap_err();

        match err {
            PipelineError::MergeFailed { status, stderr } => {
                assert_eq!(status, 1);
                assert!(stderr.contains("conversion failed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(leftover_entries(tmp.path()), 1);
    }
}
