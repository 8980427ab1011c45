// Request context - per-request temp storage with unconditional cleanup
//
// Every request gets its own uniquely named working directory so two
// concurrent requests can never collide on artifact paths. Every artifact
// staged through the context is deleted when the context is cleaned up or
// dropped, success or failure alike; keeping artifacts around for manual
// inspection is an explicit opt-in.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::errors::PipelineError;

pub struct RequestContext {
    token: String,
    work_dir: PathBuf,
    artifacts: Vec<PathBuf>,
    keep_artifacts: bool,
    cleaned: bool,
}

impl RequestContext {
    /// Create a fresh working directory under `base` (created on demand).
    pub fn create(base: &Path) -> Result<Self, PipelineError> {
        let token = Uuid::new_v4().simple().to_string();
        let work_dir = base.join(format!("request-{}", token));
        std::fs::create_dir_all(&work_dir)?;

        Ok(Self {
            token,
            work_dir,
            artifacts: Vec::new(),
            keep_artifacts: false,
            cleaned: false,
        })
    }

    /// Opt in to leaving artifacts on disk after the request.
    pub fn with_keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Reserve a path for one artifact and register it for cleanup.
    ///
    /// The name carries both the label and the request token, so even a
    /// caller that escapes the working directory gets collision-free names.
    pub fn stage(&mut self, label: &str, ext: &str) -> PathBuf {
        let path = self
            .work_dir
            .join(format!("{}-{}.{}", label, self.token, ext));
        self.artifacts.push(path.clone());
        path
    }

    /// How many artifacts are currently registered.
    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// Delete every staged artifact and the working directory.
    ///
    /// Idempotent: already-removed files are fine, and calling this twice is
    /// fine. Honors the keep-artifacts opt-in.
    pub fn cleanup(&mut self) {
        if self.cleaned || self.keep_artifacts {
            if self.keep_artifacts && !self.cleaned {
                tracing::info!(dir = %self.work_dir.display(), "keeping artifacts as requested");
                self.cleaned = true;
            }
            return;
        }

        for path in &self.artifacts {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), "failed to remove artifact: {}", e)
                }
            }
        }

        // Only removed when empty; a warning would be noise if the caller
        // put extra files there on purpose.
        let _ = std::fs::remove_dir(&self.work_dir);
        self.cleaned = true;
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        let base = tempfile::tempdir().unwrap();
        let a = RequestContext::create(base.path()).unwrap();
        let b = RequestContext::create(base.path()).unwrap();
        assert_ne!(a.token(), b.token());
        assert_ne!(a.work_dir(), b.work_dir());
    }

    #[test]
    fn test_staged_paths_embed_label_and_token() {
        let base = tempfile::tempdir().unwrap();
        let mut ctx = RequestContext::create(base.path()).unwrap();
        let video = ctx.stage("video", "mp4");
        let audio = ctx.stage("audio", "m4a");

        assert_ne!(video, audio);
        let name = video.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("video-"));
        assert!(name.contains(ctx.token()));
        assert!(name.ends_with(".mp4"));
    }

    #[test]
    fn test_cleanup_removes_everything() {
        let base = tempfile::tempdir().unwrap();
        let mut ctx = RequestContext::create(base.path()).unwrap();
        let video = ctx.stage("video", "mp4");
        let audio = ctx.stage("audio", "m4a");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(&audio, b"a").unwrap();
        let dir = ctx.work_dir().to_path_buf();

        ctx.cleanup();
        assert!(!video.exists());
        assert!(!audio.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_cleanup_is_idempotent_and_tolerates_missing_files() {
        let base = tempfile::tempdir().unwrap();
        let mut ctx = RequestContext::create(base.path()).unwrap();
        let staged = ctx.stage("video", "mp4");
        // Never written: the fetch "failed" before creating it

        ctx.cleanup();
        ctx.cleanup();
        assert!(!staged.exists());
    }

    #[test]
    fn test_drop_cleans_up() {
        let base = tempfile::tempdir().unwrap();
        let staged;
        let dir;
        {
            let mut ctx = RequestContext::create(base.path()).unwrap();
            staged = ctx.stage("merged", "mp4");
            std::fs::write(&staged, b"m").unwrap();
            dir = ctx.work_dir().to_path_buf();
        }
        assert!(!staged.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_keep_artifacts_opt_in() {
        let base = tempfile::tempdir().unwrap();
        let mut ctx = RequestContext::create(base.path())
            .unwrap()
            .with_keep_artifacts(true);
        let staged = ctx.stage("video", "mp4");
        std::fs::write(&staged, b"v").unwrap();

        ctx.cleanup();
        assert!(staged.exists());
    }
}
