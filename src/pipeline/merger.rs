// Merger - muxes separate video and audio files with the external encoder
//
// The video track is copied unmodified; audio is re-encoded to AAC for broad
// player compatibility. The call blocks until the encoder exits. Its stderr
// is drained line-by-line while waiting so a caller can show live output,
// but there is no background execution: merge() does not return early.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::errors::PipelineError;
use super::tools::{find_tool, ToolKind};

/// Caller-supplied sink for encoder output lines.
pub type LineSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// How many trailing diagnostic lines to keep on failure.
const STDERR_TAIL: usize = 40;

pub struct Merger {
    ffmpeg_path: PathBuf,
}

impl Merger {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: PathBuf::from(find_tool(ToolKind::Ffmpeg)),
        }
    }

    /// Use a specific encoder executable instead of the discovered one.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: path.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        std::process::Command::new(&self.ffmpeg_path)
            .arg("-version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Mux `video` and `audio` into `output`, overwriting it if present.
    pub async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        mut lines: Option<LineSink<'_>>,
    ) -> Result<(), PipelineError> {
        tracing::info!(
            encoder = %self.ffmpeg_path.display(),
            output = %output.display(),
            "merging video and audio"
        );

        let mut child = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c:v", "copy", "-c:a", "aac", "-strict", "experimental", "-y"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PipelineError::EncoderNotFound(
                    self.ffmpeg_path.display().to_string(),
                ),
                _ => PipelineError::Storage(e),
            })?;

        // Drain stderr while the encoder runs; ffmpeg writes all its
        // progress and diagnostics there.
        let stderr = child.stderr.take().ok_or_else(|| {
            PipelineError::Storage(std::io::Error::other("failed to capture encoder stderr"))
        })?;

        let mut captured: Vec<String> = Vec::new();
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if let Some(sink) = lines.as_mut() {
                sink(&line);
            }
            captured.push(line);
            if captured.len() > STDERR_TAIL {
                captured.remove(0);
            }
        }

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }

        Err(PipelineError::MergeFailed {
            status: status.code().unwrap_or(-1),
            stderr: captured.join("\n"),
        })
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_encoder_reports_not_found() {
        let merger = Merger::with_path("/nonexistent/bin/encoder");
        assert!(!merger.is_available());

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v.mp4");
        let audio = dir.path().join("a.m4a");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(&audio, b"a").unwrap();

        let err = merger
            .merge(&video, &audio, &dir.path().join("out.mp4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EncoderNotFound(_)));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_merge_failure() {
        // `sh` ignores the encoder argument vector and exits 1, standing in
        // for an encoder that rejects its inputs.
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-encoder");
        std::fs::write(&fake, "#!/bin/sh\necho 'boom: bad input' >&2\nexit 1\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let merger = Merger::with_path(&fake);
        let video = dir.path().join("v.mp4");
        let audio = dir.path().join("a.m4a");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(&audio, b"a").unwrap();

        let mut seen = Vec::new();
        let mut sink = |line: &str| seen.push(line.to_string());
        let err = merger
            .merge(&video, &audio, &dir.path().join("out.mp4"), Some(&mut sink))
            .await
            .unwrap_err();

        match err {
            PipelineError::MergeFailed { status, stderr } => {
                assert_eq!(status, 1);
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(seen.iter().any(|l| l.contains("boom")));
    }
}
