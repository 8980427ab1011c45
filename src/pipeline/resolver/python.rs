// Python backend - probes via `python3 -m yt_dlp`
//
// Advantages:
// - Better at surviving provider bot detection
// - Easy to pin/upgrade through pip
//
// Disadvantages:
// - Requires Python 3 with the yt_dlp module installed
// - Slightly slower to start than the native binary

use async_trait::async_trait;
use std::process::Command as StdCommand;

use super::traits::{InfoBackend, ProbeConfig, RawVideoInfo};
use super::{classify_tool_failure, is_youtube_url};
use crate::pipeline::errors::PipelineError;
use crate::pipeline::tools::{find_tool, ToolKind};
use crate::pipeline::utils::run_output_with_timeout;

/// Metadata backend running the yt_dlp Python module.
pub struct PythonBackend {
    python_cmd: String,
}

impl PythonBackend {
    pub fn new() -> Self {
        Self {
            python_cmd: find_tool(ToolKind::Python),
        }
    }

    /// Check if the yt_dlp module is importable
    fn has_module(&self) -> bool {
        match StdCommand::new(&self.python_cmd)
            .args(["-c", "import yt_dlp"])
            .output()
        {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }

    fn build_args(&self, url: &str, config: &ProbeConfig) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            "yt_dlp".to_string(),
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            config.timeout_seconds.to_string(),
            "--retries".to_string(),
            "2".to_string(),
        ];

        if is_youtube_url(url) {
            let client = config.player_client.as_deref().unwrap_or("web");
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={}", client));
        }

        if let Some(proxy) = &config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }
}

impl Default for PythonBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InfoBackend for PythonBackend {
    fn name(&self) -> &'static str {
        "python-yt-dlp"
    }

    fn is_available(&self) -> bool {
        self.has_module()
    }

    async fn probe(
        &self,
        url: &str,
        config: &ProbeConfig,
    ) -> Result<RawVideoInfo, PipelineError> {
        if !self.is_available() {
            return Err(PipelineError::ToolNotFound(
                "Python yt_dlp module not installed".to_string(),
            ));
        }

        let args = self.build_args(url, config);
        tracing::debug!(backend = self.name(), "running {} {}", self.python_cmd, args.join(" "));

        // Subprocess gets a little slack past the socket timeout
        let output = run_output_with_timeout(
            &self.python_cmd,
            args,
            config.timeout_seconds as u64 + 5,
        )
        .await
        .map_err(classify_tool_failure)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_tool_failure(stderr.to_string()));
        }

        RawVideoInfo::from_json(&output.stdout)
    }
}
