// CLI backend - probes via the native `yt-dlp` binary
//
// Advantages:
// - Faster startup, no Python dependency
// - Easier for CI and packaged installs
//
// Disadvantages:
// - More likely to trip provider bot detection
// - May need different player clients per site

use async_trait::async_trait;
use std::process::Command as StdCommand;

use super::traits::{InfoBackend, ProbeConfig, RawVideoInfo};
use super::{classify_tool_failure, is_youtube_url};
use crate::pipeline::errors::PipelineError;
use crate::pipeline::tools::{find_tool, ToolKind};
use crate::pipeline::utils::run_output_with_timeout;

const PROBE_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Metadata backend running the yt-dlp binary.
pub struct CliBackend {
    ytdlp_path: String,
}

impl CliBackend {
    pub fn new() -> Self {
        Self {
            ytdlp_path: find_tool(ToolKind::YtDlp),
        }
    }

    fn has_binary(&self) -> bool {
        match StdCommand::new(&self.ytdlp_path).arg("--version").output() {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }

    fn build_args(&self, url: &str, config: &ProbeConfig, client: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            config.timeout_seconds.to_string(),
            "--retries".to_string(),
            "2".to_string(),
            "--user-agent".to_string(),
            PROBE_USER_AGENT.to_string(),
        ];

        if is_youtube_url(url) {
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

    /// Try the probe with each player client until one succeeds.
    async fn try_with_clients(
        &self,
        url: &str,
        config: &ProbeConfig,
        clients: &[&str],
    ) -> Result<RawVideoInfo, PipelineError> {
        let mut last_error = PipelineError::ToolNotFound("no clients to try".to_string());

        for &client in clients {
            let args = self.build_args(url, config, client);
            tracing::debug!(client, "running {} {}", self.ytdlp_path, args.join(" "));

            let output = run_output_with_timeout(
                &self.ytdlp_path,
                args,
                config.timeout_seconds as u64 + 5,
            )
            .await;

            match output {
                Ok(out) if out.status.success() => {
                    tracing::debug!(client, "probe succeeded");
                    return RawVideoInfo::from_json(&out.stdout);
                }
                Ok(out) => {
                    let stderr = String::from_utf8_lossy(&out.stderr);
                    tracing::debug!(client, "probe failed: {}", stderr.trim());
                    last_error = classify_tool_failure(stderr.to_string());
                }
                Err(e) => {
                    tracing::debug!(client, "probe error: {}", e);
                    last_error = classify_tool_failure(e);
                }
            }
        }

        Err(last_error)
    }
}

impl Default for CliBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InfoBackend for CliBackend {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    fn is_available(&self) -> bool {
        self.has_binary()
    }

    async fn probe(
        &self,
        url: &str,
        config: &ProbeConfig,
    ) -> Result<RawVideoInfo, PipelineError> {
        if !self.is_available() {
            return Err(PipelineError::ToolNotFound(
                "yt-dlp binary not found".to_string(),
            ));
        }

        // android is less likely to be blocked; web handles more edge cases
        let clients: Vec<&str> = if is_youtube_url(url) {
            match &config.player_client {
                Some(client) => vec![client.as_str()],
                None => vec!["android", "tv", "web"],
            }
        } else {
            vec!["web"]
        };

        self.try_with_clients(url, config, &clients).await
    }
}
