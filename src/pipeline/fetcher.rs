// Fetcher - copies one stream's remote bytes to a local file
//
// Progress is advisory only: the callback fires when the integer percentage
// crosses a 5-point boundary, never more often, and a failed callback cannot
// exist (it returns nothing) so it cannot alter control flow.

use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::errors::PipelineError;
use super::models::{DownloadProgress, StreamDescriptor};

/// Granularity of progress reports, in whole percentage points.
const PROGRESS_STEP: u32 = 5;

/// Caller-supplied progress callback.
pub type ProgressSink<'a> = &'a mut (dyn FnMut(DownloadProgress) + Send);

pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build a fetcher, optionally routed through a proxy.
    pub fn new(proxy: Option<&str>) -> Result<Self, PipelineError> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(15));

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| PipelineError::Fetch(format!("invalid proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| PipelineError::Fetch(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Stream a descriptor's bytes into `dest`.
    ///
    /// `status` labels the progress reports ("downloading video"); `progress`
    /// may be None when nobody is watching.
    pub async fn fetch<'a, 'b>(
        &self,
        stream: &StreamDescriptor,
        dest: &Path,
        status: &str,
        mut progress: Option<&'a mut (dyn FnMut(DownloadProgress) + Send + 'b)>,
    ) -> Result<(), PipelineError> {
        let response = self
            .client
            .get(&stream.url)
            .send()
            .await
            .map_err(|e| PipelineError::Fetch(format!("request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| PipelineError::Fetch(format!("server rejected request: {}", e)))?;

        // Declared size first; the response header is the fallback estimate
        let total = stream
            .filesize
            .or(response.content_length())
            .filter(|t| *t > 0);

        let mut file = File::create(dest).await?;
        let mut body = response.bytes_stream();
        let mut received: u64 = 0;
        let mut last_bucket: Option<u32> = None;

        while let Some(chunk) = body.next().await {
            let data =
                chunk.map_err(|e| PipelineError::Fetch(format!("download interrupted: {}", e)))?;
            file.write_all(&data).await?;
            received += data.len() as u64;

            if let (Some(total), Some(sink)) = (total, progress.as_mut()) {
                let percent = (received as f64 / total as f64 * 100.0).min(100.0) as f32;
                let bucket = percent as u32 / PROGRESS_STEP;
                if last_bucket.map_or(true, |last| bucket > last) {
                    last_bucket = Some(bucket);
                    sink(DownloadProgress {
                        percent,
                        status: status.to_string(),
                    });
                }
            }
        }

        file.flush().await?;
        tracing::info!(bytes = received, dest = %dest.display(), "fetch complete");

        if let Some(sink) = progress.as_mut() {
            sink(DownloadProgress {
                percent: 100.0,
                status: format!("{} done", status),
            });
        }

        Ok(())
    }
}
