// Interactive downloader: paste a URL, pick a quality, get one mp4.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use tubefetch::pipeline::{
    tools, DownloadProgress, Pipeline, PipelineConfig, ProbeMode, SelectionPolicy, VideoDetails,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Auto,
    Python,
    Cli,
}

impl From<ModeArg> for ProbeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => ProbeMode::Auto,
            ModeArg::Python => ProbeMode::Python,
            ModeArg::Cli => ProbeMode::Cli,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "fetch", about = "Download a video in your preferred quality")]
struct Args {
    /// Video URL; prompted for when omitted
    url: Option<String>,

    /// Skip the quality menu and take the best video + audio
    #[arg(long)]
    best: bool,

    /// Skip the quality menu and download this exact stream
    #[arg(long)]
    itag: Option<u32>,

    /// Audio stream to pair with --itag when it is video-only
    #[arg(long)]
    audio_itag: Option<u32>,

    /// Directory the finished file is written to
    #[arg(long, short, default_value = ".")]
    output: PathBuf,

    /// Write to the user's downloads directory instead of --output
    #[arg(long)]
    downloads: bool,

    /// Keep temp artifacts on disk after the request (for inspection)
    #[arg(long)]
    keep_temp: bool,

    /// SOCKS5/HTTP proxy URL
    #[arg(long)]
    proxy: Option<String>,

    /// Metadata extraction mode
    #[arg(long, value_enum, default_value = "auto")]
    mode: ModeArg,

    /// Socket timeout in seconds for metadata probes
    #[arg(long, default_value = "30")]
    timeout: u32,

    /// Print external tool status and exit
    #[arg(long)]
    tools: bool,

    /// Show encoder output and debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<()> {
    if args.tools {
        print_tools();
        return Ok(());
    }

    let url = match &args.url {
        Some(url) => url.clone(),
        None => prompt("Video URL: ")?,
    };
    if url.is_empty() {
        anyhow::bail!("no URL provided");
    }

    let config = PipelineConfig::default()
        .with_mode(args.mode.into())
        .with_proxy(args.proxy.clone())
        .with_timeout(args.timeout)
        .with_keep_artifacts(args.keep_temp);
    let pipeline = Pipeline::new(config)?;

    println!("Fetching video details...");
    let details = pipeline.probe(&url).await?;
    println!("Title: {}", details.title);
    println!("Uploader: {} | Duration: {}", details.uploader, details.duration_display());

    let policy = pick_policy(&args, &details)?;

    let mut last_line = String::new();
    let mut progress = |p: DownloadProgress| {
        let line = format!("{:>3.0}% {}", p.percent, p.status);
        if line != last_line {
            println!("  {}", line);
            last_line = line;
        }
    };

    let verbose = args.verbose;
    let mut merge_log = move |line: &str| {
        if verbose {
            eprintln!("  [encoder] {}", line);
        }
    };

    println!("Processing... the merge step can take a while for long videos.");
    let delivered = pipeline
        .download_resolved(&details, &policy, Some(&mut progress), Some(&mut merge_log))
        .await?;

    let out_dir = if args.downloads {
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    } else {
        args.output.clone()
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let dest = out_dir.join(&delivered.file_name);
    std::fs::write(&dest, &delivered.bytes)
        .with_context(|| format!("writing {}", dest.display()))?;

    println!("Done: {}", dest.display());
    Ok(())
}

/// Decide what to download: flags first, interactive menu otherwise.
fn pick_policy(args: &Args, details: &VideoDetails) -> Result<SelectionPolicy> {
    if let Some(itag) = args.itag {
        return Ok(SelectionPolicy::Explicit {
            video_itag: itag,
            audio_itag: args.audio_itag,
        });
    }
    if args.best {
        return Ok(SelectionPolicy::Best);
    }

    if details.streams.is_empty() {
        anyhow::bail!("no downloadable streams found for this video");
    }

    println!("\nAvailable qualities:");
    println!("  0) best available (video + audio)");
    for (i, s) in details.streams.iter().enumerate() {
        let kind = match s.kind {
            tubefetch::pipeline::MediaKind::Combined => "video + audio",
            tubefetch::pipeline::MediaKind::VideoOnly => "video only",
            tubefetch::pipeline::MediaKind::AudioOnly => "audio only",
        };
        let size = s
            .size_mb()
            .map(|mb| format!("{:.2} MB", mb))
            .unwrap_or_else(|| "size unknown".to_string());
        println!("  {}) {} ({}) - {}", i + 1, s.quality_label(), kind, size);
    }

    let answer = prompt("Select a quality [0]: ")?;
    if answer.is_empty() || answer == "0" {
        return Ok(SelectionPolicy::Best);
    }

    let index: usize = answer.parse().context("selection must be a number")?;
    let stream = index
        .checked_sub(1)
        .and_then(|i| details.streams.get(i))
        .context("selection out of range")?;

    Ok(SelectionPolicy::Explicit {
        video_itag: stream.itag,
        audio_itag: None,
    })
}

fn print_tools() {
    for info in tools::all_tools() {
        let status = match (&info.version, &info.path) {
            (Some(version), Some(path)) => format!("{} ({})", version, path),
            _ => "not found".to_string(),
        };
        println!("{:<10} {}", info.name, status);
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
