// External tool discovery - extraction tool, Python, encoder

use serde::{Deserialize, Serialize};
use std::process::Command;

/// Environment override for the Python interpreter (e.g. a venv).
pub const PYTHON_ENV: &str = "TUBEFETCH_PYTHON";
/// Environment override for the encoder executable.
pub const FFMPEG_ENV: &str = "TUBEFETCH_FFMPEG";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolKind {
    YtDlp,
    Python,
    Ffmpeg,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "yt-dlp",
            ToolKind::Python => "python3",
            ToolKind::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolKind::Python => "--version",
            ToolKind::YtDlp => "--version",
            ToolKind::Ffmpeg => "-version",
        }
    }

    fn env_override(&self) -> Option<&'static str> {
        match self {
            ToolKind::Python => Some(PYTHON_ENV),
            ToolKind::Ffmpeg => Some(FFMPEG_ENV),
            ToolKind::YtDlp => None,
        }
    }
}

/// Discovery result for one tool, suitable for a status listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub kind: ToolKind,
    pub path: Option<String>,
    pub version: Option<String>,
    pub is_available: bool,
}

/// Locate a tool binary: env override first, then common install paths,
/// then PATH via `which`. Falls back to the bare name so a later spawn
/// still produces a proper not-found error.
pub fn find_tool(kind: ToolKind) -> String {
    if let Some(var) = kind.env_override() {
        if let Ok(custom) = std::env::var(var) {
            if !custom.is_empty() {
                return custom;
            }
        }
    }

    let name = kind.as_str();
    let common_paths = [
        format!("/opt/homebrew/bin/{}", name),
        format!("/usr/local/bin/{}", name),
        format!("/usr/bin/{}", name),
    ];

    for path in common_paths {
        if std::path::Path::new(&path).exists() {
            return path;
        }
    }

    if let Ok(output) = Command::new("which").arg(name).output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                return path;
            }
        }
    }

    name.to_string()
}

/// Probe one tool for presence and version.
pub fn tool_info(kind: ToolKind) -> ToolInfo {
    let path = find_tool(kind);
    let version = match Command::new(&path).arg(kind.version_arg()).output() {
        Ok(output) if output.status.success() => {
            let out = String::from_utf8_lossy(&output.stdout);
            out.lines().next().map(|l| l.trim().to_string())
        }
        _ => None,
    };

    ToolInfo {
        name: kind.as_str().to_string(),
        kind,
        is_available: version.is_some(),
        path: version.is_some().then_some(path),
        version,
    }
}

/// Status of every external tool the pipeline can use.
pub fn all_tools() -> Vec<ToolInfo> {
    vec![
        tool_info(ToolKind::YtDlp),
        tool_info(ToolKind::Python),
        tool_info(ToolKind::Ffmpeg),
    ]
}
