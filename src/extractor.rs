//! Narrow wrapper around the external video extractor.
//!
//! The rest of the crate only sees the [`Extractor`] trait. The production
//! implementation shells out to `yt-dlp`, reads its JSON output and translates
//! its free-text diagnostics into [`ExtractError`] variants, so string
//! matching on extractor messages happens in exactly one place.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde::Deserialize;
use tracing::debug;

use crate::error::ExtractError;
use crate::metadata::RawVideoInfo;

pub const DEFAULT_YTDLP_BIN: &str = "yt-dlp";

/// Diagnostic yt-dlp prints when a `-f` selector matches nothing.
const FORMAT_UNAVAILABLE_MARKER: &str = "Requested format is not available";

/// Player clients that keep working when the default web client gets
/// throttled.
const YOUTUBE_EXTRACTOR_ARGS: &str = "youtube:player_client=android,web;player_skip=webpage,configs";

/// Printed once the file has reached its final name, one JSON object per line.
const FETCH_PRINT_TEMPLATE: &str = "after_move:%(.{filepath,title,ext})j";

/// Two-operation capability the service needs from an extraction library.
///
/// Both calls block for as long as the extractor runs; async callers are
/// expected to wrap them in `spawn_blocking`.
pub trait Extractor: Send + Sync {
    /// Reads metadata without downloading anything.
    fn probe(&self, url: &str) -> Result<RawVideoInfo, ExtractError>;

    /// Downloads `url` using `format_selector`, writing to `output_template`
    /// (a path that may contain `%(ext)s`).
    fn fetch(
        &self,
        url: &str,
        format_selector: &str,
        output_template: &Path,
    ) -> Result<FetchReport, ExtractError>;
}

/// What the extractor reports after a successful download.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FetchReport {
    #[serde(rename = "filepath")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
}

/// [`Extractor`] backed by the `yt-dlp` command-line tool.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new(DEFAULT_YTDLP_BIN)
    }
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `yt-dlp --version`. Used at start-up to warn early when the
    /// binary is missing.
    pub fn version(&self) -> Result<String, ExtractError> {
        let output = self.run(vec!["--version".into()])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, args: Vec<OsString>) -> Result<Output, ExtractError> {
        debug!(program = %self.program.display(), ?args, "running extractor");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(ExtractError::Spawn)?;

        if !output.status.success() {
            return Err(classify_failure(&output.stderr));
        }
        Ok(output)
    }
}

impl Extractor for YtDlp {
    fn probe(&self, url: &str) -> Result<RawVideoInfo, ExtractError> {
        let output = self.run(probe_args(url))?;
        serde_json::from_slice(&output.stdout)
            .map_err(|err| ExtractError::InvalidOutput(format!("metadata JSON: {err}")))
    }

    fn fetch(
        &self,
        url: &str,
        format_selector: &str,
        output_template: &Path,
    ) -> Result<FetchReport, ExtractError> {
        let output = self.run(fetch_args(url, format_selector, output_template))?;
        parse_fetch_report(&output.stdout)
    }
}

fn common_args() -> Vec<OsString> {
    vec![
        "--no-playlist".into(),
        "--no-warnings".into(),
        "--extractor-args".into(),
        YOUTUBE_EXTRACTOR_ARGS.into(),
    ]
}

fn probe_args(url: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--dump-single-json".into(), "--skip-download".into()];
    args.extend(common_args());
    args.push(url.into());
    args
}

fn fetch_args(url: &str, format_selector: &str, output_template: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--format".into(),
        format_selector.into(),
        "--output".into(),
        output_template.as_os_str().to_owned(),
        "--merge-output-format".into(),
        "mp4".into(),
        // The janitor ages scratch files by mtime, so keep the local write time.
        "--no-mtime".into(),
        "--print".into(),
        FETCH_PRINT_TEMPLATE.into(),
    ];
    args.extend(common_args());
    args.push(url.into());
    args
}

/// Maps a failed run onto the error taxonomy using the last stderr line,
/// which is where yt-dlp puts its `ERROR:` summary.
fn classify_failure(stderr: &[u8]) -> ExtractError {
    let stderr = String::from_utf8_lossy(stderr);
    let message = last_line(&stderr)
        .unwrap_or("extractor exited without a diagnostic")
        .to_string();

    if stderr.contains(FORMAT_UNAVAILABLE_MARKER) {
        ExtractError::FormatUnavailable(message)
    } else {
        ExtractError::Rejected(message)
    }
}

fn parse_fetch_report(stdout: &[u8]) -> Result<FetchReport, ExtractError> {
    let stdout = String::from_utf8_lossy(stdout);
    let line = last_line(&stdout)
        .ok_or_else(|| ExtractError::InvalidOutput("no file reported after download".into()))?;
    let report: FetchReport = serde_json::from_str(line)
        .map_err(|err| ExtractError::InvalidOutput(format!("download report: {err}")))?;
    if report.path.is_none() {
        return Err(ExtractError::InvalidOutput(
            "download report is missing the file path".into(),
        ));
    }
    Ok(report)
}

fn last_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
}
