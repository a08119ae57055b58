//! Data model shared by the extractor adapter, the normalizer and the API.
//!
//! Two families of structs live here. The `Raw*` types mirror the subset of
//! yt-dlp's `--dump-single-json` payload we actually read; every field is
//! optional because different sites populate wildly different subsets. The
//! other types are what the API hands back to clients, with serde renames that
//! keep the JSON shape stable for the existing frontend.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Full `yt-dlp --dump-single-json` payload, trimmed to the fields the API
/// exposes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Seconds, kept as parsed: whole numbers stay integers on the way out
    /// and fractional durations keep their fraction.
    #[serde(default)]
    pub duration: Option<Number>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

/// One entry of the `formats` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub format_note: Option<String>,
    /// Either `"1920x1080"`, `"1080p"`, `"audio only"` or missing entirely.
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub filesize_approx: Option<f64>,
}

impl RawFormat {
    /// yt-dlp marks missing streams with the literal codec `"none"`. An absent
    /// codec field means "unknown", which we treat as present.
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }
}

/// Metadata returned by `POST /api/video-info`.
///
/// Optional fields serialize as `null` instead of being skipped so clients can
/// rely on every key being present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "duration")]
    pub duration_seconds: Option<Number>,
    pub uploader: Option<String>,
    pub view_count: Option<u64>,
    pub formats: Vec<RenditionInfo>,
}

/// A single downloadable rendition after deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionInfo {
    pub format_id: String,
    #[serde(rename = "quality")]
    pub quality_label: String,
    pub resolution: String,
    #[serde(rename = "ext")]
    pub container_ext: String,
    #[serde(rename = "filesize")]
    pub filesize_bytes: u64,
    pub has_audio: bool,
}
