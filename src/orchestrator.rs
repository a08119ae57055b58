//! Download flow: try the requested rendition, fall back to the best
//! available one when the extractor says that rendition does not exist.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::ScratchDir;
use crate::error::{DownloadError, ExtractError};
use crate::extractor::{Extractor, FetchReport};

/// Generic selector used for the single fallback attempt.
pub const BEST_AVAILABLE: &str = "best";
const DEFAULT_TITLE: &str = "video";
const DEFAULT_EXT: &str = "mp4";

/// A finished download sitting in the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedVideo {
    pub path: PathBuf,
    pub title: String,
    pub ext: String,
}

/// Downloads `url` in `format_id`, retrying once with [`BEST_AVAILABLE`] when
/// the extractor classifies the failure as an unavailable format.
///
/// Every other failure is returned untouched. A failed primary attempt may
/// leave a partial file behind; the janitor takes care of it.
pub fn fetch_best_effort(
    extractor: &dyn Extractor,
    scratch: &ScratchDir,
    url: &str,
    format_id: &str,
) -> Result<FetchedVideo, DownloadError> {
    let template = scratch.unique_template();
    info!(url, format_id, "starting download");

    let report = match extractor.fetch(url, format_id, &template) {
        Ok(report) => report,
        Err(ExtractError::FormatUnavailable(message)) => {
            warn!(url, format_id, "format unavailable, retrying with best: {message}");
            extractor
                .fetch(url, BEST_AVAILABLE, &template)
                .inspect_err(|err| error!(url, "fallback download failed: {err}"))?
        }
        Err(err) => {
            error!(url, format_id, "download failed: {err}");
            return Err(err.into());
        }
    };

    let fetched = verify(report, &template)?;
    info!(url, path = %fetched.path.display(), "download finished");
    Ok(fetched)
}

fn verify(report: FetchReport, template: &Path) -> Result<FetchedVideo, DownloadError> {
    let path = report
        .path
        .ok_or_else(|| DownloadError::Incomplete(template.to_path_buf()))?;
    if !path.is_file() {
        return Err(DownloadError::Incomplete(path));
    }

    let ext = report
        .ext
        .filter(|ext| !ext.is_empty())
        .or_else(|| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_EXT.to_string());
    let title = report
        .title
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    Ok(FetchedVideo { path, title, ext })
}
