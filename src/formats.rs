//! Turns the extractor's raw format list into the short, ranked list shown to
//! users.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::metadata::{RawFormat, RawVideoInfo, RenditionInfo, VideoMetadata};

pub const MAX_RENDITIONS: usize = 10;
const UNKNOWN: &str = "unknown";
const DEFAULT_EXT: &str = "mp4";
const DEFAULT_TITLE: &str = "Unknown";

/// Builds the API payload for a probed video.
pub fn normalize_video(info: RawVideoInfo) -> VideoMetadata {
    let formats = normalize(&info.formats);
    VideoMetadata {
        title: info.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        thumbnail_url: info.thumbnail,
        duration_seconds: info.duration,
        uploader: info.uploader,
        view_count: info.view_count,
        formats,
    }
}

/// Drops audio-only entries, keeps the first entry per
/// `(resolution, quality)` pair, then ranks by pixel height.
///
/// The sort is stable, so renditions with equal height keep their input
/// order.
pub fn normalize(raw_formats: &[RawFormat]) -> Vec<RenditionInfo> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut renditions = Vec::new();

    for format in raw_formats.iter().filter(|format| format.has_video()) {
        let resolution = format
            .resolution
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string());
        let quality = format
            .format_note
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string());

        if !seen.insert((resolution.clone(), quality.clone())) {
            continue;
        }

        renditions.push(RenditionInfo {
            format_id: format.format_id.clone().unwrap_or_default(),
            quality_label: quality,
            resolution,
            container_ext: format
                .ext
                .clone()
                .unwrap_or_else(|| DEFAULT_EXT.to_string()),
            filesize_bytes: filesize_bytes(format),
            has_audio: format.has_audio(),
        });
    }

    renditions.sort_by_key(|rendition| {
        Reverse(extract_height(Some(rendition.resolution.as_str())))
    });
    renditions.truncate(MAX_RENDITIONS);
    renditions
}

/// Pixel height encoded in a resolution string.
///
/// Understands `"1920x1080"` (trailing number) and `"1080p"`. Everything
/// else ranks as `0`.
pub fn extract_height(resolution: Option<&str>) -> u32 {
    let Some(value) = resolution.map(str::trim).filter(|value| !value.is_empty()) else {
        return 0;
    };
    if value == UNKNOWN {
        return 0;
    }

    let digits = if value.contains('x') {
        value.rsplit('x').next().unwrap_or_default()
    } else {
        value.strip_suffix('p').unwrap_or(value)
    };

    digits.trim().parse().unwrap_or(0)
}

fn filesize_bytes(format: &RawFormat) -> u64 {
    format
        .filesize
        .or(format.filesize_approx)
        .filter(|size| size.is_finite() && *size > 0.0)
        .map(|size| size as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, resolution: Option<&str>, note: Option<&str>) -> RawFormat {
        RawFormat {
            format_id: Some(id.into()),
            format_note: note.map(Into::into),
            resolution: resolution.map(Into::into),
            ext: Some("mp4".into()),
            vcodec: Some("avc1".into()),
            acodec: Some("mp4a".into()),
            filesize: None,
            filesize_approx: None,
        }
    }

    #[test]
    fn extract_height_handles_known_shapes() {
        assert_eq!(extract_height(Some("1920x1080")), 1080);
        assert_eq!(extract_height(Some("720p")), 720);
        assert_eq!(extract_height(Some("unknown")), 0);
        assert_eq!(extract_height(None), 0);
        assert_eq!(extract_height(Some("audio only")), 0);
        assert_eq!(extract_height(Some("1080p60")), 0);
        assert_eq!(extract_height(Some("")), 0);
    }

    #[test]
    fn normalize_skips_audio_only_and_dedupes() {
        let mut audio = video("140", Some("audio only"), Some("medium"));
        audio.vcodec = Some("none".into());
        let formats = vec![
            video("137", Some("1920x1080"), Some("1080p")),
            audio,
            video("399", Some("1920x1080"), Some("1080p")),
            video("136", Some("1280x720"), Some("720p")),
        ];

        let result = normalize(&formats);
        let ids: Vec<_> = result.iter().map(|r| r.format_id.as_str()).collect();
        assert_eq!(ids, vec!["137", "136"]);
    }

    #[test]
    fn normalize_keys_missing_values_as_unknown() {
        let mut codecless = video("a", None, None);
        codecless.vcodec = None;
        let formats = vec![codecless, video("b", None, None), video("c", Some("unknown"), None)];

        let result = normalize(&formats);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].format_id, "a");
        assert_eq!(result[0].resolution, "unknown");
        assert_eq!(result[0].quality_label, "unknown");
    }

    #[test]
    fn normalize_ranks_by_height_and_keeps_ties_stable() {
        let formats = vec![
            video("low", Some("640x360"), Some("360p")),
            video("odd", Some("weird"), Some("x")),
            video("hd-a", Some("1280x720"), Some("720p")),
            video("hd-b", Some("720p"), Some("720p60")),
            video("fhd", Some("1080p"), Some("1080p")),
        ];

        let result = normalize(&formats);
        let ids: Vec<_> = result.iter().map(|r| r.format_id.as_str()).collect();
        assert_eq!(ids, vec!["fhd", "hd-a", "hd-b", "low", "odd"]);
    }

    #[test]
    fn normalize_truncates_to_top_ten() {
        let formats: Vec<_> = (1..=15)
            .map(|height| {
                video(
                    &format!("f{height}"),
                    Some(format!("{height}00p").as_str()),
                    Some(format!("q{height}").as_str()),
                )
            })
            .collect();

        let result = normalize(&formats);
        assert_eq!(result.len(), MAX_RENDITIONS);
        assert_eq!(result[0].format_id, "f15");
        assert_eq!(result[9].format_id, "f6");

        let mut keys = HashSet::new();
        for rendition in &result {
            assert!(keys.insert((rendition.resolution.clone(), rendition.quality_label.clone())));
        }
        let heights: Vec<_> = result
            .iter()
            .map(|r| extract_height(Some(r.resolution.as_str())))
            .collect();
        assert!(heights.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn filesize_prefers_exact_then_approx_then_zero() {
        let mut exact = video("a", Some("1080p"), Some("a"));
        exact.filesize = Some(2048.0);
        exact.filesize_approx = Some(4096.0);
        let mut approx = video("b", Some("720p"), Some("b"));
        approx.filesize_approx = Some(4096.7);
        let missing = video("c", Some("480p"), Some("c"));

        let result = normalize(&[exact, approx, missing]);
        assert_eq!(result[0].filesize_bytes, 2048);
        assert_eq!(result[1].filesize_bytes, 4096);
        assert_eq!(result[2].filesize_bytes, 0);
    }

    #[test]
    fn normalize_video_fills_defaults() {
        let metadata = normalize_video(RawVideoInfo::default());
        assert_eq!(metadata.title, "Unknown");
        assert!(metadata.thumbnail_url.is_none());
        assert!(metadata.formats.is_empty());

        let mut audio_only = video("140", None, None);
        audio_only.vcodec = Some("none".into());
        audio_only.ext = None;
        let mut muxed = video("18", Some("640x360"), Some("360p"));
        muxed.ext = None;
        muxed.acodec = Some("none".into());
        let metadata = normalize_video(RawVideoInfo {
            title: Some("Clip".into()),
            uploader: Some("Someone".into()),
            view_count: Some(42),
            formats: vec![audio_only, muxed],
            ..RawVideoInfo::default()
        });
        assert_eq!(metadata.title, "Clip");
        assert_eq!(metadata.view_count, Some(42));
        assert_eq!(metadata.formats.len(), 1);
        assert_eq!(metadata.formats[0].container_ext, "mp4");
        assert!(!metadata.formats[0].has_audio);
    }
}
