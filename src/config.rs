//! Runtime configuration for the backend binary.
//!
//! Defaults need no file at all. An optional `KEY="value"` env file can be
//! passed with `--config`, and command-line flags override both.

use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};
use uuid::Uuid;

use crate::extractor::DEFAULT_YTDLP_BIN;

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 8000;
pub const SCRATCH_SUBDIR: &str = "video_downloads";
pub const SERVICE_NAME: &str = "video-downloader-backend";

#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about = "HTTP API for probing and downloading online videos.")]
pub struct BackendArgs {
    #[arg(long = "config", value_name = "PATH", help = "Optional KEY=\"value\" env file")]
    pub config: Option<PathBuf>,
    #[arg(long = "host", value_name = "ADDR", help = "Listen address (default 0.0.0.0)")]
    pub host: Option<IpAddr>,
    #[arg(long = "port", value_name = "PORT", help = "Listen port (default 8000)")]
    pub port: Option<u16>,
    #[arg(
        long = "scratch-dir",
        value_name = "PATH",
        help = "Directory for in-flight downloads (default <tmp>/video_downloads)"
    )]
    pub scratch_dir: Option<PathBuf>,
    #[arg(long = "yt-dlp", value_name = "PATH", help = "yt-dlp executable to invoke")]
    pub ytdlp_bin: Option<PathBuf>,
}

/// Values read from the optional env file. Everything is optional so the
/// command line can fill the gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub scratch_dir: Option<PathBuf>,
    pub ytdlp_bin: Option<PathBuf>,
}

/// Fully resolved configuration, built once in `main`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen: SocketAddr,
    pub scratch: ScratchDir,
    pub ytdlp_bin: PathBuf,
}

/// The shared directory downloads are written to before being streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<system tmp>/video_downloads`.
    pub fn default_location() -> Self {
        Self::new(std::env::temp_dir().join(SCRATCH_SUBDIR))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates the directory if it is missing.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating scratch directory {}", self.root.display()))
    }

    /// Output template for a fresh download: `<root>/<uuid>.%(ext)s`.
    pub fn unique_template(&self) -> PathBuf {
        self.root.join(format!("{}.%(ext)s", Uuid::new_v4()))
    }
}

pub fn read_env_config(path: &Path) -> Result<EnvConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "HOST" => {
                    let host = value
                        .parse()
                        .with_context(|| format!("Parsing HOST from {}", path.display()))?;
                    cfg.host = Some(host);
                }
                "PORT" => {
                    let port = value
                        .parse()
                        .with_context(|| format!("Parsing PORT from {}", path.display()))?;
                    cfg.port = Some(port);
                }
                "SCRATCH_DIR" => cfg.scratch_dir = Some(PathBuf::from(value)),
                "YTDLP_BIN" => cfg.ytdlp_bin = Some(PathBuf::from(value)),
                _ => {}
            }
        }
    }
    Ok(cfg)
}

impl AppConfig {
    pub fn load(args: BackendArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => read_env_config(path)?,
            None => EnvConfig::default(),
        };
        Ok(Self::resolve(args, file))
    }

    /// Merges flags over the env file over built-in defaults.
    pub fn resolve(args: BackendArgs, file: EnvConfig) -> Self {
        let host = args.host.or(file.host).unwrap_or(DEFAULT_HOST);
        let port = args.port.or(file.port).unwrap_or(DEFAULT_PORT);
        let scratch = args
            .scratch_dir
            .or(file.scratch_dir)
            .map(ScratchDir::new)
            .unwrap_or_else(ScratchDir::default_location);
        let ytdlp_bin = args
            .ytdlp_bin
            .or(file.ytdlp_bin)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_YTDLP_BIN));
        Self {
            listen: SocketAddr::new(host, port),
            scratch,
            ytdlp_bin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{}", contents)?;
        Ok(file)
    }

    #[test]
    fn read_env_config_extracts_values() -> Result<()> {
        let cfg = make_config(
            "# backend\nHOST=\"127.0.0.1\"\nPORT=\"4242\"\nSCRATCH_DIR=\"/srv/tmp\"\nOTHER=1\n",
        )?;
        let parsed = read_env_config(cfg.path())?;
        assert_eq!(parsed.port, Some(4242));
        assert_eq!(parsed.host, Some("127.0.0.1".parse::<IpAddr>()?));
        assert_eq!(parsed.scratch_dir, Some(PathBuf::from("/srv/tmp")));
        assert!(parsed.ytdlp_bin.is_none());
        Ok(())
    }

    #[test]
    fn read_env_config_rejects_bad_port() -> Result<()> {
        let cfg = make_config("PORT=\"eighty\"\n")?;
        assert!(read_env_config(cfg.path()).is_err());
        Ok(())
    }

    #[test]
    fn resolve_defaults_without_file_or_flags() {
        let config = AppConfig::resolve(BackendArgs::default(), EnvConfig::default());
        assert_eq!(config.listen, SocketAddr::new(DEFAULT_HOST, DEFAULT_PORT));
        assert_eq!(config.scratch, ScratchDir::default_location());
        assert!(config.scratch.path().ends_with(SCRATCH_SUBDIR));
        assert_eq!(config.ytdlp_bin, PathBuf::from("yt-dlp"));
    }

    #[test]
    fn flags_override_env_file() -> Result<()> {
        let cfg = make_config("PORT=\"4242\"\nYTDLP_BIN=\"/opt/yt-dlp\"\n")?;
        let args = BackendArgs::parse_from([
            "backend",
            "--config",
            cfg.path().to_str().context("temp path is not UTF-8")?,
            "--port",
            "9000",
        ]);
        let config = AppConfig::load(args)?;
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.ytdlp_bin, PathBuf::from("/opt/yt-dlp"));
        Ok(())
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = BackendArgs {
            config: Some(PathBuf::from("/definitely/not/here.env")),
            ..BackendArgs::default()
        };
        assert!(AppConfig::load(args).is_err());
    }

    #[test]
    fn scratch_templates_are_unique() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let scratch = ScratchDir::new(dir.path().join("scratch"));
        scratch.prepare()?;
        assert!(scratch.path().is_dir());

        let first = scratch.unique_template();
        let second = scratch.unique_template();
        assert_ne!(first, second);
        assert!(first.starts_with(scratch.path()));
        assert!(first.to_string_lossy().ends_with(".%(ext)s"));
        Ok(())
    }
}
