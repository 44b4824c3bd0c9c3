//! Fixed catalogue of the migration plus the per-run settings.
//!
//! All links come from the diep-wra.xyz leaderboard dumps (desktop + mobile).
//! As of May 2023 they hold 7702 imgur links: 7700 direct links, one deleted
//! video ([`KNOWN_DEAD_LINKS`]) and one album that was re-hosted by hand
//! ([`SPECIAL_CASES`]).

use std::path::PathBuf;
use std::time::Duration;

use crate::util::env::{env_flag, env_list, env_opt, env_parse, preflight_snapshot};

pub const DEFAULT_SOURCE_URLS: &[&str] = &[
    "https://diep-wra.xyz/desktop.json",
    "https://diep-wra.xyz/mobile.json",
];

/// Links must contain this to count as candidates.
pub const DEFAULT_LINK_MARKER: &str = "imgur.";

pub const DEFAULT_OUTPUT_FILE: &str = "DiepWraImgurBackupLinks.jsonl";
pub const DEFAULT_FOLDER: &str = "DiepWraImgurBackups";
pub const DEFAULT_DELAY_MS: u64 = 4;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Links confirmed 404 before the migration started.
pub const KNOWN_DEAD_LINKS: &[&str] = &["https://i.imgur.com/yhkA58e.mp4"];

/// Album link with no direct media; its images were uploaded to imgbb manually.
pub const SPECIAL_CASES: &[(&str, &str)] = &[(
    "https://imgur.com/a/qhzJj",
    "https://ibb.co/album/NrRw8d?sort=name_asc&page=1",
)];

pub fn special_case_destination(link: &str) -> Option<&'static str> {
    SPECIAL_CASES
        .iter()
        .find(|(source, _)| *source == link)
        .map(|(_, destination)| *destination)
}

/// Cloudinary account credentials as supplied on the command line.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub source_urls: Vec<String>,
    pub link_marker: String,
    pub output: PathBuf,
    pub folder: String,
    pub delay: Duration,
    pub dry_run: bool,
    pub upload_timeout: Duration,
    /// Alternate Cloudinary API root, e.g. a regional endpoint.
    pub api_base: Option<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_urls: DEFAULT_SOURCE_URLS.iter().map(|s| s.to_string()).collect(),
            link_marker: DEFAULT_LINK_MARKER.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
            folder: DEFAULT_FOLDER.to_string(),
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            dry_run: false,
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            api_base: None,
        }
    }
}

/// Values given explicitly on the command line; `None` falls through to env then defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub sources: Vec<String>,
    pub output: Option<PathBuf>,
    pub folder: Option<String>,
    pub delay_ms: Option<u64>,
    pub dry_run: bool,
}

impl MigrationConfig {
    /// Resolve settings in order: CLI override, `IMGUR_RESCUE_*` env var, built-in default.
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        let defaults = Self::default();
        let source_urls = if !overrides.sources.is_empty() {
            overrides.sources
        } else {
            env_list("IMGUR_RESCUE_SOURCES").unwrap_or(defaults.source_urls)
        };
        let output = overrides
            .output
            .or_else(|| env_opt("IMGUR_RESCUE_OUTPUT").map(PathBuf::from))
            .unwrap_or(defaults.output);
        let folder = overrides
            .folder
            .or_else(|| env_opt("IMGUR_RESCUE_FOLDER"))
            .unwrap_or(defaults.folder);
        let delay_ms = overrides
            .delay_ms
            .unwrap_or_else(|| env_parse("IMGUR_RESCUE_DELAY_MS", DEFAULT_DELAY_MS));
        let dry_run = overrides.dry_run || env_flag("IMGUR_RESCUE_DRY_RUN", false);

        Self {
            source_urls,
            link_marker: env_opt("IMGUR_RESCUE_LINK_MARKER").unwrap_or(defaults.link_marker),
            output,
            folder: folder.trim_matches('/').to_string(),
            delay: Duration::from_millis(delay_ms),
            dry_run,
            upload_timeout: Duration::from_secs(env_parse(
                "IMGUR_RESCUE_UPLOAD_TIMEOUT_SECS",
                DEFAULT_UPLOAD_TIMEOUT_SECS,
            )),
            api_base: env_opt("IMGUR_RESCUE_CLOUDINARY_API_BASE"),
        }
    }

    pub fn log_snapshot(&self, credentials: &Credentials) {
        preflight_snapshot(
            "imgur-rescue",
            &[
                ("cloud_name", credentials.cloud_name.clone()),
                ("api_key", credentials.api_key.clone()),
                ("api_secret", credentials.api_secret.clone()),
                ("sources", self.source_urls.join(",")),
                ("output", self.output.display().to_string()),
                ("folder", self.folder.clone()),
                ("delay_ms", self.delay.as_millis().to_string()),
                ("dry_run", self.dry_run.to_string()),
                ("upload_timeout_secs", self.upload_timeout.as_secs().to_string()),
                ("api_base", self.api_base.clone().unwrap_or_default()),
            ],
        );
    }
}
