use anyhow::{Context, Result};
use clap::Parser;
use imgur_rescue::cloudinary::CloudinaryProvider;
use imgur_rescue::config::{ConfigOverrides, Credentials, MigrationConfig, KNOWN_DEAD_LINKS};
use imgur_rescue::extract::{fetch_candidates, LinkFilter};
use imgur_rescue::migrate::Migrator;
use imgur_rescue::progress::ProgressStore;
use imgur_rescue::util::env as env_util;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "imgur-rescue",
    version,
    about = "Copy the diep-wra imgur proof links to Cloudinary, resumably"
)]
struct Cli {
    /// Cloudinary cloud name
    cloud_name: String,
    /// Cloudinary API key
    api_key: String,
    /// Cloudinary API secret
    api_secret: String,
    /// Source JSON document (repeatable; defaults to the desktop + mobile dumps)
    #[arg(long = "source")]
    sources: Vec<String>,
    /// JSON-lines progress file (default: DiepWraImgurBackupLinks.jsonl)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Cloudinary folder for uploaded assets (default: DiepWraImgurBackups)
    #[arg(long)]
    folder: Option<String>,
    /// Pause before each upload call in milliseconds (default: 4)
    #[arg(long)]
    delay_ms: Option<u64>,
    /// Only log what would be uploaded
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl Cli {
    fn split(self) -> (Credentials, ConfigOverrides) {
        (
            Credentials {
                cloud_name: self.cloud_name,
                api_key: self.api_key,
                api_secret: self.api_secret,
            },
            ConfigOverrides {
                sources: self.sources,
                output: self.output,
                folder: self.folder,
                delay_ms: self.delay_ms,
                dry_run: self.dry_run,
            },
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials are checked before anything touches disk or network.
    let cli = Cli::parse();
    env_util::init_env();
    imgur_rescue::tracing::init_tracing("info")?;

    let (credentials, overrides) = cli.split();
    let config = MigrationConfig::resolve(overrides);
    config.log_snapshot(&credentials);

    let mut store = ProgressStore::load(&config.output)?;
    info!(
        path = %store.path().display(),
        migrated = store.len(),
        "loaded progress file"
    );

    let http = Client::builder()
        .user_agent(concat!("imgur-rescue/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(60))
        .build()
        .context("building source http client")?;
    let filter = LinkFilter::new(config.link_marker.as_str(), KNOWN_DEAD_LINKS.iter().copied());
    let candidates = fetch_candidates(&http, &config.source_urls, &filter).await?;

    let mut uploader = CloudinaryProvider::new(credentials, config.upload_timeout)?;
    if let Some(api_base) = config.api_base.as_deref() {
        uploader = uploader.with_api_base(api_base);
    }
    let report = Migrator::new(&uploader, &mut store, &config.folder, config.delay)
        .dry_run(config.dry_run)
        .run(&candidates)
        .await;
    report.log_summary();
    Ok(())
}
