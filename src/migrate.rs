//! Upload driver: one awaited upload per candidate link, in candidate order.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::cloudinary::{MediaUploader, UploadOptions};
use crate::config::special_case_destination;
use crate::progress::ProgressStore;

/// Terminal state of a single candidate link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Skipped,
    SpecialCase { destination: String },
    Uploaded { destination: String },
    Planned { options: UploadOptions },
    PlannedSpecialCase { destination: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub total_candidates: usize,
    pub skipped: usize,
    pub special_cases: usize,
    pub uploaded: usize,
    pub planned: usize,
    pub failed: Vec<String>,
}

impl MigrationReport {
    fn record(&mut self, link: &str, outcome: &LinkOutcome) {
        match outcome {
            LinkOutcome::Skipped => self.skipped += 1,
            LinkOutcome::SpecialCase { .. } => self.special_cases += 1,
            LinkOutcome::Uploaded { .. } => self.uploaded += 1,
            LinkOutcome::Planned { .. } | LinkOutcome::PlannedSpecialCase { .. } => {
                self.planned += 1
            }
            LinkOutcome::Failed { .. } => self.failed.push(link.to_string()),
        }
    }

    /// Final operator summary: count of failures followed by each failed link.
    pub fn log_summary(&self) {
        info!(
            candidates = self.total_candidates,
            skipped = self.skipped,
            special_cases = self.special_cases,
            uploaded = self.uploaded,
            planned = self.planned,
            failed = self.failed.len(),
            "migration run finished"
        );
        // The failure list is the operator's stdout contract, kept free of log formatting.
        for line in self.failure_lines() {
            println!("{line}");
        }
    }

    fn failure_lines(&self) -> Vec<String> {
        std::iter::once(format!(
            "THERE WERE {} FAILED IMGUR LINK UPLOADS:",
            self.failed.len()
        ))
        .chain(self.failed.iter().map(|link| format!("FAILED LINK: {link}")))
        .collect()
    }
}

/// Fixed pause before every upload call. Not adaptive.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    delay: Duration,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

pub struct Migrator<'a, U: MediaUploader + ?Sized> {
    uploader: &'a U,
    store: &'a mut ProgressStore,
    folder: String,
    throttle: Throttle,
    dry_run: bool,
}

impl<'a, U: MediaUploader + ?Sized> Migrator<'a, U> {
    pub fn new(uploader: &'a U, store: &'a mut ProgressStore, folder: &str, delay: Duration) -> Self {
        Self {
            uploader,
            store,
            folder: folder.to_string(),
            throttle: Throttle::new(delay),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Process every candidate. Per-link failures are collected, never propagated.
    pub async fn run(&mut self, candidates: &[String]) -> MigrationReport {
        let total = candidates.len();
        let mut report = MigrationReport {
            total_candidates: total,
            ..Default::default()
        };
        let mut recorded = self.store.len();
        let mut failed_this_run: HashSet<&str> = HashSet::new();

        info!(
            candidates = total,
            already_migrated = recorded,
            dry_run = self.dry_run,
            progress_file = %self.store.path().display(),
            "starting migration"
        );

        for link in candidates {
            let link = link.as_str();
            if failed_this_run.contains(link) {
                debug!(link, "already failed this run; not retrying");
                report.record(link, &LinkOutcome::Skipped);
                continue;
            }
            let outcome = self.migrate_one(link).await;
            match &outcome {
                LinkOutcome::Skipped => debug!(link, "already migrated"),
                LinkOutcome::SpecialCase { destination } => {
                    recorded += 1;
                    info!(
                        link,
                        destination = %destination,
                        "SPECIAL CASE :: link {recorded} of {total}"
                    );
                }
                LinkOutcome::Uploaded { destination } => {
                    recorded += 1;
                    info!(link, destination = %destination, "link {recorded} of {total}");
                }
                LinkOutcome::Planned { options } => {
                    info!(
                        link,
                        resource_type = %options.resource_type,
                        public_id = %options.public_id,
                        "dry-run: would upload"
                    );
                }
                LinkOutcome::PlannedSpecialCase { destination } => {
                    info!(
                        link,
                        destination = %destination,
                        "dry-run: SPECIAL CASE :: would record override"
                    );
                }
                LinkOutcome::Failed { error } => {
                    failed_this_run.insert(link);
                    error!(link, error = %error, "upload failed");
                }
            }
            report.record(link, &outcome);
        }

        report
    }

    async fn migrate_one(&mut self, link: &str) -> LinkOutcome {
        if self.store.contains(link) {
            return LinkOutcome::Skipped;
        }

        if let Some(destination) = special_case_destination(link) {
            if self.dry_run {
                return LinkOutcome::PlannedSpecialCase {
                    destination: destination.to_string(),
                };
            }
            return match self.store.append(link, destination) {
                Ok(()) => LinkOutcome::SpecialCase {
                    destination: destination.to_string(),
                },
                Err(e) => LinkOutcome::Failed {
                    error: format!("{e:#}"),
                },
            };
        }

        let options = UploadOptions::for_link(link, &self.folder);
        if self.dry_run {
            return LinkOutcome::Planned { options };
        }

        self.throttle.wait().await;
        let asset = match self.uploader.upload(link, &options).await {
            Ok(asset) => asset,
            Err(e) => {
                return LinkOutcome::Failed {
                    error: format!("{e:#}"),
                }
            }
        };

        match self.store.append(link, &asset.secure_url) {
            Ok(()) => LinkOutcome::Uploaded {
                destination: asset.secure_url,
            },
            Err(e) => {
                warn!(link, destination = %asset.secure_url, "uploaded but could not record");
                LinkOutcome::Failed {
                    error: format!("{e:#}"),
                }
            }
        }
    }
}
