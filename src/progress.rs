//! Append-only JSON-lines record of finished migrations.
//!
//! Every line is a standalone object `{"<imgur link>": "<new link>"}`. The file is
//! never rewritten; a crash can at worst lose the record that was being written.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    migrated: HashSet<String>,
}

impl ProgressStore {
    /// Create the file if missing, then read every record into the migrated set.
    /// A line that is not a JSON object aborts the load.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(&path, "").with_context(|| format!("creating {}", path.display()))?;
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading progress file {}", path.display()))?;
        let migrated = parse_records(&raw)
            .with_context(|| format!("parsing progress file {}", path.display()))?;
        Ok(Self { path, migrated })
    }

    pub fn contains(&self, link: &str) -> bool {
        self.migrated.contains(link)
    }

    pub fn len(&self) -> usize {
        self.migrated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrated.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append `{source: destination}`. Returns only after the bytes are synced.
    pub fn append(&mut self, source: &str, destination: &str) -> Result<()> {
        let line = record_line(source, destination)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {} for append", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {}", self.path.display()))?;
        file.sync_data()
            .with_context(|| format!("syncing {}", self.path.display()))?;
        self.migrated.insert(source.to_string());
        Ok(())
    }
}

fn record_line(source: &str, destination: &str) -> Result<String> {
    let mut obj = Map::new();
    obj.insert(source.to_string(), Value::String(destination.to_string()));
    let mut line = serde_json::to_string(&Value::Object(obj))?;
    line.push('\n');
    Ok(line)
}

fn parse_records(raw: &str) -> Result<HashSet<String>> {
    let mut migrated = HashSet::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value =
            serde_json::from_str(line).with_context(|| format!("line {}: invalid JSON", idx + 1))?;
        let Value::Object(obj) = value else {
            return Err(anyhow!("line {}: expected a JSON object", idx + 1));
        };
        migrated.extend(obj.into_iter().map(|(source, _)| source));
    }
    Ok(migrated)
}
