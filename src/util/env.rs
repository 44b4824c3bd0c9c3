//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in the binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Load .env exactly once, from the working directory or else the crate root.
/// Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_err() {
            let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
            let _ = dotenv::from_filename(candidate);
        }
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        Err(_) => default,
    }
}

/// Comma-separated list; blank entries dropped. None when unset or empty.
pub fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env_opt(key)?;
    let items = split_list(&raw);
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("SECRET") || k.contains("KEY") || k.contains("TOKEN") || k.contains("PASSWORD")
    {
        return "***".to_string();
    }
    // Trim so copy/paste newlines don't end up in the log line.
    val.trim().to_string()
}

/// Log a consolidated, redacted snapshot of the effective configuration.
pub fn preflight_snapshot(title: &str, entries: &[(&str, String)]) {
    let snapshot: Vec<(String, String)> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), redact_value(k, v)))
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
}
