use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::time::Duration;
use tracing::debug;

use super::{MediaUploader, UploadOptions, UploadedAsset};
use crate::config::Credentials;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Signed client for the Cloudinary upload API.
///
/// Cloudinary fetches the remote `file` URL itself, so nothing is downloaded locally.
/// Signed uploads overwrite an existing asset with the same `public_id`.
#[derive(Debug, Clone)]
pub struct CloudinaryProvider {
    api_base: String,
    credentials: Credentials,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl CloudinaryProvider {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("imgur-rescue/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building cloudinary http client")?;
        Ok(Self {
            api_base: DEFAULT_API_BASE.to_string(),
            credentials,
            http,
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn upload_url(&self, options: &UploadOptions) -> String {
        format!(
            "{}/{}/{}/upload",
            self.api_base, self.credentials.cloud_name, options.resource_type
        )
    }
}

/// `k=v` pairs sorted by key and joined with `&`, then the secret appended, SHA-1 hex.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl MediaUploader for CloudinaryProvider {
    async fn upload(&self, link: &str, options: &UploadOptions) -> Result<UploadedAsset> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("public_id", options.public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.credentials.api_secret,
        );
        let form = [
            ("file", link),
            ("public_id", options.public_id.as_str()),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.credentials.api_key.as_str()),
            ("signature", signature.as_str()),
        ];

        let url = self.upload_url(options);
        debug!(url = %url, public_id = %options.public_id, "cloudinary upload request");
        let resp = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .with_context(|| format!("cloudinary request failed for {link}"))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading cloudinary response for {link}"))?;
        parse_upload_response(status, &body)
    }
}

fn parse_upload_response(status: reqwest::StatusCode, body: &str) -> Result<UploadedAsset> {
    let parsed: Option<UploadResponse> = serde_json::from_str(body).ok();
    if !status.is_success() {
        let message = parsed
            .and_then(|p| p.error)
            .map(|e| e.message)
            .unwrap_or_else(|| body.chars().take(200).collect());
        return Err(anyhow!("cloudinary rejected upload ({status}): {message}"));
    }
    match parsed {
        Some(UploadResponse {
            secure_url: Some(secure_url),
            ..
        }) => Ok(UploadedAsset { secure_url }),
        Some(UploadResponse {
            error: Some(err), ..
        }) => Err(anyhow!("cloudinary error: {}", err.message)),
        _ => Err(anyhow!("cloudinary response missing secure_url")),
    }
}
