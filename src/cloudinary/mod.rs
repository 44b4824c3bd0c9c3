/// Cloudinary destination
///
/// Architecture:
/// - `MediaUploader`: the seam the migration driver talks to
/// - provider: signed REST client for the Cloudinary upload API
pub mod provider;

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub use provider::CloudinaryProvider;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];

/// Cloudinary resource type. Videos uploaded as images come back broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Video,
}

impl ResourceType {
    /// Pick the resource type from the link's file extension.
    pub fn for_link(link: &str) -> Self {
        let path = url::Url::parse(link)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| {
                link.split(['?', '#'])
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });
        let ext = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            ResourceType::Video
        } else {
            ResourceType::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Video => "video",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub resource_type: ResourceType,
    pub public_id: String,
}

impl UploadOptions {
    pub fn for_link(link: &str, folder: &str) -> Self {
        Self {
            resource_type: ResourceType::for_link(link),
            public_id: public_id_for(link, folder),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub secure_url: String,
}

/// Deterministic destination id: base64 of the source URL under `folder`.
/// Re-uploading the same link targets the same asset.
pub fn public_id_for(link: &str, folder: &str) -> String {
    let encoded = STANDARD.encode(link.as_bytes());
    if folder.is_empty() {
        encoded
    } else {
        format!("{folder}/{encoded}")
    }
}

/// Uploads a remote file by URL and reports where it now lives.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, link: &str, options: &UploadOptions) -> Result<UploadedAsset>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp4_links_are_videos() {
        assert_eq!(ResourceType::for_link("https://i.imgur.com/abc.mp4"), ResourceType::Video);
        assert_eq!(ResourceType::for_link("https://i.imgur.com/abc.MP4"), ResourceType::Video);
        assert_eq!(
            ResourceType::for_link("https://i.imgur.com/abc.mp4?dl=1"),
            ResourceType::Video
        );
    }

    #[test]
    fn everything_else_is_an_image() {
        for link in [
            "https://i.imgur.com/abc.png",
            "https://i.imgur.com/abc.gif",
            "https://i.imgur.com/abc",
            "https://imgur.com/a/qhzJj",
            "https://i.imgur.com/mp4.png",
            "not a url",
        ] {
            assert_eq!(ResourceType::for_link(link), ResourceType::Image, "{link}");
        }
    }

    #[test]
    fn public_id_is_folder_plus_base64() {
        assert_eq!(
            public_id_for("https://i.imgur.com/abc.png", "DiepWraImgurBackups"),
            "DiepWraImgurBackups/aHR0cHM6Ly9pLmltZ3VyLmNvbS9hYmMucG5n"
        );
        assert_eq!(
            public_id_for("https://i.imgur.com/abc.png", ""),
            "aHR0cHM6Ly9pLmltZ3VyLmNvbS9hYmMucG5n"
        );
    }

    #[test]
    fn options_follow_the_link() {
        let opts = UploadOptions::for_link("https://i.imgur.com/yhkA58e.mp4", "B");
        assert_eq!(opts.resource_type, ResourceType::Video);
        assert_eq!(opts.public_id, "B/aHR0cHM6Ly9pLmltZ3VyLmNvbS95aGtBNThlLm1wNA==");
    }
}
