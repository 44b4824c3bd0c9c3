//! Candidate link extraction from the leaderboard JSON dumps.
//!
//! Each document has the shape
//! `{ "<tank>": { "<gamemode>": [ { "proof": ["<url>", ...], ... }, ... ] } }`.
//! Keys are kept in document order so the candidate sequence is stable between runs.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::info;

/// One leaderboard entry. Only `proof` matters here; other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ProofRecord {
    pub proof: Vec<String>,
}

/// category -> mode -> records
pub type SourceDocument = IndexMap<String, IndexMap<String, Vec<ProofRecord>>>;

/// Walk every leaf `proof` array under the two-level keyed structure, in order.
pub fn collect_proof_links(doc: &SourceDocument) -> impl Iterator<Item = &str> + '_ {
    doc.values()
        .flat_map(|modes| modes.values())
        .flatten()
        .flat_map(|record| record.proof.iter())
        .map(|link| link.trim())
}

#[derive(Debug, Clone)]
pub struct LinkFilter {
    marker: String,
    known_bad: HashSet<String>,
}

impl LinkFilter {
    pub fn new<I, S>(marker: impl Into<String>, known_bad: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            marker: marker.into(),
            known_bad: known_bad.into_iter().map(Into::into).collect(),
        }
    }

    /// Expects an already trimmed link.
    pub fn accepts(&self, link: &str) -> bool {
        !self.known_bad.contains(link) && link.contains(&self.marker)
    }
}

/// Flatten all documents into the candidate sequence. No deduplication.
pub fn extract_candidates(docs: &[SourceDocument], filter: &LinkFilter) -> Vec<String> {
    docs.iter()
        .flat_map(|doc| collect_proof_links(doc))
        .filter(|link| filter.accepts(link))
        .map(str::to_string)
        .collect()
}

pub async fn fetch_document(client: &Client, url: &str) -> Result<SourceDocument> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("non-success status from {url}"))?;
    resp.json::<SourceDocument>()
        .await
        .with_context(|| format!("unexpected document shape at {url}"))
}

/// Fetch every document in order, then extract. Any fetch failure aborts.
pub async fn fetch_candidates(
    client: &Client,
    urls: &[String],
    filter: &LinkFilter,
) -> Result<Vec<String>> {
    let mut docs = Vec::with_capacity(urls.len());
    for url in urls {
        let doc = fetch_document(client, url).await?;
        info!(url = %url, categories = doc.len(), "fetched source document");
        docs.push(doc);
    }
    let candidates = extract_candidates(&docs, filter);
    info!(documents = docs.len(), candidates = candidates.len(), "extracted candidate links");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(raw: &str) -> SourceDocument {
        serde_json::from_str(raw).unwrap()
    }

    fn filter() -> LinkFilter {
        LinkFilter::new("imgur.", ["https://i.imgur.com/dead.mp4"])
    }

    #[test]
    fn walks_in_document_order() {
        // Keys deliberately not alphabetical.
        let d = doc(r#"{
            "Tri-Angle": {
                "ffa": [
                    {"name": "a", "proof": ["https://i.imgur.com/1.png", "https://i.imgur.com/2.png"]},
                    {"proof": ["https://i.imgur.com/3.png"]}
                ],
                "2tdm": [{"proof": ["https://i.imgur.com/4.png"]}]
            },
            "Annihilator": {
                "maze": [{"proof": ["https://i.imgur.com/5.png"]}]
            }
        }"#);
        let links: Vec<&str> = collect_proof_links(&d).collect();
        assert_eq!(
            links,
            vec![
                "https://i.imgur.com/1.png",
                "https://i.imgur.com/2.png",
                "https://i.imgur.com/3.png",
                "https://i.imgur.com/4.png",
                "https://i.imgur.com/5.png",
            ]
        );
    }

    #[test]
    fn drops_known_bad_and_foreign_links() {
        let d = doc(r#"{
            "Tank": {
                "ffa": [
                    {"proof": ["https://i.imgur.com/dead.mp4", "https://www.youtube.com/watch?v=k9fdYD_J0ec"]},
                    {"proof": ["  https://i.imgur.com/dead.mp4\n", "https://i.imgur.com/ok.png"]}
                ]
            }
        }"#);
        let out = extract_candidates(&[d], &filter());
        assert_eq!(out, vec!["https://i.imgur.com/ok.png".to_string()]);
    }

    #[test]
    fn trims_before_keeping() {
        let d = doc(r#"{"T": {"m": [{"proof": ["  https://imgur.com/a/qhzJj  "]}]}}"#);
        assert_eq!(
            extract_candidates(&[d], &filter()),
            vec!["https://imgur.com/a/qhzJj".to_string()]
        );
    }

    #[test]
    fn keeps_duplicates_across_documents() {
        let a = doc(r#"{"T": {"m": [{"proof": ["https://i.imgur.com/x.png"]}]}}"#);
        let b = doc(r#"{"T": {"m": [{"proof": ["https://i.imgur.com/x.png", "https://i.imgur.com/y.png"]}]}}"#);
        assert_eq!(
            extract_candidates(&[a, b], &filter()),
            vec![
                "https://i.imgur.com/x.png".to_string(),
                "https://i.imgur.com/x.png".to_string(),
                "https://i.imgur.com/y.png".to_string(),
            ]
        );
    }

    /// Minimal HTTP/1.1 responder: `(path, status, body)` routes, 404 otherwise.
    async fn serve(routes: Vec<(&'static str, u16, &'static str)>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = sock.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    let head = String::from_utf8_lossy(&buf[..read]).to_string();
                    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let (status, body) = routes
                        .iter()
                        .find(|(p, _, _)| *p == path)
                        .map(|(_, status, body)| (*status, *body))
                        .unwrap_or((404, ""));
                    let resp = format!(
                        "HTTP/1.1 {status} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = sock.write_all(resp.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    const GOOD_DOC: &str = r#"{"T": {"m": [{"proof": ["https://i.imgur.com/a.png", "https://youtu.be/x"]}]}}"#;

    #[tokio::test]
    async fn fetches_and_extracts_served_documents() {
        let base = serve(vec![("/desktop.json", 200, GOOD_DOC)]).await;
        let urls = vec![format!("{base}/desktop.json")];
        let out = fetch_candidates(&local_client(), &urls, &filter()).await.unwrap();
        assert_eq!(out, vec!["https://i.imgur.com/a.png".to_string()]);
    }

    #[tokio::test]
    async fn server_error_on_second_document_aborts() {
        let base = serve(vec![
            ("/desktop.json", 200, GOOD_DOC),
            ("/mobile.json", 500, "oops"),
        ])
        .await;
        let urls = vec![format!("{base}/desktop.json"), format!("{base}/mobile.json")];
        let err = fetch_candidates(&local_client(), &urls, &filter())
            .await
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains(&urls[1]), "{msg}");
        assert!(msg.contains("non-success status"), "{msg}");
    }

    #[tokio::test]
    async fn malformed_body_aborts_with_url() {
        let base = serve(vec![
            ("/desktop.json", 200, GOOD_DOC),
            ("/mobile.json", 200, "{\"T\": [not json"),
        ])
        .await;
        let urls = vec![format!("{base}/desktop.json"), format!("{base}/mobile.json")];
        let err = fetch_candidates(&local_client(), &urls, &filter())
            .await
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains(&format!("unexpected document shape at {}", urls[1])), "{msg}");
    }

    #[tokio::test]
    async fn unreachable_host_aborts() {
        // Bind then drop so the port is very likely closed.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let urls = vec![format!("http://{addr}/desktop.json")];
        let err = fetch_document(&local_client(), &urls[0]).await.unwrap_err();
        assert!(err.to_string().contains(&urls[0]));
    }

    #[test]
    fn missing_proof_is_a_decode_error() {
        let res = serde_json::from_str::<SourceDocument>(r#"{"T": {"m": [{"name": "x"}]}}"#);
        assert!(res.is_err());
    }
}
