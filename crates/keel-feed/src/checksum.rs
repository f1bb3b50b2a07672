//! Archive checksum verification against feed sidecar files.

use reqwest::Client;

use keel_util::errors::KeelError;
use keel_util::hash::{sha256_bytes, sha512_base64, sha512_bytes};

use crate::download;
use crate::repository::PackageFeed;

/// Verify downloaded data against sidecar files published by the feed.
///
/// Tries the `.sha512` sidecar first (base64 or hex), then `.sha256` (hex).
/// Logs a warning when no sidecar is available.
pub async fn verify(
    client: &Client,
    feed: &PackageFeed,
    file_url: &str,
    data: &[u8],
) -> miette::Result<()> {
    let sha512_url = format!("{file_url}.sha512");
    if let Some(expected) = download::download_text(client, feed, &sha512_url).await? {
        let expected = extract_hash(&expected);
        if expected == sha512_base64(data) || expected.eq_ignore_ascii_case(&sha512_bytes(data)) {
            tracing::debug!("SHA-512 ok for {file_url}");
            return Ok(());
        }
        return Err(mismatch("SHA-512", file_url, &expected));
    }

    let sha256_url = format!("{file_url}.sha256");
    if let Some(expected) = download::download_text(client, feed, &sha256_url).await? {
        let expected = extract_hash(&expected);
        let actual = sha256_bytes(data);
        if expected.eq_ignore_ascii_case(&actual) {
            tracing::debug!("SHA-256 ok for {file_url}");
            return Ok(());
        }
        return Err(mismatch("SHA-256", file_url, &expected));
    }

    tracing::warn!("No checksum sidecar found for {file_url}");
    Ok(())
}

fn mismatch(algo: &str, url: &str, expected: &str) -> miette::Report {
    KeelError::Network {
        message: format!("{algo} mismatch for {url}: expected {expected}"),
    }
    .into()
}

/// Extract the hash from a sidecar file.
///
/// Sidecars may contain just the hash, or `hash  filename`.
fn extract_hash(content: &str) -> String {
    content.split_whitespace().next().unwrap_or("").to_string()
}
