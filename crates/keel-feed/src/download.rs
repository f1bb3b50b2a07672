//! Archive and metadata downloading from package feeds.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;

use keel_util::errors::KeelError;

use crate::repository::PackageFeed;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Build a shared reqwest client for feed traffic.
///
/// `proxy` is the already-parsed proxy address handed down by the caller.
pub fn build_client(proxy: Option<&str>) -> miette::Result<Client> {
    let mut builder = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent("keel/0.3");
    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| KeelError::Network {
            message: format!("Invalid proxy address '{proxy}': {e}"),
        })?;
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|e| {
        KeelError::Network {
            message: format!("Failed to create HTTP client: {e}"),
        }
        .into()
    })
}

fn apply_auth(req: reqwest::RequestBuilder, feed: &PackageFeed) -> reqwest::RequestBuilder {
    if feed.has_auth() {
        req.basic_auth(
            feed.username.clone().unwrap_or_default(),
            feed.password.clone(),
        )
    } else {
        req
    }
}

/// Download raw bytes from a URL, with authentication and retries.
///
/// Returns `Ok(None)` for 404 (file not present in this feed). Server errors
/// and connect/timeout failures are retried; exhausting the retries is an
/// error, which callers treat as a failed source.
pub async fn download_bytes(
    client: &Client,
    feed: &PackageFeed,
    url: &str,
) -> miette::Result<Option<Vec<u8>>> {
    let mut last_err = String::new();

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            tokio::time::sleep(RETRY_DELAY * attempt).await;
        }

        let req = apply_auth(client.get(url), feed);

        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if status.is_server_error() {
                    last_err = format!("HTTP {status} from {url}");
                    continue;
                }
                if !status.is_success() {
                    return Err(KeelError::Network {
                        message: format!("HTTP {status} fetching {url}"),
                    }
                    .into());
                }

                let bytes = resp.bytes().await.map_err(|e| KeelError::Network {
                    message: format!("Failed to read response from {url}: {e}"),
                })?;
                return Ok(Some(bytes.to_vec()));
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                last_err = format!("{e}");
                continue;
            }
            Err(e) => {
                return Err(KeelError::Network {
                    message: format!("Request to {url} failed: {e}"),
                }
                .into());
            }
        }
    }

    Err(KeelError::Network {
        message: format!("Failed after {MAX_RETRIES} retries for {url}: {last_err}"),
    }
    .into())
}

/// Download a package archive with a progress bar for large transfers.
pub async fn download_archive(
    client: &Client,
    feed: &PackageFeed,
    url: &str,
    label: &str,
) -> miette::Result<Option<Vec<u8>>> {
    let req = apply_auth(client.get(url), feed);

    let resp = req.send().await.map_err(|e| KeelError::Network {
        message: format!("Request to {url} failed: {e}"),
    })?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !resp.status().is_success() {
        return Err(KeelError::Network {
            message: format!("HTTP {} fetching {url}", resp.status()),
        }
        .into());
    }

    let total = resp.content_length().unwrap_or(0);
    let pb = if total > 100_000 {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::with_template("  {msg} {bar:30.cyan/dim} {bytes}/{total_bytes}")
                .expect("valid template")
                .progress_chars("##-"),
        );
        pb.set_message(label.to_string());
        Some(pb)
    } else {
        None
    };

    let bytes = resp.bytes().await.map_err(|e| KeelError::Network {
        message: format!("Failed to read {url}: {e}"),
    })?;

    if let Some(pb) = pb {
        pb.set_position(bytes.len() as u64);
        pb.finish_and_clear();
    }

    Ok(Some(bytes.to_vec()))
}

/// Download a text file (manifest, index, checksum sidecar).
pub async fn download_text(
    client: &Client,
    feed: &PackageFeed,
    url: &str,
) -> miette::Result<Option<String>> {
    match download_bytes(client, feed, url).await? {
        Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).to_string())),
        None => Ok(None),
    }
}
