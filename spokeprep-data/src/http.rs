//! Shared HTTP helpers for the network-backed collaborators.

use std::io;
use std::time::Duration;

use camino::Utf8Path;
use futures_util::TryStreamExt;
use log::debug;
use reqwest::{Client, Response};
use spokeprep_core::{AcquisitionError, TransportError};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// User agent sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str = "spokeprep/0.1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client sending `user_agent` on every request.
pub(crate) fn build_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(user_agent.to_owned())
        .build()
}

/// Trim trailing slashes, falling back to `default` when nothing remains.
pub(crate) fn sanitise_base_url(url: impl Into<String>, default: &str) -> String {
    let raw = url.into();
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        default.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Issue a GET request, treating error statuses as failures.
pub(crate) async fn get(client: &Client, url: &str) -> Result<Response, TransportError> {
    debug!("GET {url}");
    client
        .get(url)
        .send()
        .await
        .map_err(|err| convert_reqwest_error(err, url))?
        .error_for_status()
        .map_err(|err| convert_reqwest_error(err, url))
}

/// Stream the body at `url` into `path`, replacing any previous file.
pub(crate) async fn download_to(
    client: &Client,
    url: &str,
    path: &Utf8Path,
) -> Result<u64, AcquisitionError> {
    let response = get(client, url).await?;
    let write_error = |source| AcquisitionError::Write {
        path: path.to_owned(),
        source,
    };
    let file = spokeprep_fs::create_utf8_file(path).map_err(write_error)?;
    let mut file = tokio::fs::File::from_std(file.into_std());
    let mut body = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
    let written = tokio::io::copy(&mut body, &mut file)
        .await
        .map_err(|source| TransportError::Network {
            url: url.to_owned(),
            source,
        })?;
    file.flush().await.map_err(write_error)?;
    debug!("wrote {written} bytes to {path}");
    Ok(written)
}

pub(crate) fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.org/", "https://example.org")]
    #[case("https://example.org///", "https://example.org")]
    #[case("  ", "https://fallback.test")]
    #[case("", "https://fallback.test")]
    fn sanitises_base_urls(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitise_base_url(input, "https://fallback.test"), expected);
    }
}
