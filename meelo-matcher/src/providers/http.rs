//! HTTP plumbing shared by the JSON providers

use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

pub const USER_AGENT: &str = concat!(
    "Meelo-Matcher/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/Arthi-chaud/Meelo)"
);

/// Build the client a provider keeps for its whole lifetime
pub fn build_client(timeout: Duration) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}

/// GET a JSON document; 404 maps to `Ok(None)`
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> ProviderResult<Option<T>> {
    debug!(url = %url, "Provider request");
    let response = client.get(url).query(query).send().await?;
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api(status.as_u16(), body));
    }

    response
        .json::<T>()
        .await
        .map(Some)
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Last non-empty path segment of a URL
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(segment.to_string())
}

/// Whether `url` points at `host` or one of its subdomains
pub fn url_has_host(url: &str, host: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .is_some_and(|h| h == host || h.ends_with(&format!(".{}", host)))
}
