//! Fetching feed bodies over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::{debug, error};

use crate::constants::ICS_MEDIA_TYPE;
use crate::error::{CoreError, CoreResult};
use crate::event::ParsedEvent;
use crate::ics::parse_ics;

/// Source of raw ICS bodies.
#[async_trait]
pub trait IcsFetcher: Send + Sync {
    /// Fetch the body behind `url` as text.
    async fn fetch(&self, url: &str) -> CoreResult<String>;
}

/// Fetches feeds with a plain `GET`, asking for `text/calendar`.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests are aborted after `timeout`.
    pub fn new(timeout: Duration, user_agent: &str) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl IcsFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CoreResult<String> {
        let url = http_url(url);
        debug!(%url, "fetching feed");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, ICS_MEDIA_TYPE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Fetch {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Subscription links are often published as `webcal://`; fetch them over HTTPS.
fn http_url(url: &str) -> String {
    let url = url.trim();
    for scheme in ["webcal://", "webcals://"] {
        if let Some(rest) = url
            .get(..scheme.len())
            .filter(|head| head.eq_ignore_ascii_case(scheme))
            .and_then(|_| url.get(scheme.len()..))
        {
            return format!("https://{rest}");
        }
    }
    url.to_string()
}

/// Fetch a feed and parse it. Fetch and parse errors are returned unchanged.
pub async fn fetch_and_parse_ics(
    fetcher: &dyn IcsFetcher,
    url: &str,
) -> CoreResult<Vec<ParsedEvent>> {
    let result = match fetcher.fetch(url).await {
        Ok(body) => parse_ics(&body),
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        error!(url, error = %e, "failed to fetch or parse feed");
    }

    result
}
