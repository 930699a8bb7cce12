use futures::future::BoxFuture;
use reqwest::{redirect::Policy, ClientBuilder};

use crate::error::{Error, Result};

use super::{Fetcher, RawStation};

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = ClientBuilder::new()
            .user_agent(APP_USER_AGENT)
            .redirect(Policy::default())
            .build()
            .map_err(|e| Error::Configuration(format!("build http client: {}", e)))?;

        Ok(Self { client })
    }

    async fn get(client: &reqwest::Client, url: &str) -> Result<String> {
        let fetch_err = |source| Error::Fetch {
            url: url.to_string(),
            source,
        };

        let res = client
            .get(url)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(fetch_err)?;

        res.text().await.map_err(fetch_err)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<RawStation>>> {
        Box::pin(async move {
            let body = Self::get(&self.client, url).await?;
            log::trace!("response from {}: {}", url, body);

            parse_body(&body)
        })
    }
}

/// The upstream contract is a top-level JSON array of station objects.
fn parse_body(body: &str) -> Result<Vec<RawStation>> {
    serde_json::from_str(body)
        .map_err(|e| Error::MalformedPayload(format!("expected a JSON array of stations: {}", e)))
}
