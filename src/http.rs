//! Blocking HTTP access for the geocoding and static map services.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;

use crate::error::Result;

const USER_AGENT: &str = concat!("hexruns/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Something that can GET a URL and hand back the body.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(HttpFetcher { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        // Strip the key before logging
        let shown = url.split("&key=").next().unwrap_or(url);
        debug!("GET {}", shown);

        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}
