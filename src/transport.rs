//! Blocking HTTP delivery to the collector.
use std::{
    io::BufRead,
    sync::{Arc, OnceLock},
};

use crate::Result;

/// Blocking HTTP client used by the synchronous delivery path and by the worker subprocess.
///
/// The underlying `reqwest` client is created on first use and shared between clones, so the
/// connection pool is reused across requests.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Arc<OnceLock<reqwest::blocking::Client>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a GET request and return the raw response body.
    ///
    /// Non-2xx responses are not treated as errors: the collector reports rejected events in
    /// the body.
    pub fn get(&self, url: &str) -> Result<String> {
        let client = self.client.get_or_init(reqwest::blocking::Client::new);

        let response = client.get(url).send()?;
        log::trace!(target: "mixpanel", status = response.status().as_u16(); "collector responded");

        Ok(response.text()?)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

/// Read newline-delimited URLs from `input` and GET each of them, in order.
///
/// Blank lines are skipped. Delivery failures are logged and do not stop the loop. Returns the
/// number of URLs delivered successfully once `input` reaches EOF.
pub fn relay(input: impl BufRead, transport: &HttpTransport) -> std::io::Result<usize> {
    let mut delivered = 0;

    for line in input.lines() {
        let line = line?;
        let url = line.trim();
        if url.is_empty() {
            continue;
        }

        match transport.get(url) {
            Ok(body) => {
                log::debug!(target: "mixpanel", accepted = body == "1"; "delivered event");
                delivered += 1;
            }
            Err(err) => {
                log::warn!(target: "mixpanel", "failed to deliver event: {}", err);
            }
        }
    }

    Ok(delivered)
}
