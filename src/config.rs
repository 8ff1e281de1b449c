use std::sync::Arc;

use crate::{Delegate, Delivery, Error, RequestContext, Result, Tracker, WorkerSupervisor};

/// Configuration for [`Tracker`].
///
/// A config is built once at startup and then used to create a tracker for every request.
///
/// # Examples
/// ```
/// # use mixpanel::{RequestContext, TrackerConfig};
/// let config = TrackerConfig::from_token("project-token");
///
/// let mut context = RequestContext::with_remote_addr("10.0.0.1");
/// let mut tracker = config.tracker(&mut context);
/// tracker.append_event("Page Viewed", &serde_json::json!({"page": "/"}))?;
/// # Ok::<(), mixpanel::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub(crate) token: String,
    pub(crate) base_url: String,
    pub(crate) delivery: Delivery,
}

impl TrackerConfig {
    /// Default collector URL.
    pub const DEFAULT_BASE_URL: &'static str = "http://api.mixpanel.com";

    /// Create a configuration for the project `token` delivering events synchronously.
    pub fn from_token(token: impl Into<String>) -> Self {
        TrackerConfig {
            token: token.into(),
            base_url: TrackerConfig::DEFAULT_BASE_URL.to_owned(),
            delivery: Delivery::synchronous(),
        }
    }

    /// Override the collector URL. Clients should use the default setting in most cases.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(Error::InvalidBaseUrl)?;
        self.base_url = base_url;
        Ok(self)
    }

    /// Send events with a blocking request on the calling thread. This is the default.
    pub fn synchronous(mut self) -> Self {
        self.delivery = Delivery::synchronous();
        self
    }

    /// Send events through the worker subprocess owned by `supervisor`.
    pub fn worker_process(mut self, supervisor: Arc<WorkerSupervisor>) -> Self {
        self.delivery = Delivery::worker_process(supervisor);
        self
    }

    /// Hand encoded URLs to `delegate` instead of sending them.
    pub fn delegate(mut self, delegate: impl Delegate + Send + Sync + 'static) -> Self {
        self.delivery = Delivery::delegate(delegate);
        self
    }

    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    /// Create a tracker for one request. The context's event queue is cleared.
    pub fn tracker<'a>(&self, context: &'a mut RequestContext) -> Tracker<'a> {
        Tracker::new(
            self.token.clone(),
            context,
            self.delivery.clone(),
        )
        .with_base_url(self.base_url.clone())
    }
}
