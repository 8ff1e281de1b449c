use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::{
    encoder::{encode_payload, track_url, EventPayload},
    Delivery, Error, EventQueue, Properties, QueuedCall, RequestContext, Result, TrackerConfig,
};

/// Per-request event tracker.
///
/// Events can either be queued on the request context with [`Tracker::append_event`], to be
/// rendered into the response by the request handler, or sent to the collector immediately with
/// [`Tracker::track_event`].
///
/// In order to create a tracker, first create [`TrackerConfig`] or use [`Tracker::new`].
pub struct Tracker<'a> {
    token: String,
    base_url: String,
    delivery: Delivery,
    context: &'a mut RequestContext,
}

impl<'a> Tracker<'a> {
    /// Create a tracker for the request described by `context`.
    ///
    /// Any events already queued on `context` are discarded.
    pub fn new(
        token: impl Into<String>,
        context: &'a mut RequestContext,
        delivery: Delivery,
    ) -> Self {
        let mut tracker = Tracker {
            token: token.into(),
            base_url: TrackerConfig::DEFAULT_BASE_URL.to_owned(),
            delivery,
            context,
        };
        tracker.clear_queue();
        tracker
    }

    pub(crate) fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Queue a `track` call for the response.
    pub fn append_event<P: Serialize + ?Sized>(&mut self, event: &str, properties: &P) -> Result<()> {
        let args = vec![serde_json::to_string(event)?, serde_json::to_string(properties)?];
        self.push_call("track", args);
        Ok(())
    }

    /// Queue an arbitrary API call for the response.
    ///
    /// ```
    /// # use mixpanel::{Delivery, RequestContext, Tracker};
    /// # use serde_json::json;
    /// let mut context = RequestContext::new();
    /// let mut tracker = Tracker::new("token", &mut context, Delivery::synchronous());
    /// tracker.append_api("identify", [json!("user-1")])?;
    /// assert_eq!(tracker.queue().len(), 1);
    /// # Ok::<(), mixpanel::Error>(())
    /// ```
    pub fn append_api<I>(&mut self, call_type: &str, args: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Serialize,
    {
        let args = args
            .into_iter()
            .map(|arg| serde_json::to_string(&arg))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.push_call(call_type, args);
        Ok(())
    }

    fn push_call(&mut self, call_type: &str, args: Vec<String>) {
        log::trace!(target: "mixpanel", call_type; "queueing call");
        self.context.events.push(QueuedCall {
            call_type: call_type.to_owned(),
            args,
        });
    }

    /// Send an event to the collector now.
    ///
    /// `token`, `time` and `ip` are added to `properties`, replacing any values the caller
    /// supplied under those keys. Returns `true` if the collector accepted the event. Only
    /// synchronous delivery observes the response; other modes always return `false`.
    pub fn track_event<P: Serialize + ?Sized>(&self, event: &str, properties: &P) -> Result<bool> {
        let mut properties = match serde_json::to_value(properties)? {
            Value::Object(properties) => properties,
            Value::Null => Properties::new(),
            _ => return Err(Error::InvalidProperties),
        };
        properties.insert("token".to_owned(), self.token.clone().into());
        properties.insert("time".to_owned(), Utc::now().timestamp().into());
        properties.insert("ip".to_owned(), self.ip().into());

        let payload = EventPayload {
            event: event.to_owned(),
            properties,
        };
        let url = track_url(&self.base_url, &encode_payload(&payload)?);

        log::debug!(target: "mixpanel", event; "tracking event");
        let response = self.delivery.deliver(&url)?;

        Ok(parse_response(response.as_deref()))
    }

    /// Address of the client, or an empty string if unknown.
    pub fn ip(&self) -> &str {
        self.context.remote_addr.as_deref().unwrap_or("")
    }

    pub fn queue(&self) -> &EventQueue {
        &self.context.events
    }

    pub fn clear_queue(&mut self) {
        self.context.events.clear();
    }

    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }
}

fn parse_response(response: Option<&str>) -> bool {
    response == Some("1")
}
