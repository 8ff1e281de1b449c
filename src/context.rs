use std::collections::HashMap;

use crate::EventQueue;

/// Request-scoped state the tracker reads from and writes to.
///
/// One context is created per inbound request. The tracker reads the client address from it and
/// records deferred calls into [`RequestContext::events`], which the surrounding request handler
/// flushes once the response is ready.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Address of the client that issued the request.
    pub remote_addr: Option<String>,
    /// Calls recorded with `append_event` / `append_api`.
    pub events: EventQueue,
}

impl RequestContext {
    /// Environment key holding the client address.
    pub const REMOTE_ADDR: &'static str = "REMOTE_ADDR";

    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context for a client at `remote_addr`.
    pub fn with_remote_addr(remote_addr: impl Into<String>) -> Self {
        Self {
            remote_addr: Some(remote_addr.into()),
            events: EventQueue::new(),
        }
    }

    /// Build a context from a CGI-style request environment.
    ///
    /// ```
    /// # use std::collections::HashMap;
    /// # use mixpanel::RequestContext;
    /// let env = HashMap::from([("REMOTE_ADDR".to_owned(), "10.0.0.1".to_owned())]);
    /// let context = RequestContext::from_env(&env);
    /// assert_eq!(context.remote_addr.as_deref(), Some("10.0.0.1"));
    /// ```
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        Self {
            remote_addr: env.get(Self::REMOTE_ADDR).cloned(),
            events: EventQueue::new(),
        }
    }
}
