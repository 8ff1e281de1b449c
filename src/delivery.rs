use std::sync::Arc;

use crate::{DelegateError, HttpTransport, Result, WorkerSupervisor};

/// Custom delivery mechanism, e.g. handing URLs to a background job queue.
///
/// Closures taking the URL implement this trait:
///
/// ```
/// # use mixpanel::{Delegate, DelegateError};
/// let delegate = |url: &str| -> Result<(), DelegateError> {
///     println!("enqueue {url}");
///     Ok(())
/// };
/// delegate.perform("http://api.mixpanel.com/track/?data=e30=").unwrap();
/// ```
pub trait Delegate {
    /// Deliver the fully encoded collector URL.
    fn perform(&self, url: &str) -> std::result::Result<(), DelegateError>;
}

impl<T: Fn(&str) -> std::result::Result<(), DelegateError>> Delegate for T {
    fn perform(&self, url: &str) -> std::result::Result<(), DelegateError> {
        self(url)
    }
}

/// How encoded events reach the collector.
#[derive(Clone)]
pub enum Delivery {
    /// Blocking GET on the calling thread. The only mode that observes the collector's response.
    Synchronous(HttpTransport),
    /// Write the URL to the shared worker subprocess.
    WorkerProcess(Arc<WorkerSupervisor>),
    /// Pass the URL to a custom delegate.
    Delegate(Arc<dyn Delegate + Send + Sync>),
}

impl Delivery {
    pub fn synchronous() -> Self {
        Delivery::Synchronous(HttpTransport::new())
    }

    pub fn worker_process(supervisor: Arc<WorkerSupervisor>) -> Self {
        Delivery::WorkerProcess(supervisor)
    }

    pub fn delegate(delegate: impl Delegate + Send + Sync + 'static) -> Self {
        Delivery::Delegate(Arc::new(delegate))
    }

    /// Deliver `url`, returning the response body in synchronous mode and `None` otherwise.
    pub fn deliver(&self, url: &str) -> Result<Option<String>> {
        match self {
            Delivery::Synchronous(transport) => {
                log::trace!(target: "mixpanel", "sending event synchronously");
                transport.get(url).map(Some)
            }
            Delivery::WorkerProcess(supervisor) => {
                log::trace!(target: "mixpanel", "sending event to worker");
                supervisor.send(url).map(|()| None)
            }
            Delivery::Delegate(delegate) => {
                log::trace!(target: "mixpanel", "sending event to delegate");
                delegate.perform(url)?;
                Ok(None)
            }
        }
    }
}

impl Default for Delivery {
    fn default() -> Self {
        Delivery::synchronous()
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Synchronous(_) => f.write_str("Synchronous"),
            Delivery::WorkerProcess(supervisor) => {
                f.debug_tuple("WorkerProcess").field(supervisor).finish()
            }
            Delivery::Delegate(_) => f.write_str("Delegate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::{test_util::Collector, Error};

    use super::*;

    #[test]
    fn synchronous_returns_body() {
        let collector = Collector::start(&["0"]);

        let response = Delivery::synchronous()
            .deliver(&format!("{}/track/?data=e30=", collector.base_url()))
            .unwrap();

        assert_eq!(response.as_deref(), Some("0"));
        assert_eq!(collector.requests().len(), 1);
    }

    #[test]
    fn delegate_receives_url() {
        let urls = Arc::new(Mutex::new(Vec::new()));
        let delivery = {
            let urls = Arc::clone(&urls);
            Delivery::delegate(move |url: &str| -> std::result::Result<(), DelegateError> {
                urls.lock().unwrap().push(url.to_owned());
                Ok(())
            })
        };

        let response = delivery.deliver("http://api.mixpanel.com/track/?data=e30=").unwrap();

        assert_eq!(response, None);
        assert_eq!(
            *urls.lock().unwrap(),
            vec!["http://api.mixpanel.com/track/?data=e30="]
        );
    }

    #[test]
    fn delegate_errors_propagate() {
        let delivery = Delivery::delegate(|_: &str| -> std::result::Result<(), DelegateError> {
            Err("queue is full".into())
        });

        let err = delivery.deliver("http://api.mixpanel.com/").unwrap_err();

        assert!(matches!(err, Error::Delegate(_)));
    }
}
