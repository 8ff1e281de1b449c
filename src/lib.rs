//! Mixpanel event tracking for Rust web applications.
//!
//! # Overview
//!
//! A [`Tracker`] is created for every inbound request from a shared [`TrackerConfig`]. It can
//! queue calls on the request's [`RequestContext`] (to be rendered into the response page by the
//! request handler, see [`EventQueue::to_javascript`]) or send events straight to the Mixpanel
//! collector.
//!
//! Events sent with [`Tracker::track_event`] go through one of the [`Delivery`] strategies:
//!
//! - [`Delivery::Synchronous`] issues a blocking request on the calling thread.
//! - [`Delivery::WorkerProcess`] writes the request URL to a long-lived `mixpanel-worker`
//!   subprocess managed by a [`WorkerSupervisor`], keeping network latency off request threads.
//! - [`Delivery::Delegate`] hands the URL to your own [`Delegate`], e.g. a job queue.
//!
//! Delivery is best-effort: there are no retries, and events written to a worker whose pipe is
//! broken are dropped.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. Tracking is rarely critical enough to fail a
//! request, so most applications log and ignore them.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages under
//! the `mixpanel` target. The `mixpanel-worker` binary logs through `env_logger`; set `RUST_LOG`
//! to control it.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod config;
mod context;
mod delivery;
pub mod encoder;
mod error;
mod queue;
mod tracker;
pub mod transport;
mod worker;

#[cfg(test)]
mod test_util;

pub use config::TrackerConfig;
pub use context::RequestContext;
pub use delivery::{Delegate, Delivery};
pub use error::{DelegateError, Error, Result};
pub use queue::{EventQueue, QueuedCall};
pub use tracker::Tracker;
pub use transport::HttpTransport;
pub use worker::{WorkerCommand, WorkerHandle, WorkerSupervisor};

/// Event properties.
pub type Properties = serde_json::Map<String, serde_json::Value>;
