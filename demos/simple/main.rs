use std::sync::Arc;

use mixpanel::{RequestContext, TrackerConfig, WorkerSupervisor};
use serde_json::json;

pub fn main() -> mixpanel::Result<()> {
    env_logger::init();

    let token = std::env::var("MIXPANEL_TOKEN").unwrap();

    // One supervisor per process, shared by every request.
    let supervisor = Arc::new(WorkerSupervisor::with_default_command()?);
    let config = TrackerConfig::from_token(token).worker_process(Arc::clone(&supervisor));

    // Per request.
    let mut context = RequestContext::with_remote_addr("127.0.0.1");
    let mut tracker = config.tracker(&mut context);

    tracker.track_event("Demo Started", &json!({"source": "demo"}))?;
    tracker.append_event("Page Viewed", &json!({"page": "/"}))?;

    println!("{}", context.events.to_javascript());

    // Wait for the worker to deliver queued events.
    supervisor.shutdown();
    Ok(())
}
