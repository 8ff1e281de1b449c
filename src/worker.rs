//! Supervision of the long-lived delivery subprocess.
//!
//! The worker is a separate OS process that reads newline-terminated URLs from its standard input
//! and delivers them itself, so request threads only pay for a pipe write. The supervisor keeps at
//! most one worker alive, starting it on first use and discarding it as soon as a write to its
//! pipe fails. The next send starts a fresh one.
use std::{
    ffi::OsString,
    io::{self, Write},
    path::PathBuf,
    process::{Child, ChildStdin, Command, Stdio},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use crate::{Error, Result};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Command line used to start the worker subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    /// Name of the worker executable shipped with this crate.
    pub const BINARY_NAME: &'static str = "mixpanel-worker";

    /// Environment variable overriding the worker executable path.
    pub const PATH_ENV: &'static str = "MIXPANEL_WORKER";

    pub fn new(program: impl Into<PathBuf>) -> Self {
        WorkerCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Locate the `mixpanel-worker` executable.
    ///
    /// `MIXPANEL_WORKER` takes precedence. Otherwise the worker is expected next to the current
    /// executable, or one directory up (where cargo places binaries relative to test and example
    /// executables).
    pub fn resolve_default() -> Result<Self> {
        if let Some(path) = std::env::var_os(Self::PATH_ENV) {
            return Ok(WorkerCommand::new(path));
        }

        let current_exe = std::env::current_exe().map_err(|err| Error::WorkerSpawn(Arc::new(err)))?;
        let file_name = format!("{}{}", Self::BINARY_NAME, std::env::consts::EXE_SUFFIX);

        current_exe
            .ancestors()
            .skip(1)
            .take(2)
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
            .map(WorkerCommand::new)
            .ok_or_else(|| {
                Error::WorkerSpawn(Arc::new(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} executable not found", Self::BINARY_NAME),
                )))
            })
    }

    fn spawn(&self) -> io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
    }
}

/// A running worker subprocess.
///
/// Handles are compared by [`WorkerHandle::id`], which is unique within the process.
pub struct WorkerHandle {
    id: u64,
    pid: u32,
    /// `None` once the handle has been closed.
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Child>,
}

impl WorkerHandle {
    fn spawn(command: &WorkerCommand) -> Result<WorkerHandle> {
        let mut child = command
            .spawn()
            .map_err(|err| Error::WorkerSpawn(Arc::new(err)))?;
        let stdin = child.stdin.take();

        Ok(WorkerHandle {
            id: NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed),
            pid: child.id(),
            stdin: Mutex::new(stdin),
            child: Mutex::new(child),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// OS process id of the worker.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.stdin).is_none()
    }

    /// Write `url` followed by a newline as a single write.
    ///
    /// Writing to a closed handle fails with [`io::ErrorKind::BrokenPipe`].
    pub fn write_line(&self, url: &str) -> io::Result<()> {
        let mut line = String::with_capacity(url.len() + 1);
        line.push_str(url);
        line.push('\n');

        let mut stdin = lock(&self.stdin);
        let pipe = stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "worker pipe is closed"))?;
        pipe.write_all(line.as_bytes())?;
        pipe.flush()
    }

    /// Close the pipe and reap the process. The worker exits after draining its input.
    fn close(&self) {
        // Dropping stdin closes our end of the pipe.
        drop(lock(&self.stdin).take());

        match lock(&self.child).wait() {
            Ok(status) => {
                log::debug!(target: "mixpanel", worker_id = self.id, pid = self.pid; "worker exited with {}", status);
            }
            Err(err) => {
                log::warn!(target: "mixpanel", worker_id = self.id, pid = self.pid; "failed to wait for worker: {}", err);
            }
        }
    }

    #[cfg(test)]
    fn kill(&self) {
        let mut child = lock(&self.child);
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum WorkerState {
    Idle,
    Active(Arc<WorkerHandle>),
}

/// Owner of the shared worker subprocess.
///
/// Create one supervisor at startup and share it between trackers with an [`Arc`]. All state
/// transitions (start, dispose, shutdown) happen under a single lock, so concurrent senders never
/// observe more than one live worker.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use mixpanel::{WorkerCommand, WorkerSupervisor};
/// let supervisor = Arc::new(WorkerSupervisor::new(WorkerCommand::new("/usr/local/bin/mixpanel-worker")));
/// supervisor.send("http://api.mixpanel.com/track/?data=e30=")?;
/// # Ok::<(), mixpanel::Error>(())
/// ```
#[derive(Debug)]
pub struct WorkerSupervisor {
    command: WorkerCommand,
    state: Mutex<WorkerState>,
    spawned: AtomicUsize,
}

impl WorkerSupervisor {
    pub fn new(command: WorkerCommand) -> Self {
        WorkerSupervisor {
            command,
            state: Mutex::new(WorkerState::Idle),
            spawned: AtomicUsize::new(0),
        }
    }

    /// Create a supervisor for the `mixpanel-worker` executable, see
    /// [`WorkerCommand::resolve_default`].
    pub fn with_default_command() -> Result<Self> {
        Ok(Self::new(WorkerCommand::resolve_default()?))
    }

    /// Return the live worker, starting one if there is none.
    pub fn acquire(&self) -> Result<Arc<WorkerHandle>> {
        let mut state = self.lock_state();

        if let WorkerState::Active(handle) = &*state {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(WorkerHandle::spawn(&self.command)?);
        self.spawned.fetch_add(1, Ordering::Relaxed);
        log::debug!(target: "mixpanel", worker_id = handle.id, pid = handle.pid; "started worker");

        *state = WorkerState::Active(Arc::clone(&handle));
        Ok(handle)
    }

    /// Discard `handle` if it is still the live worker.
    ///
    /// Returns `false` when another thread has already replaced or disposed it, in which case the
    /// live worker is left untouched.
    pub fn dispose(&self, handle: &Arc<WorkerHandle>) -> bool {
        let mut state = self.lock_state();

        let is_current =
            matches!(&*state, WorkerState::Active(current) if Arc::ptr_eq(current, handle));
        if !is_current {
            return false;
        }

        *state = WorkerState::Idle;
        log::debug!(target: "mixpanel", worker_id = handle.id; "disposing worker");
        handle.close();
        true
    }

    /// Hand `url` to the worker.
    ///
    /// If the write fails the worker is disposed and the event is dropped. A broken pipe is not
    /// reported to the caller; any other write error is.
    pub fn send(&self, url: &str) -> Result<()> {
        let handle = self.acquire()?;

        match handle.write_line(url) {
            Ok(()) => Ok(()),
            Err(err) => {
                log::warn!(target: "mixpanel", worker_id = handle.id; "failed to write to worker, dropping event: {}", err);
                self.dispose(&handle);
                if err.kind() == io::ErrorKind::BrokenPipe {
                    Ok(())
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// The live worker, if any.
    pub fn current(&self) -> Option<Arc<WorkerHandle>> {
        match &*self.lock_state() {
            WorkerState::Active(handle) => Some(Arc::clone(handle)),
            WorkerState::Idle => None,
        }
    }

    /// Number of workers started by this supervisor.
    pub fn spawned_count(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Close the live worker, waiting for it to drain its input and exit.
    pub fn shutdown(&self) {
        let mut state = self.lock_state();
        if let WorkerState::Active(handle) = std::mem::replace(&mut *state, WorkerState::Idle) {
            log::debug!(target: "mixpanel", worker_id = handle.id; "shutting down worker");
            handle.close();
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        lock(&self.state)
    }
}

impl Drop for WorkerSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// A panic while holding one of these locks cannot leave the guarded value half-updated, so a
// poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;

    fn cat_supervisor() -> WorkerSupervisor {
        WorkerSupervisor::new(WorkerCommand::new("cat"))
    }

    #[test]
    fn starts_worker_lazily() {
        let supervisor = cat_supervisor();

        assert!(supervisor.current().is_none());
        assert_eq!(supervisor.spawned_count(), 0);

        let handle = supervisor.acquire().unwrap();

        assert_eq!(supervisor.current().unwrap().id(), handle.id());
        assert_eq!(supervisor.spawned_count(), 1);
    }

    #[test]
    fn sequential_sends_reuse_worker() {
        let supervisor = cat_supervisor();

        supervisor.send("http://localhost/track/?data=a").unwrap();
        let first = supervisor.current().unwrap();
        supervisor.send("http://localhost/track/?data=b").unwrap();
        let second = supervisor.current().unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(supervisor.spawned_count(), 1);
    }

    #[test]
    fn broken_pipe_disposes_worker_and_next_send_respawns() {
        let supervisor = cat_supervisor();
        let first = supervisor.acquire().unwrap();
        first.kill();

        // The event is dropped silently.
        supervisor.send("http://localhost/track/?data=a").unwrap();

        assert!(supervisor.current().is_none());
        assert!(first.is_closed());

        supervisor.send("http://localhost/track/?data=b").unwrap();
        let second = supervisor.current().unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(supervisor.spawned_count(), 2);
    }

    #[test]
    fn disposing_stale_handle_keeps_live_worker() {
        let supervisor = cat_supervisor();
        let first = supervisor.acquire().unwrap();
        assert!(supervisor.dispose(&first));

        let second = supervisor.acquire().unwrap();

        assert!(!supervisor.dispose(&first));
        assert_eq!(supervisor.current().unwrap().id(), second.id());
        assert!(!second.is_closed());
    }

    #[test]
    fn writing_to_closed_handle_is_broken_pipe() {
        let supervisor = cat_supervisor();
        let handle = supervisor.acquire().unwrap();
        supervisor.shutdown();

        let err = handle.write_line("http://localhost/").unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(supervisor.current().is_none());
    }

    #[test]
    fn spawn_failure_is_reported() {
        let supervisor =
            WorkerSupervisor::new(WorkerCommand::new("/nonexistent/mixpanel-worker"));

        let err = supervisor.send("http://localhost/").unwrap_err();

        assert!(matches!(err, Error::WorkerSpawn(_)));
        assert!(supervisor.current().is_none());
    }

    #[test]
    fn concurrent_senders_share_one_worker() {
        let supervisor = Arc::new(cat_supervisor());

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let supervisor = Arc::clone(&supervisor);
                std::thread::spawn(move || {
                    let mut seen = HashSet::new();
                    for j in 0..25 {
                        supervisor
                            .send(&format!("http://localhost/track/?data={i}-{j}"))
                            .unwrap();
                        if let Some(handle) = supervisor.current() {
                            seen.insert(handle.id());
                        }
                    }
                    seen
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for thread in threads {
            seen.extend(thread.join().unwrap());
        }

        assert_eq!(seen.len(), 1);
        assert_eq!(supervisor.spawned_count(), 1);
    }

    #[test]
    fn worker_receives_lines_in_order() {
        let output = tempfile::NamedTempFile::new().unwrap();
        let supervisor = WorkerSupervisor::new(
            WorkerCommand::new("sh")
                .args(["-c", "cat > \"$0\""])
                .arg(output.path()),
        );

        for data in ["a", "b", "c"] {
            supervisor
                .send(&format!("http://localhost/track/?data={data}"))
                .unwrap();
        }
        supervisor.shutdown();

        let written = std::fs::read_to_string(output.path()).unwrap();
        assert_eq!(
            written,
            "http://localhost/track/?data=a\nhttp://localhost/track/?data=b\nhttp://localhost/track/?data=c\n"
        );
    }

    #[test]
    fn resolves_worker_from_environment() {
        std::env::set_var(WorkerCommand::PATH_ENV, "/opt/mixpanel/bin/mixpanel-worker");
        let command = WorkerCommand::resolve_default();
        std::env::remove_var(WorkerCommand::PATH_ENV);

        assert_eq!(
            command.unwrap(),
            WorkerCommand::new("/opt/mixpanel/bin/mixpanel-worker")
        );
    }
}
