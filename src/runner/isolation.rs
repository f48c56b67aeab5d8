//! Isolated check execution.
//!
//! With process isolation each check runs in a forked child that reports
//! its outcome over a pipe. The child leads its own process group, so
//! anything it spawns (executable plugins) is killed along with it when the
//! timeout expires. The parent reaps the child either way. Without
//! isolation the check runs in the current process and only panics are
//! contained.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::check::{Check, Summary};
use crate::shell::{self, SHARED_MEMORY_DIR};

/// How checks are isolated from the runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationMode {
    /// Fork when the host supports it, otherwise run in-process.
    #[default]
    Auto,
    /// Always fork.
    Process,
    /// Never fork.
    None,
}

impl FromStr for IsolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(IsolationMode::Auto),
            "process" => Ok(IsolationMode::Process),
            "none" => Ok(IsolationMode::None),
            other => Err(format!(
                "unknown isolation mode '{}' (expected auto, process or none)",
                other
            )),
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationMode::Auto => "auto",
            IsolationMode::Process => "process",
            IsolationMode::None => "none",
        };
        f.write_str(s)
    }
}

/// What became of one check run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Summary),
    TimedOut,
    Crashed,
    Failed(String),
}

impl RunOutcome {
    /// The summary recorded for `check`; anything but completion is ERROR.
    pub fn into_summary(self, check: &str) -> Summary {
        match self {
            RunOutcome::Completed(summary) => summary,
            RunOutcome::TimedOut => Summary::timed_out(check),
            RunOutcome::Crashed => Summary::crashed(check),
            RunOutcome::Failed(message) => Summary::failed(check, &message),
        }
    }
}

/// Message a worker sends back to the runner.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WorkerMessage {
    Summary { document: Value },
    Failure { message: String },
}

/// Runs checks with the configured isolation.
#[derive(Debug, Clone)]
pub struct Executor {
    isolated: bool,
}

impl Executor {
    /// Resolve `mode` against the host's shared-memory directory.
    pub fn new(mode: IsolationMode) -> Self {
        Self::with_shared_memory_dir(mode, Path::new(SHARED_MEMORY_DIR))
    }

    /// Resolve `mode`, probing `shm_dir` instead of the system directory.
    pub fn with_shared_memory_dir(mode: IsolationMode, shm_dir: &Path) -> Self {
        let isolated = match mode {
            IsolationMode::None => false,
            IsolationMode::Process => cfg!(unix),
            IsolationMode::Auto => {
                let usable = cfg!(unix) && shell::shared_memory_usable(shm_dir);
                if !usable {
                    warn!(
                        "{} is not a writable shared-memory directory; checks will run in-process without timeouts",
                        shm_dir.display()
                    );
                }
                usable
            }
        };
        if mode == IsolationMode::Process && !isolated {
            warn!("Process isolation is not available on this platform; checks will run in-process");
        }
        Self { isolated }
    }

    /// Executor that never forks.
    pub fn in_process() -> Self {
        Self { isolated: false }
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// Run `check` with `inputs`.
    pub fn execute(&self, check: &Check, inputs: &Map<String, Value>) -> RunOutcome {
        #[cfg(unix)]
        if self.isolated {
            return run_forked(check, inputs);
        }
        run_in_process(check, inputs)
    }
}

fn run_in_process(check: &Check, inputs: &Map<String, Value>) -> RunOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| check.run(inputs))) {
        Ok(Ok(summary)) => RunOutcome::Completed(summary),
        Ok(Err(e)) => RunOutcome::Failed(e.to_string()),
        Err(_) => RunOutcome::Crashed,
    }
}

fn worker_message(check: &Check, inputs: &Map<String, Value>) -> Option<WorkerMessage> {
    match panic::catch_unwind(AssertUnwindSafe(|| check.run(inputs))) {
        Ok(Ok(summary)) => Some(WorkerMessage::Summary {
            document: summary.to_document(),
        }),
        Ok(Err(e)) => Some(WorkerMessage::Failure {
            message: e.to_string(),
        }),
        Err(_) => None,
    }
}

fn decode_message(bytes: &[u8]) -> RunOutcome {
    if bytes.is_empty() {
        return RunOutcome::Crashed;
    }
    match serde_json::from_slice::<WorkerMessage>(bytes) {
        Ok(WorkerMessage::Summary { document }) => match Summary::from_document(&document) {
            Ok(summary) => RunOutcome::Completed(summary),
            Err(e) => RunOutcome::Failed(e.to_string()),
        },
        Ok(WorkerMessage::Failure { message }) => RunOutcome::Failed(message),
        Err(_) => RunOutcome::Crashed,
    }
}

#[cfg(unix)]
static FORK_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(unix)]
fn run_forked(check: &Check, inputs: &Map<String, Value>) -> RunOutcome {
    use std::fs::File;
    use std::io::Write;
    use std::os::unix::io::FromRawFd;

    // Held until the parent has closed its write end, so no other worker
    // inherits it and keeps the pipe open past its own exit.
    let spawn_guard = FORK_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let mut fds = [0 as libc::c_int; 2];
    // SAFETY: fds is a valid array of two descriptors
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return RunOutcome::Failed(format!(
            "cannot create pipe: {}",
            std::io::Error::last_os_error()
        ));
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);
    for fd in fds {
        // SAFETY: fd is an open descriptor returned by pipe()
        unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) };
    }

    // SAFETY: the child only runs the check, writes to its pipe and exits
    let pid = unsafe { libc::fork() };
    match pid {
        -1 => {
            // SAFETY: both descriptors came from pipe() above
            unsafe {
                libc::close(read_fd);
                libc::close(write_fd);
            }
            RunOutcome::Failed(format!(
                "cannot fork: {}",
                std::io::Error::last_os_error()
            ))
        }
        0 => {
            // SAFETY: read_fd belongs to this process after fork
            unsafe {
                libc::setpgid(0, 0);
                libc::close(read_fd);
            }
            if let Some(message) = worker_message(check, inputs) {
                // SAFETY: write_fd is open and owned solely by this File
                let mut pipe = unsafe { File::from_raw_fd(write_fd) };
                if serde_json::to_writer(&mut pipe, &message).is_ok() {
                    let _ = pipe.flush();
                }
            }
            // SAFETY: terminate the child without running the parent's exit handlers
            unsafe { libc::_exit(0) }
        }
        child => {
            // Also set from the parent so the group exists before any kill.
            // SAFETY: child is our unreaped child; write_fd belongs to it now
            unsafe {
                libc::setpgid(child, child);
                libc::close(write_fd);
            }
            drop(spawn_guard);
            // SAFETY: read_fd is open and owned solely by this File
            let pipe = unsafe { File::from_raw_fd(read_fd) };
            wait_for_worker(pipe, child, check.name(), check.metadata().timeout())
        }
    }
}

#[cfg(unix)]
fn wait_for_worker(
    mut pipe: std::fs::File,
    child: libc::pid_t,
    name: &str,
    timeout: std::time::Duration,
) -> RunOutcome {
    use std::io::{ErrorKind, Read};
    use std::os::unix::io::AsRawFd;
    use std::time::Instant;

    // A timeout past the end of the clock means no deadline.
    let deadline = Instant::now().checked_add(timeout);
    let mut received = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let wait_ms = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    debug!("Check '{}' exceeded its timeout of {:?}", name, timeout);
                    kill_and_reap(child);
                    return RunOutcome::TimedOut;
                }
                remaining.as_millis().min(libc::c_int::MAX as u128) as libc::c_int
            }
            None => -1,
        };

        let mut poll_fd = libc::pollfd {
            fd: pipe.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: poll_fd is a single valid pollfd
        let ready = unsafe { libc::poll(&mut poll_fd, 1, wait_ms) };
        if ready < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            kill_and_reap(child);
            return RunOutcome::Failed(format!("cannot wait for check: {}", err));
        }
        if ready == 0 {
            continue;
        }

        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                kill_and_reap(child);
                return RunOutcome::Failed(format!("cannot read check output: {}", e));
            }
        }
    }

    reap(child);
    decode_message(&received)
}

#[cfg(unix)]
fn kill_and_reap(child: libc::pid_t) {
    // SAFETY: child is a process this runner forked and has not reaped; it
    // leads a process group of its own
    unsafe {
        if libc::kill(-child, libc::SIGKILL) != 0 {
            libc::kill(child, libc::SIGKILL);
        }
    }
    reap(child);
}

#[cfg(unix)]
fn reap(child: libc::pid_t) {
    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: status is a valid out-pointer
        let rc = unsafe { libc::waitpid(child, &mut status, 0) };
        if rc >= 0 || std::io::Error::last_os_error().kind() != std::io::ErrorKind::Interrupted {
            break;
        }
    }
}
