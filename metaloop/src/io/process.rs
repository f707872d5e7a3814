//! Child process runner with a wall-clock limit.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// How long pipe readers may keep running once the child is gone.
const PIPE_GRACE: Duration = Duration::from_millis(500);
const PIPE_POLL: Duration = Duration::from_millis(10);

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Status(ExitStatus),
    /// Killed after exceeding the limit.
    TimedOut,
}

/// Output captured from a finished or killed child, lossily decoded.
#[derive(Debug)]
pub struct ProcessCapture {
    pub exit: ChildExit,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessCapture {
    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Spawn `cmd` with stdin closed and both output pipes drained on reader
/// threads, killing it once `limit` elapses.
///
/// On unix the child leads its own process group and the whole group is
/// killed, so grandchildren do not outlive the limit. Pipes still held open
/// by an escaped descendant are abandoned shortly after the limit, keeping
/// whatever was read. Output written before a kill is kept. Only spawn and
/// wait failures are errors.
#[instrument(skip_all, fields(limit_secs = limit.as_secs()))]
pub fn run_with_timeout(mut cmd: Command, limit: Duration) -> Result<ProcessCapture> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

    let started = Instant::now();
    let mut child = cmd.spawn().context("spawn command")?;
    debug!(pid = child.id(), "child spawned");

    let stdout = PipeReader::spawn(child.stdout.take());
    let stderr = PipeReader::spawn(child.stderr.take());

    let exit = match child.wait_timeout(limit).context("wait for child")? {
        Some(status) => ChildExit::Status(status),
        None => {
            warn!(limit_secs = limit.as_secs(), "child exceeded time limit, killing");
            kill_tree(&mut child)?;
            child.wait().context("reap killed child")?;
            ChildExit::TimedOut
        }
    };

    let drain_by = (started + limit).max(Instant::now()) + PIPE_GRACE;
    let capture = ProcessCapture {
        exit,
        stdout: stdout.finish(drain_by).context("read stdout")?,
        stderr: stderr.finish(drain_by).context("read stderr")?,
    };
    debug!(exit = ?capture.exit, "child finished");
    Ok(capture)
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) -> Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).context("child pid out of range")?;
    if let Err(errno) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!(%errno, "process group kill failed, killing child only");
        child.kill().context("kill child")?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill child")
}

/// Reader thread appending into a shared buffer, so a partial read survives
/// a reader that never reaches EOF.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let Some(mut pipe) = pipe else {
                return Ok(());
            };
            let mut chunk = [0u8; 8192];
            loop {
                let n = pipe.read(&mut chunk)?;
                if n == 0 {
                    return Ok(());
                }
                if let Ok(mut buf) = sink.lock() {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
        });
        Self { buf, handle }
    }

    fn finish(self, deadline: Instant) -> Result<String> {
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(PIPE_POLL);
        }
        if self.handle.is_finished() {
            self.handle
                .join()
                .map_err(|_| anyhow!("pipe reader panicked"))??;
        } else {
            warn!("output pipe still held open after child exit, keeping partial output");
        }
        let bytes = self
            .buf
            .lock()
            .map_err(|_| anyhow!("pipe buffer poisoned"))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
