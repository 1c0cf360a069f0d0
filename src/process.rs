//! The one seam through which the scheduler talks to external programs.
//!
//! The oracle client and the mutation worker describe what they want run as an
//! [`Invocation`]; a [`CommandRunner`] decides how. [`SystemRunner`] spawns real
//! OS processes; tests provide scripted runners instead.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Where the child's standard output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// Collected into [`ProcessOutput::stdout`].
    Capture,
    /// Streamed into the file at this path (truncated first).
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// File connected to the child's standard input.
    pub stdin: Option<PathBuf>,
    pub stdout: OutputSink,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            stdout: OutputSink::Capture,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = OutputSink::File(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process ran to completion. `None` means it was ended by a signal.
    Exited(Option<i32>),
    /// The timeout elapsed; the process was killed and reaped.
    TimedOut(Duration),
}

impl Termination {
    pub fn success(&self) -> bool {
        matches!(self, Termination::Exited(Some(0)))
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        Termination::Exited(status.code())
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub termination: Termination,
    /// Empty unless the invocation used [`OutputSink::Capture`].
    pub stdout: Vec<u8>,
}

/// Runs external programs on behalf of the scheduler.
///
/// `Err` means the process could not be started at all; anything that
/// happens after a successful start is reported through [`ProcessOutput`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput>;
}

/// Spawns real child processes.
///
/// On unix each child gets its own process group, so an interactive Ctrl-C
/// reaches the scheduler only and in-flight children run to completion. The
/// same group is what a timeout kills.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(invocation: &Invocation) -> std::io::Result<Command> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);

        cmd.stdin(match &invocation.stdin {
            Some(path) => Stdio::from(File::open(path)?),
            None => Stdio::null(),
        });
        cmd.stdout(match &invocation.stdout {
            OutputSink::Capture => Stdio::piped(),
            OutputSink::File(path) => Stdio::from(File::create(path)?),
        });
        cmd.stderr(Stdio::inherit());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        Ok(cmd)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput> {
        let mut child = Self::command(invocation)?.spawn()?;
        debug!(
            "spawned {} (pid {}) {:?}",
            invocation.program,
            child.id(),
            invocation.args
        );

        // Drain the pipe on its own thread so a chatty child can't block on a
        // full pipe while we poll for exit.
        let reader = child.stdout.take().map(|mut out| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                out.read_to_end(&mut buf).map(|_| buf)
            })
        });

        let termination = match invocation.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit)?,
            None => child.wait()?.into(),
        };

        let stdout = match reader {
            Some(handle) => handle
                .join()
                .map_err(|_| std::io::Error::other("stdout reader thread panicked"))??,
            None => Vec::new(),
        };

        Ok(ProcessOutput {
            termination,
            stdout,
        })
    }
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> std::io::Result<Termination> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status.into());
        }
        if start.elapsed() >= limit {
            warn!("pid {} exceeded {:?}; killing its process group", child.id(), limit);
            kill_tree(child);
            child.wait()?;
            return Ok(Termination::TimedOut(limit));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills the child together with everything it started.
///
/// The child leads its own process group (see [`SystemRunner`]), so one
/// `killpg` reaches grandchildren that would otherwise keep running and keep
/// the stdout pipe open.
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: plain syscall; the group leader is our unreaped child.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "killpg({}) failed: {}; killing the child only",
            pgid,
            std::io::Error::last_os_error()
        );
        // The child may exit between try_wait and kill; that is fine.
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}
