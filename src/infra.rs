//! Infrastructure traits for abstracting I/O operations.
//!
//! This module provides trait abstractions for filesystem and process execution,
//! so the run executor, orchestrator and comparator can be tested without a
//! device, a build system or a profiler.

use std::fs::Metadata;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

/// How often a supervised process is polled for exit, timeout and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Trait for abstracting filesystem operations.
pub trait FileSystem {
    /// Create a directory and all missing parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Get metadata for a file or directory.
    fn metadata(&self, path: &Path) -> io::Result<Metadata>;

    /// Read the entire contents of a file into a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write a slice of bytes to a file, replacing any previous contents.
    fn write(&self, path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()>;

    /// Write a slice of bytes to a file that must not exist yet.
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] instead of overwriting.
    fn write_new(&self, path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()>;

    /// Resolve a path to its absolute, symlink-free form.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Whether something exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }
}

/// Real filesystem implementation that delegates to std::fs.
#[derive(Debug, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        std::fs::metadata(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn write_new(&self, path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(contents.as_ref())?;
        file.sync_all()
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }
}

/// Shared flag used to request cancellation of in-flight work.
///
/// Clones observe the same flag, so a signal handler can hold one clone while
/// the orchestrator and executor poll another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// Returns `false` if the sleep was interrupted by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

/// Outcome of waiting on an external process under a deadline.
#[derive(Debug)]
pub enum Supervised {
    /// The process exited on its own; output and status are captured
    Exited(Output),
    /// The deadline passed and the process was killed
    TimedOut {
        /// Time spent waiting before the kill
        elapsed: Duration,
    },
    /// Cancellation was requested and the process was killed
    Cancelled,
}

/// A long-running process started alongside a run (e.g. a profiler).
pub trait AttachedProcess: Send {
    /// OS process id, for diagnostics
    fn id(&self) -> u32;

    /// Non-blocking check whether the process already exited.
    fn try_finished(&mut self) -> io::Result<Option<ExitStatus>>;

    /// Wait for the process to exit, killing it on timeout or cancellation.
    fn wait_finished(&mut self, timeout: Duration, cancel: &CancelToken)
        -> io::Result<Supervised>;

    /// Kill the process if it is still running.
    fn kill(&mut self) -> io::Result<()>;
}

/// Trait for abstracting command execution.
pub trait CommandExecutor {
    /// Execute a command to completion and return its output.
    fn output(&self, cmd: &mut Command) -> io::Result<Output>;

    /// Execute a command, killing it if it outlives `timeout` or `cancel` fires.
    fn supervise(
        &self,
        cmd: &mut Command,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> io::Result<Supervised>;

    /// Start a command in the background and hand back a handle to it.
    fn spawn_attached(&self, cmd: &mut Command) -> io::Result<Box<dyn AttachedProcess>>;

    /// Execute a command built with a closure and return its output.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mobperf::infra::{CommandExecutor, RealCommandExecutor};
    ///
    /// let executor = RealCommandExecutor;
    /// let output = executor.execute(|cmd| cmd.arg("version"), "adb")?;
    /// # Ok::<(), std::io::Error>(())
    /// ```
    fn execute<F>(&self, builder: F, program: &str) -> io::Result<Output>
    where
        F: FnOnce(&mut Command) -> &mut Command,
    {
        let mut cmd = Command::new(program);
        builder(&mut cmd);
        self.output(&mut cmd)
    }
}

/// Real command executor that delegates to std::process::Command.
#[derive(Debug, Clone, Copy)]
pub struct RealCommandExecutor;

impl CommandExecutor for RealCommandExecutor {
    fn output(&self, cmd: &mut Command) -> io::Result<Output> {
        cmd.output()
    }

    fn supervise(
        &self,
        cmd: &mut Command,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> io::Result<Supervised> {
        let mut child = SupervisedChild::spawn(cmd)?;
        child.wait_finished(timeout, cancel)
    }

    fn spawn_attached(&self, cmd: &mut Command) -> io::Result<Box<dyn AttachedProcess>> {
        Ok(Box::new(SupervisedChild::spawn(cmd)?))
    }
}

/// A spawned child whose stdout/stderr are drained on background threads.
struct SupervisedChild {
    child: Child,
    stdout: PipeReader,
    stderr: PipeReader,
    exited: Option<ExitStatus>,
}

impl SupervisedChild {
    fn spawn(cmd: &mut Command) -> io::Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn()?;
        let stdout = PipeReader::new(child.stdout.take());
        let stderr = PipeReader::new(child.stderr.take());
        Ok(Self {
            child,
            stdout,
            stderr,
            exited: None,
        })
    }

    /// Output of an exited child, once both pipes have reached EOF.
    fn try_collect(&mut self, status: ExitStatus) -> Option<Output> {
        let stdout_done = self.stdout.poll();
        let stderr_done = self.stderr.poll();
        if !(stdout_done && stderr_done) {
            return None;
        }
        Some(Output {
            status,
            stdout: self.stdout.take(),
            stderr: self.stderr.take(),
        })
    }

    fn terminate(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        // Grandchildren may keep the pipes open; the reader threads are abandoned.
        self.stdout.abandon();
        self.stderr.abandon();
    }
}

impl AttachedProcess for SupervisedChild {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_finished(&mut self) -> io::Result<Option<ExitStatus>> {
        if self.exited.is_none() {
            self.exited = self.child.try_wait()?;
        }
        Ok(self.exited)
    }

    /// Wait for the child to exit and its pipes to close.
    ///
    /// A descendant that inherited stdout or stderr keeps the pipes open after
    /// the child itself exits. That time counts against `timeout` too.
    fn wait_finished(
        &mut self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> io::Result<Supervised> {
        let start = Instant::now();
        loop {
            if let Some(status) = self.try_finished()? {
                if let Some(output) = self.try_collect(status) {
                    return Ok(Supervised::Exited(output));
                }
            }
            if cancel.is_cancelled() {
                self.terminate();
                return Ok(Supervised::Cancelled);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                self.terminate();
                return Ok(Supervised::TimedOut { elapsed });
            }
            thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.try_finished()?.is_none() {
            self.terminate();
        }
        Ok(())
    }
}

impl Drop for SupervisedChild {
    fn drop(&mut self) {
        if let Ok(None) = self.try_finished() {
            self.terminate();
        }
    }
}

/// One output pipe, read to EOF on its own thread.
struct PipeReader {
    rx: Option<Receiver<Vec<u8>>>,
    buf: Option<Vec<u8>>,
}

impl PipeReader {
    fn new<R: Read + Send + 'static>(reader: Option<R>) -> Self {
        match reader {
            Some(mut reader) => {
                let (tx, rx) = mpsc::channel();
                thread::spawn(move || {
                    let mut buf = Vec::new();
                    let _ = reader.read_to_end(&mut buf);
                    let _ = tx.send(buf);
                });
                Self {
                    rx: Some(rx),
                    buf: None,
                }
            }
            None => Self {
                rx: None,
                buf: Some(Vec::new()),
            },
        }
    }

    /// Whether the pipe has reached EOF.
    fn poll(&mut self) -> bool {
        if self.buf.is_none() {
            if let Some(rx) = &self.rx {
                match rx.try_recv() {
                    Ok(buf) => self.buf = Some(buf),
                    Err(TryRecvError::Disconnected) => self.buf = Some(Vec::new()),
                    Err(TryRecvError::Empty) => {}
                }
            }
        }
        self.buf.is_some()
    }

    fn take(&mut self) -> Vec<u8> {
        self.rx = None;
        self.buf.take().unwrap_or_default()
    }

    /// Stop waiting for EOF; whatever was not read yet is lost.
    fn abandon(&mut self) {
        self.rx = None;
        self.buf.get_or_insert_with(Vec::new);
    }
}

/// Create an ExitStatus with the given exit code for use in test mocks.
#[cfg(all(test, unix))]
pub fn mock_exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(all(test, windows))]
pub fn mock_exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

/// Scripted command executor shared by the pipeline unit tests.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// What a scripted command does when invoked
    #[derive(Debug, Clone)]
    pub enum Response {
        /// Exit with the code and write the given stdout
        Exit(i32, String),
        /// Outlive the deadline
        Timeout,
        /// Fail to spawn at all
        SpawnError,
        /// Observe cancellation while running (also trips the token)
        Cancelled,
    }

    #[derive(Debug)]
    struct Rule {
        pattern: String,
        responses: Vec<Response>,
    }

    /// Matches invocations by substring of `program args...` and replays responses.
    ///
    /// A rule with several responses yields them in order and then repeats the
    /// last one. Unmatched commands exit 0 with empty output.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedExecutor {
        rules: Arc<Mutex<Vec<Rule>>>,
        calls: Arc<Mutex<Vec<String>>>,
        kills: Arc<Mutex<Vec<String>>>,
        cancel_on: Arc<Mutex<Option<CancelToken>>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, pattern: &str, response: Response) -> Self {
            self.on_sequence(pattern, vec![response])
        }

        pub fn on_sequence(self, pattern: &str, responses: Vec<Response>) -> Self {
            self.rules.lock().push(Rule {
                pattern: pattern.to_string(),
                responses,
            });
            self
        }

        /// Token tripped by [`Response::Cancelled`]
        pub fn cancelling(self, token: CancelToken) -> Self {
            *self.cancel_on.lock() = Some(token);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        /// Attached processes killed while still running
        pub fn kills(&self) -> Vec<String> {
            self.kills.lock().clone()
        }

        pub fn calls_matching(&self, pattern: &str) -> usize {
            self.calls
                .lock()
                .iter()
                .filter(|c| c.contains(pattern))
                .count()
        }

        fn respond(&self, cmd: &Command) -> Response {
            let signature = std::iter::once(cmd.get_program())
                .chain(cmd.get_args())
                .map(|s| s.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.lock().push(signature.clone());

            let mut rules = self.rules.lock();
            match rules.iter_mut().find(|r| signature.contains(&r.pattern)) {
                Some(rule) if rule.responses.len() > 1 => rule.responses.remove(0),
                Some(rule) => rule
                    .responses
                    .first()
                    .cloned()
                    .unwrap_or(Response::Exit(0, String::new())),
                None => Response::Exit(0, String::new()),
            }
        }

        fn settle(&self, response: Response) -> io::Result<Supervised> {
            match response {
                Response::Exit(code, stdout) => Ok(Supervised::Exited(Output {
                    status: mock_exit_status(code),
                    stdout: stdout.into_bytes(),
                    stderr: Vec::new(),
                })),
                Response::Timeout => Ok(Supervised::TimedOut {
                    elapsed: Duration::from_secs(1),
                }),
                Response::SpawnError => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "command not found",
                )),
                Response::Cancelled => {
                    if let Some(token) = self.cancel_on.lock().as_ref() {
                        token.cancel();
                    }
                    Ok(Supervised::Cancelled)
                }
            }
        }
    }

    impl CommandExecutor for ScriptedExecutor {
        fn output(&self, cmd: &mut Command) -> io::Result<Output> {
            match self.settle(self.respond(cmd))? {
                Supervised::Exited(output) => Ok(output),
                _ => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            }
        }

        fn supervise(
            &self,
            cmd: &mut Command,
            _timeout: Duration,
            _cancel: &CancelToken,
        ) -> io::Result<Supervised> {
            self.settle(self.respond(cmd))
        }

        fn spawn_attached(&self, cmd: &mut Command) -> io::Result<Box<dyn AttachedProcess>> {
            let response = self.respond(cmd);
            if let Response::SpawnError = response {
                return Err(io::Error::new(io::ErrorKind::NotFound, "command not found"));
            }
            let signature = self.calls.lock().last().cloned().unwrap_or_default();
            Ok(Box::new(ScriptedProcess {
                signature,
                response: Some(response),
                executor: self.clone(),
            }))
        }
    }

    /// Attached process that settles with its scripted response on wait.
    ///
    /// An `Exit` response with a non-zero code counts as an early crash and is
    /// visible through `try_finished`.
    struct ScriptedProcess {
        signature: String,
        response: Option<Response>,
        executor: ScriptedExecutor,
    }

    impl AttachedProcess for ScriptedProcess {
        fn id(&self) -> u32 {
            4242
        }

        fn try_finished(&mut self) -> io::Result<Option<ExitStatus>> {
            match &self.response {
                Some(Response::Exit(code, _)) if *code != 0 => Ok(Some(mock_exit_status(*code))),
                _ => Ok(None),
            }
        }

        fn wait_finished(
            &mut self,
            _timeout: Duration,
            _cancel: &CancelToken,
        ) -> io::Result<Supervised> {
            let response = self
                .response
                .take()
                .unwrap_or(Response::Exit(0, String::new()));
            self.executor.settle(response)
        }

        fn kill(&mut self) -> io::Result<()> {
            if self.response.take().is_some() {
                self.executor.kills.lock().push(self.signature.clone());
            }
            Ok(())
        }
    }
}
