//! Child-process helpers: bounded capture, deadlines, and line streaming.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured output of a finished child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes discarded beyond the capture limit (pipes are still drained).
    pub truncated_bytes: usize,
    pub timed_out: bool,
}

/// Run a command to completion with a deadline and bounded in-memory capture.
///
/// Output pipes are drained on reader threads so a chatty child cannot
/// deadlock against a full pipe buffer.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = cmd.spawn().context("spawn command")?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || drain_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || drain_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_reader(stderr_handle).context("join stderr")?;
    let truncated_bytes = stdout_truncated + stderr_truncated;
    if truncated_bytes > 0 {
        warn!(truncated_bytes, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        truncated_bytes,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

/// A spawned child whose stdout is consumed line by line under a shared
/// deadline. Dropping the stream kills the child.
pub struct LineStream {
    child: Child,
    lines: mpsc::Receiver<std::io::Result<String>>,
    deadline: Instant,
    finished: bool,
}

/// Spawn `cmd`, feed `stdin` to the child, and stream its stdout lines.
///
/// Stdin is closed after the write so the child sees EOF on its input.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
pub fn spawn_line_stream(mut cmd: Command, stdin: &[u8], timeout: Duration) -> Result<LineStream> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    debug!("spawning streaming child process");
    let mut child = cmd.spawn().context("spawn command")?;
    let mut child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    child_stdin.write_all(stdin).context("write stdin")?;
    drop(child_stdin);

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    Ok(LineStream {
        child,
        lines: rx,
        deadline: Instant::now() + timeout,
        finished: false,
    })
}

impl LineStream {
    /// Next stdout line, or `None` at end of stream.
    ///
    /// Yields a single error (killing the child) when the deadline passes or
    /// the pipe breaks, and reports a non-zero exit as a final error item.
    pub fn next_line(&mut self) -> Option<Result<String>> {
        if self.finished {
            return None;
        }
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Some(self.fail_timed_out());
        }
        match self.lines.recv_timeout(remaining) {
            Ok(Ok(line)) => Some(Ok(line)),
            Ok(Err(err)) => {
                self.finished = true;
                self.kill_silently();
                Some(Err(anyhow!(err).context("read stream")))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Some(self.fail_timed_out()),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                self.finished = true;
                match self.wait_status() {
                    Ok(status) if status.success() => None,
                    Ok(status) => Some(Err(anyhow!(
                        "engine exited with status {:?}",
                        status.code()
                    ))),
                    Err(err) => Some(Err(err)),
                }
            }
        }
    }

    fn fail_timed_out(&mut self) -> Result<String> {
        warn!("stream deadline exceeded, killing child");
        self.finished = true;
        self.kill_silently();
        Err(anyhow!("stream timed out"))
    }

    fn kill_silently(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    fn wait_status(&mut self) -> Result<ExitStatus> {
        // The reader thread saw EOF; give the child a short grace period to exit.
        let grace = self
            .deadline
            .saturating_duration_since(Instant::now())
            .max(Duration::from_secs(1));
        match self.child.wait_timeout(grace).context("wait for child")? {
            Some(status) => Ok(status),
            None => {
                self.kill_silently();
                Err(anyhow!("stream timed out"))
            }
        }
    }
}

impl Drop for LineStream {
    fn drop(&mut self) {
        if !self.finished {
            self.kill_silently();
        }
    }
}
