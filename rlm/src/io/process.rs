//! Helpers for running child processes with stdin input, optional timeouts,
//! and bounded output capture.

use std::io::{ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::error::{Error, Result};

/// What happens to the child's stdout/stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Streams go straight to this process's terminal.
    Inherit,
    /// Streams are drained into memory, keeping at most `limit_bytes` each.
    Capture { limit_bytes: usize },
}

/// Child process exit plus any captured output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }

    /// Captured stderr decoded lossily; invalid UTF-8 never fails the call.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Run a command to completion, feeding `stdin` and handling output per `mode`.
///
/// Stdin is written from its own thread and captured output is read
/// concurrently, so a child that writes before reading cannot deadlock. With
/// `timeout` unset the call blocks until the child exits and the child stays in
/// the caller's process group. With a timeout the child gets its own group, and
/// on expiry the whole tree is killed and the output threads are detached
/// rather than joined; the returned output is empty.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs()), mode = ?mode))]
pub fn run_command(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    mode: OutputMode,
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    if timeout.is_some() {
        isolate_process_group(&mut cmd);
    }
    match mode {
        OutputMode::Inherit => {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        OutputMode::Capture { .. } => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(Error::io("spawn command", e));
        }
    };

    let stdin_handle = match stdin {
        Some(input) => {
            let child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| not_piped("stdin"))?;
            let input = input.to_vec();
            Some(thread::spawn(move || write_stdin(child_stdin, &input)))
        }
        None => None,
    };

    let readers = match mode {
        OutputMode::Inherit => None,
        OutputMode::Capture { limit_bytes } => {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| not_piped("stdout"))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| not_piped("stderr"))?;
            Some((
                thread::spawn(move || read_stream_limited(stdout, limit_bytes)),
                thread::spawn(move || read_stream_limited(stderr, limit_bytes)),
            ))
        }
    };

    let (status, timed_out) = match timeout {
        None => (
            child
                .wait()
                .map_err(|e| Error::io("wait for command", e))?,
            false,
        ),
        Some(timeout) => match child
            .wait_timeout(timeout)
            .map_err(|e| Error::io("wait for command", e))?
        {
            Some(status) => (status, false),
            None => {
                warn!(
                    timeout = ?timeout,
                    "command timed out, killing process tree"
                );
                kill_process_tree(&mut child).map_err(|e| Error::io("kill command", e))?;
                let status = child
                    .wait()
                    .map_err(|e| Error::io("wait command after kill", e))?;
                (status, true)
            }
        },
    };

    if timed_out {
        // Descendants that escaped the kill may still hold the pipes open.
        drop(stdin_handle);
        drop(readers);
        debug!(exit_code = ?status.code(), "command killed after timeout");
        return Ok(CommandOutput {
            status,
            stdout: Vec::new(),
            stderr: Vec::new(),
            stdout_truncated: 0,
            stderr_truncated: 0,
            timed_out,
        });
    }

    if let Some(handle) = stdin_handle {
        join_thread(handle, "stdin writer")?.map_err(|e| Error::io("write stdin", e))?;
    }

    let (stdout, stdout_truncated, stderr, stderr_truncated) = match readers {
        None => (Vec::new(), 0, Vec::new(), 0),
        Some((stdout_handle, stderr_handle)) => {
            let (stdout, stdout_truncated) = join_thread(stdout_handle, "stdout reader")?
                .map_err(|e| Error::io("read stdout", e))?;
            let (stderr, stderr_truncated) = join_thread(stderr_handle, "stderr reader")?
                .map_err(|e| Error::io("read stderr", e))?;
            (stdout, stdout_truncated, stderr, stderr_truncated)
        }
    };

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Write all input then close the pipe. A child that exits without reading
/// everything is not an error here; its exit status tells the story.
fn write_stdin(mut child_stdin: ChildStdin, input: &[u8]) -> std::io::Result<()> {
    match child_stdin.write_all(input) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("child closed stdin before reading all input");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

/// Kill the child and everything it started. The child must lead its own
/// process group (see [`isolate_process_group`]).
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).map_err(std::io::Error::other)?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

/// `cmd.exe /C deno.cmd` leaves `deno` as a grandchild, so kill the tree.
#[cfg(windows)]
fn kill_process_tree(child: &mut Child) -> std::io::Result<()> {
    let result = Command::new("taskkill")
        .args(["/T", "/F", "/PID"])
        .arg(child.id().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(status) if status.success() => Ok(()),
        other => {
            warn!(result = ?other, "taskkill failed, killing direct child only");
            child.kill()
        }
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_process_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

fn not_piped(stream: &str) -> Error {
    Error::io(
        format!("take {stream}"),
        std::io::Error::other(format!("{stream} was not piped")),
    )
}

fn join_thread<T>(handle: thread::JoinHandle<T>, name: &str) -> Result<T> {
    handle.join().map_err(|_| {
        Error::io(
            format!("join {name}"),
            std::io::Error::other("thread panicked"),
        )
    })
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> std::io::Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
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
