use std::{
    io::{self, Read, Write},
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{trace, warn};

/// What a finished process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Result of [`run_with_timeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Exited(ProcessOutput),
    /// Killed once the limit was reached. Output is discarded.
    TimedOut { elapsed: Duration },
}

/// Owns a child started in its own process group. The whole group is killed on drop unless
/// the child was reaped.
#[derive(Debug)]
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    /// Kill every process of the group, then the child itself, and reap it.
    fn kill(&mut self) {
        self.kill_group();
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            // already exited between the last poll and now
            trace!("kill failed: {e}");
        }
        match self.child.wait() {
            Ok(_) => self.reaped = true,
            Err(e) => warn!("could not reap process {}: {e}", self.child.id()),
        }
    }

    #[cfg(unix)]
    fn kill_group(&self) {
        use nix::{
            errno::Errno,
            sys::signal::{killpg, Signal},
            unistd::Pid,
        };

        let Ok(pgid) = i32::try_from(self.child.id()) else {
            return;
        };
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("could not kill process group {pgid}: {e}"),
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill();
        }
    }
}

fn build_command(command: &[String], cwd: &Path) -> io::Result<Command> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd);
    Ok(cmd)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Read `source` to the end on a detached thread and send what was read on `done`.
fn drain<R: Read + Send + 'static>(source: Option<R>, pipe: Pipe, done: Sender<(Pipe, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        let _ = done.send((pipe, buf));
    });
}

/// Wait for both pipes to close. `None` if `deadline` passes first: a descendant of the
/// program still holds them.
fn collect_output(
    drained: &Receiver<(Pipe, Vec<u8>)>,
    deadline: Instant,
) -> Option<(String, String)> {
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        match drained.recv_deadline(deadline) {
            Ok((Pipe::Stdout, bytes)) => stdout = Some(bytes),
            Ok((Pipe::Stderr, bytes)) => stderr = Some(bytes),
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let text =
        |bytes: Option<Vec<u8>>| String::from_utf8_lossy(&bytes.unwrap_or_default()).into_owned();
    Some((text(stdout), text(stderr)))
}

/// Run `command` in `cwd` until it exits, without time limit. Stdin is closed.
pub fn run_to_completion(command: &[String], cwd: &Path) -> io::Result<ProcessOutput> {
    let start = Instant::now();
    let output = build_command(command, cwd)?
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?
        .wait_with_output()?;
    Ok(ProcessOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        elapsed: start.elapsed(),
    })
}

/// Run `command` in `cwd` with `input` on its stdin, killing it after `timeout`.
///
/// The deadline is wall-clock time measured from just before the spawn and covers the program
/// and everything it started: the run only counts as finished once its output pipes are closed.
/// The program runs in its own process group, killed as a whole when the run ends.
pub fn run_with_timeout(
    command: &[String],
    cwd: &Path,
    input: &[u8],
    timeout: Duration,
) -> io::Result<RunOutcome> {
    let mut cmd = build_command(command, cwd)?;
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

    let start = Instant::now();
    let child = cmd.spawn()?;
    let mut guard = ChildGuard {
        child,
        reaped: false,
    };

    let stdin = guard.child.stdin.take();
    let input = input.to_vec();
    thread::spawn(move || {
        if let Some(mut stdin) = stdin {
            // the program may exit without reading everything
            let _ = stdin.write_all(&input);
        }
    });
    let (done, drained) = crossbeam_channel::bounded(2);
    drain(guard.child.stdout.take(), Pipe::Stdout, done.clone());
    drain(guard.child.stderr.take(), Pipe::Stderr, done);

    let deadline = start + timeout;
    loop {
        if let Some(status) = guard.child.try_wait()? {
            guard.reaped = true;
            let output = collect_output(&drained, deadline);
            guard.kill();
            return Ok(match output {
                Some((stdout, stderr)) => RunOutcome::Exited(ProcessOutput {
                    status,
                    stdout,
                    stderr,
                    elapsed: start.elapsed(),
                }),
                None => {
                    trace!("output still open at the deadline");
                    RunOutcome::TimedOut {
                        elapsed: start.elapsed(),
                    }
                }
            });
        }

        let now = Instant::now();
        if now >= deadline {
            guard.kill();
            return Ok(RunOutcome::TimedOut {
                elapsed: start.elapsed(),
            });
        }
        thread::sleep(Duration::from_millis(5).min(deadline - now));
    }
}
