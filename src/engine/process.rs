//! Child process execution with an optional wall-clock bound.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Everything a finished child produced.
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to start: {0}")]
    Spawn(std::io::Error),
    #[error("failed while waiting for exit: {0}")]
    Wait(std::io::Error),
    #[error("timed out after {0:?} and was killed")]
    TimedOut(Duration),
}

/// Run `command` to completion, capturing stdout and stderr.
///
/// Both pipes are drained on helper threads while the caller polls for exit,
/// so output larger than the pipe buffer cannot stall the child. The timeout
/// covers collecting the output as well: a descendant that keeps a pipe open
/// after the child exits cannot hold the caller past the deadline.
pub fn run(command: &mut Command, timeout: Option<Duration>) -> Result<Captured, RunError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn().map_err(RunError::Spawn)?;
    let (tx, rx) = mpsc::channel();
    drain(Stream::Stdout, child.stdout.take(), tx.clone());
    drain(Stream::Stderr, child.stderr.take(), tx);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if let Some(limit) = timeout
                    && started.elapsed() > limit
                {
                    reap(&mut child);
                    return Err(RunError::TimedOut(limit));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                reap(&mut child);
                return Err(RunError::Wait(e));
            }
        }
    };

    let mut captured = Captured {
        status,
        stdout: Vec::new(),
        stderr: Vec::new(),
    };
    for _ in 0..2 {
        let received = match timeout {
            Some(limit) => match rx.recv_timeout(limit.saturating_sub(started.elapsed())) {
                Ok(chunk) => Some(chunk),
                Err(RecvTimeoutError::Timeout) => return Err(RunError::TimedOut(limit)),
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => rx.recv().ok(),
        };
        match received {
            Some((Stream::Stdout, buf)) => captured.stdout = buf,
            Some((Stream::Stderr, buf)) => captured.stderr = buf,
            None => break,
        }
    }
    Ok(captured)
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

enum Stream {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(stream: Stream, pipe: Option<R>, tx: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send((stream, buf));
    });
}
