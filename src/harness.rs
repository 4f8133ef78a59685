use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{RunDescriptor, RunnerConfig};
use crate::error::{BenchError, BenchResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Raw result of one runner invocation.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
    /// `None` when the runner is not a real process.
    pub status: Option<ExitStatus>,
}

impl Invocation {
    /// Combined output, stdout first.
    pub fn combined_text(&self) -> String {
        decode_output(&self.stdout, &self.stderr)
    }
}

/// Something that can execute one benchmark run and hand back its captured output.
pub trait ModelRunner {
    fn invoke(&self, run: &RunDescriptor) -> BenchResult<Invocation>;
}

/// Runs the configured runner executable as a child process.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    cfg: RunnerConfig,
}

impl ProcessRunner {
    pub fn new(cfg: RunnerConfig) -> Self {
        Self { cfg }
    }

    fn command(&self, run: &RunDescriptor) -> Command {
        let mut cmd = Command::new(&self.cfg.program);
        cmd.arg("run")
            .arg(run.model_id())
            // Scoped to this child; the parent environment is left alone.
            .env(&self.cfg.device_env, run.device.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl ModelRunner for ProcessRunner {
    fn invoke(&self, run: &RunDescriptor) -> BenchResult<Invocation> {
        let timeout = self.cfg.timeout();

        let start = Instant::now();
        let mut child = self.command(run).spawn().map_err(|source| BenchError::Spawn {
            program: self.cfg.program.clone(),
            source,
        })?;

        // Feed and drain on helper threads so a full pipe can never stall the wait below.
        let feeder = child.stdin.take().map(|mut stdin| {
            let prompt = run.prompt.clone().into_bytes();
            thread::spawn(move || {
                // The runner may exit without reading; a broken pipe is not our failure.
                let _ = stdin.write_all(&prompt);
            })
        });
        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(pipe) = child.stdout.take() {
            drain(pipe, Stream::Stdout, tx.clone());
            pending += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            drain(pipe, Stream::Stderr, tx.clone());
            pending += 1;
        }
        drop(tx);

        let timed_out = || BenchError::Timeout {
            model_id: run.model_id(),
            device: run.device.to_string(),
            timeout,
        };

        let status = wait_with_timeout(&mut child, timeout)?.ok_or_else(timed_out)?;

        // A backgrounded descendant can hold the pipes open after the runner
        // exits; the deadline covers reading them too.
        let deadline = start + timeout;
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((Stream::Stdout, buf)) => stdout = buf,
                Ok((Stream::Stderr, buf)) => stderr = buf,
                Err(RecvTimeoutError::Timeout) => return Err(timed_out()),
                Err(RecvTimeoutError::Disconnected) => break,
            }
            pending -= 1;
        }
        let elapsed = start.elapsed();

        if let Some(h) = feeder {
            let _ = h.join();
        }

        Ok(Invocation {
            stdout,
            stderr,
            elapsed,
            status: Some(status),
        })
    }
}

#[derive(Clone, Copy, Debug)]
enum Stream {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(mut pipe: R, stream: Stream, tx: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        // The receiver is gone once the run has timed out.
        let _ = tx.send((stream, buf));
    });
}

/// The slice of [`Child`] that [`wait_with_timeout`] drives.
pub trait Waitable {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>>;
    fn kill(&mut self) -> std::io::Result<()>;
    fn wait(&mut self) -> std::io::Result<ExitStatus>;
}

impl Waitable for Child {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn kill(&mut self) -> std::io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        Child::wait(self)
    }
}

/// Poll `child` until it exits or `timeout` elapses.
///
/// On expiry the child is killed and reaped and `Ok(None)` is returned. A
/// failed status query also kills and reaps before the error is returned.
pub fn wait_with_timeout<C: Waitable>(
    child: &mut C,
    timeout: Duration,
) -> BenchResult<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Decode captured stdout followed by stderr, dropping malformed UTF-8 sequences.
pub fn decode_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut out = String::with_capacity(stdout.len() + stderr.len());
    for bytes in [stdout, stderr] {
        for chunk in bytes.utf8_chunks() {
            out.push_str(chunk.valid());
        }
    }
    out
}
