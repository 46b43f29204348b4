//! sandbox/runner.rs
//!
//! Runs one synthesized program in a fresh interpreter process.
//! Raw output + exit facts only; interpretation lives in protocol.rs.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;

use super::budget::ConcurrencyBudget;
use crate::error::{EngineError, EngineResult};

/// Per-stream cap. The tail is kept so the result record survives.
const MAX_STREAM_BYTES: usize = 1024 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long to wait for pipe readers once the child is gone. A leaked
/// grandchild can hold a pipe open indefinitely.
const READER_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Default)]
pub struct RawRun {
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub spawn_error: Option<String>,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl RawRun {
    fn spawn_failure(message: String, duration: Duration) -> Self {
        Self {
            spawn_error: Some(message),
            duration,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    interpreter: String,
    budget: Arc<ConcurrencyBudget>,
}

impl Sandbox {
    pub fn new(interpreter: impl Into<String>, budget: Arc<ConcurrencyBudget>) -> Self {
        Self {
            interpreter: interpreter.into(),
            budget,
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn budget(&self) -> &Arc<ConcurrencyBudget> {
        &self.budget
    }

    /// Stage `program` in a private temp file and run it under `timeout`.
    ///
    /// The budget unit and the temp file are both released on every path
    /// out of this function. Only failing to stage the file is an `Err`;
    /// everything the child does is reported inside `RawRun`.
    pub fn run(&self, program: &str, timeout: Duration) -> EngineResult<RawRun> {
        let run_id = Uuid::new_v4();
        let _permit = self.budget.acquire();

        let script = stage_script(program).map_err(EngineError::TempFile)?;
        debug!(%run_id, script = %script.path().display(), "staged sandbox script");

        let started = Instant::now();
        let spawned = Command::new(&self.interpreter)
            .arg(script.path())
            .env("PYTHONPATH", "")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONHASHSEED", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(c) => c,
            Err(e) => {
                warn!(%run_id, interpreter = %self.interpreter, error = %e, "sandbox spawn failed");
                remove_script(script, run_id);
                return Ok(RawRun::spawn_failure(
                    format!("Execution error: cannot start {}: {}", self.interpreter, e),
                    started.elapsed(),
                ));
            }
        };

        let (tx, rx) = crossbeam_channel::unbounded();
        if let Some(out) = child.stdout.take() {
            spawn_reader(Stream::Stdout, out, tx.clone());
        }
        if let Some(err) = child.stderr.take() {
            spawn_reader(Stream::Stderr, err, tx.clone());
        }
        drop(tx);

        let waited = wait_with_timeout(&mut child, timeout);
        let duration = started.elapsed();
        let (stdout, stderr) = collect_streams(&rx);
        remove_script(script, run_id);

        match waited {
            Ok(Some(status)) => {
                debug!(%run_id, code = ?status.code(), ms = (duration.as_millis() as u64), "sandbox exited");
                Ok(RawRun {
                    stdout,
                    stderr,
                    timed_out: false,
                    spawn_error: None,
                    exit_code: status.code(),
                    duration,
                })
            }
            Ok(None) => {
                warn!(%run_id, limit_secs = timeout.as_secs_f64(), "sandbox timed out, child killed");
                Ok(RawRun {
                    stdout,
                    stderr,
                    timed_out: true,
                    spawn_error: None,
                    exit_code: None,
                    duration,
                })
            }
            Err(e) => Ok(RawRun {
                stdout,
                stderr,
                spawn_error: Some(format!("Execution error: lost track of child: {}", e)),
                duration,
                ..RawRun::default()
            }),
        }
    }
}

fn stage_script(program: &str) -> Result<NamedTempFile, String> {
    let mut file = tempfile::Builder::new()
        .prefix("codejudge-")
        .suffix(".py")
        .tempfile()
        .map_err(|e| format!("create temp file: {}", e))?;

    let path = file.path().display().to_string();
    file.write_all(program.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| format!("write {}: {}", path, e))?;

    Ok(file)
}

// Deletion failures are logged and otherwise ignored.
fn remove_script(script: NamedTempFile, run_id: Uuid) {
    if let Err(e) = script.close() {
        debug!(%run_id, error = %e, "temp script cleanup failed");
    }
}

/// `Ok(None)` means the deadline passed and the child was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: Stream, pipe: R, tx: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let (bytes, truncated) = read_tail(pipe, MAX_STREAM_BYTES);
        let bytes = if truncated {
            let mut marked = b"...truncated...\n".to_vec();
            marked.extend_from_slice(&bytes);
            marked
        } else {
            bytes
        };
        let _ = tx.send((stream, bytes));
    });
}

fn collect_streams(rx: &Receiver<(Stream, Vec<u8>)>) -> (String, String) {
    let deadline = Instant::now() + READER_GRACE;
    let mut stdout = String::new();
    let mut stderr = String::new();

    while let Ok((stream, bytes)) = rx.recv_deadline(deadline) {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        match stream {
            Stream::Stdout => stdout = text,
            Stream::Stderr => stderr = text,
        }
    }

    (stdout, stderr)
}

/// Read to EOF keeping at most the last `limit` bytes.
fn read_tail<R: Read>(mut pipe: R, limit: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > limit.saturating_mul(2) {
                    let excess = buf.len() - limit;
                    buf.drain(..excess);
                    truncated = true;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    if buf.len() > limit {
        let excess = buf.len() - limit;
        buf.drain(..excess);
        truncated = true;
    }

    (buf, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn short_streams_are_kept_whole() {
        let (bytes, truncated) = read_tail(Cursor::new(b"hello\n".to_vec()), 64);
        assert_eq!(bytes, b"hello\n");
        assert!(!truncated);
    }

    #[test]
    fn long_streams_keep_their_tail() {
        let mut data = vec![b'x'; 50_000];
        data.extend_from_slice(b"\n{\"success\": true, \"result\": \"1\"}\n");
        let (bytes, truncated) = read_tail(Cursor::new(data), 1000);
        assert!(truncated);
        assert_eq!(bytes.len(), 1000);
        assert!(bytes.ends_with(b"{\"success\": true, \"result\": \"1\"}\n"));
    }

    #[test]
    fn staged_script_is_removed_on_close() {
        let script = stage_script("print('hi')\n").unwrap();
        let path = script.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print('hi')\n");
        remove_script(script, Uuid::new_v4());
        assert!(!path.exists());
    }

    #[test]
    fn missing_interpreter_is_a_spawn_error_not_a_hard_error() {
        let budget = Arc::new(ConcurrencyBudget::new(1));
        let sandbox = Sandbox::new("codejudge-no-such-interpreter", Arc::clone(&budget));
        let raw = sandbox.run("print(1)\n", Duration::from_secs(1)).unwrap();
        assert!(raw.spawn_error.is_some());
        assert!(!raw.timed_out);
        assert_eq!(budget.available(), 1);
    }
}
