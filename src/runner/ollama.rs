use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::runner::{ProcessExecutor, ProcessHandle, RunnerError, RunnerEvent};

const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Spawns `<binary> run <model> <prompt> --stream --quiet` and relays its
/// stdout chunk-by-chunk. stderr is drained to the operator log; it never
/// ends the stream, only process exit does.
pub struct OllamaRunner {
    binary: String,
    model: String,
}

impl OllamaRunner {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.name.clone(),
        }
    }
}

#[async_trait]
impl ProcessExecutor for OllamaRunner {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn spawn(&self, prompt: &str) -> Result<ProcessHandle, RunnerError> {
        let mut child = Command::new(&self.binary)
            .arg("run")
            .arg(&self.model)
            .arg(prompt)
            .arg("--stream")
            .arg("--quiet")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Launch(format!("{}: {}", self.binary, e)))?;

        debug!(binary = %self.binary, model = %self.model, "model runner spawned");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Launch("child stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::Launch("child stderr not captured".into()))?;

        // Diagnostics go to the operator log only, never to the client.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("[AI STDERR] {line}");
            }
        });

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        tokio::spawn(pump_child(child, stdout, tx, cancel.clone()));

        Ok(ProcessHandle::new(rx, cancel))
    }
}

/// Forward stdout chunks as they arrive, kill the child on cancellation or
/// receiver drop, and always reap it with `wait()` before reporting Exit.
async fn pump_child(
    mut child: Child,
    mut stdout: ChildStdout,
    tx: mpsc::Sender<RunnerEvent>,
    cancel: CancellationToken,
) {
    let mut buf = [0u8; 4096];
    let mut cancelled = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                if let Err(e) = child.start_kill() {
                    warn!("failed to kill model runner: {e}");
                }
            }
            _ = tx.closed(), if !cancelled => {
                cancelled = true;
                let _ = child.start_kill();
            }
            read = stdout.read(&mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                        if !cancelled && tx.send(RunnerEvent::Chunk(text)).await.is_err() {
                            cancelled = true;
                            let _ = child.start_kill();
                        }
                    }
                    Err(e) => {
                        warn!("model runner stdout read failed: {e}");
                        break;
                    }
                }
            }
        }
    }

    let status = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!("failed to reap model runner: {e}");
            None
        }
    };

    let _ = tx.send(RunnerEvent::Exit { status, cancelled }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;

    fn config(binary: &str) -> ModelConfig {
        ModelConfig {
            binary: binary.to_string(),
            name: "test-model".to_string(),
            max_concurrent: 1,
            stream_timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_fast_launch_error() {
        let runner = OllamaRunner::new(&config("/nonexistent/model-runner"));
        let err = runner.spawn("hi").await.err().unwrap();
        assert!(matches!(err, RunnerError::Launch(_)));
    }

    #[tokio::test]
    async fn echo_binary_streams_chunks_then_exits_clean() {
        // /bin/echo prints its arguments ("run test-model hi --stream --quiet")
        // and exits 0, which exercises chunk forwarding and reaping.
        let runner = OllamaRunner::new(&config("echo"));
        let mut handle = runner.spawn("hi").await.unwrap();

        let mut text = String::new();
        let mut exit = None;
        while let Some(ev) = handle.next_event().await {
            match ev {
                RunnerEvent::Chunk(chunk) => text.push_str(&chunk),
                RunnerEvent::Exit { status, cancelled } => {
                    exit = Some((status, cancelled));
                }
            }
        }

        assert!(text.contains("run test-model hi"));
        assert_eq!(exit, Some((Some(0), false)));
    }

    #[tokio::test]
    async fn cancel_kills_and_reaps_a_long_running_child() {
        // `yes` repeats its arguments forever, so this child never exits on
        // its own.
        let runner = OllamaRunner::new(&config("yes"));
        let mut handle = runner.spawn("hi").await.unwrap();

        // Wait for one chunk so the process is known to be alive.
        match handle.next_event().await {
            Some(RunnerEvent::Chunk(_)) => {}
            other => panic!("expected a chunk, got {other:?}"),
        }

        handle.cancel();

        let mut exit = None;
        while let Some(ev) = handle.next_event().await {
            if let RunnerEvent::Exit { status, cancelled } = ev {
                exit = Some((status, cancelled));
            }
        }
        let (status, cancelled) = exit.expect("exit event after cancel");
        assert!(cancelled);
        // Killed by signal, so there is no exit code.
        assert_eq!(status, None);
    }
}
