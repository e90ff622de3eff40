pub mod ollama;
pub mod speech;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Launch Error: {0}")]
    Launch(String),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

/// One event from a running model subprocess: incremental stdout text, then
/// exactly one `Exit` once the process has been reaped.
#[derive(Debug)]
pub enum RunnerEvent {
    Chunk(String),
    Exit {
        status: Option<i32>,
        /// True when the process was killed via `ProcessHandle::cancel`
        /// (client disconnect or watchdog), not by its own exit.
        cancelled: bool,
    },
}

/// Live handle to one spawned model subprocess. Dropping the handle cancels
/// the subprocess; the pump task still reaps it.
pub struct ProcessHandle {
    events: mpsc::Receiver<RunnerEvent>,
    cancel: CancellationToken,
}

impl ProcessHandle {
    pub fn new(events: mpsc::Receiver<RunnerEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next chunk or exit notification, in emission order. `None` after Exit.
    pub async fn next_event(&mut self) -> Option<RunnerEvent> {
        self.events.recv().await
    }

    /// Ask the pump task to kill the subprocess.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Model-runner boundary: spawn a subprocess for one prompt and stream its
/// output. Implemented by `OllamaRunner` in production and by mocks in tests
/// so the relay is exercisable without real binaries.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn spawn(&self, prompt: &str) -> Result<ProcessHandle, RunnerError>;
}
