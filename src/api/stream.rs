use std::sync::Arc;
use std::time::Duration;

use actix_web::{get, http::header, web, HttpResponse, Result as WebResult};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, info, warn};

use crate::api::models::{ErrorBody, StreamQuery};
use crate::config::ModelConfig;
use crate::runner::speech::SpeechSynth;
use crate::runner::{ProcessExecutor, ProcessHandle, RunnerEvent};
use crate::transcript::TranscriptStore;

const RELAY_CHANNEL_CAPACITY: usize = 64;

/// Admission control for model subprocesses plus the per-stream watchdog.
#[derive(Clone)]
pub struct StreamLimits {
    slots: Arc<Semaphore>,
    timeout: Duration,
}

impl StreamLimits {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
            timeout: Duration::from_secs(config.stream_timeout_secs),
        }
    }
}

/// One frame on the wire between the relay task and the SSE body.
enum RelayEvent {
    Chunk(String),
    Error(String),
    Done,
}

/// GET /api/stream?prompt=... — the streaming relay.
///
/// Records the USER turn, spawns the model runner, forwards every stdout
/// chunk as an SSE data frame, and records the AI turn with the full
/// accumulated text once the process exits. A client disconnect cancels the
/// subprocess; a run cancelled before completing writes no AI turn.
#[get("/api/stream")]
pub async fn stream_chat(
    query: web::Query<StreamQuery>,
    store: web::Data<Arc<TranscriptStore>>,
    executor: web::Data<Arc<dyn ProcessExecutor>>,
    speech: web::Data<Arc<SpeechSynth>>,
    limits: web::Data<StreamLimits>,
) -> WebResult<HttpResponse> {
    let prompt = match query.into_inner().prompt.filter(|p| !p.trim().is_empty()) {
        Some(p) => p,
        None => {
            return Ok(
                HttpResponse::BadRequest().json(ErrorBody::new("Missing prompt parameter"))
            )
        }
    };

    let permit = match limits.slots.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            warn!("stream rejected: all model runner slots busy");
            return Ok(HttpResponse::ServiceUnavailable()
                .json(ErrorBody::new("Too many concurrent streams")));
        }
    };

    // This timestamp is reused for the AI turn, linking the pair in the log.
    let timestamp = Utc::now();
    if let Err(e) = store.append_user(timestamp, &prompt) {
        error!("failed to record user turn: {e}");
        return Ok(HttpResponse::InternalServerError()
            .json(ErrorBody::new(format!("Transcript write failed: {e}"))));
    }

    let handle = match executor.spawn(&prompt).await {
        Ok(handle) => handle,
        Err(e) => {
            // The USER entry stays; a prompt with no answer is an honest log.
            error!("model runner failed to start: {e}");
            return Ok(HttpResponse::InternalServerError().json(ErrorBody::new(e.to_string())));
        }
    };

    info!(runner = executor.name(), "streaming response started");

    let (tx, mut rx) = mpsc::channel::<RelayEvent>(RELAY_CHANNEL_CAPACITY);

    // The relay task owns the subprocess handle so the AI transcript write
    // survives a client that disconnects after the process completed.
    tokio::spawn(relay_session(
        handle,
        store.as_ref().clone(),
        speech.as_ref().clone(),
        timestamp,
        limits.timeout,
        tx,
        permit,
    ));

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match event {
                RelayEvent::Chunk(text) => {
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(format!("data: {text}\n\n")));
                }
                RelayEvent::Error(msg) => {
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(format!("event: error\ndata: {msg}\n\n")));
                }
                RelayEvent::Done => {
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from("event: end\ndata: [DONE]\n\n"));
                    break;
                }
            }
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream))
}

async fn relay_session(
    mut handle: ProcessHandle,
    store: Arc<TranscriptStore>,
    speech: Arc<SpeechSynth>,
    timestamp: DateTime<Utc>,
    timeout: Duration,
    out: mpsc::Sender<RelayEvent>,
    _permit: OwnedSemaphorePermit,
) {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut buffer = String::new();
    let mut client_gone = false;
    let mut timed_out = false;

    loop {
        tokio::select! {
            // A dropped response body means the client is gone; a silent
            // subprocess must not keep running until the watchdog.
            _ = out.closed(), if !client_gone => {
                info!("client disconnected mid-stream, cancelling model runner");
                client_gone = true;
                handle.cancel();
            }
            _ = &mut deadline, if !timed_out => {
                timed_out = true;
                warn!("stream exceeded {}s watchdog, killing model runner", timeout.as_secs());
                handle.cancel();
                if !client_gone {
                    let _ = out.send(RelayEvent::Error("Model runner timed out".into())).await;
                }
            }
            event = handle.next_event() => {
                match event {
                    Some(RunnerEvent::Chunk(text)) => {
                        buffer.push_str(&text);
                        if !client_gone && out.send(RelayEvent::Chunk(text)).await.is_err() {
                            info!("client disconnected mid-stream, cancelling model runner");
                            client_gone = true;
                            handle.cancel();
                        }
                    }
                    Some(RunnerEvent::Exit { status, cancelled }) => {
                        if let Some(code) = status {
                            if code != 0 {
                                warn!(code, "model runner exited nonzero");
                            }
                        }
                        if !cancelled {
                            let full = buffer.trim().to_string();
                            if let Err(e) = store.append_ai(timestamp, &full) {
                                error!("failed to record AI turn: {e}");
                            }
                            speech.say(full);
                            if !client_gone {
                                let _ = out.send(RelayEvent::Done).await;
                            }
                        }
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}
