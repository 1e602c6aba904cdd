//! Debounced background compilation.
//!
//! `CompileHandle::request` is fire-and-continue: it stamps the content with a
//! new generation and hands it to the worker. The worker waits for a quiet
//! period, compiles only the newest content of a burst, and reports back on
//! the event channel. In-flight compiles are never cancelled; consumers
//! discard reports older than the newest one they applied.

use core_events::{AsyncEventSource, CHANNEL_SEND_FAILURES, CompileReport, CompileStatus, Event};
use core_services::{CompileOutcome, Compiler};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct CompileRequest {
    generation: u64,
    content: String,
}

/// Cheap-to-clone sender side of the compile worker.
#[derive(Debug, Clone)]
pub struct CompileHandle {
    tx: mpsc::UnboundedSender<CompileRequest>,
    generation: Arc<AtomicU64>,
}

impl CompileHandle {
    /// Queue `content` for compilation. Returns the generation assigned.
    pub fn request(&self, content: String) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if self
            .tx
            .send(CompileRequest {
                generation,
                content,
            })
            .is_err()
        {
            debug!(target: "compile", generation, "compile_worker_gone");
        }
        generation
    }

    /// Newest generation handed out so far.
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

pub struct CompileWorker<C> {
    compiler: C,
    rx: mpsc::UnboundedReceiver<CompileRequest>,
    debounce: Duration,
    timeout: Duration,
}

/// Create a connected handle/worker pair. Register the worker with the event
/// source registry; it stops once every handle is dropped.
pub fn compile_channel<C: Compiler>(
    compiler: C,
    debounce: Duration,
    timeout: Duration,
) -> (CompileHandle, CompileWorker<C>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        CompileHandle {
            tx,
            generation: Arc::new(AtomicU64::new(0)),
        },
        CompileWorker {
            compiler,
            rx,
            debounce,
            timeout,
        },
    )
}

async fn run_compile<C: Compiler>(compiler: &C, content: String, timeout: Duration) -> CompileStatus {
    match tokio::time::timeout(timeout, compiler.compile(content)).await {
        Ok(CompileOutcome::Pdf(pdf)) => CompileStatus::Succeeded { pdf },
        Ok(CompileOutcome::Failed(failure)) => {
            let message = match failure.exit_code {
                Some(code) => format!("{} (exit code {code})", failure.message),
                None => failure.message,
            };
            CompileStatus::Failed {
                message,
                log: failure.log.or(failure.stderr),
            }
        }
        Err(_) => CompileStatus::Failed {
            message: format!("compilation timed out after {}s", timeout.as_secs()),
            log: None,
        },
    }
}

impl<C: Compiler> AsyncEventSource for CompileWorker<C> {
    fn name(&self) -> &'static str {
        "compile"
    }

    fn spawn(self: Box<Self>, tx: mpsc::Sender<Event>) -> JoinHandle<()> {
        let CompileWorker {
            compiler,
            mut rx,
            debounce,
            timeout,
        } = *self;
        tokio::spawn(async move {
            while let Some(mut pending) = rx.recv().await {
                let mut coalesced = 0usize;
                // Quiet period: every new request restarts the timer.
                loop {
                    tokio::select! {
                        next = rx.recv() => match next {
                            Some(req) => {
                                pending = req;
                                coalesced += 1;
                            }
                            None => break,
                        },
                        _ = tokio::time::sleep(debounce) => break,
                    }
                }
                let generation = pending.generation;
                info!(target: "compile", generation, coalesced, bytes = pending.content.len(), "compile_started");
                let status = run_compile(&compiler, pending.content, timeout).await;
                match &status {
                    CompileStatus::Succeeded { pdf } => {
                        info!(target: "compile", generation, pdf_bytes = pdf.len(), "compile_succeeded")
                    }
                    CompileStatus::Failed { message, .. } => {
                        warn!(target: "compile", generation, message = message.as_str(), "compile_failed")
                    }
                }
                let report = CompileReport { generation, status };
                if tx.send(Event::Compile(report)).await.is_err() {
                    CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        })
    }
}
