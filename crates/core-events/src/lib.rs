//! Core event types and async event sources for the Octree session loop.
//!
//! Everything that reaches the session from outside the editing path travels
//! through one bounded channel of `Event`s: commands typed by the user,
//! complete assistant responses, and compile reports from the background
//! worker.

use std::sync::atomic::AtomicU64;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

pub mod command;

pub use command::{CommandEvent, CommandParseError, LineCommandSource};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded channel with producer backpressure. Sources await `send` and stop as soon as it fails
// (consumer dropped). Compile reports are rare and commands arrive at typing speed, so the cap is
// never approached in practice.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 256;

/// Sends that failed because the session loop had already gone away.
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the session loop.
#[derive(Debug, Clone)]
pub enum Event {
    Command(CommandEvent),
    /// A line that did not parse as a command; carries the error text.
    InvalidCommand(String),
    /// A complete assistant response to run through the diff parser.
    AssistantResponse(String),
    Compile(CompileReport),
    Shutdown,
}

/// Result of one background compile, tagged with the generation that was
/// current when the compile was requested. Reports from older generations are
/// stale and must be ignored by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    pub generation: u64,
    pub status: CompileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileStatus {
    Succeeded {
        pdf: Vec<u8>,
    },
    Failed {
        message: String,
        log: Option<String>,
    },
}

impl CompileReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, CompileStatus::Succeeded { .. })
    }
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
///
/// Each source is failure-isolated: it must stop when `tx.send(..).await` returns Err (channel
/// closed) or on its own internal stop condition, and should await timers or IO rather than spin.
pub trait AsyncEventSource: Send + 'static {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources, spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source receives its own
    /// clone of `tx`; the caller keeps ownership of the original.
    ///
    /// During shutdown the caller should drop its final `Sender` before awaiting the handles so
    /// the sources observe the closed channel and exit cooperatively.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        // Drained so a second call cannot spawn duplicates.
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}
