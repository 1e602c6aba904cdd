//! Collaborator seams for the suggestion workflow.
//!
//! The session talks to four external systems: a usage gate consulted before
//! every accept, a document store, a LaTeX compiler and the AI assistant. Each
//! is a trait here with at least one in-process implementation, so the core
//! stays runnable (and testable) without a network. The binary supplies
//! process-backed implementations where a real tool is configured.
//!
//! All methods return `Send` futures; compile runs inside a spawned worker.

pub mod assistant;
pub mod compiler;
pub mod gate;
pub mod store;

pub use assistant::{Assistant, AssistantRequest, ScriptedAssistant};
pub use compiler::{CompileFailure, CompileOutcome, Compiler, EchoCompiler};
pub use gate::{AllowAllEdits, EditLimitGate, EditQuota};
pub use store::{DocumentStore, MemoryDocumentStore};
