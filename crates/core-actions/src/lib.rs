//! Suggestion workflow actions.
//!
//! * `applicator`: bounds-checked translation of a suggestion into one edit.
//! * `conflict`: re-anchoring stale suggestions through the assistant.
//! * `compile`: debounced background compile worker.
//! * `session`: `EditorSession`, which sequences gate, edit, save and compile.
//! * `dispatcher`: line-command front end over a session.
//! * `io_ops`: document files and the file-backed store.

pub mod applicator;
pub mod compile;
pub mod conflict;
pub mod dispatcher;
pub mod error;
pub mod io_ops;
pub mod session;

pub use applicator::{EditPlan, current_text_at, plan_edit};
pub use compile::{CompileHandle, CompileWorker, compile_channel};
pub use conflict::{ConflictRequest, ConflictResolver, build_prompt, is_small_change};
pub use dispatcher::{DispatchResult, HELP, dispatch, listing};
pub use error::{ApplyError, ConflictError};
pub use io_ops::{FsDocumentStore, open_document};
pub use session::{AcceptAllSummary, AcceptOutcome, EditorSession, SessionOptions};
