//! Applies `CommandEvent`s to an `EditorSession` and renders text output for
//! a line-oriented front end.

use crate::error::ApplyError;
use crate::session::{AcceptOutcome, EditorSession};
use core_events::CommandEvent;
use core_render::{DecorationHost, preview_lines};
use core_services::{Assistant, DocumentStore, EditLimitGate};
use core_text::TextModel;

pub const HELP: &[&str] = &[
    "list                 show displayed suggestions",
    "show                 print the document with line numbers",
    "accept <n>           apply suggestion n",
    "reject <n>           discard suggestion n",
    "accept-all           apply every displayed suggestion",
    "continue             show the next batch",
    "ask <prompt>         ask the assistant for changes",
    "response <file>      load an assistant response from a file",
    "edit <line> <text>   replace a line",
    "select <a> [b]       select lines a..b (`select none` clears)",
    "undo | redo          step through edit history",
    "save                 write the document",
    "compile              queue a compile",
    "quit                 leave",
];

/// Outcome of one command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub quit: bool,
    pub output: Vec<String>,
}

impl DispatchResult {
    fn line(mut self, text: impl Into<String>) -> Self {
        self.output.push(text.into());
        self
    }
}

/// Listing of the displayed batch with previews.
pub fn listing<G, S, A, H>(session: &EditorSession<G, S, A, H>) -> Vec<String>
where
    G: EditLimitGate,
    S: DocumentStore,
    A: Assistant,
    H: DecorationHost,
{
    let queue = session.queue();
    let mut out = Vec::new();
    if queue.displayed().is_empty() {
        out.push("no suggestions".to_string());
    }
    for (idx, s) in queue.displayed().iter().enumerate() {
        let mut lines = preview_lines(s).into_iter();
        if let Some(header) = lines.next() {
            out.push(format!("[{}] {header}", idx + 1));
        }
        out.extend(lines.map(|l| format!("    {l}")));
        if let Some(err) = queue.apply_error(s.id) {
            out.push(format!("    (last attempt failed: {err})"));
        }
    }
    if queue.backlog_len() > 0 {
        out.push(format!("{} more queued", queue.backlog_len()));
    }
    out
}

fn numbered_document<G, S, A, H>(session: &EditorSession<G, S, A, H>) -> Vec<String>
where
    G: EditLimitGate,
    S: DocumentStore,
    A: Assistant,
    H: DecorationHost,
{
    let buffer = session.state().buffer();
    (1..=buffer.line_count())
        .map(|n| format!("{n:>4} | {}", buffer.line_content(n).unwrap_or_default()))
        .collect()
}

pub async fn dispatch<G, S, A, H>(
    command: CommandEvent,
    session: &mut EditorSession<G, S, A, H>,
) -> DispatchResult
where
    G: EditLimitGate,
    S: DocumentStore,
    A: Assistant,
    H: DecorationHost,
{
    let mut result = DispatchResult::default();
    match command {
        CommandEvent::List => result.output = listing(session),
        CommandEvent::Show => result.output = numbered_document(session),
        CommandEvent::Accept(n) => {
            let Some(id) = session.suggestion_at(n) else {
                return result.line(format!("no suggestion #{n}"));
            };
            match session.accept(id).await {
                Ok(AcceptOutcome::Applied { .. }) => result = result.line(format!("accepted #{n}")),
                Ok(AcceptOutcome::Rerouted {
                    replacement: Some(_),
                }) => result = result.line(format!("#{n} was out of date and has been re-anchored")),
                Ok(AcceptOutcome::Rerouted { replacement: None }) => {
                    result = result.line(format!("#{n} was out of date and was dropped"))
                }
                Err(ApplyError::NotPending(_)) => {
                    result = result.line(format!("#{n} is no longer pending"))
                }
                // Remaining failures already raised a notice.
                Err(_) => {}
            }
        }
        CommandEvent::Reject(n) => {
            let Some(id) = session.suggestion_at(n) else {
                return result.line(format!("no suggestion #{n}"));
            };
            if session.reject(id).is_ok() {
                result = result.line(format!("rejected #{n}"));
            }
        }
        CommandEvent::AcceptAll => {
            let summary = session.accept_all().await;
            result = result.line(format!(
                "accepted {}, re-anchored {}, failed {}",
                summary.applied, summary.rerouted, summary.failed
            ));
        }
        CommandEvent::Continue => {
            let moved = session.continue_suggestions();
            if moved == 0 {
                result = result.line("nothing to continue");
            } else {
                result.output = listing(session);
            }
        }
        CommandEvent::Ask(prompt) => {
            if session.ask(&prompt).await.is_ok() {
                result.output = listing(session);
            }
        }
        CommandEvent::Response(path) => match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                session.receive_response(&text);
                result.output = listing(session);
            }
            Err(e) => {
                tracing::warn!(target: "io", path = %path.display(), error = %e, "response_read_failed");
                result = result.line(format!("cannot read {}: {e}", path.display()));
            }
        },
        CommandEvent::Edit { line, text } => {
            if let Err(e) = session.replace_line(line, &text) {
                result = result.line(format!("edit failed: {e}"));
            }
        }
        CommandEvent::Select {
            start_line,
            end_line,
        } => {
            session.select_lines(start_line, end_line);
            if session.state().selection().is_none() {
                result = result.line("selection is outside the document");
            }
        }
        CommandEvent::ClearSelection => session.set_selection(None),
        CommandEvent::Undo => {
            result = result.line(match session.undo() {
                Some(source) => format!("undid {source} edit"),
                None => "nothing to undo".to_string(),
            })
        }
        CommandEvent::Redo => {
            result = result.line(match session.redo() {
                Some(source) => format!("redid {source} edit"),
                None => "nothing to redo".to_string(),
            })
        }
        CommandEvent::Save => {
            if session.save().await {
                result = result.line("saved");
            }
        }
        CommandEvent::Compile => {
            result = result.line(match session.recompile() {
                Some(generation) => format!("compile #{generation} queued"),
                None => "no compiler configured".to_string(),
            })
        }
        CommandEvent::Help => result.output = HELP.iter().map(|s| s.to_string()).collect(),
        CommandEvent::Quit => result.quit = true,
    }
    result
        .output
        .extend(session.drain_notices().into_iter().map(|n| format!("! {n}")));
    result
}
