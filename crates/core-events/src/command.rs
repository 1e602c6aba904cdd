//! Line-oriented session commands and the async source that reads them.

use crate::{AsyncEventSource, CHANNEL_SEND_FAILURES, Event};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Commands understood by the session loop. Suggestion indices are 1-based
/// positions in the displayed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    List,
    Show,
    Accept(usize),
    Reject(usize),
    AcceptAll,
    Continue,
    Ask(String),
    /// Load a saved assistant response from disk.
    Response(PathBuf),
    /// Replace one line as if the user typed it.
    Edit { line: usize, text: String },
    Select { start_line: usize, end_line: usize },
    ClearSelection,
    Undo,
    Redo,
    Save,
    Compile,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{command}` needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("`{0}` is not a positive number")]
    InvalidNumber(String),
}

fn positive(raw: &str) -> Result<usize, CommandParseError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandParseError::InvalidNumber(raw.to_string())),
    }
}

fn required<'a>(
    arg: Option<&'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, CommandParseError> {
    arg.filter(|a| !a.is_empty())
        .ok_or(CommandParseError::MissingArgument { command, argument })
}

impl FromStr for CommandEvent {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandParseError::Empty);
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((h, r)) => (h, Some(r.trim_start())),
            None => (line, None),
        };
        let cmd = match head {
            "list" | "ls" => CommandEvent::List,
            "show" => CommandEvent::Show,
            "accept" | "a" => CommandEvent::Accept(positive(required(rest, "accept", "an index")?)?),
            "reject" | "r" => CommandEvent::Reject(positive(required(rest, "reject", "an index")?)?),
            "accept-all" => CommandEvent::AcceptAll,
            "continue" => CommandEvent::Continue,
            "ask" => CommandEvent::Ask(required(rest, "ask", "a prompt")?.to_string()),
            "response" => {
                CommandEvent::Response(PathBuf::from(required(rest, "response", "a file path")?))
            }
            "edit" => {
                let rest = required(rest, "edit", "a line number")?;
                let (num, text) = rest.split_once(' ').unwrap_or((rest, ""));
                CommandEvent::Edit {
                    line: positive(num)?,
                    text: text.to_string(),
                }
            }
            "select" => {
                let rest = required(rest, "select", "a line range or `none`")?;
                if rest == "none" {
                    CommandEvent::ClearSelection
                } else {
                    let (a, b) = rest.split_once(char::is_whitespace).unwrap_or((rest, rest));
                    let (start_line, end_line) = (positive(a)?, positive(b.trim())?);
                    CommandEvent::Select {
                        start_line: start_line.min(end_line),
                        end_line: start_line.max(end_line),
                    }
                }
            }
            "undo" | "u" => CommandEvent::Undo,
            "redo" => CommandEvent::Redo,
            "save" | "w" => CommandEvent::Save,
            "compile" => CommandEvent::Compile,
            "help" | "?" => CommandEvent::Help,
            "quit" | "q" | "exit" => CommandEvent::Quit,
            other => return Err(CommandParseError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

/// Reads commands line by line from any async reader (stdin in the binary).
/// Blank lines are skipped; end of input sends `Event::Shutdown`.
pub struct LineCommandSource<R> {
    reader: R,
}

impl<R> LineCommandSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R> AsyncEventSource for LineCommandSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> &'static str {
        "commands"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let mut lines = self.reader.lines();
        tokio::spawn(async move {
            loop {
                let event = match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match line.parse::<CommandEvent>() {
                        Ok(cmd) => {
                            trace!(target: "runtime.events", ?cmd, "command_parsed");
                            Event::Command(cmd)
                        }
                        Err(e) => Event::InvalidCommand(e.to_string()),
                    },
                    Ok(None) => Event::Shutdown,
                    Err(e) => {
                        debug!(target: "runtime.events", error = %e, "command_read_failed");
                        Event::Shutdown
                    }
                };
                let last = matches!(event, Event::Shutdown);
                if tx.send(event).await.is_err() {
                    CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                if last {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<CommandEvent, CommandParseError> {
        s.parse()
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse("list"), Ok(CommandEvent::List));
        assert_eq!(parse("  accept 3 "), Ok(CommandEvent::Accept(3)));
        assert_eq!(parse("accept-all"), Ok(CommandEvent::AcceptAll));
        assert_eq!(parse("q"), Ok(CommandEvent::Quit));
    }

    #[test]
    fn ask_keeps_whole_prompt() {
        assert_eq!(
            parse("ask fix the   spacing"),
            Ok(CommandEvent::Ask("fix the   spacing".into()))
        );
    }

    #[test]
    fn edit_allows_empty_text() {
        assert_eq!(
            parse("edit 4"),
            Ok(CommandEvent::Edit {
                line: 4,
                text: String::new()
            })
        );
        assert_eq!(
            parse("edit 2 \\section{A b}"),
            Ok(CommandEvent::Edit {
                line: 2,
                text: "\\section{A b}".into()
            })
        );
    }

    #[test]
    fn select_orders_bounds() {
        assert_eq!(
            parse("select 9 3"),
            Ok(CommandEvent::Select {
                start_line: 3,
                end_line: 9
            })
        );
        assert_eq!(
            parse("select 5"),
            Ok(CommandEvent::Select {
                start_line: 5,
                end_line: 5
            })
        );
        assert_eq!(parse("select none"), Ok(CommandEvent::ClearSelection));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse(""), Err(CommandParseError::Empty));
        assert_eq!(parse("accept 0"), Err(CommandParseError::InvalidNumber("0".into())));
        assert!(matches!(
            parse("reject"),
            Err(CommandParseError::MissingArgument { command: "reject", .. })
        ));
        assert_eq!(parse("frobnicate"), Err(CommandParseError::Unknown("frobnicate".into())));
    }
}
