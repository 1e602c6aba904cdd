//! Octree entrypoint: a line-oriented front end over one LaTeX document.
use anyhow::Result;
use clap::Parser;
use core_actions::{
    EditorSession, FsDocumentStore, SessionOptions, compile_channel, dispatch, listing,
    open_document,
};
use core_config::load_from;
use core_events::{EVENT_CHANNEL_CAP, Event, EventSourceRegistry, LineCommandSource};
use core_services::AllowAllEdits;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod external;

use external::{CommandAssistant, CommandCompiler};

type Session = EditorSession<AllowAllEdits, FsDocumentStore, CommandAssistant>;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "octree", version, about = "Review AI edit suggestions for a LaTeX document")]
struct Args {
    /// The `.tex` document to open.
    pub document: PathBuf,
    /// Assistant response to load as the first turn.
    #[arg(long = "response")]
    pub response: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `octree.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    CommandQuit,
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::CommandQuit => "command_quit",
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("octree.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }
    let file_appender = tracing_appender::rolling::never(log_dir, "octree.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

struct Runtime {
    session: Session,
    rx: mpsc::Receiver<Event>,
    tx: Option<mpsc::Sender<Event>>,
    source_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Runtime {
    async fn run(&mut self) {
        let mut reason = ShutdownReason::ChannelClosed;
        while let Some(event) = self.rx.recv().await {
            match event {
                Event::Command(cmd) => {
                    trace!(target: "runtime.events", ?cmd, "command");
                    let result = dispatch(cmd, &mut self.session).await;
                    print_lines(&result.output);
                    if result.quit {
                        reason = ShutdownReason::CommandQuit;
                        break;
                    }
                }
                Event::InvalidCommand(message) => println!("{message} (try `help`)"),
                Event::AssistantResponse(text) => {
                    self.session.receive_response(&text);
                    print_lines(&listing(&self.session));
                }
                Event::Compile(report) => {
                    let generation = report.generation;
                    let success = report.is_success();
                    if self.session.on_compile_report(report) && success {
                        println!("compile #{generation} finished");
                    }
                    for notice in self.session.drain_notices() {
                        println!("! {notice}");
                    }
                }
                Event::Shutdown => {
                    reason = ShutdownReason::ShutdownEvent;
                    break;
                }
            }
        }
        self.rx.close();
        self.finalize_shutdown(reason).await;
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        info!(target: "runtime.shutdown", reason = %reason, "shutdown_begin");
        drop(self.tx.take());
        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(())) => trace!(target: "runtime.shutdown", "event_source_task_stopped"),
                Ok(Err(err)) => error!(target: "runtime.shutdown", ?err, "event_source_task_error"),
                // Stdin readers block until the next line; leave them to process exit.
                Err(_) => warn!(target: "runtime.shutdown", "event_source_task_timeout"),
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    let config = load_from(args.config.clone())?;
    let state = open_document(&args.document).await?;
    let storage_dir = if config.file.storage.dir == Path::new(".") {
        args.document
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        config.file.storage.dir.clone()
    };
    let compiler = CommandCompiler::new(
        config.file.compile.program.clone(),
        config.file.compile.args.clone(),
        storage_dir.join(".octree-build"),
        &state.document_id,
    );
    let assistant = CommandAssistant::new(config.file.assistant.program.clone());
    info!(
        target: "runtime.startup",
        document = state.document_id.as_str(),
        storage = %storage_dir.display(),
        config = ?config.source,
        "bootstrap_complete"
    );

    let mut session = EditorSession::new(
        state,
        AllowAllEdits,
        FsDocumentStore::new(storage_dir),
        assistant,
        SessionOptions::from_config(&config),
    );
    let (compile, worker) =
        compile_channel(compiler, config.compile_debounce(), config.compile_timeout());
    session.attach_compiler(compile);

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let mut registry = EventSourceRegistry::new();
    registry.register(LineCommandSource::new(BufReader::new(tokio::io::stdin())));
    registry.register(worker);
    let source_handles = registry.spawn_all(&tx);

    if let Some(path) = args.response.as_ref() {
        let text = tokio::fs::read_to_string(path).await?;
        tx.send(Event::AssistantResponse(text)).await?;
    } else {
        println!("opened {}; `help` lists commands", session.state().document_id);
    }

    let mut runtime = Runtime {
        session,
        rx,
        tx: Some(tx),
        source_handles,
    };
    runtime.run().await;
    Ok(())
}
