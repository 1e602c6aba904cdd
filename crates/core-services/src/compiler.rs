//! LaTeX compilation seam.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Failure details as reported by the compile service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileFailure {
    pub message: String,
    pub log: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i32>,
}

impl CompileFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Pdf(Vec<u8>),
    Failed(CompileFailure),
}

/// Compiles full document content. Transport problems are reported as
/// `CompileOutcome::Failed`, never as a panic.
pub trait Compiler: Send + Sync + 'static {
    fn compile(&self, content: String) -> impl Future<Output = CompileOutcome> + Send;
}

impl<T: Compiler> Compiler for std::sync::Arc<T> {
    fn compile(&self, content: String) -> impl Future<Output = CompileOutcome> + Send {
        (**self).compile(content)
    }
}

/// In-process stand-in: "renders" the source bytes behind a PDF magic
/// header. Documents without `\end{document}` fail like a real run would.
#[derive(Debug, Default)]
pub struct EchoCompiler {
    runs: AtomicUsize,
}

impl EchoCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Compiler for EchoCompiler {
    async fn compile(&self, content: String) -> CompileOutcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if !content.contains("\\end{document}") {
            return CompileOutcome::Failed(CompileFailure {
                message: "Emergency stop: missing \\end{document}".into(),
                log: Some(content.lines().rev().take(5).collect::<Vec<_>>().join("\n")),
                exit_code: Some(1),
                ..CompileFailure::default()
            });
        }
        let mut pdf = b"%PDF-1.5\n".to_vec();
        pdf.extend_from_slice(content.as_bytes());
        CompileOutcome::Pdf(pdf)
    }
}
