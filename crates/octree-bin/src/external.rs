//! Compiler and assistant backed by external programs.

use anyhow::{Context, bail};
use core_diff::ResponseAccumulator;
use core_services::{Assistant, AssistantRequest, CompileFailure, CompileOutcome, Compiler};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs a LaTeX toolchain (latexmk by default) in a build directory and
/// reads the produced PDF back.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    build_dir: PathBuf,
    job_name: String,
}

impl CommandCompiler {
    pub fn new(program: String, args: Vec<String>, build_dir: PathBuf, document_id: &str) -> Self {
        let job_name = document_id
            .strip_suffix(".tex")
            .unwrap_or(document_id)
            .to_string();
        Self {
            program,
            args,
            build_dir,
            job_name,
        }
    }

    async fn run(&self, content: String) -> anyhow::Result<CompileOutcome> {
        tokio::fs::create_dir_all(&self.build_dir)
            .await
            .with_context(|| format!("creating {}", self.build_dir.display()))?;
        let source = format!("{}.tex", self.job_name);
        tokio::fs::write(self.build_dir.join(&source), content.as_bytes()).await?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&source)
            .current_dir(&self.build_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("starting {}", self.program))?;
        let log = tokio::fs::read_to_string(self.build_dir.join(format!("{}.log", self.job_name)))
            .await
            .ok();
        debug!(target: "compile", status = ?output.status, "compiler_exited");

        if output.status.success() {
            let pdf = tokio::fs::read(self.build_dir.join(format!("{}.pdf", self.job_name)))
                .await
                .context("reading compiled PDF")?;
            return Ok(CompileOutcome::Pdf(pdf));
        }
        Ok(CompileOutcome::Failed(CompileFailure {
            message: format!("{} failed", self.program),
            log,
            stdout: Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            exit_code: output.status.code(),
        }))
    }
}

impl Compiler for CommandCompiler {
    async fn compile(&self, content: String) -> CompileOutcome {
        match self.run(content).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(target: "compile", error = %e, "compile_transport_failed");
                CompileOutcome::Failed(CompileFailure::new(format!("{e:#}")))
            }
        }
    }
}

/// Pipes each request as one JSON object into a helper program and treats
/// its standard output as the assistant's reply.
#[derive(Debug, Clone)]
pub struct CommandAssistant {
    program: String,
}

impl CommandAssistant {
    pub fn new(program: String) -> Self {
        Self { program }
    }
}

pub fn request_json(request: &AssistantRequest) -> serde_json::Value {
    serde_json::json!({
        "fileContent": request.file_content,
        "prompt": request.prompt,
        "selection": request.selection,
        "model": request.model,
    })
}

const READ_CHUNK: usize = 8 * 1024;

/// Read a reply as it is produced, feeding it through the diff-block
/// accumulator so completed suggestions are noticed before the helper exits.
/// Multi-byte characters split across reads are carried to the next chunk.
pub async fn stream_reply<R: AsyncRead + Unpin>(
    mut reader: R,
    chunk_size: usize,
) -> std::io::Result<ResponseAccumulator> {
    let mut acc = ResponseAccumulator::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut carry: Vec<u8> = Vec::new();
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        carry.extend_from_slice(&buf[..n]);
        let valid = match std::str::from_utf8(&carry) {
            Ok(text) => text.len(),
            // Invalid bytes (not a split character): take everything lossily.
            Err(e) if e.error_len().is_some() => carry.len(),
            Err(e) => e.valid_up_to(),
        };
        let chunk: Vec<u8> = carry.drain(..valid).collect();
        for s in acc.push(&String::from_utf8_lossy(&chunk)) {
            debug!(target: "assistant", id = %s.id, label = s.range_label().as_str(), "suggestion_streamed");
        }
    }
    if !carry.is_empty() {
        acc.push(&String::from_utf8_lossy(&carry));
    }
    Ok(acc)
}

impl Assistant for CommandAssistant {
    async fn complete(&self, request: AssistantRequest) -> anyhow::Result<String> {
        if self.program.is_empty() {
            bail!("no assistant program configured ([assistant] program in octree.toml)");
        }
        let payload = serde_json::to_vec(&request_json(&request))?;
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("starting {}", self.program))?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().context("assistant stdout not captured")?;
        let mut stderr = child.stderr.take().context("assistant stderr not captured")?;

        // Feed stdin while draining stdout and stderr so neither side can
        // block on a full pipe.
        let write = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        };
        let mut err_text = String::new();
        let (written, reply, _) = tokio::join!(
            write,
            stream_reply(stdout, READ_CHUNK),
            stderr.read_to_string(&mut err_text)
        );
        let status = child.wait().await?;
        if !status.success() {
            bail!("{} exited with {}: {}", self.program, status, err_text.trim());
        }
        if let Err(e) = written
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(e).context("writing assistant request");
        }
        let reply = reply.context("reading assistant reply")?;
        debug!(
            target: "assistant",
            bytes = reply.text().len(),
            suggestions = reply.emitted(),
            open_block = reply.has_open_block(),
            "assistant_reply_complete"
        );
        Ok(reply.finish())
    }
}
