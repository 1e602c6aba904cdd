//! Configuration loading and parsing.
//!
//! Parses `octree.toml` (or an override path provided by the binary). Every
//! section and key is optional; missing values take the defaults below and
//! unknown keys are ignored so older binaries accept newer files. A file that
//! fails to parse falls back to defaults with a warning instead of aborting
//! startup.
//!
//! ```toml
//! [suggestions]
//! batch_size = 5
//! verify_original_text = false
//! rebase_on_accept = true
//!
//! [compile]
//! debounce_ms = 1500
//! timeout_secs = 30
//! program = "latexmk"
//! args = ["-pdf", "-interaction=nonstopmode"]
//!
//! [assistant]
//! fast_model = "gpt-4o-mini"
//! capable_model = "gpt-4o"
//! timeout_secs = 30
//! small_change_lines = 5
//! program = ""
//!
//! [storage]
//! dir = "."
//! ```

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "octree.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SuggestionsConfig {
    pub batch_size: usize,
    /// Treat a changed `original` text at the anchor as a conflict, not only
    /// an out-of-range anchor.
    pub verify_original_text: bool,
    /// Shift later anchors after an accepted edit changes the line count.
    pub rebase_on_accept: bool,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            verify_original_text: false,
            rebase_on_accept: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CompileConfig {
    pub debounce_ms: u64,
    pub timeout_secs: u64,
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1500,
            timeout_secs: 30,
            program: "latexmk".into(),
            args: vec!["-pdf".into(), "-interaction=nonstopmode".into()],
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AssistantConfig {
    pub fast_model: String,
    pub capable_model: String,
    pub timeout_secs: u64,
    /// A conflict counts as small when both texts span at most this many lines.
    pub small_change_lines: usize,
    /// External command answering assistant requests; empty disables `ask`.
    pub program: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            fast_model: "gpt-4o-mini".into(),
            capable_model: "gpt-4o".into(),
            timeout_secs: 30,
            small_change_lines: 5,
            program: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
    #[serde(default)]
    pub compile: CompileConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
    pub source: Option<PathBuf>,
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("octree").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                file,
                source: Some(path),
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Batch size with the lower bound applied.
    pub fn batch_size(&self) -> usize {
        let raw = self.file.suggestions.batch_size;
        if raw == 0 {
            info!(target: "config", raw, clamped = 1, "batch_size_clamped");
            return 1;
        }
        raw
    }

    pub fn compile_debounce(&self) -> Duration {
        Duration::from_millis(self.file.compile.debounce_ms)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.file.compile.timeout_secs.max(1))
    }

    pub fn assistant_timeout(&self) -> Duration {
        Duration::from_secs(self.file.assistant.timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn capture<F: FnOnce()>(level: Level, f: F) -> String {
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();
        with_default(subscriber, f);
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        assert_eq!(cfg.batch_size(), 5);
        assert!(!cfg.file.suggestions.verify_original_text);
        assert!(cfg.file.suggestions.rebase_on_accept);
        assert_eq!(cfg.compile_debounce(), Duration::from_millis(1500));
        assert_eq!(cfg.file.assistant.small_change_lines, 5);
        assert!(cfg.source.is_none());
    }

    #[test]
    fn parses_partial_sections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[suggestions]\nbatch_size = 3\n[assistant]\nfast_model = \"tiny\"\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.batch_size(), 3);
        assert_eq!(cfg.file.assistant.fast_model, "tiny");
        assert_eq!(cfg.file.assistant.capable_model, "gpt-4o");
        assert_eq!(cfg.file.compile.program, "latexmk");
        assert_eq!(cfg.source.as_deref(), Some(tmp.path()));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[compile]\ndebounce_ms = 200\nengine = \"tectonic\"\n[theme]\nname = \"dark\"\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.compile_debounce(), Duration::from_millis(200));
    }

    #[test]
    fn zero_batch_size_clamps_with_config_log() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[suggestions]\nbatch_size = 0\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let mut size = 0;
        let log = capture(Level::INFO, || size = cfg.batch_size());
        assert_eq!(size, 1);
        assert!(log.contains("INFO config:"));
        assert!(log.contains("batch_size_clamped"));
    }

    #[test]
    fn parse_error_falls_back_with_warning() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[suggestions\nbatch_size = \"many\"\n").unwrap();
        let path = tmp.path().to_path_buf();
        let mut cfg = None;
        let log = capture(Level::WARN, || cfg = Some(load_from(Some(path)).unwrap()));
        let cfg = cfg.unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.batch_size(), 5);
        assert!(log.contains("WARN config:"));
        assert!(log.contains("config_parse_failed"));
    }

    #[test]
    fn timeouts_never_zero() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[assistant]\ntimeout_secs = 0\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.assistant_timeout(), Duration::from_secs(1));
    }
}
