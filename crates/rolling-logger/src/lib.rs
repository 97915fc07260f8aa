//! Rolling Logger
//!
//! Installs a global `tracing` subscriber that writes every event to
//! `<dir>/<app>.log` and to stderr. `log` records from libraries are
//! bridged in as well.
//!
//! The file is rolled to `<app>.log.1 .. <app>.log.N` once it passes a
//! size limit, and the newest lines are kept in a bounded in-memory ring
//! so an in-app log viewer can show them without touching disk.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{self, format::Writer, time::FormatTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("cannot open log file: {0}")]
    Io(#[from] io::Error),
    #[error("a global logger is already installed: {0}")]
    AlreadyInitialized(String),
    #[error("logger not initialized")]
    NotInitialized,
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Roll the file once it grows past this many bytes
    pub max_file_bytes: u64,
    /// Rolled files kept next to the live one
    pub max_files: usize,
    /// Lines kept in memory for `recent_lines`
    pub buffer_lines: usize,
    pub level: LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_files: 3,
            buffer_lines: 500,
            level: LevelFilter::INFO,
        }
    }
}

struct RollingFile {
    dir: PathBuf,
    app_name: String,
    config: LoggerConfig,
    file: File,
    written: u64,
    ring: VecDeque<String>,
    partial: String,
}

impl RollingFile {
    fn open(dir: &Path, app_name: &str, config: LoggerConfig) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = log_path(dir, app_name, 0);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            dir: dir.to_path_buf(),
            app_name: app_name.to_string(),
            config,
            file,
            written,
            ring: VecDeque::new(),
            partial: String::new(),
        })
    }

    fn remember(&mut self, buf: &[u8]) {
        self.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            self.ring.push_back(line.trim_end().to_string());
            while self.ring.len() > self.config.buffer_lines {
                self.ring.pop_front();
            }
        }
    }

    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.config.max_files == 0 {
            self.file = File::create(log_path(&self.dir, &self.app_name, 0))?;
        } else {
            for n in (1..self.config.max_files).rev() {
                let from = log_path(&self.dir, &self.app_name, n);
                if from.exists() {
                    fs::rename(&from, log_path(&self.dir, &self.app_name, n + 1))?;
                }
            }
            fs::rename(
                log_path(&self.dir, &self.app_name, 0),
                log_path(&self.dir, &self.app_name, 1),
            )?;
            self.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path(&self.dir, &self.app_name, 0))?;
        }
        self.written = 0;
        Ok(())
    }
}

fn log_path(dir: &Path, app_name: &str, index: usize) -> PathBuf {
    if index == 0 {
        dir.join(format!("{}.log", app_name))
    } else {
        dir.join(format!("{}.log.{}", app_name, index))
    }
}

/// Shared handle to the rolling file; what the fmt layer writes into
#[derive(Clone)]
pub struct RollingWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl RollingWriter {
    pub fn open(dir: impl AsRef<Path>, app_name: &str, config: LoggerConfig) -> Result<Self, LoggerError> {
        let file = RollingFile::open(dir.as_ref(), app_name, config)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RollingFile> {
        // A panic mid-write leaves nothing inconsistent worth refusing over.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn recent_lines(&self) -> Vec<String> {
        self.lock().ring.iter().cloned().collect()
    }

    pub fn path(&self) -> PathBuf {
        let inner = self.lock();
        log_path(&inner.dir, &inner.app_name, 0)
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        if inner.written > 0 && inner.written + buf.len() as u64 > inner.config.max_file_bytes {
            inner.roll()?;
        }
        inner.file.write_all(buf)?;
        inner.written += buf.len() as u64;
        inner.remember(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().file.flush()
    }
}

struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

static WRITER: OnceLock<RollingWriter> = OnceLock::new();

/// Install the global logger with default settings.
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), LoggerError> {
    init_with_config(log_dir, app_name, LoggerConfig::default())
}

pub fn init_with_config(
    log_dir: impl AsRef<Path>,
    app_name: &str,
    config: LoggerConfig,
) -> Result<(), LoggerError> {
    if WRITER.get().is_some() {
        return Err(LoggerError::AlreadyInitialized("rolling logger".to_string()));
    }
    let level = config.level;
    let writer = RollingWriter::open(log_dir, app_name, config)?;

    let file_writer = writer.clone();
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(LocalTime)
        .with_writer(move || file_writer.clone());
    let stderr_layer = fmt::layer().with_timer(LocalTime).with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(level)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))?;

    let path = writer.path();
    // Losing this race only means another thread finished init first.
    let _ = WRITER.set(writer);
    log::info!("logging to {}", path.display());
    Ok(())
}

pub fn info(msg: &str) -> Result<(), LoggerError> {
    WRITER.get().ok_or(LoggerError::NotInitialized)?;
    tracing::info!("{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), LoggerError> {
    WRITER.get().ok_or(LoggerError::NotInitialized)?;
    tracing::error!("{}", msg);
    Ok(())
}

/// Newest lines written since init, oldest first
pub fn recent_lines() -> Vec<String> {
    WRITER.get().map(RollingWriter::recent_lines).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> LoggerConfig {
        LoggerConfig {
            max_file_bytes: 64,
            max_files: 2,
            buffer_lines: 3,
            level: LevelFilter::DEBUG,
        }
    }

    #[test]
    fn test_ring_keeps_newest_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingWriter::open(dir.path(), "test", small_config()).unwrap();

        for i in 0..5 {
            writeln!(writer, "line {}", i).unwrap();
        }
        assert_eq!(writer.recent_lines(), ["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_partial_lines_wait_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingWriter::open(dir.path(), "test", small_config()).unwrap();

        writer.write_all(b"hel").unwrap();
        assert!(writer.recent_lines().is_empty());
        writer.write_all(b"lo\n").unwrap();
        assert_eq!(writer.recent_lines(), ["hello"]);
    }

    #[test]
    fn test_file_rolls_past_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingWriter::open(dir.path(), "test", small_config()).unwrap();

        for i in 0..20 {
            let line = format!("a fairly long log line number {}\n", i);
            writer.write_all(line.as_bytes()).unwrap();
        }
        writer.flush().unwrap();

        assert!(dir.path().join("test.log").exists());
        assert!(dir.path().join("test.log.1").exists());
        assert!(dir.path().join("test.log.2").exists());
        assert!(!dir.path().join("test.log.3").exists());

        let live = fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert!(live.contains("number 19"));
        assert!(!live.contains("number 0\n"));
    }

    #[test]
    fn test_helpers_require_init() {
        // No test in this crate installs the global logger.
        assert!(matches!(info("hi"), Err(LoggerError::NotInitialized)));
        assert!(recent_lines().is_empty());
    }
}
