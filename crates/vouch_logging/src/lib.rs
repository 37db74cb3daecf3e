//! Tracing setup for the vouch binary.
//!
//! Everything goes to a size-rotated file under `$VOUCH_HOME/logs`; stderr
//! gets the same filter unless the caller asks for quiet output.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "vouch=info,vouch_core=info";
const HOME_ENV: &str = "VOUCH_HOME";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    /// Base name of the log file (`<app_name>.log`).
    pub app_name: &'a str,
    pub verbose: bool,
    /// Only warnings and errors reach stderr.
    pub quiet: bool,
}

/// Install the global subscriber. Fails if the log directory cannot be
/// created or a subscriber is already installed.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let writer = RotatingWriter::open(&log_dir, config.app_name)
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        EnvFilter::new("debug")
    } else if config.quiet {
        EnvFilter::new("warn")
    } else {
        file_filter.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// `$VOUCH_HOME`, or `~/.vouch`. Falls back to `./.vouch` when no home
/// directory can be determined.
pub fn vouch_home() -> PathBuf {
    if let Some(path) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vouch")
}

pub fn logs_dir() -> PathBuf {
    vouch_home().join("logs")
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// `<base>.log` plus up to `max_files - 1` numbered predecessors.
struct RotatingFile {
    dir: PathBuf,
    base: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    size: u64,
}

impl RotatingFile {
    fn open(dir: &Path, name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut rotating = Self {
            dir: dir.to_path_buf(),
            base: sanitize_name(name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            size: 0,
        };
        rotating.reopen()?;
        if rotating.size > rotating.max_size {
            rotating.rotate()?;
        }
        Ok(rotating)
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base))
    }

    fn numbered_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base, index))
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let last = self.max_files - 1;
        if last > 0 {
            let oldest = self.numbered_path(last);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..last).rev() {
                let from = self.numbered_path(index);
                if from.exists() {
                    fs::rename(&from, self.numbered_path(index + 1))?;
                }
            }
            let current = self.current_path();
            if current.exists() {
                fs::rename(current, self.numbered_path(1))?;
            }
        } else {
            // Single-file mode: start over.
            fs::remove_file(self.current_path()).or_else(|e| match e.kind() {
                io::ErrorKind::NotFound => Ok(()),
                _ => Err(e),
            })?;
        }

        self.reopen()
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let written = file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Cloneable handle so one file can back the fmt layer's `MakeWriter`.
#[derive(Clone)]
struct RotatingWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl RotatingWriter {
    fn open(dir: &Path, name: &str) -> io::Result<Self> {
        let file = RotatingFile::open(dir, name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut RotatingFile) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        f(&mut guard)
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
