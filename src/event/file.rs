// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Event, EventSink};
use crate::time::Timestamp;
use serde::Serialize;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// File name of the active compaction log
pub const LOG_FILE_NAME: &str = "compaction.log";

/// Write errors are reported at most once per interval
const ERROR_REPORT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct LogLine<'a> {
    #[serde(flatten)]
    event: &'a Event,
    date: String,
}

/// Appends events as JSON lines to `<dir>/compaction.log`
///
/// Events are serialized on the caller's thread, then handed to a dedicated
/// writer thread, so [`EventSink::record`] never blocks on I/O.
///
/// The log file is created when the first line is written. If a log file
/// already exists at that point, it is moved to the first free `compaction-N.log`.
///
/// Lines that cannot be written are dropped; the failure is logged.
pub struct CompactionLog {
    path: PathBuf,
    sender: Option<flume::Sender<String>>,
    thread: Option<JoinHandle<()>>,
}

impl CompactionLog {
    /// Starts the writer thread for a log in `dir`.
    ///
    /// # Errors
    ///
    /// Returns error if the writer thread could not be spawned.
    pub fn new<P: AsRef<Path>>(dir: P) -> crate::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let (sender, receiver) = flume::unbounded::<String>();

        let mut writer = LogWriter::new(dir.clone());

        let thread = std::thread::Builder::new()
            .name("compaction-log".into())
            .spawn(move || {
                while let Ok(line) = receiver.recv() {
                    writer.write_line(&line);
                }
                writer.close();
            })?;

        Ok(Self {
            path: dir.join(LOG_FILE_NAME),
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Path of the active log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for CompactionLog {
    fn record(&self, event: Event) {
        let line = LogLine {
            event: &event,
            date: Timestamp::now().to_rfc3339(),
        };

        let line = match serde_json::to_string(&line) {
            Ok(line) => line,
            Err(e) => {
                log::error!("Could not serialize {} event: {e:?}", event.kind.name());
                return;
            }
        };

        if let Some(sender) = &self.sender {
            if sender.send(line).is_err() {
                log::error!("Compaction log writer is gone, dropping event");
            }
        }
    }
}

impl Drop for CompactionLog {
    fn drop(&mut self) {
        // NOTE: Closing the channel lets the writer drain and exit
        self.sender.take();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Compaction log writer panicked");
            }
        }
    }
}

struct LogWriter {
    dir: PathBuf,
    file: Option<BufWriter<File>>,
    last_error_report: Option<Instant>,
}

impl LogWriter {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            file: None,
            last_error_report: None,
        }
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = self.try_write_line(line) {
            self.report(&e);
        }
    }

    fn try_write_line(&mut self, line: &str) -> std::io::Result<()> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => BufWriter::new(create_log(&self.dir)?),
        };

        file.write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush())?;

        // NOTE: On error the writer is dropped with its partial line,
        // the next line opens a fresh log
        self.file = Some(file);
        Ok(())
    }

    fn report(&mut self, e: &std::io::Error) {
        let now = Instant::now();

        let should_report = self
            .last_error_report
            .is_none_or(|last| now.duration_since(last) >= ERROR_REPORT_INTERVAL);

        if should_report {
            log::error!("Could not write to the compaction log: {e:?}");
            self.last_error_report = Some(now);
        }
    }

    fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                self.report(&e);
            }
        }
    }
}

/// Creates a fresh log file, rotating away an existing one.
fn create_log(dir: &Path) -> std::io::Result<File> {
    let path = dir.join(LOG_FILE_NAME);

    if path.try_exists()? {
        let rotated = (0..)
            .map(|n| dir.join(format!("compaction-{n}.log")))
            .find(|candidate| !candidate.exists())
            .unwrap_or_else(|| dir.join("compaction-rotated.log"));

        log::debug!("Rotating {} to {}", path.display(), rotated.display());
        std::fs::rename(&path, rotated)?;
    }

    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::StoreId, event::EventKind};
    use test_log::test;

    fn pending(n: usize) -> Event {
        Event {
            store: StoreId::new("ks", "tbl"),
            kind: EventKind::Pending {
                strategy: "STCS",
                pending: n,
            },
        }
    }

    #[test]
    fn compaction_log_writes_lines() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        let log = CompactionLog::new(dir.path())?;
        assert!(!log.path().exists());

        log.record(pending(1));
        log.record(pending(2));
        drop(log);

        let content = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME))?;
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(2, lines.len());

        for (line, expected) in lines.iter().zip([1, 2]) {
            let json: serde_json::Value =
                serde_json::from_str(line).map_err(std::io::Error::other)?;
            assert_eq!(Some(expected), json["pending"].as_u64());
            assert!(json["date"].is_string());
        }

        Ok(())
    }

    #[test]
    fn compaction_log_rotates() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(LOG_FILE_NAME), "old\n")?;
        std::fs::write(dir.path().join("compaction-0.log"), "older\n")?;

        let log = CompactionLog::new(dir.path())?;
        log.record(pending(1));
        drop(log);

        assert_eq!(
            "old\n",
            std::fs::read_to_string(dir.path().join("compaction-1.log"))?
        );
        assert_eq!(
            "older\n",
            std::fs::read_to_string(dir.path().join("compaction-0.log"))?
        );
        assert_eq!(
            1,
            std::fs::read_to_string(dir.path().join(LOG_FILE_NAME))?
                .lines()
                .count()
        );

        Ok(())
    }

    #[test]
    fn compaction_log_failed_write_drops_line() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(LOG_FILE_NAME);
        std::fs::write(&path, "")?;

        // Read-only handle, so flushing fails
        let mut writer = LogWriter::new(dir.path().to_path_buf());
        writer.file = Some(BufWriter::new(File::open(&path)?));

        writer.write_line("first");
        assert!(writer.file.is_none());

        writer.write_line("second");
        writer.close();

        assert_eq!("second\n", std::fs::read_to_string(&path)?);
        assert_eq!("", std::fs::read_to_string(dir.path().join("compaction-0.log"))?);

        Ok(())
    }

    #[test]
    fn compaction_log_missing_dir_drops_lines() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("does-not-exist");

        let log = CompactionLog::new(&missing)?;
        log.record(pending(1));
        log.record(pending(2));
        drop(log);

        assert!(!missing.exists());

        Ok(())
    }
}
