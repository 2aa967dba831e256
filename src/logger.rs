//! Server log pipeline: timestamped, level-tagged lines in date-named files.
//!
//! The logger is an explicit handle constructed once in `main` and cloned
//! into every component that needs it; there is no global instance. In
//! asynchronous mode, `write` pushes the rendered line onto a bounded queue
//! drained by one background thread; when the queue is full (or the logger
//! runs synchronously) the line is written directly under the file lock, so
//! a log line is never dropped.
//!
//! Rotation happens under the same lock that guards the line counter: a new
//! file is opened when the calendar day changes, and a `.N`-suffixed file is
//! opened when the line count crosses the split threshold within one day.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use chrono::{DateTime, Local, NaiveDate};

use crate::queue::BoundedQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Debug => "[debug]",
            Level::Info => "[info]",
            Level::Warn => "[warn]",
            Level::Error => "[error]",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory the log files live in; created if missing.
    pub dir: PathBuf,
    /// Base file name, prefixed with the current date.
    pub file_name: String,
    /// Lines per file before a `.N` sequence file is opened.
    pub split_lines: u64,
    /// Queue depth for asynchronous mode; `0` selects synchronous writes.
    pub queue_depth: usize,
}

struct Sink {
    out: File,
    day: NaiveDate,
    lines: u64,
    seq: u64,
}

struct Shared {
    sink: Mutex<Sink>,
    dir: PathBuf,
    file_name: String,
    split_lines: u64,
    queue: Option<Arc<BoundedQueue<String>>>,
}

/// Cheaply cloneable logging handle.
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
    drain: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Logger {
    /// Opens today's log file and, when `queue_depth >= 1`, starts the
    /// background drain thread.
    pub fn open(config: &LogConfig) -> io::Result<Logger> {
        fs::create_dir_all(&config.dir)?;
        let today = Local::now().date_naive();
        let out = open_log_file(&config.dir, &config.file_name, today, 0)?;

        let queue = if config.queue_depth >= 1 {
            Some(Arc::new(BoundedQueue::new(config.queue_depth)))
        } else {
            None
        };

        let shared = Arc::new(Shared {
            sink: Mutex::new(Sink {
                out,
                day: today,
                lines: 0,
                seq: 0,
            }),
            dir: config.dir.clone(),
            file_name: config.file_name.clone(),
            split_lines: config.split_lines.max(1),
            queue: queue.clone(),
        });

        let drain = queue.map(|queue| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                while let Some(line) = queue.pop() {
                    shared.append(&line);
                }
            })
        });

        Ok(Logger {
            shared,
            drain: Arc::new(Mutex::new(drain)),
        })
    }

    /// Renders and records one log line.
    pub fn write(&self, level: Level, message: &str) {
        let line = render(Local::now(), level, message);
        match &self.shared.queue {
            Some(queue) => {
                // Full (or closed) queue: the line comes back and is written
                // synchronously instead.
                if let Err(line) = queue.push(line) {
                    self.shared.append(&line);
                }
            }
            None => self.shared.append(&line),
        }
    }

    pub fn debug(&self, message: &str) {
        self.write(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.write(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.write(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.write(Level::Error, message);
    }

    /// Stops the drain thread after it has flushed everything still queued.
    /// Later writes fall back to the synchronous path.
    pub fn shutdown(&self) {
        if let Some(queue) = &self.shared.queue {
            queue.close();
        }
        let handle = match self.drain.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Shared {
    fn append(&self, line: &str) {
        let mut sink = self.lock_sink();
        if let Err(err) = self.rotate_if_needed(&mut sink) {
            eprintln!("log rotation failed: {err}");
        }
        if let Err(err) = sink.out.write_all(line.as_bytes()) {
            eprintln!("log write failed: {err}");
            return;
        }
        sink.lines += 1;
    }

    fn rotate_if_needed(&self, sink: &mut Sink) -> io::Result<()> {
        let today = Local::now().date_naive();
        if sink.day != today {
            sink.out = open_log_file(&self.dir, &self.file_name, today, 0)?;
            sink.day = today;
            sink.lines = 0;
            sink.seq = 0;
        } else if sink.lines >= self.split_lines {
            sink.seq += 1;
            sink.out = open_log_file(&self.dir, &self.file_name, today, sink.seq)?;
            sink.lines = 0;
        }
        Ok(())
    }

    fn lock_sink(&self) -> MutexGuard<'_, Sink> {
        match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// `2000-01-01 00:00:00.123456 [info]: message`
fn render(at: DateTime<Local>, level: Level, message: &str) -> String {
    format!(
        "{} {}: {}\n",
        at.format("%Y-%m-%d %H:%M:%S%.6f"),
        level.tag(),
        message
    )
}

fn open_log_file(dir: &Path, file_name: &str, day: NaiveDate, seq: u64) -> io::Result<File> {
    let base = format!("{}_{}", day.format("%Y_%m_%d"), file_name);
    let name = if seq == 0 {
        base
    } else {
        format!("{base}.{seq}")
    };
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_timestamp_and_tag() {
        let at = Local::now();
        let line = render(at, Level::Info, "hello");
        assert!(line.contains("[info]: hello"));
        assert!(line.ends_with('\n'));
        // date + space + time with microseconds
        assert_eq!(line.split(' ').count(), 4);
    }
}
