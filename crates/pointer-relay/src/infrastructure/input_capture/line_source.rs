//! Newline-delimited JSON capture source.
//!
//! Reads pointer events from any [`BufRead`] (standard input in the binary),
//! one JSON object per line:
//!
//! ```text
//! {"event":"move","x":812.5,"y":440}
//! {"event":"button","x":812,"y":440,"button":"left","pressed":true}
//! ```
//!
//! This lets any external capture tool drive the relay by piping its output
//! into `pointer-relay`.
//!
//! # Threading
//!
//! A single reader thread is spawned on the first [`start`](PointerSource::start)
//! and lives until the input reaches EOF.  Blocking reads cannot be
//! interrupted, so [`stop`](PointerSource::stop) does not kill the thread; it
//! detaches the current subscription instead, and lines read while stopped are
//! discarded.  A later `start()` attaches a fresh channel to the same reader.

use std::io::BufRead;
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex, PoisonError,
};
use std::thread;

use tracing::{debug, info, warn};

use super::{CaptureError, PointerSource, RawPointerEvent};

type Subscriber = Arc<Mutex<Option<Sender<RawPointerEvent>>>>;

/// Capture source fed by newline-delimited JSON.
pub struct LinePointerSource {
    reader: Mutex<Option<Box<dyn BufRead + Send>>>,
    subscriber: Subscriber,
}

impl LinePointerSource {
    /// Creates a source that will read from `reader` once started.
    pub fn new(reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            subscriber: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a source reading the process's standard input.
    pub fn stdin() -> Self {
        Self::new(Box::new(std::io::BufReader::new(std::io::stdin())))
    }

    fn spawn_reader(&self) -> Result<(), CaptureError> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(reader) = reader else {
            // Already running (or already at EOF).
            return Ok(());
        };
        let subscriber = Arc::clone(&self.subscriber);
        thread::Builder::new()
            .name("pointer-line-reader".to_string())
            .spawn(move || read_lines(reader, &subscriber))
            .map(|_| ())
            .map_err(|e| CaptureError::StartFailed(e.to_string()))
    }
}

impl PointerSource for LinePointerSource {
    fn probe(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn start(&self) -> Result<mpsc::Receiver<RawPointerEvent>, CaptureError> {
        let (tx, rx) = mpsc::channel();
        *self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.spawn_reader()?;
        Ok(rx)
    }

    fn stop(&self) {
        *self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Parses one input line.
///
/// Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns the `serde_json` error for malformed lines or unknown event kinds.
pub fn parse_line(line: &str) -> Result<Option<RawPointerEvent>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

fn read_lines(reader: Box<dyn BufRead + Send>, subscriber: &Subscriber) {
    for (index, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("capture input read failed: {e}");
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(event)) => {
                let guard = subscriber.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(tx) = guard.as_ref() {
                    // A closed receiver means the pump has gone away; drop the event.
                    let _ = tx.send(event);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("skipping malformed capture line {}: {e}", index + 1),
        }
    }
    info!("capture input reached end of stream");
}
