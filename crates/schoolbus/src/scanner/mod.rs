//! Scanner input.
//!
//! Decoded QR strings arrive from a [`ScanSource`] over a tokio channel and
//! pass through a [`DecodeDebouncer`] before reaching the recorder. Camera
//! choice for video scanners lives in [`camera`].

pub mod camera;

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

/// Default window for collapsing repeated decodes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Collapses repeated decodes of the same code.
///
/// A decode equal to the last accepted one and less than `window` after it
/// is dropped. Only the last accepted (value, instant) pair is kept.
#[derive(Debug, Clone)]
pub struct DecodeDebouncer {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl Default for DecodeDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl DecodeDebouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// The configured window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `value`, decoded now, is a new event.
    pub fn accept(&mut self, value: &str) -> bool {
        self.accept_at(value, Instant::now())
    }

    /// Whether `value`, decoded at `at`, is a new event.
    pub fn accept_at(&mut self, value: &str, at: Instant) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        if let Some((last, when)) = &self.last {
            if last == value && at.saturating_duration_since(*when) < self.window {
                trace!(value, "Dropping repeated decode");
                return false;
            }
        }
        self.last = Some((value.to_string(), at));
        true
    }

    /// Forget the last decode.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// A producer of scanned lines.
#[async_trait]
pub trait ScanSource: Send {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Start delivering trimmed lines through `tx`.
    ///
    /// Delivery stops at end of input or when the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanSourceStart`] if the source cannot start.
    async fn start(&mut self, tx: mpsc::Sender<String>) -> Result<JoinHandle<()>>;
}

/// Line-oriented source: stdin, or a keyboard-wedge/serial scanner exposed
/// as a readable path.
pub struct LineSource {
    name: String,
    reader: Option<Box<dyn AsyncBufRead + Unpin + Send>>,
}

impl fmt::Debug for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineSource")
            .field("name", &self.name)
            .field("started", &self.reader.is_none())
            .finish()
    }
}

impl LineSource {
    /// Read lines from `reader`.
    pub fn new<R>(name: impl Into<String>, reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self {
            name: name.into(),
            reader: Some(Box::new(reader)),
        }
    }

    /// Read lines from the process's standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new("stdin", BufReader::new(tokio::io::stdin()))
    }

    /// Read lines from a scanner device or file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanSourceStart`] if the path cannot be opened.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::ScanSourceStart {
                name: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::new(path.display().to_string(), BufReader::new(file)))
    }
}

#[async_trait]
impl ScanSource for LineSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self, tx: mpsc::Sender<String>) -> Result<JoinHandle<()>> {
        let reader = self.reader.take().ok_or_else(|| Error::ScanSourceStart {
            name: self.name.clone(),
            message: "already started".to_string(),
        })?;
        let name = self.name.clone();
        info!(source = %name, "Scan source started");

        Ok(tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line.trim().to_string()).await.is_err() {
                            debug!(source = %name, "Receiver dropped, stopping");
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(source = %name, "End of input");
                        break;
                    }
                    Err(e) => {
                        warn!(source = %name, error = %e, "Read failed, stopping");
                        break;
                    }
                }
            }
        }))
    }
}
