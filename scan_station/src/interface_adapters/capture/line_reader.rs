// Capture device adapter for QR readers that emit one decoded code per line: hardware
// scanners in serial or keyboard mode, or a camera decoder process piped into stdin.

use crate::domain::{Camera, CameraError, DecodeFeed};
use async_trait::async_trait;
use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, mpsc};
use tracing::{debug, warn};

/// Device path meaning "read decodes from standard input".
pub const STDIN_DEVICE: &str = "-";

const STDIN_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct LineReaderCamera {
    device: String,
}

impl LineReaderCamera {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

#[async_trait]
impl Camera for LineReaderCamera {
    async fn acquire(&self) -> Result<Box<dyn DecodeFeed>, CameraError> {
        if self.device == STDIN_DEVICE {
            let lines = stdin_lines()
                .map_err(|err| CameraError::new(STDIN_DEVICE, err.to_string()))?;
            debug!("reading decodes from stdin");
            return Ok(Box::new(lines.acquire(STDIN_DEVICE)?));
        }

        let feed = open_device(&self.device).await?;
        debug!(device = %self.device, "capture device opened");
        Ok(feed)
    }
}

async fn open_device(device: &str) -> Result<Box<dyn DecodeFeed>, CameraError> {
    let unavailable = |err: io::Error| CameraError::new(device, err.to_string());

    let metadata = tokio::fs::metadata(device).await.map_err(unavailable)?;
    if metadata.is_file() {
        // Regular files never wait on a producer, so reads on the blocking pool end promptly.
        let file = tokio::fs::File::open(device).await.map_err(unavailable)?;
        return Ok(Box::new(LineFeed::new(file)));
    }
    open_stream_device(device, &metadata).map_err(unavailable)
}

// FIFOs and character devices are read non-blocking through the reactor, so dropping the feed
// closes the descriptor at once instead of after the next line arrives.
#[cfg(unix)]
#[cfg_attr(not(target_os = "linux"), allow(unused_variables))]
fn open_stream_device(
    device: &str,
    metadata: &std::fs::Metadata,
) -> io::Result<Box<dyn DecodeFeed>> {
    use std::os::unix::fs::FileTypeExt;
    use tokio::net::unix::pipe;

    let mut options = pipe::OpenOptions::new();
    options.unchecked(true);
    // Holding a write end keeps a FIFO from reporting end of input before its producer
    // connects.
    #[cfg(target_os = "linux")]
    options.read_write(metadata.file_type().is_fifo());

    let receiver = options.open_receiver(device)?;
    Ok(Box::new(LineFeed::new(receiver)))
}

#[cfg(not(unix))]
fn open_stream_device(
    _device: &str,
    _metadata: &std::fs::Metadata,
) -> io::Result<Box<dyn DecodeFeed>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "stream capture devices are only supported on unix",
    ))
}

/// Decode feed over any line-oriented reader. Blank lines are skipped.
pub struct LineFeed<R> {
    lines: Lines<BufReader<R>>,
}

impl<R> LineFeed<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

#[async_trait]
impl<R> DecodeFeed for LineFeed<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_decode(&mut self) -> Option<String> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(line),
                Ok(None) => return None,
                Err(err) => {
                    warn!(error = %err, "capture device read failed");
                    return None;
                }
            }
        }
    }
}

// Lines from a source that outlives any one acquisition. A single reader thread owns the
// source; a feed holds the receiving end exclusively and hands it back when dropped.
#[derive(Clone)]
struct SharedLines {
    rx: Arc<AsyncMutex<mpsc::Receiver<String>>>,
}

impl SharedLines {
    fn new(rx: mpsc::Receiver<String>) -> Self {
        Self {
            rx: Arc::new(AsyncMutex::new(rx)),
        }
    }

    fn acquire(&self, device: &str) -> Result<SharedLineFeed, CameraError> {
        let mut rx = Arc::clone(&self.rx)
            .try_lock_owned()
            .map_err(|_| CameraError::new(device, "already in use"))?;
        // Lines entered while nobody was scanning do not belong to this session.
        while rx.try_recv().is_ok() {}
        Ok(SharedLineFeed { rx })
    }
}

struct SharedLineFeed {
    rx: OwnedMutexGuard<mpsc::Receiver<String>>,
}

#[async_trait]
impl DecodeFeed for SharedLineFeed {
    async fn next_decode(&mut self) -> Option<String> {
        loop {
            let line = self.rx.recv().await?;
            if !line.trim().is_empty() {
                return Some(line);
            }
        }
    }
}

// Process-wide stdin reader. The thread blocks on stdin outside the runtime, so neither a stop
// nor runtime shutdown waits for the operator to press Enter.
fn stdin_lines() -> io::Result<SharedLines> {
    static STDIN: Mutex<Option<SharedLines>> = Mutex::new(None);

    let mut slot = STDIN
        .lock()
        .map_err(|_| io::Error::other("stdin reader state poisoned"))?;
    if let Some(lines) = slot.as_ref() {
        return Ok(lines.clone());
    }

    let (tx, rx) = mpsc::channel(STDIN_BUFFER);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || read_stdin(tx))?;
    let lines = SharedLines::new(rx);
    *slot = Some(lines.clone());
    Ok(lines)
}

fn read_stdin(tx: mpsc::Sender<String>) {
    for line in io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                if tx.blocking_send(line).is_err() {
                    return;
                }
            }
            Err(err) => {
                warn!(error = %err, "stdin read failed");
                return;
            }
        }
    }
    debug!("stdin closed");
}
