//! Byte streams for command I/O.
//!
//! Three stream kinds back stdin/stdout/stderr: memory buffers (captured
//! output, here-docs, here-strings), bounded pipes (a full buffer suspends
//! the writer, an empty one suspends the reader) and VFS-backed files.
//! [`Output`] handles are cheap clones of a shared sink, which is what makes
//! `2>&1` duplicate rather than copy.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, Notify};

use crate::error::{Error, Result};
use crate::fs::FileSystem;

struct PipeInner {
    buffer: VecDeque<u8>,
    capacity: usize,
    writer_closed: bool,
    reader_closed: bool,
}

struct PipeShared {
    inner: Mutex<PipeInner>,
    /// Writer pings this after producing; `notify_one` stores a permit so a
    /// late reader never misses the wakeup.
    data_ready: Notify,
    /// Reader pings this after consuming or closing.
    space_ready: Notify,
}

/// Writing end of a bounded pipe.
pub struct PipeWriter {
    shared: Arc<PipeShared>,
}

/// Reading end of a bounded pipe.
pub struct PipeReader {
    shared: Arc<PipeShared>,
}

/// Create a bounded pipe pair. The writer suspends when `capacity` bytes are
/// buffered; the reader suspends when the buffer is empty and the writer is
/// still open.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let shared = Arc::new(PipeShared {
        inner: Mutex::new(PipeInner {
            buffer: VecDeque::new(),
            capacity: capacity.max(1),
            writer_closed: false,
            reader_closed: false,
        }),
        data_ready: Notify::new(),
        space_ready: Notify::new(),
    });
    (
        PipeWriter {
            shared: Arc::clone(&shared),
        },
        PipeReader { shared },
    )
}

impl PipeWriter {
    /// Write all of `data`, suspending whenever the buffer is full.
    /// Fails with `BrokenPipe` once the reader is gone.
    pub async fn write_all(&self, data: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < data.len() {
            {
                let mut inner = self.shared.inner.lock().await;
                if inner.reader_closed {
                    return Err(Error::BrokenPipe);
                }
                let available = inner.capacity.saturating_sub(inner.buffer.len());
                if available > 0 {
                    let n = (data.len() - written).min(available);
                    inner.buffer.extend(&data[written..written + n]);
                    written += n;
                    self.shared.data_ready.notify_one();
                    continue;
                }
            }
            self.shared.space_ready.notified().await;
        }
        Ok(())
    }

    /// Signal EOF to the reader.
    pub async fn close(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.writer_closed = true;
        self.shared.data_ready.notify_one();
    }
}

impl PipeReader {
    /// Read whatever is buffered, suspending while the pipe is empty.
    /// Returns `None` at EOF (writer closed and buffer drained).
    pub async fn read_chunk(&mut self) -> Option<Vec<u8>> {
        loop {
            {
                let mut inner = self.shared.inner.lock().await;
                if !inner.buffer.is_empty() {
                    let chunk: Vec<u8> = inner.buffer.drain(..).collect();
                    self.shared.space_ready.notify_one();
                    return Some(chunk);
                }
                if inner.writer_closed {
                    return None;
                }
            }
            self.shared.data_ready.notified().await;
        }
    }

    /// Drop interest in further data; pending writers fail with BrokenPipe.
    pub async fn close(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.reader_closed = true;
        self.shared.space_ready.notify_one();
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        // Best effort: unblock a suspended writer when the consumer goes away
        // mid-stream (e.g. `head -1` finishing early).
        if let Ok(mut inner) = self.shared.inner.try_lock() {
            inner.reader_closed = true;
        }
        self.shared.space_ready.notify_one();
    }
}

enum OutputKind {
    Capture(StdMutex<Vec<u8>>),
    Pipe(PipeWriter),
    File {
        fs: Arc<dyn FileSystem>,
        path: PathBuf,
    },
    Null,
}

/// A byte sink handle. Clones share the underlying sink.
#[derive(Clone)]
pub struct Output {
    kind: Arc<OutputKind>,
}

impl Output {
    /// In-memory capture buffer (session stdout/stderr, `$( )` capture).
    pub fn capture() -> Self {
        Self {
            kind: Arc::new(OutputKind::Capture(StdMutex::new(Vec::new()))),
        }
    }

    /// Discard sink.
    pub fn null() -> Self {
        Self {
            kind: Arc::new(OutputKind::Null),
        }
    }

    pub fn from_pipe(writer: PipeWriter) -> Self {
        Self {
            kind: Arc::new(OutputKind::Pipe(writer)),
        }
    }

    /// VFS-backed sink. With `truncate`, the file is created or emptied up
    /// front; every `write` then appends, so interleaved writers behave like
    /// `O_APPEND` descriptors.
    pub async fn to_file(fs: Arc<dyn FileSystem>, path: PathBuf, truncate: bool) -> Result<Self> {
        if truncate {
            fs.write_file(&path, b"").await?;
        } else if !fs.exists(&path).await? {
            fs.write_file(&path, b"").await?;
        }
        Ok(Self {
            kind: Arc::new(OutputKind::File { fs, path }),
        })
    }

    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        match &*self.kind {
            OutputKind::Capture(buf) => {
                buf.lock().expect("capture buffer lock").extend_from_slice(bytes);
                Ok(())
            }
            OutputKind::Pipe(writer) => writer.write_all(bytes).await,
            OutputKind::File { fs, path } => fs.append_file(path, bytes).await,
            OutputKind::Null => Ok(()),
        }
    }

    pub async fn write_str(&self, text: &str) -> Result<()> {
        self.write(text.as_bytes()).await
    }

    /// Close the sink; only pipes care (EOF for the downstream reader).
    pub async fn close(&self) {
        if let OutputKind::Pipe(writer) = &*self.kind {
            writer.close().await;
        }
    }

    /// Snapshot of a capture buffer; empty for other sinks.
    pub fn captured(&self) -> Vec<u8> {
        match &*self.kind {
            OutputKind::Capture(buf) => buf.lock().expect("capture buffer lock").clone(),
            _ => Vec::new(),
        }
    }

    /// Drain a capture buffer, returning its contents.
    pub fn take_captured(&self) -> Vec<u8> {
        match &*self.kind {
            OutputKind::Capture(buf) => std::mem::take(&mut *buf.lock().expect("capture buffer lock")),
            _ => Vec::new(),
        }
    }
}

enum InputKind {
    Memory(Vec<u8>),
    Pipe(PipeReader),
    Null,
}

/// A byte source for command stdin.
pub struct Input {
    kind: InputKind,
    /// Bytes read from the source but not yet consumed by `read_line`.
    pending: VecDeque<u8>,
}

impl Input {
    pub fn null() -> Self {
        Self {
            kind: InputKind::Null,
            pending: VecDeque::new(),
        }
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: InputKind::Memory(data.into()),
            pending: VecDeque::new(),
        }
    }

    pub fn from_pipe(reader: PipeReader) -> Self {
        Self {
            kind: InputKind::Pipe(reader),
            pending: VecDeque::new(),
        }
    }

    /// Pull the next chunk from the underlying source. `None` means EOF.
    async fn fill(&mut self) -> Option<Vec<u8>> {
        match &mut self.kind {
            InputKind::Memory(data) => {
                if data.is_empty() {
                    None
                } else {
                    Some(std::mem::take(data))
                }
            }
            InputKind::Pipe(reader) => reader.read_chunk().await,
            InputKind::Null => None,
        }
    }

    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut out: Vec<u8> = self.pending.drain(..).collect();
        while let Some(chunk) = self.fill().await {
            out.extend_from_slice(&chunk);
        }
        out
    }

    pub async fn read_to_string(&mut self) -> String {
        String::from_utf8_lossy(&self.read_to_end().await).into_owned()
    }

    /// Read one line (without the trailing newline). `None` at EOF.
    pub async fn read_line(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                return Some(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
            }
            match self.fill().await {
                Some(chunk) => self.pending.extend(chunk),
                None => {
                    if self.pending.is_empty() {
                        return None;
                    }
                    let line: Vec<u8> = self.pending.drain(..).collect();
                    return Some(String::from_utf8_lossy(&line).into_owned());
                }
            }
        }
    }
}

/// The stdin/stdout/stderr bundle a command runs against.
pub struct Io {
    pub stdin: Input,
    pub stdout: Output,
    pub stderr: Output,
}

impl Io {
    pub fn new(stdin: Input, stdout: Output, stderr: Output) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
        }
    }

    /// Take the stdin handle, leaving a closed source in its place.
    pub fn take_stdin(&mut self) -> Input {
        std::mem::replace(&mut self.stdin, Input::null())
    }
}
