//! Persistent OCI-P connection
//!
//! An [`OciConnection`] owns the TCP socket exclusively: all reads happen
//! on one background task spawned at connect time, all writes go through
//! the send operations. Inbound bytes accumulate until the buffer ends
//! with the literal envelope trailer; each complete message is parsed and
//! delivered to the oldest pending promise (correlation is positional, see
//! the crate docs).
//!
//! Lifecycle: [`connect`](OciConnection::connect) starts the reader,
//! [`close`](OciConnection::close) stops it. A fatal read or parse error
//! also stops it from the inside; either way the pending queue is drained
//! so blocked callers wake up with a closed-connection error.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ocip_core::OciDocument;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::promise::ResponsePromise;

/// Fixed preamble of every outgoing message
pub const ENVELOPE_HEADER: &str = "<?xml version='1.0' encoding='UTF-8'?>\n<BroadsoftDocument xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xmlns=\"C\" protocol=\"OCI\">";

/// Fixed closing marker; also the inbound message boundary
pub const ENVELOPE_TRAILER: &str = "</BroadsoftDocument>\n";

// Bound on the initial TCP connect
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Client connection to an OCI-P provisioning server
///
/// Cheap to clone; all clones share the same socket, pending queue and
/// lifecycle state.
#[derive(Clone)]
pub struct OciConnection {
    inner: Arc<Inner>,
}

struct Inner {
    peer: String,
    /// Write half of the socket. Holding this lock is also what makes
    /// "enqueue + write" atomic with respect to other senders.
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    /// Promises awaiting a response, oldest first
    pending: Mutex<VecDeque<PendingRequest>>,
    closing: AtomicBool,
    last_error: Mutex<Option<String>>,
    stop_tx: watch::Sender<bool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

struct PendingRequest {
    slot: oneshot::Sender<OciDocument>,
    request: String,
}

impl OciConnection {
    /// Open a connection and start its background reader
    ///
    /// Fails with [`Error::ConnectTimeout`] or [`Error::ConnectFailed`] if
    /// the server cannot be reached within the connect bound.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let peer = format!("{host}:{port}");
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&peer))
            .await
            .map_err(|_| Error::ConnectTimeout { addr: peer.clone() })?
            .map_err(|source| Error::ConnectFailed {
                addr: peer.clone(),
                source,
            })?;
        let (read_half, write_half) = stream.into_split();

        let (stop_tx, stop_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            peer: peer.clone(),
            writer: tokio::sync::Mutex::new(write_half),
            pending: Mutex::new(VecDeque::new()),
            closing: AtomicBool::new(false),
            last_error: Mutex::new(None),
            stop_tx,
            reader_task: Mutex::new(None),
        });

        let handle = tokio::spawn(read_loop(
            inner.clone(),
            BufReader::new(read_half),
            stop_rx,
        ));
        *inner.reader_task.lock() = Some(handle);

        info!("connected to {}", peer);
        Ok(OciConnection { inner })
    }

    /// Address this connection was opened against
    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    /// Last fatal error observed by the background reader, if any
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().clone()
    }

    /// Write a raw message and register a promise for its response
    ///
    /// The pending-queue entry is pushed before the bytes leave, under the
    /// writer lock, so queue order always equals wire order even with
    /// concurrent senders. Fails immediately once the connection is
    /// closing.
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<ResponsePromise> {
        let text = text.into();
        if self.inner.closing.load(Ordering::Relaxed) {
            return Err(self.closed_error());
        }

        let mut writer = self.inner.writer.lock().await;

        // The closing re-check and the push must happen under the same
        // pending lock the reader drains under: the reader raises the flag
        // while holding that lock, so an entry pushed here is guaranteed to
        // still be in the queue when the reader clears it.
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.inner.pending.lock();
            if self.inner.closing.load(Ordering::Relaxed) {
                return Err(self.closed_error());
            }
            pending.push_back(PendingRequest {
                slot: tx,
                request: text.clone(),
            });
        }

        let written = write_all(&mut writer, &text).await;
        if let Err(e) = written {
            // take the entry back out so correlation stays aligned
            self.inner.pending.lock().pop_back();
            return Err(Error::Io(e));
        }
        trace!(bytes = text.len(), "request written");

        Ok(ResponsePromise::new(rx, text))
    }

    /// Wrap a command fragment in the protocol envelope and send it
    pub async fn send(&self, fragment: &str) -> Result<ResponsePromise> {
        self.send_raw(format!("{ENVELOPE_HEADER}{fragment}{ENVELOPE_TRAILER}"))
            .await
    }

    /// Request the background reader to stop
    ///
    /// Idempotent. Any send attempted after this point fails immediately.
    /// With `wait`, returns only once the reader task has fully
    /// terminated.
    pub async fn close(&self, wait: bool) {
        self.inner.closing.store(true, Ordering::Relaxed);
        let _ = self.inner.stop_tx.send(true);
        if wait {
            let handle = self.inner.reader_task.lock().take();
            if let Some(handle) = handle {
                let _ = handle.await;
            }
        }
    }

    fn closed_error(&self) -> Error {
        Error::Closed {
            last_error: self.last_error(),
        }
    }
}

impl std::fmt::Debug for OciConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciConnection")
            .field("peer", &self.inner.peer)
            .field("closing", &self.inner.closing.load(Ordering::Relaxed))
            .finish()
    }
}

impl Inner {
    /// Record the first fatal error; later ones only add log noise
    fn record_error(&self, err: impl Into<String>) {
        let mut slot = self.last_error.lock();
        if slot.is_none() {
            *slot = Some(err.into());
        }
    }
}

async fn write_all(writer: &mut OwnedWriteHalf, text: &str) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

/// Background reading task, one per connection for its whole lifetime
///
/// Waits on the stop signal and the socket simultaneously, which gives the
/// same bounded-shutdown behavior as a polling read deadline without the
/// timer churn. Read errors, EOF, and undecodable messages are all fatal;
/// a silently dropped message would misalign every response behind it.
async fn read_loop(
    inner: Arc<Inner>,
    mut reader: BufReader<OwnedReadHalf>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut message = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        tokio::select! {
            _ = stop_rx.changed() => {
                debug!("reader stopping on close request");
                break;
            }
            read = reader.read_line(&mut line) => match read {
                Ok(0) => {
                    debug!("connection closed by peer");
                    inner.record_error("connection closed by peer");
                    break;
                }
                Ok(_) => {
                    message.push_str(&line);
                    if message.ends_with(ENVELOPE_TRAILER) {
                        if !deliver(&inner, message.trim()) {
                            break;
                        }
                        message.clear();
                    }
                }
                Err(e) => {
                    error!("socket read failed: {}", e);
                    inner.record_error(format!("read error: {e}"));
                    break;
                }
            }
        }
    }

    {
        // Raise the flag and drain in one critical section so a concurrent
        // send either sees `closing` and fails, or gets its entry dropped
        // here. Dropping the queued senders wakes every caller still
        // blocked on a promise with a closed-connection error.
        let mut pending = inner.pending.lock();
        inner.closing.store(true, Ordering::Relaxed);
        pending.clear();
    }
    debug!("reader stopped");
}

/// Parse one complete inbound message and complete the oldest promise
///
/// Returns false when the message could not be parsed; the caller tears
/// the connection down in that case.
fn deliver(inner: &Inner, body: &str) -> bool {
    let doc = match OciDocument::parse(body) {
        Ok(doc) => doc,
        Err(e) => {
            error!(
                "undecodable server message, closing connection: {} (body hex: {})",
                e,
                hex::encode(body.as_bytes())
            );
            inner.record_error(format!("response parsing error: {e}"));
            return false;
        }
    };

    match inner.pending.lock().pop_front() {
        Some(entry) => {
            trace!(request = %entry.request, "completing response slot");
            // the caller may have dropped its promise; nothing to do then
            let _ = entry.slot.send(doc);
        }
        None => warn!("response with no pending request, dropping"),
    }
    true
}
