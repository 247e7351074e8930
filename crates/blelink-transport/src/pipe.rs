//! Line transport over a pair of async byte streams.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::{LineTransport, TransportError};

/// A [`LineTransport`] over any reader/writer pair.
///
/// Reader and writer sit behind separate locks, so a pending read never
/// holds up a write.
pub struct PipeTransport<R, W> {
    reader: Mutex<Lines<BufReader<R>>>,
    writer: Mutex<Option<W>>,
    closed: AtomicBool,
}

impl<R, W> PipeTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader).lines()),
            writer: Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
        }
    }

    /// Flushes and drops the writer, so the peer sees end of input.
    ///
    /// Reads keep working until the peer closes its side.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await.map_err(TransportError::WriteFailed)?;
        }
        Ok(())
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl<R, W> LineTransport for PipeTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;

        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            self.mark_closed();
            return Err(TransportError::WriteFailed(e));
        }

        tracing::debug!(line = line.trim_end(), "line written");
        Ok(())
    }

    async fn read_line(&self) -> Result<Option<String>, TransportError> {
        let next = self.reader.lock().await.next_line().await;
        match next {
            Ok(Some(line)) => {
                tracing::debug!(line = %line, "line read");
                Ok(Some(line))
            }
            Ok(None) => {
                tracing::debug!("end of stream");
                self.mark_closed();
                Ok(None)
            }
            Err(e) => {
                self.mark_closed();
                Err(TransportError::ReadFailed(e))
            }
        }
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}
