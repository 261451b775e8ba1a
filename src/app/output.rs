//! The single shared output stream.
//!
//! Both the command loop and the ping emitter hold a clone of [`SharedOutput`].
//! A response is written and flushed while the lock is held, so replies are
//! never torn by a concurrent writer.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};

use crate::core::protocol::Response;

pub struct SharedOutput<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for SharedOutput<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin> SharedOutput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Take exclusive ownership of the stream until the guard drops.
    pub async fn lock(&self) -> MutexGuard<'_, W> {
        self.inner.lock().await
    }

    /// Write one complete response as a single locked unit.
    pub async fn send(&self, response: &Response) -> std::io::Result<()> {
        let mut out = self.lock().await;
        write_response(&mut *out, response).await
    }
}

/// Write and flush `response` on an already-locked stream.
pub async fn write_response<W: AsyncWrite + Unpin>(
    out: &mut W,
    response: &Response,
) -> std::io::Result<()> {
    out.write_all(response.render().as_bytes()).await?;
    out.flush().await
}
