//! Liveness heartbeat for serve mode.
//!
//! Emits `ping:<n>` every interval, independent of command traffic, through
//! the same [`SharedOutput`] the command loop writes to.

use std::time::Duration;

use anyhow::Context;
use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::output::{write_response, SharedOutput};
use crate::core::protocol::Response;

/// Handle to a running ping task.  Dropping it without [`stop`](Self::stop)
/// leaves the task running.
pub struct PingEmitter<W> {
    output: SharedOutput<W>,
    cancel: CancellationToken,
    handle: JoinHandle<std::io::Result<u64>>,
}

impl<W> PingEmitter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Start pinging on the current runtime.  The first ping goes out one
    /// full `interval` after this call.
    pub fn spawn(output: SharedOutput<W>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(output.clone(), interval, cancel.clone()));
        Self {
            output,
            cancel,
            handle,
        }
    }

    /// Signal the task to stop and wait for it to finish.  Returns how many
    /// pings were written.
    ///
    /// The stop signal is raised while holding the output lock, so no ping
    /// can reach the stream once this starts returning.
    pub async fn stop(self) -> anyhow::Result<u64> {
        {
            let _stream = self.output.lock().await;
            self.cancel.cancel();
        }
        let emitted = self
            .handle
            .await
            .context("ping task panicked")?
            .context("failed to write ping")?;
        Ok(emitted)
    }
}

async fn run<W: AsyncWrite + Unpin>(
    output: SharedOutput<W>,
    interval: Duration,
    cancel: CancellationToken,
) -> std::io::Result<u64> {
    let mut counter: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let mut out = output.lock().await;
        // Stop may have been requested while we waited for the lock.
        if cancel.is_cancelled() {
            break;
        }
        write_response(&mut *out, &Response::Ping(counter)).await?;
        drop(out);

        trace!(counter, "ping");
        counter = counter.wrapping_add(1);
    }

    debug!(emitted = counter, "ping emitter stopped");
    Ok(counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn pings_count_up_from_zero() {
        let output = SharedOutput::new(Vec::new());
        let pinger = PingEmitter::spawn(output.clone(), Duration::from_secs(3));

        tokio::time::sleep(Duration::from_millis(9_500)).await;
        let emitted = pinger.stop().await.unwrap();

        assert_eq!(emitted, 3);
        assert_eq!(text(&output.lock().await), "ping:0\nping:1\nping:2\n");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_sleep() {
        let output = SharedOutput::new(Vec::new());
        let pinger = PingEmitter::spawn(output.clone(), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let started = tokio::time::Instant::now();
        assert_eq!(pinger.stop().await.unwrap(), 0);

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(output.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_written_after_stop() {
        let output = SharedOutput::new(Vec::new());
        let pinger = PingEmitter::spawn(output.clone(), Duration::from_secs(3));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        pinger.stop().await.unwrap();
        let after_stop = output.lock().await.clone();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(*output.lock().await, after_stop);
        assert_eq!(text(&after_stop), "ping:0\n");
    }

    #[tokio::test(start_paused = true)]
    async fn ping_waits_for_a_held_lock() {
        let output = SharedOutput::new(Vec::new());
        let pinger = PingEmitter::spawn(output.clone(), Duration::from_secs(3));

        {
            let mut out = output.lock().await;
            out.extend_from_slice(b"listing\n");
            tokio::time::sleep(Duration::from_secs(5)).await;
            out.extend_from_slice(b"a:A\n\n");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        pinger.stop().await.unwrap();

        assert_eq!(text(&output.lock().await), "listing\na:A\n\nping:0\n");
    }
}
