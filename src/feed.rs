//! Newline-delimited JSON event feed.
//!
//! Every TCP client gets its own broadcaster subscription. The first frame is
//! the current stats snapshot, followed by `newDomain` and `stats` frames as
//! they are published. A client that cannot keep up or disconnects is
//! dropped without affecting the others.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::core::broadcaster::{EventBroadcaster, Subscription};
use crate::utils::error::Result;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[async_trait]
trait Acceptor: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// Accepts feed clients until `cancel` fires. A failed `accept` is logged
/// and retried after a short pause; it never stops the feed.
///
/// # Errors
///
/// Currently always returns `Ok`; the `Result` leaves room for setup
/// failures.
pub async fn serve_event_feed(
    listener: TcpListener,
    broadcaster: EventBroadcaster,
    cancel: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Event feed listening");
    }
    accept_loop(&listener, &broadcaster, &cancel).await;
    tracing::info!("Event feed stopped");
    Ok(())
}

async fn accept_loop(
    listener: &dyn Acceptor,
    broadcaster: &EventBroadcaster,
    cancel: &CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer) = match accepted {
            Ok(connection) => connection,
            Err(e) => {
                // Usually descriptor exhaustion or an aborted handshake.
                tracing::warn!(error = %e, "Feed accept failed; retrying");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(ACCEPT_RETRY_DELAY) => continue,
                }
            }
        };

        tracing::debug!(%peer, "Feed client connected");
        let subscription = broadcaster.subscribe();
        tokio::spawn(stream_events(stream, subscription, cancel.clone()));
    }
}

async fn stream_events(
    mut stream: TcpStream,
    mut subscription: Subscription,
    cancel: CancellationToken,
) {
    let id = subscription.id();
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = subscription.recv() => event,
        };
        // None: the hub dropped this subscriber (full buffer) or shut down.
        let Some(event) = event else { break };

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(subscriber = id, error = %e, "Event not serializable; skipped");
                continue;
            }
        };

        if let Err(e) = stream.write_all(frame.as_bytes()).await {
            tracing::debug!(subscriber = id, error = %e, "Feed client write failed");
            break;
        }
    }

    let _ = stream.shutdown().await;
    tracing::debug!(subscriber = id, "Feed client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufReadExt, BufReader};

    /// Fails the first `failures` accepts, then behaves like the listener.
    struct FlakyListener {
        inner: TcpListener,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl Acceptor for FlakyListener {
        async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(io::Error::new(io::ErrorKind::Other, "Too many open files"));
            }
            self.inner.accept().await
        }
    }

    #[tokio::test]
    async fn test_accept_errors_do_not_stop_the_feed() {
        let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = inner.local_addr().unwrap();
        let listener = FlakyListener {
            inner,
            failures: AtomicUsize::new(3),
        };
        let broadcaster = EventBroadcaster::new(16);
        let cancel = CancellationToken::new();

        let server = {
            let broadcaster = broadcaster.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { accept_loop(&listener, &broadcaster, &cancel).await })
        };

        let client = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(client).lines();
        let first = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(first.contains("\"stats\""));
        assert!(!server.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap();
    }
}
