//! Delivered postings and the handles that own listening tasks.

use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// A resolved payload posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Topic path relative to the posting agent's root.
    pub topic: String,
    /// Timestamp the poster put on the envelope.
    pub timestamp: String,
    /// JSON text of the posting.
    pub payload: Vec<u8>,
}

/// A received raw file, already downloaded. The file belongs to the
/// receiver from here on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePosting {
    /// Topic path relative to the posting agent's root.
    pub topic: String,
    /// Timestamp the poster put on the envelope.
    pub timestamp: String,
    /// Local copy of the file, named after the timestamp.
    pub path: PathBuf,
}

/// Ordered stream of deliveries from one subscription.
///
/// Dropping the stream stops the decoding task behind it.
pub struct DeliveryStream<T> {
    inner: ReceiverStream<T>,
    decoder: AbortHandle,
}

/// Stream of inline or downloaded JSON postings.
pub type PostingStream = DeliveryStream<Posting>;
/// Stream of downloaded raw files.
pub type FileStream = DeliveryStream<FilePosting>;

impl<T> DeliveryStream<T> {
    pub(crate) fn new(receiver: mpsc::Receiver<T>, decoder: AbortHandle) -> Self {
        Self {
            inner: ReceiverStream::new(receiver),
            decoder,
        }
    }

    /// Next delivery, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.next().await
    }
}

impl<T> Stream for DeliveryStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T> Drop for DeliveryStream<T> {
    fn drop(&mut self) {
        self.decoder.abort();
    }
}

/// Owns a running listener. Dropping it, or calling [`stop`](Self::stop),
/// ends the listener.
#[must_use = "dropping a ListenerHandle stops the listener"]
#[derive(Debug)]
pub struct ListenerHandle {
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Take ownership of a spawned listener task.
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// End the listener now. Postings not yet handled are dropped.
    pub fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the listener task has ended, for any reason.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Keep the listener running for the rest of the process.
    pub fn detach(mut self) {
        self.task.take();
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stream_yields_in_order_and_ends() {
        let (tx, rx) = mpsc::channel(4);
        let decoder = tokio::spawn(async {});
        let mut stream = DeliveryStream::new(rx, decoder.abort_handle());
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        drop(tx);

        assert_eq!(stream.recv().await, Some(1));
        assert_eq!(stream.recv().await, Some(2));
        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropping_stream_aborts_decoder() {
        let (_tx, rx) = mpsc::channel::<u8>(1);
        let decoder = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let abort = decoder.abort_handle();
        drop(DeliveryStream::new(rx, abort));

        let joined = tokio::time::timeout(Duration::from_secs(1), decoder).await.unwrap();
        assert!(joined.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_stop_aborts_listener() {
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let handle = ListenerHandle::new(task);
        assert!(!handle.is_finished());
        handle.stop();
    }
}
