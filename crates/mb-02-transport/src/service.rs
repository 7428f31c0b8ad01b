//! Modelling bus connector: the envelope transport service.

use crate::envelope::{Envelope, EnvelopeBody};
use crate::listener::{DeliveryStream, FilePosting, FileStream, ListenerHandle, Posting, PostingStream};
use crate::metrics::TransportMetrics;
use mb_01_repository::{BlobPointer, CleanupReport, RepositoryConnector, RepositoryTransport, ScratchFile};
use shared_bus::{BusMessage, EventBusConnector};
use shared_types::{
    BusConfig, BusError, ErrorReporter, SystemTimestamps, TimestampSource, JSON_FILE_EXTENSION,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Publishes and receives postings for one agent.
///
/// Cheap to clone; clones share the bus, the repository connector (and its
/// directory cache), the timestamp source, the error sink and the metrics.
#[derive(Clone)]
pub struct ModellingBusConnector {
    bus: Arc<dyn EventBusConnector>,
    repository: Arc<RepositoryConnector>,
    timestamps: Arc<dyn TimestampSource>,
    reporter: Arc<dyn ErrorReporter>,
    metrics: Arc<TransportMetrics>,
    channel_capacity: usize,
}

impl ModellingBusConnector {
    /// Build a connector from configuration with a wall-clock timestamp
    /// source.
    pub fn new(
        config: &BusConfig,
        bus: Arc<dyn EventBusConnector>,
        repository_transport: Arc<dyn RepositoryTransport>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let timestamps: Arc<dyn TimestampSource> = Arc::new(SystemTimestamps::new());
        let repository = Arc::new(RepositoryConnector::new(
            config,
            repository_transport,
            Arc::clone(&timestamps),
        ));
        Self::from_parts(bus, repository, timestamps, reporter, config.channel_capacity)
    }

    /// Build a connector around an existing repository connector and
    /// timestamp source. Agents sharing a process can share both.
    pub fn from_parts(
        bus: Arc<dyn EventBusConnector>,
        repository: Arc<RepositoryConnector>,
        timestamps: Arc<dyn TimestampSource>,
        reporter: Arc<dyn ErrorReporter>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            bus,
            repository,
            timestamps,
            reporter,
            metrics: Arc::new(TransportMetrics::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Identifier of the agent this connector publishes as.
    pub fn agent_id(&self) -> &str {
        self.bus.agent_id()
    }

    /// Blob store connector used for large payloads and files.
    pub fn repository(&self) -> &RepositoryConnector {
        &self.repository
    }

    /// Sink every failure is reported to.
    pub fn reporter(&self) -> &Arc<dyn ErrorReporter> {
        &self.reporter
    }

    /// Transport counters.
    pub fn metrics(&self) -> &TransportMetrics {
        &self.metrics
    }

    /// Next timestamp from the shared source. Never sorts before an earlier one.
    pub fn new_timestamp(&self) -> String {
        self.timestamps.next_timestamp()
    }

    /// Application-level identifier: `<agent>-<timestamp>`.
    pub fn new_id(&self) -> String {
        format!("{}-{}", self.agent_id(), self.new_timestamp())
    }

    /// Local file name for a download, unique within a shared work directory.
    fn scratch_name(&self) -> String {
        format!("{}-{}", self.agent_id(), self.new_timestamp())
    }

    // =========================================================================
    // Posting
    // =========================================================================

    /// Post a JSON payload, inline when the bus admits it and through the
    /// repository otherwise.
    pub async fn post_payload(
        &self,
        topic_path: &str,
        payload: Vec<u8>,
        timestamp: &str,
    ) -> Result<(), BusError> {
        let envelope = if self.bus.payload_admissible(&payload) {
            Envelope::inline(timestamp, payload)
        } else {
            let size = payload.len() as u64;
            let pointer = self
                .repository
                .upload_json_payload(topic_path, &payload)
                .await?;
            self.metrics.record_upload(size);
            Envelope::remote(timestamp, pointer)
        };
        self.publish(topic_path, &envelope).await
    }

    /// Post a JSON payload inline regardless of its size.
    pub async fn post_streamed(
        &self,
        topic_path: &str,
        payload: Vec<u8>,
        timestamp: &str,
    ) -> Result<(), BusError> {
        self.publish(topic_path, &Envelope::inline(timestamp, payload))
            .await
    }

    /// Upload a local file and post a pointer to it. The remote object is
    /// named after `timestamp` and keeps the file's extension.
    pub async fn post_file(
        &self,
        topic_path: &str,
        local_path: &Path,
        timestamp: &str,
    ) -> Result<(), BusError> {
        let extension = local_path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| BusError::io(local_path, e))?
            .len();

        let pointer = self
            .repository
            .upload(topic_path, timestamp, &extension, local_path)
            .await?;
        self.metrics.record_upload(size);
        self.publish(topic_path, &Envelope::remote(timestamp, pointer))
            .await
    }

    async fn publish(&self, topic_path: &str, envelope: &Envelope) -> Result<(), BusError> {
        let bytes = envelope.encode()?;
        self.bus.publish(topic_path, bytes).await?;
        if envelope.is_inline() {
            self.metrics.record_inline_post();
        }
        trace!(
            topic = topic_path,
            timestamp = %envelope.timestamp,
            inline = envelope.is_inline(),
            "Posting published"
        );
        Ok(())
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Resolve an envelope into payload bytes. A downloaded blob goes through
    /// a scratch file that is removed whether or not it could be read.
    ///
    /// Any failure to fetch or read a blob is a [`BusError::Retrieval`]
    /// naming the pointer, with the underlying error as its reason.
    pub async fn receive_payload(&self, envelope: &Envelope) -> Result<Vec<u8>, BusError> {
        match &envelope.body {
            EnvelopeBody::Inline(payload) => Ok(payload.clone()),
            EnvelopeBody::Remote(pointer) => {
                let local_name = self.scratch_name();
                let scratch = ScratchFile::adopt(self.repository.local_path(pointer, &local_name));
                let fetched = match self.repository.download(pointer, &local_name).await {
                    Ok(_) => scratch.read().await,
                    Err(e) => Err(e),
                };
                let payload = fetched.map_err(|e| retrieval(pointer, &e))?;
                self.metrics.record_download();
                Ok(payload)
            }
        }
    }

    /// Resolve an envelope into a local file owned by the caller. Inline
    /// payloads are written out as JSON files.
    pub async fn receive_file(&self, envelope: &Envelope) -> Result<PathBuf, BusError> {
        let local_name = self.scratch_name();
        match &envelope.body {
            EnvelopeBody::Inline(payload) => {
                let path = self
                    .repository
                    .work_directory()
                    .join(format!("{}{}", local_name, JSON_FILE_EXTENSION));
                Ok(ScratchFile::write(path, payload).await?.persist())
            }
            EnvelopeBody::Remote(pointer) => {
                let scratch = ScratchFile::adopt(self.repository.local_path(pointer, &local_name));
                self.repository
                    .download(pointer, &local_name)
                    .await
                    .map_err(|e| retrieval(pointer, &e))?;
                self.metrics.record_download();
                Ok(scratch.persist())
            }
        }
    }

    async fn resolve_posting(&self, message: &BusMessage) -> Result<Posting, BusError> {
        let envelope = Envelope::decode(&message.payload)?;
        let payload = self.receive_payload(&envelope).await?;
        Ok(Posting {
            topic: message.topic.clone(),
            timestamp: envelope.timestamp,
            payload,
        })
    }

    async fn resolve_file(&self, message: &BusMessage) -> Result<FilePosting, BusError> {
        let envelope = Envelope::decode(&message.payload)?;
        let path = self.receive_file(&envelope).await?;
        Ok(FilePosting {
            topic: message.topic.clone(),
            timestamp: envelope.timestamp,
            path,
        })
    }

    // =========================================================================
    // Listening
    // =========================================================================

    /// Subscribe to `agent_id`'s postings on `topic_paths` and resolve them
    /// in bus order. Undecodable or unresolvable messages are reported and
    /// dropped.
    pub async fn listen(
        &self,
        agent_id: &str,
        topic_paths: &[String],
    ) -> Result<PostingStream, BusError> {
        self.spawn_decoder(agent_id, topic_paths, |connector, message| async move {
            connector.resolve_posting(&message).await
        })
        .await
    }

    /// Like [`listen`](Self::listen) but delivers downloaded files.
    pub async fn listen_files(
        &self,
        agent_id: &str,
        topic_paths: &[String],
    ) -> Result<FileStream, BusError> {
        self.spawn_decoder(agent_id, topic_paths, |connector, message| async move {
            connector.resolve_file(&message).await
        })
        .await
    }

    async fn spawn_decoder<T, F, Fut>(
        &self,
        agent_id: &str,
        topic_paths: &[String],
        resolve: F,
    ) -> Result<DeliveryStream<T>, BusError>
    where
        T: Send + 'static,
        F: Fn(ModellingBusConnector, BusMessage) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, BusError>> + Send + 'static,
    {
        let mut subscription = self.bus.subscribe(agent_id, topic_paths).await?;
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let connector = self.clone();
        let agent = agent_id.to_string();

        let task = tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                let topic = message.topic.clone();
                match resolve(connector.clone(), message).await {
                    Ok(delivery) => {
                        connector.metrics.record_delivery();
                        if tx.send(delivery).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        connector.metrics.record_dropped();
                        connector
                            .reporter
                            .report(&format!("receive {}/{}", agent, topic), &e);
                    }
                }
            }
            debug!(agent = %agent, "Listener decoding task finished");
        });

        debug!(agent = agent_id, topics = ?topic_paths, "Listening");
        Ok(DeliveryStream::new(rx, task.abort_handle()))
    }

    /// Call `handler` for every payload posting on one topic.
    pub async fn listen_for_payloads<F>(
        &self,
        agent_id: &str,
        topic_path: &str,
        mut handler: F,
    ) -> Result<ListenerHandle, BusError>
    where
        F: FnMut(Posting) + Send + 'static,
    {
        let mut stream = self.listen(agent_id, &[topic_path.to_string()]).await?;
        Ok(ListenerHandle::new(tokio::spawn(async move {
            while let Some(posting) = stream.recv().await {
                handler(posting);
            }
        })))
    }

    /// Streamed postings are inline, so they resolve like any payload.
    pub async fn listen_for_streamed<F>(
        &self,
        agent_id: &str,
        topic_path: &str,
        handler: F,
    ) -> Result<ListenerHandle, BusError>
    where
        F: FnMut(Posting) + Send + 'static,
    {
        self.listen_for_payloads(agent_id, topic_path, handler).await
    }

    /// Call `handler` with the local path of every file posted on one topic.
    pub async fn listen_for_files<F>(
        &self,
        agent_id: &str,
        topic_path: &str,
        mut handler: F,
    ) -> Result<ListenerHandle, BusError>
    where
        F: FnMut(FilePosting) + Send + 'static,
    {
        let mut stream = self
            .listen_files(agent_id, &[topic_path.to_string()])
            .await?;
        Ok(ListenerHandle::new(tokio::spawn(async move {
            while let Some(posting) = stream.recv().await {
                handler(posting);
            }
        })))
    }

    // =========================================================================
    // Retained postings
    // =========================================================================

    /// The latest posting of `agent_id` on a topic, resolved.
    pub async fn fetch_payload(
        &self,
        agent_id: &str,
        topic_path: &str,
    ) -> Result<Option<Posting>, BusError> {
        let Some(bytes) = self.bus.fetch_one(agent_id, topic_path).await? else {
            return Ok(None);
        };
        let envelope = Envelope::decode(&bytes)?;
        let payload = self.receive_payload(&envelope).await?;
        Ok(Some(Posting {
            topic: topic_path.to_string(),
            timestamp: envelope.timestamp,
            payload,
        }))
    }

    /// The latest file posting of `agent_id` on a topic, downloaded.
    pub async fn fetch_file(
        &self,
        agent_id: &str,
        topic_path: &str,
    ) -> Result<Option<FilePosting>, BusError> {
        let Some(bytes) = self.bus.fetch_one(agent_id, topic_path).await? else {
            return Ok(None);
        };
        let envelope = Envelope::decode(&bytes)?;
        let path = self.receive_file(&envelope).await?;
        Ok(Some(FilePosting {
            topic: topic_path.to_string(),
            timestamp: envelope.timestamp,
            path,
        }))
    }

    /// Delete this agent's posting on a topic along with every blob stored
    /// for it. Blobs that cannot be removed are reported.
    pub async fn delete_posting(&self, topic_path: &str) -> Result<(), BusError> {
        self.bus.delete_topic(topic_path).await?;
        let report = self.repository.cleanup(topic_path, "").await?;
        self.report_left_behind(&format!("delete {}", topic_path), &report);
        Ok(())
    }

    /// Remove this agent's blobs for a topic that are older than `cutoff`.
    /// Blobs that cannot be removed are reported and listed in the returned
    /// report.
    pub async fn retain_since(
        &self,
        topic_path: &str,
        cutoff: &str,
    ) -> Result<CleanupReport, BusError> {
        let report = self.repository.cleanup(topic_path, cutoff).await?;
        self.report_left_behind(&format!("retain {} since {}", topic_path, cutoff), &report);
        Ok(report)
    }

    fn report_left_behind(&self, context: &str, report: &CleanupReport) {
        for (path, error) in &report.failed {
            warn!(path = %path, "Blob left behind after cleanup");
            self.reporter.report(
                context,
                &BusError::Io {
                    path: path.clone(),
                    reason: error.to_string(),
                },
            );
        }
    }
}

fn retrieval(pointer: &BlobPointer, error: &BusError) -> BusError {
    BusError::Retrieval {
        location: pointer.to_string(),
        reason: error.to_string(),
    }
}
