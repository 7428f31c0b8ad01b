//! Counters for transport decisions and failures.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe transport counters.
#[derive(Debug, Default)]
pub struct TransportMetrics {
    /// Postings published with the payload inline
    pub inline_posts: AtomicU64,
    /// Payloads and files uploaded to the repository
    pub uploads: AtomicU64,
    /// Bytes uploaded
    pub bytes_uploaded: AtomicU64,
    /// Blobs downloaded on receipt
    pub downloads: AtomicU64,
    /// Postings handed to listeners
    pub deliveries: AtomicU64,
    /// Received messages dropped because they could not be decoded or resolved
    pub dropped_messages: AtomicU64,
}

impl TransportMetrics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one posting published inline.
    pub fn record_inline_post(&self) {
        self.inline_posts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one upload of `bytes` bytes.
    pub fn record_upload(&self, bytes: u64) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count one blob fetched on receipt.
    pub fn record_download(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one posting handed to a listener.
    pub fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one received message that was not delivered.
    pub fn record_dropped(&self) {
        self.dropped_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the current counts.
    pub fn snapshot(&self) -> TransportMetricsSnapshot {
        TransportMetricsSnapshot {
            inline_posts: self.inline_posts.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
        }
    }

    /// Share of posts that travelled inline.
    pub fn inline_ratio(&self) -> f64 {
        let inline = self.inline_posts.load(Ordering::Relaxed);
        let total = inline + self.uploads.load(Ordering::Relaxed);
        if total > 0 {
            inline as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Point-in-time copy of [`TransportMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportMetricsSnapshot {
    /// See [`TransportMetrics::inline_posts`].
    pub inline_posts: u64,
    /// See [`TransportMetrics::uploads`].
    pub uploads: u64,
    /// See [`TransportMetrics::bytes_uploaded`].
    pub bytes_uploaded: u64,
    /// See [`TransportMetrics::downloads`].
    pub downloads: u64,
    /// See [`TransportMetrics::deliveries`].
    pub deliveries: u64,
    /// See [`TransportMetrics::dropped_messages`].
    pub dropped_messages: u64,
}
