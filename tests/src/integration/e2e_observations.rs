//! # Observation Routing End-to-End
//!
//! A small JSON observation rides inside the event; a large one is parked in
//! the poster's repository and fetched by the receiver.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{channel, next, TestAgent};
    use mb_01_repository::{InMemoryRepository, RepositoryStats};
    use mb_04_topics::Observations;
    use shared_bus::InMemoryEventBus;
    use std::sync::Arc;

    const TEN_MB: usize = 10 * 1024 * 1024;

    fn json_of_size(size: usize) -> Vec<u8> {
        // a JSON string literal: two quotes around the filler
        let mut json = Vec::with_capacity(size);
        json.push(b'"');
        json.extend((0..size - 2).map(|i| b'a' + (i % 26) as u8));
        json.push(b'"');
        json
    }

    #[tokio::test]
    async fn test_ten_byte_observation_never_touches_repository() {
        let bus = Arc::new(InMemoryEventBus::new());
        let repository = Arc::new(InMemoryRepository::new());
        let a = TestAgent::join(&bus, repository.clone(), "sensor");
        let b = TestAgent::join(&bus, repository.clone(), "modeller");
        let observations_a = Observations::new(a.transport.clone());
        let observations_b = Observations::new(b.transport.clone());

        let (handler, mut rx) = channel();
        let _listener = observations_b
            .listen_json("sensor", "temperature", handler)
            .await
            .unwrap();

        let payload = json_of_size(10);
        assert_eq!(payload.len(), 10);
        observations_a.post_json("temperature", payload.clone()).await;

        let posting = next(&mut rx).await;
        assert_eq!(posting.payload, payload);
        assert_eq!(repository.stats(), RepositoryStats::default());
        assert!(a.errors.is_empty() && b.errors.is_empty());
    }

    #[tokio::test]
    async fn test_ten_megabyte_observation_takes_one_round_trip() {
        let bus = Arc::new(InMemoryEventBus::new());
        let repository = Arc::new(InMemoryRepository::new());
        let a = TestAgent::join(&bus, repository.clone(), "sensor");
        let b = TestAgent::join(&bus, repository.clone(), "modeller");
        let observations_a = Observations::new(a.transport.clone());
        let observations_b = Observations::new(b.transport.clone());

        let (handler, mut rx) = channel();
        let _listener = observations_b
            .listen_json("sensor", "scan", handler)
            .await
            .unwrap();

        let payload = json_of_size(TEN_MB);
        observations_a.post_json("scan", payload.clone()).await;

        let posting = next(&mut rx).await;
        assert!(posting.payload == payload, "payload not byte-identical");

        let stats = repository.stats();
        assert_eq!(stats.stores, 1);
        assert_eq!(stats.retrieves, 1);
        assert_eq!(stats.bytes_stored, TEN_MB as u64);
        assert_eq!(stats.bytes_retrieved, TEN_MB as u64);

        // scratch copies are gone on both sides
        assert_eq!(std::fs::read_dir(a.work.path()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(b.work.path()).unwrap().count(), 0);
        assert!(a.errors.is_empty() && b.errors.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let bus = Arc::new(InMemoryEventBus::with_limits(64, 100));
        let repository = Arc::new(InMemoryRepository::new());
        let a = TestAgent::join(&bus, repository.clone(), "sensor");
        let observations = Observations::new(a.transport.clone());

        observations.post_json("edge", json_of_size(100)).await;
        assert_eq!(repository.stats().stores, 0);

        observations.post_json("edge", json_of_size(101)).await;
        assert_eq!(repository.stats().stores, 1);

        let snapshot = a.transport.metrics().snapshot();
        assert_eq!(snapshot.inline_posts, 1);
        assert_eq!(snapshot.uploads, 1);
    }
}
