//! # Artefact Synchronization End-to-End
//!
//! ```text
//! Agent A                         bus                        Agent B
//! post_state({"v":1})      ──state──────────────→   current = {"v":1}
//! post_update({"v":2})     ──update (v1→v2)─────→   updated = {"v":2}
//! post_considering({"v":3})──update (v1→v2)─────→   updated = {"v":2}
//!                          ──considering (v2→v3)→   considered = {"v":3}
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{channel, next, TestAgent};
    use mb_01_repository::InMemoryRepository;
    use mb_03_artefacts::{ArtefactConnector, ArtefactListener, ArtefactState, Delta, Phase};
    use serde_json::json;
    use shared_bus::InMemoryEventBus;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn forward(
        tx: &mpsc::UnboundedSender<(Phase, ArtefactState)>,
        phase: Phase,
    ) -> impl FnMut(&ArtefactState) + Send + 'static {
        let tx = tx.clone();
        move |state| {
            let _ = tx.send((phase, state.clone()));
        }
    }

    fn agents() -> (Arc<InMemoryEventBus>, TestAgent, TestAgent) {
        let bus = Arc::new(InMemoryEventBus::new());
        let repository = Arc::new(InMemoryRepository::new());
        let a = TestAgent::join(&bus, repository.clone(), "agent-a");
        let b = TestAgent::join(&bus, repository, "agent-b");
        (bus, a, b)
    }

    #[tokio::test]
    async fn test_state_update_considering_between_agents() {
        let (_bus, a, b) = agents();
        let sender = ArtefactConnector::new(a.transport.clone(), "v1", "m1");
        let receiver = ArtefactConnector::new(b.transport.clone(), "v1", "m1");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _listener = receiver
            .listen(
                "agent-a",
                ArtefactListener::new()
                    .on_state(forward(&tx, Phase::State))
                    .on_update(forward(&tx, Phase::Update))
                    .on_considering(forward(&tx, Phase::Considering)),
            )
            .await
            .unwrap();

        let (deltas, mut raw) = channel();
        let _wire = b
            .transport
            .listen_for_payloads("agent-a", &Phase::Update.topic("m1", "v1"), deltas)
            .await
            .unwrap();

        sender.post_state(json!({"v": 1})).await;
        let (phase, state) = next(&mut rx).await;
        assert_eq!(phase, Phase::State);
        assert_eq!(state.current, json!({"v": 1}));
        assert!(state.state_communicated);

        sender.post_update(json!({"v": 2})).await;
        let (phase, state) = next(&mut rx).await;
        assert_eq!(phase, Phase::Update);
        assert_eq!(state.current, json!({"v": 1}));
        assert_eq!(state.updated, json!({"v": 2}));

        let posting = next(&mut raw).await;
        let delta = Delta::decode(&posting.payload).unwrap();
        assert_eq!(delta.apply_to(&json!({"v": 1})).unwrap(), json!({"v": 2}));
        assert_eq!(delta.state_timestamp, state.last_state_timestamp);

        sender.post_considering(json!({"v": 3})).await;
        let (first, _) = next(&mut rx).await;
        let (second, state) = next(&mut rx).await;
        assert_eq!((first, second), (Phase::Update, Phase::Considering));
        assert_eq!(state.updated, json!({"v": 2}));
        assert_eq!(state.considered, json!({"v": 3}));

        assert_eq!(receiver.snapshot().await, state);
        assert!(a.errors.is_empty());
        assert!(b.errors.is_empty());
    }

    #[tokio::test]
    async fn test_receiver_joining_late_rejects_deltas_until_state() {
        let (_bus, a, b) = agents();
        let sender = ArtefactConnector::new(a.transport.clone(), "v1", "m1");
        sender.post_state(json!({"v": 1})).await;

        let receiver = ArtefactConnector::new(b.transport.clone(), "v1", "m1");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _listener = receiver
            .listen(
                "agent-a",
                ArtefactListener::new()
                    .on_state(forward(&tx, Phase::State))
                    .on_update(forward(&tx, Phase::Update)),
            )
            .await
            .unwrap();

        // Missed the state posting: the delta has no base here
        sender.post_update(json!({"v": 2})).await;
        sender.post_state(json!({"v": 10})).await;

        let (phase, state) = next(&mut rx).await;
        assert_eq!(phase, Phase::State);
        assert_eq!(state.current, json!({"v": 10}));
        assert!(b.errors.contains_kind("out_of_order"));

        sender.post_update(json!({"v": 11})).await;
        let (phase, state) = next(&mut rx).await;
        assert_eq!(phase, Phase::Update);
        assert_eq!(state.updated, json!({"v": 11}));
    }

    #[tokio::test]
    async fn test_get_state_lets_late_receiver_apply_deltas() {
        let (_bus, a, b) = agents();
        let sender = ArtefactConnector::new(a.transport.clone(), "v1", "m1");
        sender.post_state(json!({"items": [1]})).await;

        let receiver = ArtefactConnector::new(b.transport.clone(), "v1", "m1");
        assert!(receiver.get_state("agent-a").await);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _listener = receiver
            .listen_to_update_postings("agent-a", forward(&tx, Phase::Update))
            .await
            .unwrap();

        sender.post_update(json!({"items": [1, 2]})).await;

        let (_, state) = next(&mut rx).await;
        assert_eq!(state.updated, json!({"items": [1, 2]}));
        assert!(b.errors.is_empty());
    }

    #[tokio::test]
    async fn test_large_state_travels_through_repository() {
        let bus = Arc::new(InMemoryEventBus::with_limits(64, 1024));
        let repository = Arc::new(InMemoryRepository::new());
        let a = TestAgent::join(&bus, repository.clone(), "agent-a");
        let b = TestAgent::join(&bus, repository.clone(), "agent-b");

        let sender = ArtefactConnector::new(a.transport.clone(), "v1", "big");
        let receiver = ArtefactConnector::new(b.transport.clone(), "v1", "big");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _listener = receiver
            .listen_to_state_postings("agent-a", forward(&tx, Phase::State))
            .await
            .unwrap();

        let elements: Vec<_> = (0..500).map(|i| json!({"id": i, "kind": "node"})).collect();
        let content = json!({"elements": elements});
        sender.post_state(content.clone()).await;

        let (_, state) = next(&mut rx).await;
        assert_eq!(state.current, content);
        assert_eq!(repository.stats().stores, 1);
        assert_eq!(repository.stats().retrieves, 1);
    }
}
