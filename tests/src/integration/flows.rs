//! # Multi-Agent Flows
//!
//! Agents sharing a filesystem-backed repository: coordination turns, raw
//! files, retention cleanup and deletion.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{channel, next, TestAgent};
    use mb_01_repository::{FileSystemRepository, RepositoryEndpoint};
    use mb_04_topics::{Coordination, Observations};
    use shared_bus::InMemoryEventBus;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn shared_repository(store: &Path, agents: &[&str]) -> Arc<FileSystemRepository> {
        let repository = FileSystemRepository::new();
        for agent in agents {
            let root = store.join(agent);
            std::fs::create_dir_all(&root).unwrap();
            repository.register(
                RepositoryEndpoint::new(format!("{}.repository", agent), 2121),
                root,
            );
        }
        Arc::new(repository)
    }

    fn files_under(dir: &Path) -> usize {
        if !dir.exists() {
            return 0;
        }
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|entry| {
                let path = entry.path();
                if path.is_dir() {
                    files_under(&path)
                } else {
                    1
                }
            })
            .sum()
    }

    #[tokio::test]
    async fn test_coordination_turn_taking() {
        let bus = Arc::new(InMemoryEventBus::new());
        let store = TempDir::new().unwrap();
        let repository = shared_repository(store.path(), &["a", "b"]);
        let a = TestAgent::join(&bus, repository.clone(), "a");
        let b = TestAgent::join(&bus, repository, "b");
        let coordination_a = Coordination::new(a.transport.clone());
        let coordination_b = Coordination::new(b.transport.clone());

        let (to_b, mut inbox_b) = channel();
        let (to_a, mut inbox_a) = channel();
        let _b_listens = coordination_b.listen("a", "turn", to_b).await.unwrap();
        let _a_listens = coordination_a.listen("b", "turn", to_a).await.unwrap();

        coordination_a.post("turn", br#"{"next":"b"}"#.to_vec()).await;
        assert_eq!(next(&mut inbox_b).await.payload, br#"{"next":"b"}"#);

        coordination_b.post("turn", br#"{"next":"a"}"#.to_vec()).await;
        assert_eq!(next(&mut inbox_a).await.payload, br#"{"next":"a"}"#);

        assert_eq!(files_under(store.path()), 0);
    }

    #[tokio::test]
    async fn test_raw_observation_through_shared_store() {
        let bus = Arc::new(InMemoryEventBus::new());
        let store = TempDir::new().unwrap();
        let repository = shared_repository(store.path(), &["camera", "viewer"]);
        let camera = TestAgent::join(&bus, repository.clone(), "camera");
        let viewer = TestAgent::join(&bus, repository, "viewer");

        let frame = camera.work.path().join("frame.png");
        std::fs::write(&frame, [0x89, b'P', b'N', b'G', 0, 1, 2]).unwrap();
        Observations::new(camera.transport.clone())
            .post_raw("frames", &frame)
            .await;

        let blobs = store
            .path()
            .join("camera")
            .join(camera.config.repository_root())
            .join("observations/raw/frames");
        assert_eq!(files_under(&blobs), 1);

        let received = Observations::new(viewer.transport.clone())
            .get_raw("camera", "frames")
            .await
            .unwrap();
        assert_eq!(received.path.extension().unwrap(), "png");
        assert_eq!(
            std::fs::read(&received.path).unwrap(),
            [0x89, b'P', b'N', b'G', 0, 1, 2]
        );
        assert!(camera.errors.is_empty() && viewer.errors.is_empty());
    }

    #[tokio::test]
    async fn test_retention_and_delete() {
        let bus = Arc::new(InMemoryEventBus::with_limits(64, 16));
        let store = TempDir::new().unwrap();
        let repository = shared_repository(store.path(), &["a"]);
        let a = TestAgent::join(&bus, repository, "a");
        let observations = Observations::new(a.transport.clone());
        let topic = "observations/json/series";

        for i in 0..3 {
            let payload = format!("{{\"sample\":{},\"pad\":\"................\"}}", i);
            observations.post_json("series", payload.into_bytes()).await;
        }
        let blobs = store
            .path()
            .join("a")
            .join(a.config.repository_root())
            .join(topic);
        assert_eq!(files_under(&blobs), 3);

        let cutoff = a.transport.new_timestamp();
        observations
            .post_json("series", br#"{"sample":3,"pad":"................"}"#.to_vec())
            .await;

        let report = a.transport.retain_since(topic, &cutoff).await.unwrap();
        assert_eq!(report.deleted.len(), 3);
        assert!(report.is_clean());
        assert_eq!(files_under(&blobs), 1);

        observations.delete_json("series").await;
        assert_eq!(files_under(&blobs), 0);
        assert!(observations.get_json("a", "series").await.is_none());
        assert!(a.errors.is_empty());
    }
}
