//! Cross-crate scenarios with several agents on one in-process bus.

mod e2e_artefacts;
mod e2e_observations;
mod flows;

#[cfg(test)]
pub(crate) mod fixtures {
    use mb_01_repository::RepositoryTransport;
    use mb_02_transport::ModellingBusConnector;
    use mb_telemetry::{init_logging, TelemetryConfig};
    use shared_bus::InMemoryEventBus;
    use shared_types::{BusConfig, ErrorLog};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    pub const EXPERIMENT: &str = "exp";
    pub const WAIT: Duration = Duration::from_secs(5);

    pub struct TestAgent {
        pub transport: ModellingBusConnector,
        pub errors: Arc<ErrorLog>,
        pub config: BusConfig,
        pub work: TempDir,
    }

    impl TestAgent {
        pub fn join(
            bus: &Arc<InMemoryEventBus>,
            repository: Arc<dyn RepositoryTransport>,
            agent_id: &str,
        ) -> Self {
            // Every test after the first finds a subscriber already installed
            let _ = init_logging(&TelemetryConfig::for_agent(agent_id));

            let work = TempDir::new().unwrap();
            let mut config = BusConfig {
                agent_id: agent_id.to_string(),
                experiment_id: EXPERIMENT.to_string(),
                work_directory: work.path().to_path_buf(),
                max_inline_payload: bus.max_inline_payload(),
                ..BusConfig::default()
            };
            config.repository.server = format!("{}.repository", agent_id);
            config.repository.port = 2121;
            config.repository.user = agent_id.to_string();
            config.validate().unwrap();

            let errors = Arc::new(ErrorLog::new());
            let transport = ModellingBusConnector::new(
                &config,
                Arc::new(bus.connect(config.topic_base(), agent_id)),
                repository,
                errors.clone(),
            );
            Self {
                transport,
                errors,
                config,
                work,
            }
        }
    }

    /// Forwarding closure plus the receiving end, for callback-style APIs.
    pub fn channel<T: Send + 'static>(
    ) -> (impl FnMut(T) + Send + 'static, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |item| {
                let _ = tx.send(item);
            },
            rx,
        )
    }

    pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for delivery")
            .expect("channel closed")
    }
}
