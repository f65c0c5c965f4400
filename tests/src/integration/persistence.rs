//! # Persistence Scenarios
//!
//! The in-memory engine mirrors each database to a snapshot file when a
//! data directory is configured.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tempfile::TempDir;
    use vkv_store::{
        Coordinator, CoordinatorConfig, InMemoryEngine, KeyValueApi, KvStore, OpenRequest,
    };

    fn coordinator_at(config: &CoordinatorConfig) -> Coordinator {
        Coordinator::with_config(
            Arc::new(InMemoryEngine::with_config(config)),
            config.clone(),
        )
    }

    #[tokio::test]
    async fn test_data_and_schema_survive_restart() -> anyhow::Result<()> {
        vkv_telemetry::init_test_tracing();
        let dir = TempDir::new()?;
        let config = CoordinatorConfig::default().with_data_dir(dir.path());

        {
            let coordinator = coordinator_at(&config);
            let settings = KvStore::new(coordinator.clone(), "app", "settings");
            let users = KvStore::new(coordinator, "app", "users");
            settings.set(b"theme".to_vec(), b"dark".to_vec()).await?;
            users.set(b"ada".to_vec(), b"admin".to_vec()).await?;
        }

        let coordinator = coordinator_at(&config);
        let connection = coordinator.open(OpenRequest::new("app")).await?;
        assert_eq!(connection.version().get(), 2);
        assert_eq!(connection.collection_names().len(), 2);

        let settings = KvStore::new(coordinator, "app", "settings");
        assert_eq!(settings.get(b"theme").await?, Some(b"dark".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_database_removes_snapshot() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let config = CoordinatorConfig::default().with_data_dir(dir.path());
        let coordinator = coordinator_at(&config);

        KvStore::new(coordinator.clone(), "app", "kv")
            .set(b"k".to_vec(), b"v".to_vec())
            .await?;
        assert!(dir.path().join("app.vkv").exists());

        coordinator.delete_database("app").await?;
        assert!(!dir.path().join("app.vkv").exists());

        let restarted = coordinator_at(&config);
        let fresh = restarted.open(OpenRequest::new("app")).await?;
        assert_eq!(fresh.version().get(), 1);
        assert!(fresh.collection_names().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_write_rewrites_snapshot_once() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let config = CoordinatorConfig::default().with_data_dir(dir.path());
        let engine = InMemoryEngine::with_config(&config);
        let store = KvStore::new(
            Coordinator::with_config(Arc::new(engine.clone()), config),
            "app",
            "kv",
        );
        store.warm_up().await?;
        let before = engine.snapshot_writes();

        let batch: Vec<_> = (0u8..100).map(|i| (vec![i], vec![i])).collect();
        store.set_many(batch).await?;

        assert_eq!(engine.snapshot_writes(), before + 1);
        assert_eq!(store.keys().await?.len(), 100);
        Ok(())
    }
}
