//! # Open Negotiation Scenarios
//!
//! Deduplication, version conflicts and schema upgrades through a single
//! coordinator.

#[cfg(test)]
mod tests {
    use super::super::engine_with_coordinators;
    use futures::future::join_all;
    use vkv_store::{
        CollectionName, DatabaseName, EngineError, KeyValueApi, KvStore, OpenError, OpenRequest,
        SchemaVersion, StorageEngine,
    };

    fn names(connection: &vkv_store::Connection) -> Vec<String> {
        connection
            .collection_names()
            .into_iter()
            .map(|name| name.as_str().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_many_concurrent_opens_issue_one_engine_open() {
        let (engine, coordinators) = engine_with_coordinators(1);
        let coordinator = &coordinators[0];
        let request = OpenRequest::new("app").with_collections(["kv"]);

        let results = join_all((0..16).map(|_| coordinator.open(request.clone()))).await;

        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(result.as_ref().unwrap().same_as(first));
        }
        assert_eq!(engine.opens_issued(), 1);
    }

    #[tokio::test]
    async fn test_lower_version_fails_without_touching_database() {
        let (engine, coordinators) = engine_with_coordinators(1);
        let coordinator = &coordinators[0];
        let store = KvStore::new(coordinator.clone(), "app", "kv");

        coordinator.check_version("app", 5, ["kv"]).await.unwrap();
        store.set(b"k".to_vec(), b"v".to_vec()).await.unwrap();

        let err = coordinator.check_version("app", 3, ["kv"]).await.unwrap_err();
        assert_eq!(
            err,
            OpenError::VersionConflict {
                requested: 3,
                existing: 5
            }
        );
        assert_eq!(
            engine.databases(),
            vec![(DatabaseName::from("app"), SchemaVersion::new(5).unwrap())]
        );
        assert_eq!(store.get(b"k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_fresh_database_gets_all_collections_at_version_one() {
        let (_engine, coordinators) = engine_with_coordinators(1);

        let connection = coordinators[0]
            .open(OpenRequest::new("app").with_collections(["a", "b"]))
            .await
            .unwrap();

        assert_eq!(connection.version().get(), 1);
        assert_eq!(names(&connection), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_subset_request_neither_removes_nor_bumps() {
        let (engine, coordinators) = engine_with_coordinators(1);
        let coordinator = &coordinators[0];
        coordinator
            .open(OpenRequest::new("app").with_collections(["a", "b"]))
            .await
            .unwrap();
        coordinator.invalidate(&DatabaseName::from("app"));

        let connection = coordinator
            .open(OpenRequest::new("app").with_collections(["a"]))
            .await
            .unwrap();

        assert_eq!(connection.version().get(), 1);
        assert_eq!(names(&connection), vec!["a", "b"]);
        assert_eq!(engine.opens_issued(), 2);
    }

    #[tokio::test]
    async fn test_missing_collection_bumps_exactly_one_version() {
        let (_engine, coordinators) = engine_with_coordinators(1);
        let coordinator = &coordinators[0];
        coordinator.check_version("app", 3, ["a"]).await.unwrap();

        let connection = coordinator
            .open(OpenRequest::new("app").with_collections(["a", "b"]))
            .await
            .unwrap();

        assert_eq!(connection.version().get(), 4);
        assert_eq!(names(&connection), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_check_version_at_current_version() {
        let (engine, coordinators) = engine_with_coordinators(1);
        let coordinator = &coordinators[0];
        coordinator.check_version("app", 5, ["a"]).await.unwrap();
        coordinator.invalidate(&DatabaseName::from("app"));

        let connection = coordinator.check_version("app", 5, ["a"]).await.unwrap();
        assert_eq!(connection.version().get(), 5);
        assert_eq!(engine.opens_issued(), 2);
    }

    #[tokio::test]
    async fn test_check_version_upgrades_and_adds_collection() {
        let (_engine, coordinators) = engine_with_coordinators(1);
        let coordinator = &coordinators[0];
        coordinator.check_version("app", 2, ["a"]).await.unwrap();

        let connection = coordinator.check_version("app", 3, ["a", "b"]).await.unwrap();

        assert_eq!(connection.version().get(), 3);
        assert!(connection.has_collection(&CollectionName::from("b")));
    }

    #[tokio::test]
    async fn test_pinned_version_missing_collection() {
        let (_engine, coordinators) = engine_with_coordinators(1);
        let coordinator = &coordinators[0];
        coordinator.check_version("app", 2, ["a"]).await.unwrap();

        let err = coordinator.check_version("app", 2, ["a", "z"]).await.unwrap_err();
        assert!(matches!(err, OpenError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("Version 2"));
    }

    #[tokio::test]
    async fn test_failed_open_is_not_replayed() {
        let (engine, coordinators) = engine_with_coordinators(1);
        let coordinator = &coordinators[0];
        engine.fail_next_open("app", EngineError::Io("permission denied".into()));

        let (first, second) = tokio::join!(
            coordinator.open(OpenRequest::new("app")),
            coordinator.open(OpenRequest::new("app")),
        );
        // Both joined the same failing attempt.
        assert!(matches!(first, Err(OpenError::OpenFailed { .. })));
        assert_eq!(first.unwrap_err(), second.unwrap_err());
        assert_eq!(engine.opens_issued(), 1);

        let retry = coordinator.open(OpenRequest::new("app")).await;
        assert!(retry.is_ok());
        assert_eq!(engine.opens_issued(), 2);
    }
}
