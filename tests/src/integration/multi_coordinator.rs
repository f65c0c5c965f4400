//! # Multi-Coordinator Scenarios
//!
//! Several coordinators (think: several tabs or processes) share one
//! engine. An upgrade by one must make the others step aside.
//!
//! ```text
//! Coordinator A (v1 handle) ──┐
//!                             ├── InMemoryEngine ── "app"
//! Coordinator B (opens v2) ───┘
//!        │
//!        └─ engine fires version change on A's handle
//!             → A closes it, drops its registry entry, publishes events
//! ```

#[cfg(test)]
mod tests {
    use super::super::engine_with_coordinators;
    use std::time::Duration;
    use tokio::time::timeout;
    use vkv_bus::{ConnectionEventKind, EventFilter, EventTopic, InvalidationReason};
    use vkv_store::test_utils::open_raw;
    use vkv_store::{
        Coordinator, DatabaseName, KeyValueApi, KvStore, OpenError, OpenRequest, StorageEngine,
    };

    #[tokio::test]
    async fn test_upgrade_elsewhere_closes_local_handle() {
        let (_engine, coordinators) = engine_with_coordinators(2);
        let (a, b) = (&coordinators[0], &coordinators[1]);
        let app = DatabaseName::from("app");

        let mut lifecycle = a.subscribe(
            EventFilter::database("app")
                .with_topics(vec![EventTopic::Lifecycle, EventTopic::Invalidation]),
        );

        let old = a.check_version("app", 1, ["kv"]).await.unwrap();
        let new = b.check_version("app", 2, ["kv", "extra"]).await.unwrap();

        assert!(old.is_closed());
        assert!(!new.is_closed());
        assert!(!a.registry().contains(&app));

        let kinds: Vec<_> = lifecycle.drain().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConnectionEventKind::VersionChange {
                    connection_id: old.id(),
                    old_version: 1,
                    new_version: Some(2),
                },
                ConnectionEventKind::Closed {
                    connection_id: old.id()
                },
                ConnectionEventKind::Invalidated {
                    generation: Some(old.generation()),
                    reason: InvalidationReason::VersionChange,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_stores_follow_upgrades_from_other_coordinators() {
        let (engine, coordinators) = engine_with_coordinators(2);
        let users_a = KvStore::new(coordinators[0].clone(), "app", "users");
        let posts_b = KvStore::new(coordinators[1].clone(), "app", "posts");

        users_a.set(b"u1".to_vec(), b"ada".to_vec()).await.unwrap();
        // B needs "posts", which bumps the database and evicts A's handle.
        posts_b.set(b"p1".to_vec(), b"hello".to_vec()).await.unwrap();

        // A reopens transparently at the new version.
        assert_eq!(users_a.get(b"u1").await.unwrap(), Some(b"ada".to_vec()));
        let users_b = KvStore::new(coordinators[1].clone(), "app", "users");
        assert_eq!(users_b.get(b"u1").await.unwrap(), Some(b"ada".to_vec()));

        assert_eq!(engine.databases()[0].1.get(), 2);
        assert_eq!(engine.open_connections(&DatabaseName::from("app")), 2);
    }

    #[tokio::test]
    async fn test_unresponsive_connection_blocks_upgrade() {
        let (engine, coordinators) = engine_with_coordinators(1);
        let coordinator = &coordinators[0];
        let mut opens = coordinator.subscribe(EventFilter::topics(vec![EventTopic::Open]));

        // Opened behind the coordinator's back: nobody closes it on request.
        let stubborn = open_raw(&engine, "app", Some(1), &["kv"]).await.unwrap();

        let err = coordinator.check_version("app", 2, ["kv"]).await.unwrap_err();
        assert_eq!(
            err,
            OpenError::Blocked {
                database: DatabaseName::from("app")
            }
        );
        assert!(opens
            .drain()
            .iter()
            .any(|e| matches!(e.kind, ConnectionEventKind::OpenFailed { .. })));

        stubborn.close();
        let connection = timeout(
            Duration::from_secs(2),
            coordinator.check_version("app", 2, ["kv"]),
        )
        .await
        .expect("upgrade should proceed once the connection closes")
        .unwrap();
        assert_eq!(connection.version().get(), 2);
        // The connection produced for the rejected attempt was discarded.
        assert_eq!(engine.open_connections(&DatabaseName::from("app")), 1);
    }

    #[tokio::test]
    async fn test_upgrade_racing_another_coordinators_open() {
        let (engine, coordinators) = engine_with_coordinators(2);
        let (a, b) = (&coordinators[0], &coordinators[1]);
        a.check_version("app", 1, ["kv"]).await.unwrap();
        a.invalidate(&DatabaseName::from("app"));

        // Both opens are in the engine's queue before either is awaited.
        let (old, new) = tokio::join!(
            a.open(OpenRequest::new("app")),
            b.check_version("app", 2, ["kv"]),
        );
        let new = new.expect("upgrade must not be blocked by a coordinator handle");
        assert_eq!(new.version().get(), 2);
        // A either kept the v1 handle, now closed, or reopened after the upgrade.
        let old = old.unwrap();
        assert!(old.is_closed() || old.version().get() == 2);

        let fresh = Coordinator::new(std::sync::Arc::new(engine.clone()));
        let later = timeout(Duration::from_secs(2), fresh.open(OpenRequest::new("app")))
            .await
            .expect("later opens must not hang")
            .unwrap();
        assert_eq!(later.version().get(), 2);
    }

    #[tokio::test]
    async fn test_lower_version_from_other_coordinator_conflicts() {
        let (_engine, coordinators) = engine_with_coordinators(2);
        coordinators[0]
            .check_version("app", 4, ["kv"])
            .await
            .unwrap();

        let err = coordinators[1]
            .open(OpenRequest::new("app").with_version(vkv_store::SchemaVersion::new(2).unwrap()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OpenError::VersionConflict {
                requested: 2,
                existing: 4
            }
        );
        assert!(!coordinators[1].registry().contains(&DatabaseName::from("app")));
    }

    #[tokio::test]
    async fn test_delete_from_one_coordinator_closes_the_other() {
        let (engine, coordinators) = engine_with_coordinators(2);
        let store_a = KvStore::new(coordinators[0].clone(), "app", "kv");
        store_a.set(b"k".to_vec(), b"v".to_vec()).await.unwrap();

        coordinators[1].delete_database("app").await.unwrap();
        assert!(engine.databases().is_empty());

        // A starts from scratch.
        assert_eq!(store_a.get(b"k").await.unwrap(), None);
        assert_eq!(engine.databases()[0].1.get(), 1);
    }
}
