//! # Key-Value Scenarios

#[cfg(test)]
mod tests {
    use super::super::engine_with_coordinators;
    use serde::{Deserialize, Serialize};
    use vkv_store::{KeyValueApi, KvStore, StoreError, TypedStore};

    fn store(collection: &str) -> KvStore {
        let (_engine, mut coordinators) = engine_with_coordinators(1);
        KvStore::new(coordinators.remove(0), "app", collection)
    }

    #[tokio::test]
    async fn test_set_get_del_round() -> anyhow::Result<()> {
        let store = store("kv");

        store.set(b"greeting".to_vec(), b"hello".to_vec()).await?;
        assert_eq!(store.get(b"greeting").await?, Some(b"hello".to_vec()));

        store.set(b"greeting".to_vec(), b"hi".to_vec()).await?;
        assert_eq!(store.get(b"greeting").await?, Some(b"hi".to_vec()));

        store.del(b"greeting").await?;
        assert_eq!(store.get(b"greeting").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_on_absent_key() -> anyhow::Result<()> {
        let store = store("counters");

        store
            .update(b"visits".to_vec(), |current| match current {
                None => 1u64.to_le_bytes().to_vec(),
                Some(bytes) => bytes,
            })
            .await?;

        assert_eq!(store.get(b"visits").await?, Some(1u64.to_le_bytes().to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn test_entries_after_set_many() -> anyhow::Result<()> {
        let store = store("kv");
        let batch: Vec<_> = (0u8..10)
            .rev()
            .map(|i| (vec![i], vec![i * 2]))
            .collect();

        store.set_many(batch).await?;

        let entries = store.entries().await?;
        assert_eq!(entries.len(), 10);
        for (i, (key, value)) in entries.iter().enumerate() {
            assert_eq!(key, &vec![i as u8]);
            assert_eq!(value, &vec![i as u8 * 2]);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_get_many_and_del_many() -> anyhow::Result<()> {
        let store = store("kv");
        store
            .set_many(vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"c".to_vec(), b"3".to_vec()),
            ])
            .await?;

        store.del_many(&[b"a".to_vec(), b"c".to_vec()]).await?;

        let values = store
            .get_many(&[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
            .await?;
        assert_eq!(values, vec![None, Some(b"2".to_vec()), None]);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let store = store("counters");

        let updates = (0..20).map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update(b"n".to_vec(), |current| {
                        let n = current.map_or(0, |bytes| bytes[0]);
                        vec![n + 1]
                    })
                    .await
            })
        });
        for handle in futures::future::join_all(updates).await {
            handle.unwrap().unwrap();
        }

        assert_eq!(store.get(b"n").await.unwrap(), Some(vec![20]));
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
    }

    #[tokio::test]
    async fn test_typed_store() -> anyhow::Result<()> {
        let profiles: TypedStore<Profile> = TypedStore::new(store("profiles"));
        let alice = Profile {
            name: "alice".into(),
            tags: vec!["admin".into()],
        };

        profiles.set(b"alice".to_vec(), &alice).await?;
        profiles
            .update(b"alice".to_vec(), |current| {
                let mut profile = current.unwrap_or(Profile {
                    name: "alice".into(),
                    tags: vec![],
                });
                profile.tags.push("owner".into());
                profile
            })
            .await?;

        let stored = profiles.get(b"alice").await?.unwrap();
        assert_eq!(stored.tags, vec!["admin", "owner"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_typed_store_rejects_foreign_bytes() {
        let raw = store("profiles");
        raw.set(b"x".to_vec(), vec![1, 2]).await.unwrap();

        let profiles: TypedStore<Profile> = TypedStore::new(raw);
        assert!(matches!(profiles.get(b"x").await, Err(StoreError::Codec(_))));
    }
}
