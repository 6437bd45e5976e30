//! In-memory key/value backend: local-only fallback and test double

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;

use super::{KvStore, Namespace};

/// Non-durable backend holding both namespaces in sorted maps.
///
/// Shared between engines through an `Arc`, which is what a multi-client
/// test uses to stand in for the shared store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    private: Mutex<BTreeMap<String, String>>,
    shared: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, namespace: Namespace) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        let mutex = match namespace {
            Namespace::Private => &self.private,
            Namespace::Shared => &self.shared,
        };
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<String>> {
        Ok(self.map(namespace).get(key).cloned())
    }

    async fn set(&self, namespace: Namespace, key: &str, value: &str) -> Result<()> {
        self.map(namespace)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
        self.map(namespace).remove(key);
        Ok(())
    }

    async fn list_keys(&self, namespace: Namespace, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .map(namespace)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete_round_trip() {
        let store = MemoryStore::new();
        store.set(Namespace::Private, "a", "1").await.unwrap();
        assert_eq!(
            store.get(Namespace::Private, "a").await.unwrap(),
            Some("1".to_string())
        );

        store.delete(Namespace::Private, "a").await.unwrap();
        assert_eq!(store.get(Namespace::Private, "a").await.unwrap(), None);

        // Deleting an absent key is fine
        store.delete(Namespace::Private, "a").await.unwrap();
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = MemoryStore::new();
        store.set(Namespace::Private, "k", "private").await.unwrap();
        store.set(Namespace::Shared, "k", "shared").await.unwrap();

        assert_eq!(
            store.get(Namespace::Private, "k").await.unwrap(),
            Some("private".to_string())
        );
        assert_eq!(
            store.get(Namespace::Shared, "k").await.unwrap(),
            Some("shared".to_string())
        );
    }

    #[tokio::test]
    async fn test_list_keys_filters_and_sorts() {
        let store = MemoryStore::new();
        store.set(Namespace::Shared, "trip:b", "x").await.unwrap();
        store.set(Namespace::Shared, "trip:a", "x").await.unwrap();
        store.set(Namespace::Shared, "other", "x").await.unwrap();

        let keys = store.list_keys(Namespace::Shared, "trip:").await.unwrap();
        assert_eq!(keys, vec!["trip:a".to_string(), "trip:b".to_string()]);

        let none = store.list_keys(Namespace::Shared, "zzz").await.unwrap();
        assert!(none.is_empty());
    }
}
