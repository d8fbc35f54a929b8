//! Per-source cache from normalized key to native record id.

use std::collections::HashMap;

use tokio::sync::RwLock;

/// Cache of `key -> native id` built as records are observed.
///
/// Owned by a single source instance. Entries can always be rebuilt
/// through the source's `key_to_id` lookup, so losing one is harmless.
#[derive(Debug, Default)]
pub struct KeyIdMap {
    entries: RwLock<HashMap<String, String>>,
}

impl KeyIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, id: impl Into<String>) {
        self.entries.write().await.insert(key.into(), id.into());
    }

    pub async fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().await.remove(key)
    }

    /// Reverse lookup, used when only the native id is known.
    pub async fn key_for_id(&self, id: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .iter()
            .find(|(_, v)| v.as_str() == id)
            .map(|(k, _)| k.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_remove() {
        let map = KeyIdMap::new();
        assert!(map.is_empty().await);

        map.insert("REPO#1", "page-1").await;
        map.insert("REPO#2", "page-2").await;
        assert_eq!(map.get("REPO#1").await.as_deref(), Some("page-1"));
        assert_eq!(map.key_for_id("page-2").await.as_deref(), Some("REPO#2"));
        assert_eq!(map.len().await, 2);

        assert_eq!(map.remove("REPO#1").await.as_deref(), Some("page-1"));
        assert!(map.get("REPO#1").await.is_none());
    }

    #[tokio::test]
    async fn test_insert_overwrites() {
        let map = KeyIdMap::new();
        map.insert("K", "old").await;
        map.insert("K", "new").await;
        assert_eq!(map.get("K").await.as_deref(), Some("new"));
    }
}
