use std::collections::HashMap;

use super::StateStore;
use crate::error::StorageError;

/// Process-local store. Used by tests and by hosts that have no durable
/// storage at all.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl StateStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_remove() {
        let mut store = MemoryStore::new();
        assert!(store.read("timer").unwrap().is_none());
        store.write("timer", "{}").unwrap();
        assert_eq!(store.read("timer").unwrap().as_deref(), Some("{}"));
        store.remove("timer").unwrap();
        assert!(store.read("timer").unwrap().is_none());
    }

    #[test]
    fn keys_are_independent() {
        let mut store = MemoryStore::new();
        store.write("a", "1").unwrap();
        store.write("b", "2").unwrap();
        store.remove("a").unwrap();
        assert!(store.read("a").unwrap().is_none());
        assert_eq!(store.read("b").unwrap().as_deref(), Some("2"));
    }
}
