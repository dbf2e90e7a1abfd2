use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_types::{Blake3Hasher, Hash, Hasher as _};

/// An ephemeral, in-process data backend; used for testing and for nodes that don't need
/// their hash trees to survive a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: Arc<Mutex<HashMap<Hash, Vec<u8>>>>,
}

impl MemoryBackend {
    fn key(prefix: &[u8], key: &[u8]) -> Hash {
        Blake3Hasher::hash(&[prefix, b"/", key].concat())
    }
}

impl tessera_types::DataBackend for MemoryBackend {
    fn get(&self, prefix: &[u8], key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.data.lock().get(&Self::key(prefix, key)).cloned())
    }

    fn has(&self, prefix: &[u8], key: &[u8]) -> anyhow::Result<bool> {
        Ok(self.data.lock().contains_key(&Self::key(prefix, key)))
    }

    fn set(&self, prefix: &[u8], key: &[u8], data: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.data.lock().insert(Self::key(prefix, key), data.to_vec()))
    }

    fn remove(&self, prefix: &[u8], key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.data.lock().remove(&Self::key(prefix, key)))
    }
}

#[cfg(test)]
mod tests {
    use tessera_types::DataBackend;

    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let backend = MemoryBackend::default();

        assert_eq!(backend.set(b"pieces", b"key", b"value").unwrap(), None);
        assert_eq!(backend.get(b"pieces", b"key").unwrap(), Some(b"value".to_vec()));
        assert!(backend.has(b"pieces", b"key").unwrap());
    }

    #[test]
    fn remove_returns_the_prior_value() {
        let backend = MemoryBackend::default();

        backend.set(b"pieces", b"key", b"value").unwrap();

        assert_eq!(backend.remove(b"pieces", b"key").unwrap(), Some(b"value".to_vec()));
        assert!(!backend.has(b"pieces", b"key").unwrap());
    }

    #[test]
    fn distinct_prefixes_do_not_collide() {
        let backend = MemoryBackend::default();

        backend.set(b"a", b"key", b"one").unwrap();
        backend.set(b"b", b"key", b"two").unwrap();

        assert_eq!(backend.get(b"a", b"key").unwrap(), Some(b"one".to_vec()));
        assert_eq!(backend.get(b"b", b"key").unwrap(), Some(b"two".to_vec()));
    }
}
