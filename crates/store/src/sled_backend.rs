use std::path::Path;

use tessera_types::{Blake3Hasher, DataBackend, Hash, Hasher as _};

/// A sled-backed data backend, for hash trees that must survive a restart.
#[derive(Clone)]
pub struct SledBackend {
    data: sled::Db,
}

impl SledBackend {
    /// Opens (creating if missing) a sled database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = sled::open(path)?;

        Ok(Self { data })
    }

    fn key(prefix: &[u8], key: &[u8]) -> Hash {
        Blake3Hasher::hash(&[prefix, b"/", key].concat())
    }
}

impl DataBackend for SledBackend {
    fn get(&self, prefix: &[u8], key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        let key = Self::key(prefix, key);

        Ok(self.data.get(key)?.map(|v| v.to_vec()))
    }

    fn has(&self, prefix: &[u8], key: &[u8]) -> anyhow::Result<bool> {
        let key = Self::key(prefix, key);

        Ok(self.data.contains_key(key)?)
    }

    fn set(&self, prefix: &[u8], key: &[u8], data: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        let key = Self::key(prefix, key);
        let replaced = self.data.insert(key, data)?;

        Ok(replaced.map(|v| v.to_vec()))
    }

    fn remove(&self, prefix: &[u8], key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        let key = Self::key(prefix, key);
        let removed = self.data.remove(key)?;

        Ok(removed.map(|v| v.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use proptest::collection;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn set_then_get_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = SledBackend::open(dir.path())?;

        assert_eq!(backend.set(b"pieces", b"key", b"value")?, None);
        assert_eq!(backend.get(b"pieces", b"key")?, Some(b"value".to_vec()));

        Ok(())
    }

    proptest! {
        #[test]
        fn arbitrary_keys_round_trip(entries in collection::vec((collection::vec(any::<u8>(), 0..32), collection::vec(any::<u8>(), 0..64)), 1..50)) {
            let dir = tempfile::tempdir().unwrap();
            let backend = SledBackend::open(dir.path()).unwrap();

            for (key, value) in &entries {
                backend.set(b"prop", key, value).unwrap();
            }

            for (key, value) in &entries {
                prop_assert_eq!(backend.get(b"prop", key).unwrap(), Some(value.clone()));
            }
        }
    }
}
