/// A generic, namespaced key-value backend.
///
/// The hash-tree repository (and anything else that wants durable storage)
/// is written against this trait rather than a concrete database, so the
/// same code runs against an in-memory backend in tests and an embedded,
/// crash-safe store in production.
pub trait DataBackend: Clone + Send + Sync + 'static {
    /// Returns the value stored under `prefix`/`key`, if any.
    fn get(&self, prefix: &[u8], key: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;

    /// Returns `true` if a value is stored under `prefix`/`key`.
    fn has(&self, prefix: &[u8], key: &[u8]) -> anyhow::Result<bool> {
        self.get(prefix, key).map(|v| v.is_some())
    }

    /// Replaces the value stored under `prefix`/`key`, returning the previous value.
    fn set(&self, prefix: &[u8], key: &[u8], data: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;

    /// Removes the value stored under `prefix`/`key`, returning it if present.
    fn remove(&self, prefix: &[u8], key: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;
}
