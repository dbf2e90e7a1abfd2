use core::fmt;

/// Marks an [`anyhow::Error`] as a dial timeout.
///
/// `connector.connect` surfaces this as the one distinguished failure kind the exchanger
/// recognises: callers `downcast_ref` the returned error looking for this marker to decide
/// whether to move on to the next host rather than abandon the download.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialTimeout;

impl fmt::Display for DialTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dial timed out")
    }
}

impl std::error::Error for DialTimeout {}

/// Returns `true` if `err` is (or wraps) a [`DialTimeout`].
pub fn is_dial_timeout(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DialTimeout>().is_some()
}
