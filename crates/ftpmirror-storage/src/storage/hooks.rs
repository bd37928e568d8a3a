//! Callbacks supplied by the owner of an attachment.

/// Maps a style name to its remote path.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, style: &str) -> String;
}

impl<F> PathResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn resolve(&self, style: &str) -> String {
        (self)(style)
    }
}

/// Lifecycle callbacks around a flush.
pub trait FlushHooks: Send + Sync {
    /// Runs once after every write flush, including empty ones. Typically
    /// removes the local files that were just uploaded.
    fn after_flush_writes(&self) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl FlushHooks for NoHooks {}
