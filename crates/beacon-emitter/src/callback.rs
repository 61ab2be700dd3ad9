/// Observer notified after each delivery pass with per-event counts.
///
/// This is the only channel through which delivery failures surface to the
/// host application; nothing propagates back to `track` callers.
pub trait RequestCallback: Send + Sync {
    /// Every event of the pass was delivered.
    fn on_success(&self, count: usize);
    /// At least one event failed; `failure_count` includes both retained
    /// (retryable) and evicted events.
    fn on_failure(&self, success_count: usize, failure_count: usize);
}
