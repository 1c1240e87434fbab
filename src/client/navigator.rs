/// Where the client sends the user after session changes.
pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

/// Headless navigator that only records the intent in the log.
#[derive(Debug, Clone, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, location: &str) {
        tracing::info!(location = %location, "navigate");
    }
}
