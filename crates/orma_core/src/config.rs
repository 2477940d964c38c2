//! Scope configuration.

/// Configuration shared by all scopes of one factory.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether query executors should flush the scope before running a
    /// query that pending changes could affect.
    ///
    /// The engine never flushes implicitly; this flag records the policy
    /// for the external query executor, which combines it with
    /// [`crate::UnitOfWork::pending_changes_affect`].
    pub auto_flush_on_query: bool,

    /// Whether clean managed instances have their snapshots retaken after
    /// every flush. Retaking keeps snapshots small for instances whose
    /// embedded values were replaced wholesale; disabling skips the copy
    /// for scopes with many untouched instances.
    pub recapture_clean_snapshots: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_flush_on_query: true,
            recapture_clean_snapshots: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flush-before-query policy flag.
    #[must_use]
    pub const fn auto_flush_on_query(mut self, value: bool) -> Self {
        self.auto_flush_on_query = value;
        self
    }

    /// Sets whether clean snapshots are retaken at flush.
    #[must_use]
    pub const fn recapture_clean_snapshots(mut self, value: bool) -> Self {
        self.recapture_clean_snapshots = value;
        self
    }
}
