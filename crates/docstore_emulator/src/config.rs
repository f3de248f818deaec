//! Emulator configuration.

use docstore_protocol::DatabaseName;

/// Configuration for the emulator.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Project id served.
    pub project_id: String,
    /// Database id served.
    pub database_id: String,
    /// Maximum writes accepted in one commit.
    pub max_writes_per_commit: usize,
    /// Maximum documents accepted in one batch get.
    pub max_batch_get: usize,
}

impl EmulatorConfig {
    /// Creates a configuration serving `projects/{project_id}/databases/{database_id}`.
    pub fn new(project_id: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: database_id.into(),
            max_writes_per_commit: 500,
            max_batch_get: 1000,
        }
    }

    /// Sets the maximum writes per commit.
    pub fn with_max_writes_per_commit(mut self, max: usize) -> Self {
        self.max_writes_per_commit = max;
        self
    }

    /// Sets the maximum documents per batch get.
    pub fn with_max_batch_get(mut self, max: usize) -> Self {
        self.max_batch_get = max;
        self
    }

    /// Returns the fully qualified database name.
    pub fn database_name(&self) -> String {
        DatabaseName::new(self.project_id.clone(), self.database_id.clone()).to_string()
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self::new("local", "(default)")
    }
}
