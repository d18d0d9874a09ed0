use serde::{Deserialize, Serialize};

use crate::schema::Schema;

pub const IN_MEMORY: &str = ":memory:";

/// SQLite connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: String,
    /// Open the connection in serialized mode so it may be used from several
    /// threads; `false` opens it without SQLite's internal mutexes.
    #[serde(default = "default_thread_safe")]
    pub thread_safe: bool,
    /// Tables created at open when missing
    #[serde(default)]
    pub schema: Schema,
}

fn default_thread_safe() -> bool {
    true
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<String>, schema: Schema) -> Self {
        Self {
            db_path: db_path.into(),
            thread_safe: default_thread_safe(),
            schema,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY, Schema::new())
    }

    pub fn with_thread_safe(mut self, thread_safe: bool) -> Self {
        self.thread_safe = thread_safe;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY
    }
}
