//! Runtime configuration.
//!
//! Values are layered with the `config` crate, later sources overriding
//! earlier ones:
//!
//! 1. Built-in defaults
//! 2. An optional `heddle.toml` (or an explicit file)
//! 3. Environment variables prefixed with `HEDDLE_`, using `__` between
//!    sections, e.g. `HEDDLE_STORE__BACKEND=sqlite`

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::workflow::{WorkflowBuilder, DEFAULT_EVENT_CHANNEL_CAPACITY};
use crate::{HeddleError, Result, Workflow, WorkflowStore};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeddleConfig {
    /// Persistence settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Event channel settings.
    #[serde(default)]
    pub events: EventsConfig,
}

/// Which [`crate::WorkflowStore`] implementation to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process, non-persistent.
    #[default]
    Memory,
    /// SQLite database file.
    Sqlite,
}

/// Persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Backend to open.
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database path, required for SQLite.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Event channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Broadcast channel capacity per workflow.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl HeddleConfig {
    /// Loads configuration from `heddle.toml` in the working directory (if
    /// present) and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::Config`] if a source is malformed or the
    /// result fails validation.
    pub fn load() -> Result<Self> {
        Self::build(File::with_name("heddle").required(false))
    }

    /// Loads configuration from an explicit file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::Config`] if the file is missing or malformed,
    /// or the result fails validation.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: HeddleConfig = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("HEDDLE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Starts a workflow builder with the configured event channel capacity.
    pub fn workflow_builder(&self, id: impl Into<String>) -> WorkflowBuilder {
        Workflow::builder(id).event_capacity(self.events.channel_capacity)
    }

    /// Loads a stored workflow with the configured event channel capacity.
    ///
    /// # Errors
    ///
    /// As [`Workflow::load_with_capacity`].
    pub async fn load_workflow<S: WorkflowStore + ?Sized>(
        &self,
        store: &S,
        workflow_id: &str,
    ) -> Result<Workflow> {
        Workflow::load_with_capacity(store, workflow_id, self.events.channel_capacity).await
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.events.channel_capacity == 0 {
            return Err(HeddleError::Config(
                "events.channel_capacity must be positive".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.path.is_none() {
            return Err(HeddleError::Config(
                "store.path is required for sqlite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::Builder;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = HeddleConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.store.path.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.events.channel_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let file = write_toml(
            r#"
            [store]
            backend = "sqlite"
            path = "/var/lib/heddle/workflows.db"

            [logging]
            json = true
            "#,
        );

        let config = HeddleConfig::load_from(file.path()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(
            config.store.path.as_deref(),
            Some(Path::new("/var/lib/heddle/workflows.db"))
        );
        assert!(config.logging.json);
        // unspecified values fall back to defaults
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.events.channel_capacity, 256);
    }

    #[test]
    #[serial]
    fn test_load_from_missing_file() {
        let result = HeddleConfig::load_from("/definitely/not/here/heddle.toml");
        assert!(matches!(result, Err(HeddleError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_sqlite_without_path_rejected() {
        let file = write_toml("[store]\nbackend = \"sqlite\"\n");
        let result = HeddleConfig::load_from(file.path());
        assert!(matches!(result, Err(HeddleError::Config(msg)) if msg.contains("store.path")));
    }

    #[test]
    #[serial]
    fn test_zero_capacity_rejected() {
        let file = write_toml("[events]\nchannel_capacity = 0\n");
        let result = HeddleConfig::load_from(file.path());
        assert!(matches!(result, Err(HeddleError::Config(_))));
    }

    #[test]
    fn test_workflow_builder_uses_capacity() {
        let mut config = HeddleConfig::default();
        config.events.channel_capacity = 0;
        assert!(config.workflow_builder("wf").build().is_err());

        config.events.channel_capacity = 8;
        let workflow = config.workflow_builder("wf").build().unwrap();
        assert_eq!(workflow.id(), "wf");
    }

    #[test]
    #[serial]
    fn test_unknown_backend_rejected() {
        let file = write_toml("[store]\nbackend = \"postgres\"\n");
        let result = HeddleConfig::load_from(file.path());
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = write_toml("[events]\nchannel_capacity = 32\n");
        std::env::set_var("HEDDLE_EVENTS__CHANNEL_CAPACITY", "8");
        std::env::set_var("HEDDLE_LOGGING__JSON", "true");

        let result = HeddleConfig::load_from(file.path());

        std::env::remove_var("HEDDLE_EVENTS__CHANNEL_CAPACITY");
        std::env::remove_var("HEDDLE_LOGGING__JSON");

        let config = result.unwrap();
        assert_eq!(config.events.channel_capacity, 8);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_load_workflow_uses_capacity() {
        let mut store = crate::MemoryWorkflowStore::new();
        crate::seed::default_workflow("board")
            .unwrap()
            .save(&mut store)
            .await
            .unwrap();

        let mut config = HeddleConfig::default();
        config.events.channel_capacity = 2;
        let workflow = config.load_workflow(&store, "board").await.unwrap();
        assert_eq!(workflow.event_capacity(), 2);
    }
}
