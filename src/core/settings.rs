use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BILLING_API_KEY_ENV: &str = "billing_api_key";
pub const CLUSTER_LOCATOR_ENV: &str = "billing_es_id";
pub const CLUSTER_API_KEY_ENV: &str = "billing_es_api";

pub const DEFAULT_BILLING_URL: &str = "https://api.elastic-cloud.com";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub billing: BillingSettings,
    pub schedule: ScheduleSettings,
    pub indices: IndexSettings,
    pub sink: SinkSettings,
    pub logging: LoggingSettings,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    pub base_url: String,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BILLING_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the tick and stop the loop on the first task error.
    #[default]
    Fatal,
    /// Log the error, leave the task's last run untouched and carry on.
    SkipTask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub org_summary_interval_secs: u64,
    pub deployment_inventory_interval_secs: u64,
    pub itemized_interval_secs: u64,
    pub loop_delay_secs: u64,
    pub on_fetch_error: FailurePolicy,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            org_summary_interval_secs: 60,
            deployment_inventory_interval_secs: 3600,
            itemized_interval_secs: 60,
            loop_delay_secs: 1,
            on_fetch_error: FailurePolicy::Fatal,
        }
    }
}

impl ScheduleSettings {
    pub fn org_summary_interval(&self) -> Duration {
        Duration::from_secs(self.org_summary_interval_secs)
    }

    pub fn deployment_inventory_interval(&self) -> Duration {
        Duration::from_secs(self.deployment_inventory_interval_secs)
    }

    pub fn itemized_interval(&self) -> Duration {
        Duration::from_secs(self.itemized_interval_secs)
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_secs(self.loop_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub org_summary: String,
    pub deployment: String,
    pub itemized: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            org_summary: "ess.billing".to_string(),
            deployment: "ess.billing.deployment".to_string(),
            itemized: "ess.billing.deployment.itemized".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    pub chunk_size: usize,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self { chunk_size: 500 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
    Journald,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ess-billing-ingest").join("config.toml"))
    }

    /// The file to read settings from: `path` when given, else the default
    /// location. `None` means the default file is absent and built-in
    /// defaults apply.
    pub fn source_path(path: Option<&Path>) -> Result<Option<PathBuf>> {
        match path {
            Some(explicit) => Ok(Some(explicit.to_path_buf())),
            None => {
                let default = Self::config_path().context("Could not determine config directory")?;
                Ok(default.exists().then_some(default))
            }
        }
    }

    pub fn read(source: Option<&Path>) -> Result<Self> {
        let Some(path) = source else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.billing.base_url.as_str();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            anyhow::bail!("billing.base_url must be an http(s) URL, got {:?}", base_url);
        }

        for (name, index) in [
            ("indices.org_summary", &self.indices.org_summary),
            ("indices.deployment", &self.indices.deployment),
            ("indices.itemized", &self.indices.itemized),
        ] {
            if index.trim().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
        }

        if self.schedule.loop_delay_secs == 0 {
            anyhow::bail!("schedule.loop_delay_secs must be greater than 0");
        }

        if self.sink.chunk_size == 0 {
            anyhow::bail!("sink.chunk_size must be greater than 0");
        }

        Ok(())
    }

    pub fn log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.logging.level
        }
    }
}

/// Credentials read from the environment. Never written to the settings file.
#[derive(Clone)]
pub struct Secrets {
    pub billing_api_key: String,
    pub cluster_locator: String,
    pub cluster_api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("billing_api_key", &"<redacted>")
            .field("cluster_locator", &self.cluster_locator)
            .field("cluster_api_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("Environment variable {} is not set", name))
        };

        Ok(Self {
            billing_api_key: required(BILLING_API_KEY_ENV)?,
            cluster_locator: required(CLUSTER_LOCATOR_ENV)?,
            cluster_api_key: required(CLUSTER_API_KEY_ENV)?,
        })
    }

    /// Only the billing key is needed when documents are not indexed.
    pub fn billing_only_from_env() -> Result<String> {
        std::env::var(BILLING_API_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("Environment variable {} is not set", BILLING_API_KEY_ENV))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.billing.base_url, "https://api.elastic-cloud.com");
        assert_eq!(settings.schedule.org_summary_interval_secs, 60);
        assert_eq!(settings.schedule.deployment_inventory_interval_secs, 3600);
        assert_eq!(settings.schedule.itemized_interval_secs, 60);
        assert_eq!(settings.schedule.loop_delay(), Duration::from_secs(1));
        assert_eq!(settings.schedule.on_fetch_error, FailurePolicy::Fatal);
        assert_eq!(settings.indices.org_summary, "ess.billing");
        assert_eq!(settings.indices.deployment, "ess.billing.deployment");
        assert_eq!(settings.indices.itemized, "ess.billing.deployment.itemized");
        assert_eq!(settings.sink.chunk_size, 500);
        assert_eq!(settings.logging.format, LogFormat::Text);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        settings.schedule.loop_delay_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.indices.itemized = "  ".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.sink.chunk_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.billing.base_url = "api.elastic-cloud.com".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            debug = true

            [schedule]
            org_summary_interval_secs = 120
            on_fetch_error = "skip_task"

            [indices]
            deployment = "billing-deployments"

            [logging]
            format = "json"
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.log_level(), "debug");
        assert_eq!(settings.schedule.org_summary_interval(), Duration::from_secs(120));
        assert_eq!(settings.schedule.deployment_inventory_interval_secs, 3600);
        assert_eq!(settings.schedule.on_fetch_error, FailurePolicy::SkipTask);
        assert_eq!(settings.indices.deployment, "billing-deployments");
        assert_eq!(settings.indices.org_summary, "ess.billing");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_read_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sink]\nchunk_size = 50").unwrap();

        let source = Settings::source_path(Some(file.path())).unwrap();
        assert_eq!(source.as_deref(), Some(file.path()));

        let settings = Settings::read(source.as_deref()).unwrap();
        assert_eq!(settings.sink.chunk_size, 50);
    }

    #[test]
    fn test_read_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let source = Settings::source_path(Some(&missing)).unwrap();
        assert!(Settings::read(source.as_deref()).is_err());
    }

    #[test]
    fn test_read_without_source_uses_defaults() {
        let settings = Settings::read(None).unwrap();
        assert_eq!(settings.sink.chunk_size, 500);
        assert_eq!(settings.schedule.on_fetch_error, FailurePolicy::Fatal);
    }

    #[test]
    fn test_secrets_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("billing_api_key", "ApiKey abc"),
            ("billing_es_id", "my-deployment:ZXhhbXBsZQ=="),
            ("billing_es_api", "es-key"),
        ]);

        let secrets = Secrets::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(secrets.billing_api_key, "ApiKey abc");
        assert_eq!(secrets.cluster_locator, "my-deployment:ZXhhbXBsZQ==");
        assert_eq!(secrets.cluster_api_key, "es-key");
        assert!(!format!("{:?}", secrets).contains("es-key"));
    }

    #[test]
    fn test_missing_secret_names_variable() {
        let env: HashMap<&str, &str> = HashMap::from([("billing_api_key", "k")]);

        let err = Secrets::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(err.to_string().contains("billing_es_id"));
    }
}
