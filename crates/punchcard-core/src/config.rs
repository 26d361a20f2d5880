use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use crate::clock::{MidnightPolicy, MidnightWindow, TimeComparator};

/// Directory under the project root holding the database and config.
pub const PROJECT_DIR: &str = ".punchcard";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl ProjectConfig {
    /// Comparator the classifier should use for this project.
    #[must_use]
    pub const fn comparator(&self) -> TimeComparator {
        TimeComparator::new(
            self.classifier.midnight,
            MidnightWindow {
                early_morning_hour: self.classifier.early_morning_hour,
                evening_hour: self.classifier.evening_hour,
            },
        )
    }

    /// Reject values the classifier cannot use.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured hour is outside `0..=23`.
    pub fn validate(&self) -> Result<()> {
        let ClassifierConfig {
            early_morning_hour,
            evening_hour,
            ..
        } = self.classifier;
        if early_morning_hour > 23 {
            bail!("classifier.early_morning_hour must be 0-23, got {early_morning_hour}");
        }
        if evening_hour > 23 {
            bail!("classifier.evening_hour must be 0-23, got {evening_hour}");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub midnight: MidnightPolicy,
    #[serde(default = "default_early_morning_hour")]
    pub early_morning_hour: u32,
    #[serde(default = "default_evening_hour")]
    pub evening_hour: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            midnight: MidnightPolicy::default(),
            early_morning_hour: default_early_morning_hour(),
            evening_hour: default_evening_hour(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

/// Load `.punchcard/config.toml` under `project_root`; a missing file
/// yields the defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid {}", path.display()))?;
    Ok(config)
}

/// Default project config as written by `punch init`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn default_project_config_toml() -> Result<String> {
    toml::to_string_pretty(&ProjectConfig::default()).context("Failed to render default config")
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("punchcard/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the output mode name: `--json`, then `FORMAT`, then the user
/// config, then TTY detection.
///
/// # Errors
///
/// Returns an error if the user config cannot be loaded.
pub fn resolve_output_for(cli_json: bool) -> Result<String> {
    let user = load_user_config()?;
    Ok(resolve_output(
        cli_json,
        user.output.as_deref(),
        env::var("FORMAT").ok().as_deref(),
    ))
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_early_morning_hour() -> u32 {
    4
}

const fn default_evening_hour() -> u32 {
    18
}

const fn default_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        let cfg_dir = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&cfg_dir).expect("create .punchcard");
        std::fs::write(cfg_dir.join("config.toml"), content).expect("write config");
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let cfg = load_project_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg.classifier.midnight, MidnightPolicy::Heuristic);
        assert_eq!(cfg.classifier.early_morning_hour, 4);
        assert_eq!(cfg.classifier.evening_hour, 18);
        assert_eq!(cfg.store.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.comparator(), TimeComparator::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = TempDir::new().expect("tempdir");
        write_config(
            &dir,
            r#"
[classifier]
midnight = "date-aware"

[store]
timeout_ms = 250
"#,
        );
        let cfg = load_project_config(dir.path()).expect("load");
        assert_eq!(cfg.classifier.midnight, MidnightPolicy::DateAware);
        assert_eq!(cfg.classifier.evening_hour, 18);
        assert_eq!(cfg.store.timeout_ms, 250);
        assert_eq!(cfg.comparator().policy, MidnightPolicy::DateAware);
    }

    #[test]
    fn malformed_config_is_an_error_naming_the_file() {
        let dir = TempDir::new().expect("tempdir");
        write_config(&dir, "[classifier]\nmidnight = \"sometimes\"\n");
        let err = load_project_config(dir.path()).expect_err("bad policy");
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn out_of_range_hour_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        write_config(&dir, "[classifier]\nevening_hour = 30\n");
        let err = load_project_config(dir.path()).expect_err("bad hour");
        assert!(format!("{err:#}").contains("evening_hour"));
    }

    #[test]
    fn default_config_round_trips() {
        let rendered = default_project_config_toml().expect("render");
        assert!(rendered.contains("midnight = \"heuristic\""));
        let parsed: ProjectConfig = toml::from_str(&rendered).expect("parse");
        assert_eq!(parsed, ProjectConfig::default());
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn env_beats_user_config_and_aliases_normalize() {
        assert_eq!(resolve_output(false, Some("json"), Some("human")), "pretty");
        assert_eq!(resolve_output(false, Some("table"), None), "text");
        assert_eq!(resolve_output(false, Some("json"), Some("bogus")), "json");
    }
}
