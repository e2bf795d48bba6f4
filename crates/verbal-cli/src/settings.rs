//! Runtime settings, layered from an optional TOML file and `VERBAL_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use verbal_core::{lifecycle::HistoryPolicy, query::BrowseDefaults};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  #[serde(default)]
  pub history_policy: HistoryPolicy,
  #[serde(default)]
  pub browser:        BrowseDefaults,
  #[serde(default)]
  pub notifier:       NotifierSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierSettings {
  /// Status changes are POSTed here as JSON. Unset disables notification.
  pub webhook_url:  Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for NotifierSettings {
  fn default() -> Self { Self { webhook_url: None, timeout_secs: default_timeout_secs() } }
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/verbal/cases.db") }

fn default_timeout_secs() -> u64 { 10 }

impl Settings {
  /// Read `path` (missing is fine) then overlay the environment.
  ///
  /// Nested keys use a double underscore:
  /// `VERBAL_BROWSER__ROLLING_YEAR=true`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("VERBAL")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?;

    let mut settings: Settings = raw
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings.history_policy, HistoryPolicy::SuppressRepeats);
    assert_eq!(settings.browser, BrowseDefaults::default());
    assert!(settings.notifier.webhook_url.is_none());
    assert!(settings.store_path.ends_with("cases.db"));
  }

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
      file,
      r#"
store_path     = "/var/lib/verbal/cases.db"
history_policy = "append_always"

[browser]
rolling_year = true

[notifier]
webhook_url = "http://localhost:9000/hooks/status"
"#
    )
    .unwrap();

    let settings = Settings::load(file.path()).unwrap();
    assert_eq!(settings.store_path, PathBuf::from("/var/lib/verbal/cases.db"));
    assert_eq!(settings.history_policy, HistoryPolicy::AppendAlways);
    assert!(settings.browser.rolling_year);
    assert_eq!(settings.browser.max_span_days, BrowseDefaults::default().max_span_days);
    assert_eq!(settings.notifier.timeout_secs, 10);
    assert_eq!(
      settings.notifier.webhook_url.as_deref(),
      Some("http://localhost:9000/hooks/status")
    );
  }

  #[test]
  fn tilde_is_expanded_against_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/cases.db")), PathBuf::from(home).join("cases.db"));
    assert_eq!(expand_tilde(Path::new("/abs/cases.db")), PathBuf::from("/abs/cases.db"));
  }
}
