use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use reqwest::Url;
use serde::Deserialize;

/// Environment variables consulted by [`Configuration::apply_env`].
pub const ENV_BASE_URL: &str = "INKY_FRAME_BASE_URL";
pub const ENV_API_KEY: &str = "INKY_FRAME_API_KEY";
pub const ENV_ROTATION_INTERVAL: &str = "INKY_FRAME_ROTATION_INTERVAL_MINUTES";
pub const ENV_DISPLAY_SCRIPT: &str = "INKY_FRAME_DISPLAY_SCRIPT";
pub const ENV_IMAGE_PATH: &str = "INKY_FRAME_IMAGE_PATH";

const MAX_ASSET_BATCH: usize = 1000;

#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Root URL of the Immich server, e.g. `http://photos.lan:2283`.
    pub base_url: String,
    /// Value sent in the `x-api-key` header.
    pub api_key: String,
    /// Minutes to wait after a successful (or empty) cycle.
    pub rotation_interval_minutes: u64,
    /// Wait after a failed cycle before trying again.
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    /// How many random assets to request per cycle.
    pub asset_batch_size: usize,
    /// Upper bound for each HTTP request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Program used to run the display script.
    pub display_interpreter: String,
    pub display_script: PathBuf,
    /// Kill the display program if it runs longer than this.
    #[serde(with = "humantime_serde")]
    pub display_timeout: Option<Duration>,
    /// Hand-off file between download and display, overwritten every cycle.
    pub image_path: PathBuf,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Loads the YAML file when one is given; otherwise starts from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display())),
            None => Ok(Self::default()),
        }
    }

    /// Applies `INKY_FRAME_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(raw) = lookup(ENV_ROTATION_INTERVAL) {
            self.rotation_interval_minutes = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_ROTATION_INTERVAL} must be a whole number, got {raw:?}"))?;
        }
        if let Some(script) = lookup(ENV_DISPLAY_SCRIPT) {
            self.display_script = PathBuf::from(script);
        }
        if let Some(path) = lookup(ENV_IMAGE_PATH) {
            self.image_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        let Overrides {
            base_url,
            api_key,
            rotation_interval_minutes,
            display_script,
            image_path,
        } = overrides;
        if let Some(url) = base_url {
            self.base_url = url;
        }
        if let Some(key) = api_key {
            self.api_key = key;
        }
        if let Some(minutes) = rotation_interval_minutes {
            self.rotation_interval_minutes = minutes;
        }
        if let Some(script) = display_script {
            self.display_script = script;
        }
        if let Some(path) = image_path {
            self.image_path = path;
        }
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(!self.base_url.trim().is_empty(), "base-url must be set");
        let url = Url::parse(self.base_url.trim())
            .with_context(|| format!("base-url {:?} is not a valid URL", self.base_url))?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            "base-url must use http or https, got {}",
            url.scheme()
        );
        ensure!(!self.api_key.trim().is_empty(), "api-key must be set");
        ensure!(
            self.rotation_interval_minutes > 0,
            "rotation-interval-minutes must be greater than zero"
        );
        ensure!(
            self.rotation_interval_minutes.checked_mul(60).is_some(),
            "rotation-interval-minutes is too large"
        );
        ensure!(
            self.retry_backoff > Duration::ZERO,
            "retry-backoff must be positive"
        );
        ensure!(
            (1..=MAX_ASSET_BATCH).contains(&self.asset_batch_size),
            "asset-batch-size must be between 1 and {MAX_ASSET_BATCH}"
        );
        ensure!(
            self.request_timeout > Duration::ZERO,
            "request-timeout must be positive"
        );
        ensure!(
            !self.display_interpreter.trim().is_empty(),
            "display-interpreter must not be blank"
        );
        ensure!(
            !self.display_script.as_os_str().is_empty(),
            "display-script must be set"
        );
        if let Some(timeout) = self.display_timeout {
            ensure!(timeout > Duration::ZERO, "display-timeout must be positive");
        }
        ensure!(
            self.image_path.file_name().is_some(),
            "image-path must name a file, got {}",
            self.image_path.display()
        );
        Ok(self)
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_minutes.saturating_mul(60))
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            rotation_interval_minutes: 10,
            retry_backoff: Duration::from_secs(60),
            asset_batch_size: 10,
            request_timeout: Duration::from_secs(30),
            display_interpreter: "python3".to_string(),
            display_script: PathBuf::from("./display.py"),
            display_timeout: None,
            image_path: PathBuf::from("/tmp/current_frame.jpg"),
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("Configuration")
            .field("base_url", &self.base_url)
            .field("api_key", &api_key)
            .field("rotation_interval_minutes", &self.rotation_interval_minutes)
            .field("retry_backoff", &self.retry_backoff)
            .field("asset_batch_size", &self.asset_batch_size)
            .field("request_timeout", &self.request_timeout)
            .field("display_interpreter", &self.display_interpreter)
            .field("display_script", &self.display_script)
            .field("display_timeout", &self.display_timeout)
            .field("image_path", &self.image_path)
            .finish()
    }
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub rotation_interval_minutes: Option<u64>,
    pub display_script: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
}
