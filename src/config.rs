//! Startup settings, layered file < environment < command line.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{BackendKind, CliArgs};
use crate::poller::PollerConfig;

pub const DEFAULT_API_PREFIX: &str = "http://localhost:5000";
const DEFAULT_POLL_MS: u64 = 1_000;
const DEFAULT_BACKOFF_FACTOR: u32 = 8;
const DEFAULT_RETRIES: u32 = 3;
const LOGS_INTERVAL_FACTOR: u32 = 3;
/// Upper bound for any poll interval, one day.
const MAX_POLL_MS: u64 = 86_400_000;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    pub source: Option<String>,
    pub backend: BackendKind,
    pub api_prefix: String,
    pub grafana_prefix: Option<String>,
    pub namespace: Option<String>,
    pub context: Option<String>,
    pub poll_interval: Duration,
    pub poll_max_interval: Duration,
    pub poll_retries: u32,
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    backend: Option<BackendKind>,
    #[serde(default, alias = "apiPrefix")]
    api_prefix: Option<String>,
    #[serde(default, alias = "grafanaPrefix")]
    grafana_prefix: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    poll: PollSection,
    #[serde(default)]
    log_filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PollSection {
    #[serde(default, alias = "interval")]
    interval_ms: Option<u64>,
    #[serde(default, alias = "max_interval")]
    max_interval_ms: Option<u64>,
    #[serde(default)]
    retries: Option<u32>,
}

impl Settings {
    /// Reads the settings file (if any) and the process environment, then
    /// applies the command line on top.
    pub fn load(cli: &CliArgs) -> Result<Self> {
        let path = cli.config.clone().or_else(discover_config_path);
        let (file, source) = match path {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read settings {}", path.display()))?;
                let parsed: SettingsFile = serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed to parse settings {}", path.display()))?;
                (parsed, Some(path.display().to_string()))
            }
            None => (SettingsFile::default(), None),
        };

        Self::resolve(file, source, |key| std::env::var(key).ok(), cli)
    }

    fn resolve<F>(
        file: SettingsFile,
        source: Option<String>,
        env: F,
        cli: &CliArgs,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let backend = match cli.backend {
            Some(backend) => backend,
            None => match env("SERVEDECK_BACKEND") {
                Some(raw) => parse_backend(&raw)?,
                None => file.backend.unwrap_or_default(),
            },
        };

        let api_prefix = cli
            .api_prefix
            .clone()
            .or_else(|| env("SERVEDECK_API_PREFIX"))
            .or(file.api_prefix)
            .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string());
        let grafana_prefix = cli
            .grafana_prefix
            .clone()
            .or_else(|| env("SERVEDECK_GRAFANA_PREFIX"))
            .or(file.grafana_prefix);

        let interval_ms = cli
            .poll_ms
            .or(file.poll.interval_ms)
            .unwrap_or(DEFAULT_POLL_MS);
        if interval_ms == 0 {
            bail!("poll interval must be greater than zero");
        }
        let interval_ms = interval_ms.min(MAX_POLL_MS);
        let max_interval_ms = match (cli.poll_ms, file.poll.max_interval_ms) {
            (None, Some(max)) => max,
            _ => interval_ms.saturating_mul(u64::from(DEFAULT_BACKOFF_FACTOR)),
        }
        .min(MAX_POLL_MS);

        Ok(Self {
            source,
            backend,
            api_prefix: api_prefix.trim_end_matches('/').to_string(),
            grafana_prefix: grafana_prefix.map(|prefix| prefix.trim_end_matches('/').to_string()),
            namespace: cli.namespace.clone().or(file.namespace),
            context: cli.context.clone().or(file.context),
            poll_interval: Duration::from_millis(interval_ms),
            poll_max_interval: Duration::from_millis(max_interval_ms.max(interval_ms)),
            poll_retries: file.poll.retries.unwrap_or(DEFAULT_RETRIES),
            log_filter: cli
                .log_filter
                .clone()
                .or(file.log_filter)
                .unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Schedule for the list and detail views.
    pub fn view_poller(&self) -> PollerConfig {
        PollerConfig::new(self.poll_interval, self.poll_max_interval, self.poll_retries)
    }

    /// Logs refresh more slowly than resource state.
    pub fn logs_poller(&self) -> PollerConfig {
        let interval = self.poll_interval.saturating_mul(LOGS_INTERVAL_FACTOR);
        let max_interval =
            (self.poll_max_interval.saturating_mul(LOGS_INTERVAL_FACTOR) / 2).max(interval);
        PollerConfig::new(interval, max_interval, self.poll_retries)
    }
}

fn parse_backend(raw: &str) -> Result<BackendKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "kube" | "k8s" | "kubernetes" => Ok(BackendKind::Kube),
        "rest" | "http" => Ok(BackendKind::Rest),
        other => bail!("unknown backend '{other}' in SERVEDECK_BACKEND (expected kube or rest)"),
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SERVEDECK_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("servedeck.yaml"),
        PathBuf::from("servedeck.yml"),
        PathBuf::from(".servedeck.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/servedeck/config.yaml"),
            PathBuf::from(&home).join(".config/servedeck/config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
