use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Talk to the Kubernetes API server directly
    #[default]
    Kube,
    /// Talk to the models web app backend over HTTP
    Rest,
}

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "servedeck",
    version,
    about = "A terminal dashboard for KServe InferenceServices."
)]
pub struct CliArgs {
    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Kubeconfig context to use with the kube backend
    #[arg(long)]
    pub context: Option<String>,

    /// Which API to read InferenceServices from
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Base URL of the dashboard backend (rest backend)
    #[arg(long)]
    pub api_prefix: Option<String>,

    /// Base URL of Grafana, enables the Metrics section
    #[arg(long)]
    pub grafana_prefix: Option<String>,

    /// Base poll interval in milliseconds
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Settings file, instead of the usual search locations
    #[arg(long)]
    pub config: Option<PathBuf>,
}
