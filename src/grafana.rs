//! Grafana dashboard discovery for the detail view's Metrics section.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Knative serving dashboards the Metrics section can link to, by uid.
const KNOWN_DASHBOARDS: [(&str, &str); 2] = [
    (
        "knative-serving-revision-cpu-and-memory-usage",
        "CPU and memory usage",
    ),
    ("knative-serving-revision-http-requests", "HTTP requests"),
];

#[derive(Debug, Clone, Deserialize)]
struct SearchHit {
    #[serde(default)]
    uid: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DashboardLink {
    pub title: &'static str,
    pub url: String,
}

/// Result of a successful probe: which known dashboards exist.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GrafanaDashboards {
    prefix: String,
    available: Vec<(&'static str, &'static str)>,
}

impl GrafanaDashboards {
    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    pub fn revision_links(
        &self,
        namespace: &str,
        configuration: &str,
        revision: &str,
    ) -> Vec<DashboardLink> {
        self.available
            .iter()
            .map(|&(uid, title)| DashboardLink {
                title,
                url: format!(
                    "{}/d/{uid}?var-namespace={namespace}&var-configuration={configuration}&var-revision={revision}",
                    self.prefix
                ),
            })
            .collect()
    }
}

/// Looks for the Knative dashboards. Any failure, including a Grafana that has
/// none of them, yields `None` so the section simply stays hidden.
pub async fn probe(prefix: &str) -> Option<GrafanaDashboards> {
    match search(prefix).await {
        Ok(hits) => {
            let dashboards = from_hits(prefix, &hits);
            debug!(
                "grafana probe at {prefix} found {} known dashboards",
                dashboards.available.len()
            );
            (!dashboards.is_empty()).then_some(dashboards)
        }
        Err(error) => {
            debug!("grafana probe at {prefix} failed: {error:#}");
            None
        }
    }
}

async fn search(prefix: &str) -> Result<Vec<SearchHit>> {
    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .context("failed to create HTTP client")?;
    let url = format!("{}/api/search", prefix.trim_end_matches('/'));
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("request failed: {url}"))?
        .error_for_status()
        .with_context(|| format!("grafana search rejected: {url}"))?;
    response
        .json()
        .await
        .with_context(|| format!("invalid search response from {url}"))
}

fn from_hits(prefix: &str, hits: &[SearchHit]) -> GrafanaDashboards {
    let available = KNOWN_DASHBOARDS
        .into_iter()
        .filter(|(uid, _)| hits.iter().any(|hit| hit.uid == *uid))
        .collect();
    GrafanaDashboards {
        prefix: prefix.trim_end_matches('/').to_string(),
        available,
    }
}
