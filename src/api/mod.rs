pub mod k8s;
pub mod rest;

use kube::core::DynamicObject;
use anyhow::Result;
use std::future::Future;

use crate::model::{Component, InferenceService, OwnedKind, PodLogs};

pub use self::k8s::KubeGateway;
pub use self::rest::RestGateway;

/// The namespace-scoped operations the dashboard needs from a backend.
pub trait ServingApi: Send + Sync {
    fn list(&self, namespace: &str) -> impl Future<Output = Result<Vec<InferenceService>>> + Send;

    fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<InferenceService>> + Send;

    fn create(
        &self,
        namespace: &str,
        isvc: &InferenceService,
    ) -> impl Future<Output = Result<InferenceService>> + Send;

    fn delete(&self, namespace: &str, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn owned(
        &self,
        kind: OwnedKind,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<DynamicObject>> + Send;

    fn logs(
        &self,
        namespace: &str,
        name: &str,
        component: Component,
    ) -> impl Future<Output = Result<PodLogs>> + Send;
}

/// Backend selected at startup.
#[derive(Clone)]
pub enum Backend {
    Kube(KubeGateway),
    Rest(RestGateway),
}

impl Backend {
    pub fn label(&self) -> String {
        match self {
            Self::Kube(gateway) => kube_label(gateway.context(), gateway.cluster()),
            Self::Rest(gateway) => format!("rest {}", gateway.base_url()),
        }
    }
}

fn kube_label(context: &str, cluster: &str) -> String {
    let host = cluster
        .split_once("://")
        .map_or(cluster, |(_, rest)| rest)
        .trim_end_matches('/');
    if host.is_empty() {
        format!("kube {context}")
    } else {
        format!("kube {context}@{host}")
    }
}

impl ServingApi for Backend {
    async fn list(&self, namespace: &str) -> Result<Vec<InferenceService>> {
        match self {
            Self::Kube(gateway) => gateway.list(namespace).await,
            Self::Rest(gateway) => gateway.list(namespace).await,
        }
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<InferenceService> {
        match self {
            Self::Kube(gateway) => gateway.get(namespace, name).await,
            Self::Rest(gateway) => gateway.get(namespace, name).await,
        }
    }

    async fn create(&self, namespace: &str, isvc: &InferenceService) -> Result<InferenceService> {
        match self {
            Self::Kube(gateway) => gateway.create(namespace, isvc).await,
            Self::Rest(gateway) => gateway.create(namespace, isvc).await,
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        match self {
            Self::Kube(gateway) => gateway.delete(namespace, name).await,
            Self::Rest(gateway) => gateway.delete(namespace, name).await,
        }
    }

    async fn owned(&self, kind: OwnedKind, namespace: &str, name: &str) -> Result<DynamicObject> {
        match self {
            Self::Kube(gateway) => gateway.owned(kind, namespace, name).await,
            Self::Rest(gateway) => gateway.owned(kind, namespace, name).await,
        }
    }

    async fn logs(&self, namespace: &str, name: &str, component: Component) -> Result<PodLogs> {
        match self {
            Self::Kube(gateway) => gateway.logs(namespace, name, component).await,
            Self::Rest(gateway) => gateway.logs(namespace, name, component).await,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::kube_label;

    #[test]
    fn kube_label_shows_context_and_cluster_host() {
        assert_eq!(
            kube_label("kind-serving", "https://127.0.0.1:6443/"),
            "kube kind-serving@127.0.0.1:6443"
        );
        assert_eq!(kube_label("in-cluster", ""), "kube in-cluster");
    }
}
