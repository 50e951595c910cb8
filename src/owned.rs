//! Resolution of the Knative objects KServe generates for each component.
//!
//! For one component the chain is walked strictly in order:
//! Revision → (owner) Configuration → (owner) Service → (same name) Route.
//! Components are independent of each other; a failure in one leaves the
//! others intact.

use anyhow::{Context, Result};
use futures::join;
use kube::ResourceExt;
use kube::core::DynamicObject;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::api::ServingApi;
use crate::model::{Component, InferenceService, OwnedKind};

#[derive(Debug, Clone, Default)]
pub struct OwnedResourceChain {
    pub revision: Option<DynamicObject>,
    pub configuration: Option<DynamicObject>,
    pub service: Option<DynamicObject>,
    pub route: Option<DynamicObject>,
}

impl OwnedResourceChain {
    pub fn get(&self, kind: OwnedKind) -> Option<&DynamicObject> {
        match kind {
            OwnedKind::Revision => self.revision.as_ref(),
            OwnedKind::Configuration => self.configuration.as_ref(),
            OwnedKind::KnativeService => self.service.as_ref(),
            OwnedKind::Route => self.route.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        OwnedKind::CHAIN.iter().all(|kind| self.get(*kind).is_none())
    }

    pub fn name_of(&self, kind: OwnedKind) -> Option<String> {
        self.get(kind).map(|object| object.name_any())
    }
}

#[derive(Debug, Clone)]
pub enum ChainResult {
    /// The parent has no revision for this component yet.
    Empty,
    Resolved(OwnedResourceChain),
    Failed(String),
}

impl ChainResult {
    pub fn chain(&self) -> Option<&OwnedResourceChain> {
        match self {
            Self::Resolved(chain) => Some(chain),
            Self::Empty | Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OwnedResources {
    pub predictor: ChainResult,
    pub transformer: ChainResult,
    pub explainer: ChainResult,
}

impl OwnedResources {
    pub fn get(&self, component: Component) -> &ChainResult {
        match component {
            Component::Predictor => &self.predictor,
            Component::Transformer => &self.transformer,
            Component::Explainer => &self.explainer,
        }
    }
}

/// Walks the chain for one component. A parent without a
/// `latestCreatedRevision` for it yields an empty chain without any fetch.
pub async fn resolve_chain<A>(
    api: &A,
    isvc: &InferenceService,
    component: Component,
) -> Result<OwnedResourceChain>
where
    A: ServingApi,
{
    let Some(revision_name) = isvc
        .component_status(component)
        .and_then(|status| status.latest_created_revision.as_deref())
        .filter(|name| !name.is_empty())
    else {
        return Ok(OwnedResourceChain::default());
    };
    let namespace = isvc
        .namespace()
        .with_context(|| format!("inferenceservice {} has no namespace", isvc.name()))?;

    debug!(
        "resolving {component} chain for {namespace}/{} from revision {revision_name}",
        isvc.name()
    );

    let revision = api
        .owned(OwnedKind::Revision, namespace, revision_name)
        .await
        .with_context(|| format!("failed to load revision {revision_name}"))?;

    let configuration_name = first_owner(&revision, OwnedKind::Revision)?;
    let configuration = api
        .owned(OwnedKind::Configuration, namespace, &configuration_name)
        .await
        .with_context(|| format!("failed to load configuration {configuration_name}"))?;

    let service_name = first_owner(&configuration, OwnedKind::Configuration)?;
    let service = api
        .owned(OwnedKind::KnativeService, namespace, &service_name)
        .await
        .with_context(|| format!("failed to load knative service {service_name}"))?;

    let route_name = service.name_any();
    let route = api
        .owned(OwnedKind::Route, namespace, &route_name)
        .await
        .with_context(|| format!("failed to load route {route_name}"))?;

    Ok(OwnedResourceChain {
        revision: Some(revision),
        configuration: Some(configuration),
        service: Some(service),
        route: Some(route),
    })
}

/// Resolves one component's chain within `limit`. A timeout fails only
/// this component.
pub async fn resolve_component<A>(
    api: &A,
    isvc: &InferenceService,
    component: Component,
    limit: Duration,
) -> ChainResult
where
    A: ServingApi,
{
    match timeout(limit, resolve_chain(api, isvc, component)).await {
        Ok(Ok(chain)) if chain.is_empty() => ChainResult::Empty,
        Ok(Ok(chain)) => ChainResult::Resolved(chain),
        Ok(Err(error)) => ChainResult::Failed(format!("{error:#}")),
        Err(_) => {
            warn!("{component} chain for {} timed out", isvc.name());
            ChainResult::Failed(format!(
                "resolution timed out after {}s",
                limit.as_secs()
            ))
        }
    }
}

/// Resolves all three components concurrently and joins the results.
pub async fn resolve_owned<A>(api: &A, isvc: &InferenceService, limit: Duration) -> OwnedResources
where
    A: ServingApi,
{
    let (predictor, transformer, explainer) = join!(
        resolve_component(api, isvc, Component::Predictor, limit),
        resolve_component(api, isvc, Component::Transformer, limit),
        resolve_component(api, isvc, Component::Explainer, limit),
    );

    OwnedResources {
        predictor,
        transformer,
        explainer,
    }
}

fn first_owner(object: &DynamicObject, kind: OwnedKind) -> Result<String> {
    object
        .owner_references()
        .first()
        .map(|owner| owner.name.clone())
        .with_context(|| format!("{} {} has no owner reference", kind.title(), object.name_any()))
}
