use anyhow::{Context, Result};
use futures::future::join_all;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, LogParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, ResourceExt};
use tracing::{debug, warn};

use super::ServingApi;
use crate::model::{
    Component, ISVC_GROUP, ISVC_KIND, ISVC_PLURAL, ISVC_VERSION, InferenceService, KNATIVE_GROUP,
    KNATIVE_VERSION, OwnedKind, PodLogs,
};

pub const ISVC_LABEL: &str = "serving.kserve.io/inferenceservice";
pub const COMPONENT_LABEL: &str = "component";
pub const SERVING_CONTAINER: &str = "kserve-container";
const LOG_TAIL_LINES: i64 = 500;

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    default_namespace: String,
}

impl KubeGateway {
    pub async fn new(context: Option<String>) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().ok();

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            if context.is_some() {
                anyhow::bail!("kubeconfig not found; --context is unavailable in this environment");
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;

        let context = context
            .or_else(|| {
                kubeconfig
                    .as_ref()
                    .and_then(|cfg| cfg.current_context.clone())
            })
            .unwrap_or_else(|| "in-cluster".to_string());

        Ok(Self {
            client,
            context,
            cluster,
            default_namespace,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn inference_services(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &inference_service_resource())
    }
}

impl ServingApi for KubeGateway {
    async fn list(&self, namespace: &str) -> Result<Vec<InferenceService>> {
        let list = self
            .inference_services(namespace)
            .list(&list_params())
            .await
            .with_context(|| format!("failed to list inferenceservices in {namespace}"))?;

        let mut services = list
            .into_iter()
            .map(from_dynamic)
            .collect::<Result<Vec<_>>>()?;
        services.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(services)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<InferenceService> {
        let object = self
            .inference_services(namespace)
            .get(name)
            .await
            .with_context(|| format!("failed to load inferenceservice {namespace}/{name}"))?;
        from_dynamic(object)
    }

    async fn create(&self, namespace: &str, isvc: &InferenceService) -> Result<InferenceService> {
        let object = to_dynamic(isvc)?;
        let created = self
            .inference_services(namespace)
            .create(&PostParams::default(), &object)
            .await
            .with_context(|| format!("failed to create inferenceservice {namespace}/{}", isvc.name()))?;
        from_dynamic(created)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let _ = self
            .inference_services(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .with_context(|| format!("failed to delete inferenceservice {namespace}/{name}"))?;
        Ok(())
    }

    async fn owned(&self, kind: OwnedKind, namespace: &str, name: &str) -> Result<DynamicObject> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &owned_resource(kind));
        api.get(name)
            .await
            .with_context(|| format!("failed to load {} {namespace}/{name}", kind.plural()))
    }

    async fn logs(&self, namespace: &str, name: &str, component: Component) -> Result<PodLogs> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let selector = component_selector(name, component);
        let list = pods
            .list(&list_params().labels(&selector))
            .await
            .with_context(|| format!("failed to list pods for {selector}"))?;
        debug!("loading {component} logs for {namespace}/{name} from {} pods", list.items.len());

        let params = LogParams {
            container: Some(SERVING_CONTAINER.to_string()),
            tail_lines: Some(LOG_TAIL_LINES),
            ..LogParams::default()
        };
        let fetches = list.into_iter().map(|pod| {
            let pods = pods.clone();
            let params = params.clone();
            async move {
                let pod_name = pod.name_any();
                let lines = match pods.logs(&pod_name, &params).await {
                    Ok(raw) => split_log_lines(&raw),
                    Err(error) => {
                        warn!("failed to load logs for {namespace}/{pod_name}: {error}");
                        vec![format!("failed to load logs: {error}")]
                    }
                };
                (pod_name, lines)
            }
        });

        Ok(join_all(fetches).await.into_iter().collect())
    }
}

pub fn inference_service_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(ISVC_GROUP, ISVC_VERSION, ISVC_KIND);
    ApiResource::from_gvk_with_plural(&gvk, ISVC_PLURAL)
}

pub fn owned_resource(kind: OwnedKind) -> ApiResource {
    let gvk = GroupVersionKind::gvk(KNATIVE_GROUP, KNATIVE_VERSION, kind.kind());
    ApiResource::from_gvk_with_plural(&gvk, kind.plural())
}

pub fn component_selector(name: &str, component: Component) -> String {
    format!("{ISVC_LABEL}={name},{COMPONENT_LABEL}={component}")
}

fn from_dynamic(object: DynamicObject) -> Result<InferenceService> {
    let name = object.name_any();
    let value = serde_json::to_value(object).context("failed to encode inferenceservice")?;
    serde_json::from_value(value).with_context(|| format!("unexpected inferenceservice shape for {name}"))
}

fn to_dynamic(isvc: &InferenceService) -> Result<DynamicObject> {
    let value = serde_json::to_value(isvc).context("failed to encode inferenceservice")?;
    serde_json::from_value(value).context("failed to build inferenceservice request")
}

fn split_log_lines(raw: &str) -> Vec<String> {
    raw.lines().map(str::to_string).collect()
}

fn list_params() -> ListParams {
    ListParams::default().limit(500)
}

#[cfg(test)]
mod tests {
    use super::{
        component_selector, from_dynamic, inference_service_resource, owned_resource,
        split_log_lines, to_dynamic,
    };
    use crate::model::{Component, InferenceService, OwnedKind};
    use kube::core::DynamicObject;

    #[test]
    fn knative_service_maps_to_services_plural() {
        let resource = owned_resource(OwnedKind::KnativeService);
        assert_eq!(resource.api_version, "serving.knative.dev/v1");
        assert_eq!(resource.kind, "Service");
        assert_eq!(resource.plural, "services");

        let isvc = inference_service_resource();
        assert_eq!(isvc.api_version, "serving.kserve.io/v1beta1");
        assert_eq!(isvc.plural, "inferenceservices");
    }

    #[test]
    fn pod_selector_targets_component_pods() {
        assert_eq!(
            component_selector("flowers", Component::Transformer),
            "serving.kserve.io/inferenceservice=flowers,component=transformer"
        );
    }

    #[test]
    fn dynamic_objects_convert_both_ways() {
        let object: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "serving.kserve.io/v1beta1",
            "kind": "InferenceService",
            "metadata": {"name": "flowers", "namespace": "models"},
            "spec": {"predictor": {"tensorflow": {"storageUri": "gs://kfserving/flowers"}}},
            "status": {"url": "http://flowers.models.example.com"}
        }))
        .expect("valid object");

        let isvc: InferenceService = from_dynamic(object).expect("converts");
        assert_eq!(isvc.identity(), (Some("models"), "flowers"));
        assert_eq!(isvc.url(), Some("http://flowers.models.example.com"));

        let back = to_dynamic(&isvc).expect("converts back");
        assert_eq!(
            back.types.as_ref().map(|types| types.kind.as_str()),
            Some("InferenceService")
        );
        assert!(back.data["spec"]["predictor"]["tensorflow"].is_object());
    }

    #[test]
    fn log_output_splits_on_newlines() {
        assert_eq!(
            split_log_lines("starting server\nlistening on 8080\n"),
            vec!["starting server", "listening on 8080"]
        );
        assert!(split_log_lines("").is_empty());
    }
}
