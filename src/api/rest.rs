//! Dashboard backend client. Every response is a JSON envelope of the form
//! `{"success": bool, "status": u16, "log": "...", "<payloadKey>": ...}`.

use anyhow::{Context, Result, bail};
use kube::core::DynamicObject;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::ServingApi;
use crate::model::{Component, InferenceService, OwnedKind, PodLogs};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct RestGateway {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    log: Option<String>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

/// `serviceLogs` arrives either already scoped to the requested component or
/// keyed by component name first.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServiceLogs {
    Pods(PodLogs),
    Components(BTreeMap<String, PodLogs>),
}

impl RestGateway {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, namespace: &str, path: &str) -> String {
        format!("{}/api/namespaces/{namespace}/{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Envelope> {
        let response = request
            .send()
            .await
            .with_context(|| format!("request failed: {what}"))?;
        let http_status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read response: {what}"))?;
        debug!("{what} -> HTTP {http_status}");

        match decode_envelope(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !http_status.is_success() => bail!("{what}: HTTP {http_status}"),
            Err(error) => Err(error).with_context(|| format!("invalid response: {what}")),
        }
    }

    async fn fetch<T>(&self, method: Method, url: String, key: &str, what: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let envelope = self.send(self.client.request(method, url), what).await?;
        payload(envelope, key).with_context(|| what.to_string())
    }
}

impl ServingApi for RestGateway {
    async fn list(&self, namespace: &str) -> Result<Vec<InferenceService>> {
        let what = format!("list inferenceservices in {namespace}");
        self.fetch(
            Method::GET,
            self.url(namespace, "inferenceservices"),
            "inferenceServices",
            &what,
        )
        .await
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<InferenceService> {
        let what = format!("get inferenceservice {namespace}/{name}");
        self.fetch(
            Method::GET,
            self.url(namespace, &format!("inferenceservices/{name}")),
            "inferenceService",
            &what,
        )
        .await
    }

    async fn create(&self, namespace: &str, isvc: &InferenceService) -> Result<InferenceService> {
        let what = format!("create inferenceservice {namespace}/{}", isvc.name());
        let request = self
            .client
            .post(self.url(namespace, "inferenceservices"))
            .json(isvc);
        let envelope = self.send(request, &what).await?;
        ensure_success(&envelope).with_context(|| what.clone())?;
        // Older backends answer a create with a bare success envelope.
        if envelope.payload.contains_key("inferenceService") {
            return payload(envelope, "inferenceService").with_context(|| what);
        }
        Ok(isvc.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let what = format!("delete inferenceservice {namespace}/{name}");
        let request = self
            .client
            .delete(self.url(namespace, &format!("inferenceservices/{name}")));
        let envelope = self.send(request, &what).await?;
        ensure_success(&envelope).with_context(|| what)
    }

    async fn owned(&self, kind: OwnedKind, namespace: &str, name: &str) -> Result<DynamicObject> {
        let what = format!("get {} {namespace}/{name}", kind.plural());
        self.fetch(
            Method::GET,
            self.url(namespace, &format!("{}/{name}", kind.rest_segment())),
            kind.envelope_key(),
            &what,
        )
        .await
    }

    async fn logs(&self, namespace: &str, name: &str, component: Component) -> Result<PodLogs> {
        let what = format!("{component} logs for {namespace}/{name}");
        let request = self
            .client
            .get(self.url(namespace, &format!("inferenceservices/{name}")))
            .query(&[("logs", "true"), ("component", component.key())]);
        let envelope = self.send(request, &what).await?;
        let logs: ServiceLogs = payload(envelope, "serviceLogs").with_context(|| what)?;
        Ok(component_logs(logs, component))
    }
}

fn decode_envelope(body: &str) -> Result<Envelope> {
    serde_json::from_str(body).context("response is not a JSON envelope")
}

fn ensure_success(envelope: &Envelope) -> Result<()> {
    if envelope.success == Some(false) {
        let log = envelope
            .log
            .as_deref()
            .filter(|log| !log.trim().is_empty())
            .unwrap_or("backend reported a failure");
        match envelope.status {
            Some(status) => bail!("{log} (status {status})"),
            None => bail!("{log}"),
        }
    }
    Ok(())
}

fn payload<T>(mut envelope: Envelope, key: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    ensure_success(&envelope)?;
    let value = envelope
        .payload
        .remove(key)
        .with_context(|| format!("response has no `{key}` field"))?;
    serde_json::from_value(value).with_context(|| format!("unexpected `{key}` payload"))
}

fn component_logs(logs: ServiceLogs, component: Component) -> PodLogs {
    match logs {
        ServiceLogs::Pods(pods) => pods,
        ServiceLogs::Components(mut components) => components
            .remove(component.key())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::{ServiceLogs, component_logs, decode_envelope, ensure_success, payload};
    use crate::model::{Component, InferenceService};
    use kube::ResourceExt;
    use kube::core::DynamicObject;

    #[test]
    fn failed_envelope_surfaces_backend_log() {
        let envelope = decode_envelope(
            r#"{"success": false, "status": 403, "log": "User cannot list inferenceservices"}"#,
        )
        .expect("envelope");

        let error = payload::<Vec<InferenceService>>(envelope, "inferenceServices")
            .expect_err("failure envelope");
        let message = format!("{error:#}");
        assert!(message.contains("User cannot list inferenceservices"), "{message}");
        assert!(message.contains("403"), "{message}");
    }

    #[test]
    fn failed_envelope_without_log_still_errors() {
        let envelope = decode_envelope(r#"{"success": false}"#).expect("envelope");
        assert!(ensure_success(&envelope).is_err());
    }

    #[test]
    fn list_payload_decodes_services() {
        let envelope = decode_envelope(
            r#"{
                "success": true,
                "status": 200,
                "inferenceServices": [
                    {"metadata": {"name": "iris", "namespace": "models"},
                     "spec": {"predictor": {"sklearn": {}}}}
                ]
            }"#,
        )
        .expect("envelope");

        let services: Vec<InferenceService> =
            payload(envelope, "inferenceServices").expect("services");
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name(), "iris");
    }

    #[test]
    fn owned_payload_decodes_dynamic_object() {
        let envelope = decode_envelope(
            r#"{
                "success": true,
                "knativeService": {
                    "apiVersion": "serving.knative.dev/v1",
                    "kind": "Service",
                    "metadata": {"name": "iris-predictor", "namespace": "models"}
                }
            }"#,
        )
        .expect("envelope");

        let object: DynamicObject = payload(envelope, "knativeService").expect("object");
        assert_eq!(object.name_any(), "iris-predictor");
    }

    #[test]
    fn missing_payload_key_is_an_error() {
        let envelope = decode_envelope(r#"{"success": true}"#).expect("envelope");
        let error = payload::<InferenceService>(envelope, "inferenceService")
            .expect_err("missing key");
        assert!(format!("{error:#}").contains("inferenceService"));
    }

    #[test]
    fn service_logs_accept_both_shapes() {
        let scoped: ServiceLogs =
            serde_json::from_value(serde_json::json!({"iris-predictor-abc": ["ready"]}))
                .expect("pod logs");
        assert_eq!(
            component_logs(scoped, Component::Predictor)["iris-predictor-abc"],
            vec!["ready"]
        );

        let keyed: ServiceLogs = serde_json::from_value(serde_json::json!({
            "predictor": {"iris-predictor-abc": ["ready"]},
            "transformer": {"iris-transformer-def": ["booting"]}
        }))
        .expect("component logs");
        let logs = component_logs(keyed, Component::Transformer);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs["iris-transformer-def"], vec!["booting"]);
    }
}
