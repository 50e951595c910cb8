use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub const ISVC_GROUP: &str = "serving.kserve.io";
pub const ISVC_VERSION: &str = "v1beta1";
pub const ISVC_API_VERSION: &str = "serving.kserve.io/v1beta1";
pub const ISVC_KIND: &str = "InferenceService";
pub const ISVC_PLURAL: &str = "inferenceservices";
pub const KNATIVE_GROUP: &str = "serving.knative.dev";
pub const KNATIVE_VERSION: &str = "v1";

/// Pod name → log lines, as returned for one component.
pub type PodLogs = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Component {
    Predictor,
    Transformer,
    Explainer,
}

impl Component {
    pub const ALL: [Self; 3] = [Self::Predictor, Self::Transformer, Self::Explainer];

    pub fn key(self) -> &'static str {
        match self {
            Self::Predictor => "predictor",
            Self::Transformer => "transformer",
            Self::Explainer => "explainer",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Predictor => "Predictor",
            Self::Transformer => "Transformer",
            Self::Explainer => "Explainer",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "p" | "pred" | "predictor" => Some(Self::Predictor),
            "t" | "trans" | "transformer" => Some(Self::Transformer),
            "e" | "expl" | "explainer" => Some(Self::Explainer),
            _ => None,
        }
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Knative objects generated for each InferenceService component, in the
/// order the owner-reference chain is walked.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OwnedKind {
    Revision,
    Configuration,
    KnativeService,
    Route,
}

impl OwnedKind {
    pub const CHAIN: [Self; 4] = [
        Self::Revision,
        Self::Configuration,
        Self::KnativeService,
        Self::Route,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Revision => "Revision",
            Self::Configuration => "Configuration",
            Self::KnativeService => "Knative Service",
            Self::Route => "Route",
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            Self::Revision => "Revision",
            Self::Configuration => "Configuration",
            Self::KnativeService => "Service",
            Self::Route => "Route",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Revision => "revisions",
            Self::Configuration => "configurations",
            Self::KnativeService => "services",
            Self::Route => "routes",
        }
    }

    /// Path segment used by the dashboard backend.
    pub fn rest_segment(self) -> &'static str {
        match self {
            Self::Revision => "revisions",
            Self::Configuration => "configurations",
            Self::KnativeService => "knativeServices",
            Self::Route => "routes",
        }
    }

    /// Field of the backend's JSON envelope carrying the object.
    pub fn envelope_key(self) -> &'static str {
        match self {
            Self::Revision => "revision",
            Self::Configuration => "configuration",
            Self::KnativeService => "knativeService",
            Self::Route => "route",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceService {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: InferenceServiceSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<InferenceServiceStatus>,
}

impl InferenceService {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    pub fn identity(&self) -> (Option<&str>, &str) {
        (self.namespace(), self.name())
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn component_spec(&self, component: Component) -> Option<&ComponentSpec> {
        match component {
            Component::Predictor => Some(&self.spec.predictor),
            Component::Transformer => self.spec.transformer.as_ref(),
            Component::Explainer => self.spec.explainer.as_ref(),
        }
    }

    pub fn component_status(&self, component: Component) -> Option<&ComponentStatus> {
        self.status
            .as_ref()
            .and_then(|status| status.components.get(component.key()))
    }

    pub fn url(&self) -> Option<&str> {
        let status = self.status.as_ref()?;
        status
            .url
            .as_deref()
            .or_else(|| status.address.as_ref().and_then(|a| a.url.as_deref()))
    }

    pub fn internal_url(&self) -> Option<&str> {
        self.status
            .as_ref()?
            .address
            .as_ref()
            .and_then(|address| address.url.as_deref())
    }
}

impl Default for InferenceService {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta::default(),
            spec: InferenceServiceSpec::default(),
            status: None,
        }
    }
}

fn default_api_version() -> String {
    ISVC_API_VERSION.to_string()
}

fn default_kind() -> String {
    ISVC_KIND.to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InferenceServiceSpec {
    #[serde(default)]
    pub predictor: ComponentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<ComponentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explainer: Option<ComponentSpec>,
}

/// A component spec kept as raw JSON; exactly one variant key is expected to
/// be set alongside the shared deployment fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentSpec(pub Map<String, Value>);

impl ComponentSpec {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn min_replicas(&self) -> Option<i64> {
        self.field("minReplicas").and_then(Value::as_i64)
    }

    pub fn max_replicas(&self) -> Option<i64> {
        self.field("maxReplicas").and_then(Value::as_i64)
    }

    pub fn service_account(&self) -> Option<&str> {
        self.field("serviceAccountName").and_then(Value::as_str)
    }

    pub fn container_images(&self) -> Vec<String> {
        self.field("containers")
            .and_then(Value::as_array)
            .map(|containers| {
                containers
                    .iter()
                    .filter_map(|container| container.get("image").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Addressable>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Addressable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_created_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_ready_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_rolledout_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_rolledout_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic: Vec<TrafficTarget>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_revision: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Knative-style condition; unlike the core API type every field but `type`
/// and `status` is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

pub fn human_age(timestamp: Option<&Time>) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_string();
    };

    let elapsed_seconds =
        (k8s_openapi::jiff::Timestamp::now().as_second() - timestamp.0.as_second()).max(0);
    format_elapsed_seconds(elapsed_seconds)
}

pub fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}

#[cfg(test)]
mod tests {
    use super::{Component, InferenceService, format_elapsed_seconds};

    #[test]
    fn component_aliases_map_to_expected_components() {
        assert_eq!(Component::from_token("p"), Some(Component::Predictor));
        assert_eq!(
            Component::from_token("Transformer"),
            Some(Component::Transformer)
        );
        assert_eq!(Component::from_token("expl"), Some(Component::Explainer));
        assert_eq!(Component::from_token("router"), None);
    }

    #[test]
    fn inference_service_decodes_backend_payload() {
        let raw = serde_json::json!({
            "apiVersion": "serving.kserve.io/v1beta1",
            "kind": "InferenceService",
            "metadata": {"name": "sklearn-iris", "namespace": "models"},
            "spec": {"predictor": {"sklearn": {"storageUri": "gs://bucket/model"}}},
            "status": {
                "url": "http://sklearn-iris.models.example.com",
                "conditions": [{"type": "Ready", "status": "True"}],
                "components": {
                    "predictor": {"latestCreatedRevision": "sklearn-iris-predictor-00001"}
                }
            }
        });

        let isvc: InferenceService = serde_json::from_value(raw).expect("valid payload");
        assert_eq!(isvc.identity(), (Some("models"), "sklearn-iris"));
        assert_eq!(isvc.url(), Some("http://sklearn-iris.models.example.com"));
        assert_eq!(
            isvc.component_status(Component::Predictor)
                .and_then(|status| status.latest_created_revision.as_deref()),
            Some("sklearn-iris-predictor-00001")
        );
        assert!(isvc.component_spec(Component::Explainer).is_none());
    }

    #[test]
    fn elapsed_seconds_use_largest_unit() {
        assert_eq!(format_elapsed_seconds(42), "42s");
        assert_eq!(format_elapsed_seconds(125), "2m");
        assert_eq!(format_elapsed_seconds(7_300), "2h");
        assert_eq!(format_elapsed_seconds(200_000), "2d");
    }
}
