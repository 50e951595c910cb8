use serde_json::Value;

use crate::model::{Component, ComponentSpec};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PredictorKind {
    Tensorflow,
    Triton,
    Sklearn,
    Onnx,
    Pytorch,
    Xgboost,
    Pmml,
    Lightgbm,
    Paddle,
    Huggingface,
    Model,
    Custom,
}

impl PredictorKind {
    /// Lookup order; the first populated key wins when several are set.
    pub const PRECEDENCE: [Self; 11] = [
        Self::Tensorflow,
        Self::Triton,
        Self::Sklearn,
        Self::Onnx,
        Self::Pytorch,
        Self::Xgboost,
        Self::Pmml,
        Self::Lightgbm,
        Self::Paddle,
        Self::Huggingface,
        Self::Model,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Tensorflow => "tensorflow",
            Self::Triton => "triton",
            Self::Sklearn => "sklearn",
            Self::Onnx => "onnx",
            Self::Pytorch => "pytorch",
            Self::Xgboost => "xgboost",
            Self::Pmml => "pmml",
            Self::Lightgbm => "lightgbm",
            Self::Paddle => "paddle",
            Self::Huggingface => "huggingface",
            Self::Model => "model",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ExplainerKind {
    Alibi,
    Aix,
    Art,
    Custom,
}

impl ExplainerKind {
    pub const PRECEDENCE: [Self; 3] = [Self::Alibi, Self::Aix, Self::Art];

    pub fn key(self) -> &'static str {
        match self {
            Self::Alibi => "alibi",
            Self::Aix => "aix",
            Self::Art => "art",
            Self::Custom => "custom",
        }
    }
}

/// Resolved variant of any component, with a uniform label for tables.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Variant {
    Predictor(PredictorKind),
    Explainer(ExplainerKind),
    Transformer,
}

impl Variant {
    pub fn label(self) -> &'static str {
        match self {
            Self::Predictor(kind) => kind.key(),
            Self::Explainer(kind) => kind.key(),
            Self::Transformer => "custom",
        }
    }

    #[cfg(test)]
    pub fn is_custom(self) -> bool {
        matches!(
            self,
            Self::Predictor(PredictorKind::Custom)
                | Self::Explainer(ExplainerKind::Custom)
                | Self::Transformer
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<'a, K> {
    pub kind: K,
    pub spec: Option<&'a Value>,
}

impl<'a, K> Resolved<'a, K> {
    pub fn storage_uri(&self) -> Option<&'a str> {
        self.string_field("storageUri")
    }

    pub fn runtime_version(&self) -> Option<&'a str> {
        self.string_field("runtimeVersion")
    }

    pub fn protocol_version(&self) -> Option<&'a str> {
        self.string_field("protocolVersion")
    }

    /// `modelFormat.name` for the generic `model` variant.
    pub fn model_format(&self) -> Option<&'a str> {
        self.spec?
            .get("modelFormat")
            .and_then(|format| format.get("name"))
            .and_then(Value::as_str)
    }

    /// Named serving runtime for the generic `model` variant.
    pub fn runtime(&self) -> Option<&'a str> {
        self.string_field("runtime")
    }

    fn string_field(&self, key: &str) -> Option<&'a str> {
        self.spec?.get(key).and_then(Value::as_str)
    }
}

pub fn resolve_predictor(spec: &ComponentSpec) -> Resolved<'_, PredictorKind> {
    resolve_ordered(spec, &PredictorKind::PRECEDENCE, PredictorKind::key)
        .unwrap_or(Resolved {
            kind: PredictorKind::Custom,
            spec: None,
        })
}

pub fn resolve_explainer(spec: &ComponentSpec) -> Resolved<'_, ExplainerKind> {
    resolve_ordered(spec, &ExplainerKind::PRECEDENCE, ExplainerKind::key)
        .unwrap_or(Resolved {
            kind: ExplainerKind::Custom,
            spec: None,
        })
}

/// Variant plus its sub-spec for any component. Transformers only come as
/// custom containers.
pub fn resolve_component(
    component: Component,
    spec: &ComponentSpec,
) -> (Variant, Option<&Value>) {
    match component {
        Component::Predictor => {
            let resolved = resolve_predictor(spec);
            (Variant::Predictor(resolved.kind), resolved.spec)
        }
        Component::Explainer => {
            let resolved = resolve_explainer(spec);
            (Variant::Explainer(resolved.kind), resolved.spec)
        }
        Component::Transformer => (Variant::Transformer, None),
    }
}

fn resolve_ordered<'a, K: Copy>(
    spec: &'a ComponentSpec,
    order: &[K],
    key: fn(K) -> &'static str,
) -> Option<Resolved<'a, K>> {
    order.iter().copied().find_map(|kind| {
        spec.field(key(kind)).map(|value| Resolved {
            kind,
            spec: Some(value),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::{
        ExplainerKind, PredictorKind, Variant, resolve_component, resolve_explainer,
        resolve_predictor,
    };
    use crate::model::{Component, ComponentSpec};

    fn spec(value: serde_json::Value) -> ComponentSpec {
        serde_json::from_value(value).expect("component spec")
    }

    #[test]
    fn predictor_variant_is_detected() {
        let predictor = spec(serde_json::json!({
            "minReplicas": 1,
            "sklearn": {"storageUri": "gs://kfserving-examples/models/sklearn/iris"}
        }));
        let resolved = resolve_predictor(&predictor);
        assert_eq!(resolved.kind, PredictorKind::Sklearn);
        assert_eq!(
            resolved.storage_uri(),
            Some("gs://kfserving-examples/models/sklearn/iris")
        );
    }

    #[test]
    fn earlier_variant_wins_when_two_are_set() {
        let predictor = spec(serde_json::json!({
            "pytorch": {"storageUri": "s3://b"},
            "tensorflow": {"storageUri": "s3://a"}
        }));
        for _ in 0..3 {
            let resolved = resolve_predictor(&predictor);
            assert_eq!(resolved.kind, PredictorKind::Tensorflow);
            assert_eq!(resolved.storage_uri(), Some("s3://a"));
        }
    }

    #[test]
    fn no_known_variant_falls_back_to_custom() {
        let predictor = spec(serde_json::json!({
            "containers": [{"name": "kserve-container", "image": "repo/model:1"}]
        }));
        let resolved = resolve_predictor(&predictor);
        assert_eq!(resolved.kind, PredictorKind::Custom);
        assert!(resolved.spec.is_none());
    }

    #[test]
    fn null_variant_field_is_not_a_match() {
        let predictor = spec(serde_json::json!({"tensorflow": null, "onnx": {}}));
        assert_eq!(resolve_predictor(&predictor).kind, PredictorKind::Onnx);
    }

    #[test]
    fn model_variant_exposes_format() {
        let predictor = spec(serde_json::json!({
            "model": {"modelFormat": {"name": "lightgbm"}, "runtime": "kserve-lgbserver"}
        }));
        let resolved = resolve_predictor(&predictor);
        assert_eq!(resolved.kind, PredictorKind::Model);
        assert_eq!(resolved.model_format(), Some("lightgbm"));
        assert_eq!(resolved.runtime(), Some("kserve-lgbserver"));
    }

    #[test]
    fn explainer_and_transformer_variants() {
        let explainer = spec(serde_json::json!({"alibi": {"type": "AnchorTabular"}}));
        assert_eq!(resolve_explainer(&explainer).kind, ExplainerKind::Alibi);

        let (variant, sub) = resolve_component(Component::Transformer, &explainer);
        assert_eq!(variant, Variant::Transformer);
        assert!(variant.is_custom());
        assert!(sub.is_none());
    }
}
