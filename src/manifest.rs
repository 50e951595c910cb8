//! Validation of user-submitted InferenceService YAML before it is sent.

use serde_yaml::{Mapping, Value};

use crate::model::{ISVC_API_VERSION, ISVC_KIND, InferenceService};

/// Starter manifest offered by `:template`.
pub const TEMPLATE: &str = "\
apiVersion: serving.kserve.io/v1beta1
kind: InferenceService
metadata:
  name: sklearn-iris
spec:
  predictor:
    model:
      modelFormat:
        name: sklearn
      storageUri: gs://kfserving-examples/models/sklearn/1.0/model
";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ManifestError {
    /// YAML that does not parse
    #[error("invalid YAML{}: {message}", at_line(.line))]
    Yaml { line: Option<usize>, message: String },

    /// A required key is absent or empty
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// The document is not a YAML mapping
    #[error("manifest must be a YAML mapping")]
    NotAMapping,

    /// Well-formed YAML that still is not an InferenceService
    #[error("not a valid InferenceService: {0}")]
    Invalid(String),
}

fn at_line(line: &Option<usize>) -> String {
    line.map(|line| format!(" at line {line}")).unwrap_or_default()
}

/// Parses and validates a submission. The namespace is always the active one,
/// whatever the document says, and any submitted status is discarded.
pub fn parse_submission(text: &str, namespace: &str) -> Result<InferenceService, ManifestError> {
    let document: Value = serde_yaml::from_str(text).map_err(|error| ManifestError::Yaml {
        line: error.location().map(|location| location.line()),
        message: error.to_string(),
    })?;

    let Value::Mapping(mut root) = document else {
        return Err(ManifestError::NotAMapping);
    };

    let metadata = match root.get_mut("metadata") {
        Some(Value::Mapping(metadata)) => metadata,
        _ => return Err(ManifestError::MissingField("metadata")),
    };
    let has_name = metadata
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());
    if !has_name {
        return Err(ManifestError::MissingField("metadata.name"));
    }
    metadata.insert("namespace".into(), namespace.into());

    match root.get("spec") {
        Some(Value::Mapping(spec)) if spec.contains_key("predictor") => {}
        Some(Value::Mapping(_)) => return Err(ManifestError::MissingField("spec.predictor")),
        _ => return Err(ManifestError::MissingField("spec")),
    }

    default_key(&mut root, "apiVersion", ISVC_API_VERSION);
    default_key(&mut root, "kind", ISVC_KIND);
    root.remove("status");

    serde_yaml::from_value(Value::Mapping(root))
        .map_err(|error| ManifestError::Invalid(error.to_string()))
}

fn default_key(root: &mut Mapping, key: &str, value: &str) {
    let missing = root
        .get(key)
        .and_then(Value::as_str)
        .is_none_or(|current| current.trim().is_empty());
    if missing {
        root.insert(key.into(), value.into());
    }
}
