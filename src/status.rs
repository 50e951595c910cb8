use kube::core::DynamicObject;
use serde_json::Value;

use crate::model::{Condition, InferenceService};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum StatusPhase {
    Ready,
    Waiting,
    Terminating,
    Unavailable,
    Warning,
}

impl StatusPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Waiting => "Waiting",
            Self::Terminating => "Terminating",
            Self::Unavailable => "Unavailable",
            Self::Warning => "Warning",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UiStatus {
    pub phase: StatusPhase,
    pub message: String,
}

impl UiStatus {
    fn new(phase: StatusPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

/// Derives the display status from a deletion flag and the condition list.
///
/// `conditions` is `None` when the object carries no `status` at all, and an
/// empty slice when the status exists but has no conditions yet.
pub fn classify(deleting: bool, conditions: Option<&[Condition]>) -> UiStatus {
    if deleting {
        return UiStatus::new(StatusPhase::Terminating, "Deleting resource...");
    }

    let Some(conditions) = conditions else {
        return UiStatus::new(StatusPhase::Unavailable, "Status is not available yet");
    };

    let Some(ready) = conditions.iter().find(|condition| condition.type_ == "Ready") else {
        return UiStatus::new(StatusPhase::Warning, "No Ready condition available");
    };

    if ready.status == "True" {
        return UiStatus::new(StatusPhase::Ready, "Ready");
    }

    UiStatus::new(
        StatusPhase::Waiting,
        ready.message.clone().unwrap_or_default(),
    )
}

pub fn inference_service_status(isvc: &InferenceService) -> UiStatus {
    let conditions = isvc
        .status
        .as_ref()
        .map(|status| status.conditions.as_deref().unwrap_or(&[]));
    classify(isvc.is_deleting(), conditions)
}

/// Same rules for the generated Knative objects, read from their untyped body.
pub fn object_status(object: &DynamicObject) -> UiStatus {
    let deleting = object.metadata.deletion_timestamp.is_some();
    let conditions = object.data.get("status").map(parse_conditions);
    classify(deleting, conditions.as_deref())
}

fn parse_conditions(status: &Value) -> Vec<Condition> {
    status
        .get("conditions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<Condition>(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
