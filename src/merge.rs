use crate::model::InferenceService;

/// Which top-level parts of a stored resource were replaced.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct MergeReport {
    pub metadata: bool,
    pub spec: bool,
    pub status: bool,
}

impl MergeReport {
    pub fn changed(self) -> bool {
        self.metadata || self.spec || self.status
    }

    fn everything() -> Self {
        Self {
            metadata: true,
            spec: true,
            status: true,
        }
    }
}

/// Folds a freshly fetched resource into the stored one, assigning only the
/// parts that differ so untouched parts keep their storage.
pub fn merge(stored: &mut Option<InferenceService>, fresh: InferenceService) -> MergeReport {
    if let Some(current) = stored.as_mut() {
        return merge_into(current, fresh);
    }
    *stored = Some(fresh);
    MergeReport::everything()
}

pub fn merge_into(current: &mut InferenceService, fresh: InferenceService) -> MergeReport {
    let InferenceService {
        api_version,
        kind,
        metadata,
        spec,
        status,
    } = fresh;

    let mut report = MergeReport::default();
    if current.metadata != metadata {
        current.metadata = metadata;
        report.metadata = true;
    }
    if current.spec != spec {
        current.spec = spec;
        report.spec = true;
    }
    if current.status != status {
        current.status = status;
        report.status = true;
    }
    if current.api_version != api_version || current.kind != kind {
        current.api_version = api_version;
        current.kind = kind;
        report.metadata = true;
    }
    report
}

/// Applies [`merge_into`] per (namespace, name) across a list refresh. The
/// result follows the fresh list's order; entries that vanished are dropped.
/// Returns whether anything observable changed.
pub fn merge_list(stored: &mut Vec<InferenceService>, fresh: Vec<InferenceService>) -> bool {
    let previous_order = identities(stored);
    let mut previous = std::mem::take(stored);
    let mut changed = false;

    for item in fresh {
        let position = previous
            .iter()
            .position(|existing| existing.identity() == item.identity());
        match position {
            Some(position) => {
                let mut existing = previous.swap_remove(position);
                changed |= merge_into(&mut existing, item).changed();
                stored.push(existing);
            }
            None => stored.push(item),
        }
    }

    changed || identities(stored) != previous_order
}

fn identities(items: &[InferenceService]) -> Vec<(Option<String>, String)> {
    items
        .iter()
        .map(|item| (item.namespace().map(str::to_string), item.name().to_string()))
        .collect()
}
