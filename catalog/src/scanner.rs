//! Reconciling the replay store with the index.

use std::sync::Arc;

use awbw_integrations::Log;
use awbw_replay::ContainerKind;

use crate::CatalogState;

/// Recognises replay artifact names: `<id>.zip` is a zipped replay, a bare
/// `<id>` a compressed one. Everything else (snapshots, temp files) is ignored.
pub fn classify(name: &str) -> Option<(i64, ContainerKind)> {
    let (stem, kind) = match name.strip_suffix(".zip") {
        Some(stem) => (stem, ContainerKind::Zip),
        None => (name, ContainerKind::Compressed),
    };

    if stem.is_empty() || !stem.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    stem.parse().ok().map(|id| (id, kind))
}

/// What a scan found to do.
#[derive(Debug, Default, PartialEq)]
pub struct ScanPlan {
    /// Stored files whose replay isn't in the index yet.
    pub new_files: Vec<(String, ContainerKind)>,

    /// Indexed replays still missing usernames.
    pub needs_enrichment: Vec<i64>,
}

/// Diffs the store's listing against the index. Cheap; no replay is decoded.
pub(crate) fn plan(state: &CatalogState, names: Vec<String>) -> ScanPlan {
    let mut plan = ScanPlan::default();

    for name in names {
        let Some((id, kind)) = classify(&name) else {
            continue;
        };

        match state.replays.get(id) {
            Some(info) => {
                if info.has_unresolved_usernames() && !plan.needs_enrichment.contains(&id) {
                    plan.needs_enrichment.push(id);
                }
            },

            None => plan.new_files.push((name, kind)),
        }
    }

    plan.new_files.sort_by(|(a, _), (b, _)| a.cmp(b));
    plan
}

/// The body of the scan thread: decodes and ingests every new file.
///
/// A file that fails to decode is logged and left where it is, so it will be
/// tried again by the next scan.
pub(crate) fn run(state: Arc<CatalogState>, new_files: Vec<(String, ContainerKind)>) {
    tracing::info!(target: Log::Catalog, count = new_files.len(), "Ingesting new replays");

    for (name, kind) in new_files {
        let bytes = match state.storage.read(&name) {
            Ok(bytes) => bytes,

            Err(error) => {
                tracing::error!(target: Log::Catalog, ?error, ?name, "Unable to read stored replay");
                continue;
            },
        };

        if let Err(error) = state.ingest(&bytes, kind) {
            tracing::error!(target: Log::Catalog, ?error, ?name, "Failed to ingest stored replay");
        }
    }
}
