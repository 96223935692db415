use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::collect::collect_threat_modelings;
use crate::config::ScrapingConfig;
use crate::confluence::ConfluenceApi;
use crate::emit::{EmitReport, emit_groups};
use crate::group::group_by_subject;
use crate::model::CollectionResult;

#[derive(Debug, Clone)]
pub struct CollectionRun {
    pub pages_found: usize,
    pub collection: CollectionResult,
    pub request_count: usize,
}

/// Search pages by the configured label and collect them.
pub fn collect_labeled_pages<A: ConfluenceApi>(
    api: &mut A,
    config: &ScrapingConfig,
) -> Result<CollectionRun> {
    info!(label = %config.search_label, "searching pages by label");
    let pages = api.find_pages_by_label(&config.search_label, 0, config.page_limit)?;
    if pages.is_empty() {
        warn!(label = %config.search_label, "no pages found");
    }
    let collection = collect_threat_modelings(&pages, config, api)?;
    Ok(CollectionRun {
        pages_found: pages.len(),
        collection,
        request_count: api.request_count(),
    })
}

/// Group collected records and write one file per Subject under `output_root`.
pub fn emit_collection(
    output_root: &Path,
    collection: &CollectionResult,
    config: &ScrapingConfig,
) -> Result<EmitReport> {
    let groups = group_by_subject(&collection.threat_modelings);
    info!(
        groups = groups.len(),
        root = %output_root.display(),
        "writing output files"
    );
    emit_groups(output_root, &groups, config)
}

/// Process exit status: the per-page error count, clamped to what a process can report.
pub fn exit_code(collection: &CollectionResult) -> u8 {
    u8::try_from(collection.errors.len()).unwrap_or(u8::MAX)
}
