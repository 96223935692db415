use anyhow::Result;
use tracing::{debug, info};

use crate::config::ScrapingConfig;
use crate::confluence::{ConfluenceApi, PageRecord};
use crate::extract::extract_metadata;
use crate::model::{CollectionResult, Link, ScrapedThreatModeling};
use crate::resolve::resolve_subject;

/// Extract and resolve every page in order.
///
/// Per-page failures are recorded in `errors`; any other error aborts.
pub fn collect_threat_modelings<A: ConfluenceApi>(
    pages: &[PageRecord],
    config: &ScrapingConfig,
    api: &mut A,
) -> Result<CollectionResult> {
    let mut result = CollectionResult::default();

    for page in pages {
        match extract_metadata(page, api)? {
            Ok(meta) => {
                let subject = resolve_subject(
                    &meta.space,
                    &config.space_mapping,
                    meta.application_name.as_deref(),
                    meta.team.as_deref(),
                );
                let record = ScrapedThreatModeling {
                    subject,
                    title: meta.title.clone(),
                    date: meta.date,
                    links: vec![Link {
                        title: meta.title,
                        url: meta.url.clone(),
                    }],
                    source_url: meta.url,
                };
                debug!("* {record}");
                result.threat_modelings.push(record);
            }
            Err(failure) => {
                let url = api.web_url(&page.webui_path);
                debug!(page = %page.title, %failure, "skipping page");
                result.errors.push(format!(
                    "Skipping page [{}]({url}) because: {failure}",
                    page.title
                ));
            }
        }
    }

    info!(
        collected = result.threat_modelings.len(),
        errors = result.errors.len(),
        "collection finished"
    );
    Ok(result)
}
