use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::model::{
    ActivityComponents, ApplicationDocument, ScrapedThreatModeling, Settings, Subject,
};

/// Activity key used when no name is configured.
pub const CANONICAL_ACTIVITY_KEY: &str = "threat_modeling";

/// Build the output document for one Subject. The activity name is the
/// structural key under `activities`.
pub fn build_document(
    subject: &Subject,
    threat_modelings: &[ScrapedThreatModeling],
    activity_name: &str,
) -> ApplicationDocument {
    let key = if activity_name.trim().is_empty() {
        CANONICAL_ACTIVITY_KEY
    } else {
        activity_name
    };
    let components = threat_modelings
        .iter()
        .map(ScrapedThreatModeling::to_component)
        .collect();

    ApplicationDocument {
        settings: Settings {
            team: subject.team_name.clone(),
            application: subject.application_name.clone(),
        },
        activities: BTreeMap::from([(key.to_string(), ActivityComponents { components })]),
    }
}

/// Serialize with the header comment as the first line.
pub fn render_document(document: &ApplicationDocument, header_line: &str) -> Result<String> {
    let body = serde_yaml::to_string(document).context("failed to serialize output document")?;
    Ok(format!("{header_line}\n{body}"))
}
