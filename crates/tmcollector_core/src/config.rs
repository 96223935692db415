use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;

use crate::model::{Subject, UNMAPPED_TEAM};

pub const DEFAULT_SEARCH_LABEL: &str = "threat-modeling";
pub const DEFAULT_ACTIVITY_NAME: &str = "Threat Modeling";
pub const DEFAULT_OUTPUT_SUBFOLDER: &str = "activities/automated";
pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const DEFAULT_GENERATOR_NAME: &str = "tmcollector";
pub const DEFAULT_GENERATOR_URL: &str = "https://github.com/devsecopsmaturitymodel/collector-confluence";

/// Settings for one scraping run. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapingConfig {
    pub space_mapping: BTreeMap<String, Subject>,
    pub search_label: String,
    pub activity_name: String,
    pub output_subfolder: String,
    pub page_limit: usize,
    pub generator_name: String,
    pub generator_url: String,
}

impl ScrapingConfig {
    pub fn with_mapping(space_mapping: BTreeMap<String, Subject>) -> Self {
        Self {
            space_mapping,
            search_label: DEFAULT_SEARCH_LABEL.to_string(),
            activity_name: DEFAULT_ACTIVITY_NAME.to_string(),
            output_subfolder: DEFAULT_OUTPUT_SUBFOLDER.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            generator_name: DEFAULT_GENERATOR_NAME.to_string(),
            generator_url: DEFAULT_GENERATOR_URL.to_string(),
        }
    }

    /// First line of every emitted file, without the trailing newline.
    pub fn header_line(&self) -> String {
        format!(
            "# Auto-generated by {} ({})",
            self.generator_name, self.generator_url
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Toml,
        }
    }

    fn mapping_example(self, space: &str) -> String {
        match self {
            Self::Toml => format!(
                "[space_mapping.{space}]\napplication_name = \"magic-records\"\nteam_name = \"magic-team\""
            ),
            Self::Yaml => format!(
                "space_mapping:\n  {space}:\n    application_name: magic-records\n    team_name: magic-team"
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    space_mapping: Option<BTreeMap<String, Value>>,
    search_label: Option<String>,
    activity_name: Option<String>,
    output_subfolder: Option<String>,
    page_limit: Option<usize>,
    generator_name: Option<String>,
    generator_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSubject {
    application_name: String,
    team_name: Option<String>,
}

/// Load and validate a ScrapingConfig from a TOML or YAML file.
pub fn load_config(config_path: &Path) -> Result<ScrapingConfig> {
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    parse_config(&content, ConfigFormat::from_path(config_path))
        .with_context(|| format!("invalid configuration in {}", config_path.display()))
}

pub fn parse_config(content: &str, format: ConfigFormat) -> Result<ScrapingConfig> {
    let raw: RawConfig = match format {
        ConfigFormat::Toml => toml::from_str(content).context("failed to parse TOML")?,
        ConfigFormat::Yaml => serde_yaml::from_str(content).context("failed to parse YAML")?,
    };

    let Some(entries) = raw.space_mapping else {
        bail!(
            "missing required key `space_mapping`; add at least one space, for example:\n{}",
            format.mapping_example("MR")
        );
    };

    let mut space_mapping = BTreeMap::new();
    for (space, value) in entries {
        let subject = parse_subject(&space, value, format)?;
        space_mapping.insert(space, subject);
    }

    let mut config = ScrapingConfig::with_mapping(space_mapping);
    if let Some(label) = non_empty(raw.search_label, "search_label")? {
        config.search_label = label;
    }
    if let Some(name) = non_empty(raw.activity_name, "activity_name")? {
        config.activity_name = name;
    }
    if let Some(subfolder) = non_empty(raw.output_subfolder, "output_subfolder")? {
        config.output_subfolder = subfolder;
    }
    if let Some(limit) = raw.page_limit {
        if limit == 0 {
            bail!("`page_limit` must be greater than zero, for example: page_limit = 100");
        }
        config.page_limit = limit;
    }
    if let Some(name) = non_empty(raw.generator_name, "generator_name")? {
        config.generator_name = name;
    }
    if let Some(url) = non_empty(raw.generator_url, "generator_url")? {
        config.generator_url = url;
    }
    Ok(config)
}

fn parse_subject(space: &str, value: Value, format: ConfigFormat) -> Result<Subject> {
    let raw: RawSubject = serde_json::from_value(value).map_err(|error| {
        anyhow::anyhow!(
            "malformed `space_mapping` entry `{space}`: {error}\nexpected for example:\n{}",
            format.mapping_example(space)
        )
    })?;
    let application_name = raw.application_name.trim();
    if application_name.is_empty() {
        bail!(
            "malformed `space_mapping` entry `{space}`: `application_name` is empty\nexpected for example:\n{}",
            format.mapping_example(space)
        );
    }
    let team_name = raw
        .team_name
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNMAPPED_TEAM);
    Ok(Subject::new(application_name, team_name))
}

fn non_empty(value: Option<String>, key: &str) -> Result<Option<String>> {
    match value {
        Some(value) if value.trim().is_empty() => {
            bail!("`{key}` must not be empty; remove it to use the default")
        }
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}
