use std::sync::LazyLock;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use crate::confluence::{ConfluenceApi, PageRecord};

pub const ISO_DATE_PATTERN: &str = r"(\d{4}-\d{2}-\d{2})";
pub const LABELED_DATE_PATTERN: &str = r"(?i)date:\s*(\d{4}-\d{2}-\d{2})";
pub const APPLICATION_NAME_PATTERN: &str = r"ApplicationName:[ \t]*[A-Za-z0-9À-ÖØ-öø-ÿ.+\-]+(?:[ \t]+[A-Za-z0-9À-ÖØ-öø-ÿ.+\-]+)*";
pub const TEAM_PATTERN: &str =
    r"Team:[ \t]*[A-Za-z0-9À-ÖØ-öø-ÿ.+\-]+(?:[ \t]+[A-Za-z0-9À-ÖØ-öø-ÿ.+\-]+)*";

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ISO_DATE_PATTERN).expect("valid ISO date regex"));
static LABELED_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LABELED_DATE_PATTERN).expect("valid labeled date regex"));
static APPLICATION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(APPLICATION_NAME_PATTERN).expect("valid application regex"));
static TEAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TEAM_PATTERN).expect("valid team regex"));

/// Per-page problems that skip the page without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageFailure {
    #[error(
        "Can not find *required threat-modeling date*, neither in _page body_ using regex `{body_pattern}`, nor in _page title_ using regex `{title_pattern}`!"
    )]
    MissingRequiredDate {
        body_pattern: String,
        title_pattern: String,
    },
    #[error("Found threat-modeling date `{value}`, but it is not a valid calendar date!")]
    InvalidDate { value: String },
    #[error("Found `{label}` override `{value}`, but it cannot be used as a file or directory name!")]
    InvalidOverride { label: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub url: String,
    pub date: NaiveDate,
    pub space: String,
    pub application_name: Option<String>,
    pub team: Option<String>,
}

/// Extract metadata from one page.
///
/// The outer `Result` carries fatal errors (network, malformed page shape);
/// the inner one carries per-page failures the caller may skip.
pub fn extract_metadata<A: ConfluenceApi>(
    page: &PageRecord,
    api: &mut A,
) -> Result<Result<PageMetadata, PageFailure>> {
    let space = space_from_path(&page.space_path)?;
    let url = api.web_url(&page.webui_path);
    let body = api.fetch_page_body(&page.id)?;

    Ok(metadata_from_body(&page.title, &body).map(|(date, application_name, team)| {
        PageMetadata {
            title: page.title.clone(),
            url,
            date,
            space,
            application_name,
            team,
        }
    }))
}

type BodyFields = (NaiveDate, Option<String>, Option<String>);

fn metadata_from_body(title: &str, body: &str) -> Result<BodyFields, PageFailure> {
    let body_date = LABELED_DATE_RE.find(body).map(|found| found.as_str());
    let date = resolve_date(body_date, title)?;
    let application_name = labeled_value(body, &APPLICATION_NAME_RE, "ApplicationName:")?;
    let team = labeled_value(body, &TEAM_RE, "Team:")?;
    Ok((date, application_name, team))
}

/// Body label first, then the first ISO date in the title.
pub fn resolve_date(body_match: Option<&str>, title: &str) -> Result<NaiveDate, PageFailure> {
    let raw = body_match
        .and_then(|excerpt| LABELED_DATE_RE.captures(excerpt))
        .and_then(|captures| captures.get(1))
        .or_else(|| ISO_DATE_RE.find(title))
        .map(|found| found.as_str())
        .ok_or_else(|| PageFailure::MissingRequiredDate {
            body_pattern: LABELED_DATE_PATTERN.to_string(),
            title_pattern: ISO_DATE_PATTERN.to_string(),
        })?;

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| PageFailure::InvalidDate {
        value: raw.to_string(),
    })
}

/// Space id is the segment after the last `/` of the container path.
pub fn space_from_path(space_path: &str) -> Result<String> {
    let space = space_path
        .rsplit_once('/')
        .map(|(_, tail)| tail)
        .unwrap_or(space_path)
        .trim();
    if space.is_empty() {
        bail!("page has no space in its container path `{space_path}`");
    }
    Ok(space.to_string())
}

/// First labeled value, label stripped and trimmed.
/// A value made only of dots would name `.` or `..` on disk and fails the page.
fn labeled_value(
    body: &str,
    pattern: &Regex,
    label: &str,
) -> Result<Option<String>, PageFailure> {
    let value = pattern
        .find(body)
        .and_then(|found| found.as_str().strip_prefix(label))
        .map(str::trim)
        .filter(|value| !value.is_empty());
    match value {
        Some(value) if value.chars().all(|ch| ch == '.') => Err(PageFailure::InvalidOverride {
            label: label.trim_end_matches(':').to_string(),
            value: value.to_string(),
        }),
        other => Ok(other.map(ToString::to_string)),
    }
}
