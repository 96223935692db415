use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const UNMAPPED_APPLICATION: &str = "_UNMAPPED_APP";
pub const UNMAPPED_TEAM: &str = "_UNMAPPED_TEAM";
pub const UNMAPPED_SPACE_PREFIX: &str = "_UNMAPPED_SPACE_";

/// Ownership identity of a threat-modeling: an application, owned by a team.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject {
    pub application_name: String,
    pub team_name: String,
}

impl Subject {
    pub fn new(application_name: impl Into<String>, team_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            team_name: team_name.into(),
        }
    }

    pub fn unmapped() -> Self {
        Self::new(UNMAPPED_APPLICATION, UNMAPPED_TEAM)
    }

    /// Placeholder for a space without mapping. Both names embed the space id,
    /// so distinct unmapped spaces never share a bucket.
    pub fn unmapped_space(space: &str) -> Self {
        let name = format!("{UNMAPPED_SPACE_PREFIX}{space}");
        Self::new(name.clone(), name)
    }

    /// Returns a new Subject with non-empty overrides applied field by field.
    pub fn with_overrides(&self, application_name: Option<&str>, team_name: Option<&str>) -> Self {
        let pick = |value: Option<&str>, fallback: &str| {
            value
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            application_name: pick(application_name, &self.application_name),
            team_name: pick(team_name, &self.team_name),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::unmapped() {
            return write!(f, "*UNMAPPED* application/team");
        }
        if self.team_name == UNMAPPED_TEAM {
            return write!(
                f,
                "application '{}' by *UNMAPPED* team",
                self.application_name
            );
        }
        write!(
            f,
            "application '{}' by team '{}'",
            self.application_name, self.team_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatModelingComponent {
    pub date: NaiveDate,
    pub title: String,
    pub links: Vec<Link>,
}

/// A threat-modeling found on one page, before grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedThreatModeling {
    pub subject: Subject,
    pub title: String,
    pub date: NaiveDate,
    pub links: Vec<Link>,
    pub source_url: String,
}

impl ScrapedThreatModeling {
    pub fn to_component(&self) -> ThreatModelingComponent {
        ThreatModelingComponent {
            date: self.date,
            title: self.title.clone(),
            links: self.links.clone(),
        }
    }
}

impl fmt::Display for ScrapedThreatModeling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}({}), for {}",
            self.date, self.title, self.source_url, self.subject
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionResult {
    pub threat_modelings: Vec<ScrapedThreatModeling>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub team: String,
    pub application: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityComponents {
    pub components: Vec<ThreatModelingComponent>,
}

/// One output file: settings plus activities keyed by the configured name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub settings: Settings,
    pub activities: BTreeMap<String, ActivityComponents>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_spaces_produce_distinct_subjects() {
        let zz = Subject::unmapped_space("ZZ");
        let yy = Subject::unmapped_space("YY");
        assert_ne!(zz, yy);
        assert_eq!(zz.application_name, "_UNMAPPED_SPACE_ZZ");
        assert_eq!(zz.team_name, "_UNMAPPED_SPACE_ZZ");
    }

    #[test]
    fn overrides_replace_fields_independently() {
        let mapped = Subject::new("magic-records", "magic-team");
        let team_only = mapped.with_overrides(None, Some("red-team"));
        assert_eq!(team_only, Subject::new("magic-records", "red-team"));

        let app_only = mapped.with_overrides(Some("magic-ledger"), Some("   "));
        assert_eq!(app_only, Subject::new("magic-ledger", "magic-team"));
        assert_eq!(mapped, Subject::new("magic-records", "magic-team"));
    }

    #[test]
    fn subject_display_marks_unmapped_parts() {
        assert_eq!(
            Subject::unmapped().to_string(),
            "*UNMAPPED* application/team"
        );
        assert_eq!(
            Subject::new("bed-beats", UNMAPPED_TEAM).to_string(),
            "application 'bed-beats' by *UNMAPPED* team"
        );
        assert_eq!(
            Subject::new("elastic-kube", "elastic-kubernauts").to_string(),
            "application 'elastic-kube' by team 'elastic-kubernauts'"
        );
    }

    #[test]
    fn scraped_record_display_and_component() {
        let record = ScrapedThreatModeling {
            subject: Subject::new("a", "t"),
            title: "TM".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 11, 29).expect("date"),
            links: vec![Link {
                title: "TM".to_string(),
                url: "https://wiki/x".to_string(),
            }],
            source_url: "https://wiki/x".to_string(),
        };
        assert_eq!(
            record.to_string(),
            "2023-11-29: TM(https://wiki/x), for application 'a' by team 't'"
        );
        let component = record.to_component();
        assert_eq!(component.links, record.links);
        assert_eq!(component.date, record.date);
    }
}
