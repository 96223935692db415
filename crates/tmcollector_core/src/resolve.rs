use std::collections::BTreeMap;

use crate::model::Subject;

/// Resolve the owning Subject for a page in `space`.
///
/// Unmapped spaces get a placeholder embedding the space id. Inline overrides
/// replace application and team independently.
pub fn resolve_subject(
    space: &str,
    space_mapping: &BTreeMap<String, Subject>,
    application_override: Option<&str>,
    team_override: Option<&str>,
) -> Subject {
    let mapped = space_mapping
        .get(space)
        .cloned()
        .unwrap_or_else(|| Subject::unmapped_space(space));
    if application_override.is_none() && team_override.is_none() {
        return mapped;
    }
    mapped.with_overrides(application_override, team_override)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> BTreeMap<String, Subject> {
        BTreeMap::from([
            (
                "MR".to_string(),
                Subject::new("magic-records", "magic-team"),
            ),
            (
                "EK".to_string(),
                Subject::new("elastic-kube", "elastic-kubernauts"),
            ),
        ])
    }

    #[test]
    fn mapped_space_resolves_to_configured_subject() {
        assert_eq!(
            resolve_subject("MR", &mapping(), None, None),
            Subject::new("magic-records", "magic-team")
        );
    }

    #[test]
    fn unmapped_spaces_do_not_collide() {
        let zz = resolve_subject("ZZ", &mapping(), None, None);
        let yy = resolve_subject("YY", &mapping(), None, None);
        assert_eq!(zz, Subject::unmapped_space("ZZ"));
        assert_eq!(yy, Subject::unmapped_space("YY"));
        assert_ne!(zz, yy);
    }

    #[test]
    fn team_override_keeps_mapped_application() {
        let subject = resolve_subject("MR", &mapping(), None, Some("blue-team"));
        assert_eq!(subject, Subject::new("magic-records", "blue-team"));
    }

    #[test]
    fn application_override_applies_to_unmapped_space() {
        let subject = resolve_subject("ZQ", &mapping(), Some("quartz"), None);
        assert_eq!(subject.application_name, "quartz");
        assert_eq!(subject.team_name, "_UNMAPPED_SPACE_ZQ");
    }

    #[test]
    fn both_overrides_replace_whole_subject() {
        let subject = resolve_subject("EK", &mapping(), Some("kube-ops"), Some("platform"));
        assert_eq!(subject, Subject::new("kube-ops", "platform"));
    }
}
