use std::collections::HashMap;

use crate::model::{ScrapedThreatModeling, Subject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectGroup {
    pub subject: Subject,
    pub threat_modelings: Vec<ScrapedThreatModeling>,
}

/// Partition records by Subject, keeping first-encounter order of groups and
/// encounter order inside each group.
pub fn group_by_subject(threat_modelings: &[ScrapedThreatModeling]) -> Vec<SubjectGroup> {
    let mut groups: Vec<SubjectGroup> = Vec::new();
    let mut positions: HashMap<&Subject, usize> = HashMap::new();

    for record in threat_modelings {
        match positions.get(&record.subject) {
            Some(&index) => groups[index].threat_modelings.push(record.clone()),
            None => {
                positions.insert(&record.subject, groups.len());
                groups.push(SubjectGroup {
                    subject: record.subject.clone(),
                    threat_modelings: vec![record.clone()],
                });
            }
        }
    }

    groups
}
