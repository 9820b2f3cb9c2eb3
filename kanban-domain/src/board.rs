use serde::{Deserialize, Serialize};

use crate::issue::Issue;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub statuses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,
}

impl ColumnConfig {
    pub fn new(id: &str, name: &str, statuses: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            statuses: statuses.iter().map(|status| status.to_string()).collect(),
            wip_limit: None,
        }
    }

    pub fn accepts(&self, status: &str) -> bool {
        self.statuses.iter().any(|candidate| candidate == status)
    }
}

pub fn default_columns() -> Vec<ColumnConfig> {
    vec![
        ColumnConfig::new("todo", "To Do", &["To Do", "Open"]),
        ColumnConfig::new("in-progress", "In Progress", &["In Progress", "Doing"]),
        ColumnConfig::new("review", "Review", &["In Review", "QA"]),
        ColumnConfig::new("done", "Done", &["Done", "Verified"]),
    ]
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lane<'a> {
    pub column: &'a ColumnConfig,
    pub issues: Vec<&'a Issue>,
}

/// Distributes issues over the configured columns, keeping column order.
///
/// The first column listing an issue's status takes it; anything else lands
/// in the first column.
pub fn group_by_column<'a>(issues: &'a [Issue], columns: &'a [ColumnConfig]) -> Vec<Lane<'a>> {
    let mut lanes = columns
        .iter()
        .map(|column| Lane {
            column,
            issues: Vec::new(),
        })
        .collect::<Vec<_>>();

    if lanes.is_empty() {
        return lanes;
    }

    for issue in issues {
        let index = issue
            .status_name()
            .and_then(|status| columns.iter().position(|column| column.accepts(status)))
            .unwrap_or(0);
        lanes[index].issues.push(issue);
    }

    lanes
}
