use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::issue::{is_truthy, nested_str, Issue};

const UNPLANNED: &str = "Unplanned";
const UNASSIGNED: &str = "Unassigned";
const UNKNOWN_STATUS: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Bucket {
    pub name: String,
    pub value: f64,
}

/// Named accumulators in first-seen order.
#[derive(Debug, Default)]
struct Buckets {
    entries: Vec<Bucket>,
    index: HashMap<String, usize>,
}

impl Buckets {
    fn add(&mut self, name: &str, amount: f64) {
        if let Some(position) = self.index.get(name) {
            self.entries[*position].value += amount;
            return;
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(Bucket {
            name: name.to_string(),
            value: amount,
        });
    }

    fn into_vec(self) -> Vec<Bucket> {
        self.entries
    }
}

/// Sums estimates per sprint. Issues without an estimate weigh 1.
pub fn cost_by_sprint(issues: &[Issue], sprint_field: &str, estimate_field: &str) -> Vec<Bucket> {
    let mut buckets = Buckets::default();
    for issue in issues {
        let sprint = nested_str(issue.field(sprint_field), "name").unwrap_or(UNPLANNED);
        buckets.add(sprint, estimate_of(issue.field(estimate_field)));
    }
    buckets.into_vec()
}

pub fn count_by_assignee(issues: &[Issue]) -> Vec<Bucket> {
    count_by(issues, |issue| issue.assignee_name().unwrap_or(UNASSIGNED))
}

pub fn count_by_status(issues: &[Issue]) -> Vec<Bucket> {
    count_by(issues, |issue| issue.status_name().unwrap_or(UNKNOWN_STATUS))
}

fn count_by<F>(issues: &[Issue], label: F) -> Vec<Bucket>
where
    F: for<'i> Fn(&'i Issue) -> &'i str,
{
    let mut buckets = Buckets::default();
    for issue in issues {
        buckets.add(label(issue), 1.0);
    }
    buckets.into_vec()
}

fn estimate_of(value: Option<&Value>) -> f64 {
    let Some(value) = value.filter(|value| is_truthy(value)) else {
        return 1.0;
    };

    // Unparseable estimates count as zero, never NaN.
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{cost_by_sprint, count_by_assignee, count_by_status, Bucket};
    use crate::issue::Issue;

    fn bucket(name: &str, value: f64) -> Bucket {
        Bucket {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn sums_estimates_per_sprint_in_first_seen_order() {
        let issues = vec![
            Issue::new("A-1")
                .with_field("customfield_sprint", json!({"name": "Sprint 2"}))
                .with_field("timeoriginalestimate", json!(3600)),
            Issue::new("A-2").with_field("timeoriginalestimate", json!(7200)),
            Issue::new("A-3")
                .with_field("customfield_sprint", json!({"name": "Sprint 2"}))
                .with_field("timeoriginalestimate", json!("1800")),
        ];

        let buckets = cost_by_sprint(&issues, "customfield_sprint", "timeoriginalestimate");
        assert_eq!(
            buckets,
            vec![bucket("Sprint 2", 5400.0), bucket("Unplanned", 7200.0)]
        );
    }

    #[test]
    fn missing_or_zero_estimates_weigh_one() {
        let issues = vec![
            Issue::new("A-1"),
            Issue::new("A-2").with_field("estimate", json!(0)),
            Issue::new("A-3").with_field("estimate", json!("n/a")),
        ];

        let buckets = cost_by_sprint(&issues, "sprint", "estimate");
        assert_eq!(buckets, vec![bucket("Unplanned", 2.0)]);
    }

    #[test]
    fn non_numeric_estimate_counts_as_zero() {
        let issues = vec![
            Issue::new("A-1")
                .with_field("sprint", json!({"name": "Sprint 1"}))
                .with_field("estimate", json!(3)),
            Issue::new("A-2")
                .with_field("sprint", json!({"name": "Sprint 1"}))
                .with_field("estimate", json!("n/a")),
            Issue::new("A-3")
                .with_field("sprint", json!({"name": "Sprint 1"}))
                .with_field("estimate", json!({"value": 4})),
        ];

        let buckets = cost_by_sprint(&issues, "sprint", "estimate");
        assert_eq!(buckets, vec![bucket("Sprint 1", 3.0)]);
        assert!(buckets[0].value.is_finite());
    }

    #[test]
    fn counts_assignees_and_statuses() {
        let issues = vec![
            Issue::new("A-1")
                .with_status("To Do")
                .with_field("assignee", json!({"displayName": "Alice"})),
            Issue::new("A-2").with_status("Done"),
            Issue::new("A-3")
                .with_status("To Do")
                .with_field("assignee", json!({"displayName": "Alice"})),
            Issue::new("A-4"),
        ];

        assert_eq!(
            count_by_assignee(&issues),
            vec![bucket("Alice", 2.0), bucket("Unassigned", 2.0)]
        );
        assert_eq!(
            count_by_status(&issues),
            vec![
                bucket("To Do", 2.0),
                bucket("Done", 1.0),
                bucket("Unknown", 1.0)
            ]
        );
    }
}
