use chrono::{DateTime, Utc};
use kanban_config::Settings;
use kanban_domain::{
    analytics::{cost_by_sprint, count_by_assignee, count_by_status, Bucket},
    board::group_by_column,
    evaluate, ColorRule, ColumnConfig, Issue,
};
use kanban_jira::SearchRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_MAX_RESULTS: u64 = 50;

/// Search parameters accepted by the search, board and analytics routes.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub jql: Option<String>,
    pub start_at: Option<u64>,
    pub max_results: Option<u64>,
    pub fields: Option<Vec<String>>,
}

pub fn search_request(settings: &Settings, body: SearchBody) -> SearchRequest {
    SearchRequest::new(
        settings.effective_jql(body.jql.as_deref()),
        body.start_at.unwrap_or(0),
        body.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        body.fields.unwrap_or_else(|| settings.search_fields()),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub issues: Vec<Issue>,
    pub total: Option<u64>,
}

impl SearchPage {
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }
}

#[derive(Debug, Serialize)]
pub struct Card<'a> {
    pub issue: &'a Issue,
    pub rule: Option<&'a ColorRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView<'a> {
    pub id: &'a str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,
    pub issues: Vec<Card<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView<'a> {
    pub columns: Vec<ColumnView<'a>>,
    pub total: Option<u64>,
    pub evaluated_at: DateTime<Utc>,
}

/// Lays issues out in columns and classifies each card at `now`.
pub fn board_view<'a>(
    settings: &'a Settings,
    issues: &'a [Issue],
    total: Option<u64>,
    columns: &'a [ColumnConfig],
    fallback_rules: &'a [ColorRule],
    now: DateTime<Utc>,
) -> BoardView<'a> {
    let rules = settings.rule_config(fallback_rules);
    let columns = group_by_column(issues, settings.columns(columns))
        .into_iter()
        .map(|lane| ColumnView {
            id: &lane.column.id,
            name: &lane.column.name,
            wip_limit: lane.column.wip_limit,
            issues: lane
                .issues
                .into_iter()
                .map(|issue| Card {
                    issue,
                    rule: evaluate(issue, &rules, now),
                })
                .collect(),
        })
        .collect();

    BoardView {
        columns,
        total,
        evaluated_at: now,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsView {
    pub cost_by_sprint: Vec<Bucket>,
    pub by_assignee: Vec<Bucket>,
    pub by_status: Vec<Bucket>,
}

pub fn analytics_view(settings: &Settings, issues: &[Issue]) -> AnalyticsView {
    AnalyticsView {
        cost_by_sprint: cost_by_sprint(issues, settings.sprint_field(), settings.estimate_field()),
        by_assignee: count_by_assignee(issues),
        by_status: count_by_status(issues),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use kanban_config::Settings;
    use kanban_domain::{default_color_rules, default_columns, Issue};
    use serde_json::json;

    use super::{analytics_view, board_view, search_request, SearchBody, SearchPage};

    #[test]
    fn search_request_uses_settings_defaults() {
        let settings = Settings {
            jql: "project = OPS".to_string(),
            due_date_field: Some("customfield_7".to_string()),
            ..Settings::default()
        };

        let request = search_request(&settings, SearchBody::default());
        assert_eq!(request.jql, "project = OPS");
        assert_eq!(request.start_at, 0);
        assert_eq!(request.max_results, 50);
        assert_eq!(request.fields[1], "customfield_7");
        assert_eq!(request.expand, vec!["changelog"]);

        let explicit = search_request(
            &settings,
            SearchBody {
                jql: Some("key = OPS-1".to_string()),
                start_at: Some(50),
                max_results: Some(10),
                fields: Some(vec!["summary".to_string()]),
            },
        );
        assert_eq!(explicit.jql, "key = OPS-1");
        assert_eq!(explicit.start_at, 50);
        assert_eq!(explicit.max_results, 10);
        assert_eq!(explicit.fields, vec!["summary"]);
    }

    #[test]
    fn decodes_search_page() {
        let page = SearchPage::from_value(json!({
            "startAt": 0,
            "total": 2,
            "issues": [
                {"key": "A-1", "fields": {"status": {"name": "Open"}}},
                {"key": "A-2"}
            ]
        }))
        .expect("page");

        assert_eq!(page.total, Some(2));
        assert_eq!(page.issues.len(), 2);
        assert!(SearchPage::from_value(json!(null)).expect("empty").issues.is_empty());
    }

    #[test]
    fn board_view_groups_and_classifies_cards() {
        let settings = Settings::default();
        let columns = default_columns();
        let rules = default_color_rules();
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).single().expect("now");
        let issues = vec![
            Issue::new("A-1")
                .with_status("Open")
                .with_field("duedate", json!("2024-05-01")),
            Issue::new("A-2").with_status("Done"),
            Issue::new("A-3").with_status("Blocked"),
        ];

        let view = board_view(&settings, &issues, Some(3), &columns, &rules, now);
        let encoded = serde_json::to_value(&view).expect("json");

        assert_eq!(encoded["columns"][0]["id"], json!("todo"));
        assert_eq!(encoded["columns"][0]["issues"][0]["issue"]["key"], json!("A-1"));
        assert_eq!(encoded["columns"][0]["issues"][0]["rule"]["condition"], json!("overdue"));
        assert_eq!(encoded["columns"][0]["issues"][1]["issue"]["key"], json!("A-3"));
        assert_eq!(encoded["columns"][0]["issues"][1]["rule"]["condition"], json!("no-due"));
        assert_eq!(encoded["columns"][3]["issues"][0]["rule"]["condition"], json!("done"));
        assert_eq!(encoded["total"], json!(3));
    }

    #[test]
    fn analytics_view_uses_configured_fields() {
        let settings = Settings {
            sprint_field_id: Some("customfield_sprint".to_string()),
            cost_field_id: Some("customfield_cost".to_string()),
            ..Settings::default()
        };
        let issues = vec![Issue::new("A-1")
            .with_status("Open")
            .with_field("customfield_sprint", json!({"name": "Sprint 9"}))
            .with_field("customfield_cost", json!(5))];

        let encoded = serde_json::to_value(analytics_view(&settings, &issues)).expect("json");
        assert_eq!(
            encoded,
            json!({
                "costBySprint": [{"name": "Sprint 9", "value": 5.0}],
                "byAssignee": [{"name": "Unassigned", "value": 1.0}],
                "byStatus": [{"name": "Open", "value": 1.0}]
            })
        );
    }
}
