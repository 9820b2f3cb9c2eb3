use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::issue::{is_truthy, Issue};

pub const DEFAULT_DUE_DATE_FIELD: &str = "duedate";
pub const DEFAULT_DUE_SOON_THRESHOLD: f64 = 2.0;
const DONE_RULE_ID: &str = "done";
const TERMINAL_STATUSES: [&str; 4] = ["done", "closed", "resolved", "verified"];
const MILLIS_PER_DAY: i64 = 1000 * 60 * 60 * 24;
/// Widest epoch offset a date can carry, 100 million days either way.
const MAX_TIMESTAMP_MILLIS: f64 = 8.64e15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    Overdue,
    DueToday,
    DueSoon,
    NoDue,
    Done,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::DueToday => "due-today",
            Self::DueSoon => "due-soon",
            Self::NoDue => "no-due",
            Self::Done => "done",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorRule {
    pub id: String,
    pub label: String,
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_threshold: Option<f64>,
    pub background: String,
    pub border: String,
    pub badge: String,
}

impl ColorRule {
    fn styled(
        condition: Condition,
        label: &str,
        background: &str,
        border: &str,
        badge: &str,
    ) -> Self {
        Self {
            id: condition.as_str().to_string(),
            label: label.to_string(),
            condition,
            days_threshold: None,
            background: background.to_string(),
            border: border.to_string(),
            badge: badge.to_string(),
        }
    }
}

/// Built-in rule table used when a configuration carries no rules.
pub fn default_color_rules() -> Vec<ColorRule> {
    vec![
        ColorRule::styled(
            Condition::Overdue,
            "Overdue",
            "rgba(239, 68, 68, 0.12)",
            "rgba(239, 68, 68, 0.4)",
            "#ef4444",
        ),
        ColorRule::styled(
            Condition::DueToday,
            "Due today",
            "rgba(249, 115, 22, 0.12)",
            "rgba(249, 115, 22, 0.4)",
            "#f97316",
        ),
        ColorRule {
            days_threshold: Some(DEFAULT_DUE_SOON_THRESHOLD),
            ..ColorRule::styled(
                Condition::DueSoon,
                "Due in <=2 days",
                "rgba(234, 179, 8, 0.12)",
                "rgba(234, 179, 8, 0.4)",
                "#eab308",
            )
        },
        ColorRule::styled(
            Condition::NoDue,
            "No due date",
            "rgba(148, 163, 184, 0.1)",
            "rgba(148, 163, 184, 0.4)",
            "#94a3b8",
        ),
        ColorRule::styled(
            Condition::Done,
            "Done",
            "rgba(22, 163, 74, 0.1)",
            "rgba(22, 163, 74, 0.3)",
            "#16a34a",
        ),
    ]
}

/// Inputs of [`evaluate`] besides the issue and the clock.
#[derive(Clone, Copy, Debug)]
pub struct RuleConfig<'a> {
    due_date_field: &'a str,
    rules: &'a [ColorRule],
}

impl<'a> RuleConfig<'a> {
    /// `fallback` replaces `rules` when the configured list is empty.
    pub fn new(
        due_date_field: Option<&'a str>,
        rules: &'a [ColorRule],
        fallback: &'a [ColorRule],
    ) -> Self {
        Self {
            due_date_field: due_date_field
                .filter(|field| !field.is_empty())
                .unwrap_or(DEFAULT_DUE_DATE_FIELD),
            rules: if rules.is_empty() { fallback } else { rules },
        }
    }

    pub fn due_date_field(&self) -> &'a str {
        self.due_date_field
    }

    pub fn rules(&self) -> &'a [ColorRule] {
        self.rules
    }

    /// First rule in list order carrying `condition`.
    pub fn find(&self, condition: Condition) -> Option<&'a ColorRule> {
        self.rules.iter().find(|rule| rule.condition == condition)
    }

    fn find_by_id(&self, id: &str) -> Option<&'a ColorRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }
}

/// Picks the display rule for `issue` at time `now`.
///
/// Terminal statuses win over any due date. Otherwise the day difference
/// between the due value and `now` selects overdue, due-today or due-soon;
/// an unparseable due value matches nothing.
pub fn evaluate<'a>(
    issue: &Issue,
    config: &RuleConfig<'a>,
    now: DateTime<Utc>,
) -> Option<&'a ColorRule> {
    let status = issue.status_name().map(str::to_lowercase);
    if status
        .as_deref()
        .is_some_and(|status| TERMINAL_STATUSES.contains(&status))
    {
        return config
            .find(Condition::Done)
            .or_else(|| config.find_by_id(DONE_RULE_ID));
    }

    let Some(due) = resolve_due_value(issue, config.due_date_field) else {
        return config.find(Condition::NoDue);
    };

    let diff_days = day_difference(due, now)?;

    if diff_days < 0 {
        if let Some(rule) = config.find(Condition::Overdue) {
            return Some(rule);
        }
    }

    if diff_days == 0 {
        if let Some(rule) = config.find(Condition::DueToday) {
            return Some(rule);
        }
    }

    // Without an overdue or due-today rule those diffs still reach this bound.
    let soon = config.find(Condition::DueSoon);
    let threshold = soon
        .and_then(|rule| rule.days_threshold)
        .unwrap_or(DEFAULT_DUE_SOON_THRESHOLD);
    if (diff_days as f64) <= threshold {
        return soon;
    }

    None
}

fn resolve_due_value<'i>(issue: &'i Issue, field: &str) -> Option<&'i Value> {
    issue
        .field(field)
        .filter(|value| is_truthy(value))
        .or_else(|| {
            issue
                .field(DEFAULT_DUE_DATE_FIELD)
                .filter(|value| is_truthy(value))
        })
}

/// Whole days from `now` to the due value, floored. Time-of-day on both
/// sides takes part in the difference.
pub fn day_difference(due: &Value, now: DateTime<Utc>) -> Option<i64> {
    let due_ms = parse_due_timestamp(due)?;
    let diff = due_ms.checked_sub(now.timestamp_millis())?;
    Some(diff.div_euclid(MILLIS_PER_DAY))
}

/// Epoch milliseconds of a due value, `None` for an invalid date.
pub fn parse_due_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::String(text) => parse_date_str(text.trim()),
        Value::Number(number) => number
            .as_f64()
            .filter(|millis| millis.is_finite() && millis.abs() <= MAX_TIMESTAMP_MILLIS)
            .map(|millis| millis.trunc() as i64),
        _ => None,
    }
}

fn parse_date_str(text: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }

    // Jira datetime fields: 2024-05-01T10:00:00.000+0000
    if let Ok(parsed) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.timestamp_millis());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }

    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}
