use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use kanban_domain::{
    default_color_rules, default_columns, rules::DEFAULT_DUE_DATE_FIELD, ColorRule, ColumnConfig,
    RuleConfig,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const DEFAULT_JQL: &str = "project = DEMO ORDER BY updated DESC";
const DEFAULT_SETTINGS_PATH: &str = "data/settings.json";
const DEFAULT_SEARCH_COST_FIELD: &str = "timeestimate";
const DEFAULT_ESTIMATE_FIELD: &str = "timeoriginalestimate";
const DEFAULT_SPRINT_FIELD: &str = "sprint";

/// Dashboard settings document.
///
/// Keys missing from a stored document take their default, which makes
/// deserialization the shallow merge over the defaults. `null` column and
/// rule lists also fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub base_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub api_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default = "default_jql", deserialize_with = "null_as_default")]
    pub jql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_id: Option<String>,
    #[serde(default = "default_columns", deserialize_with = "columns_or_default")]
    pub statuses: Vec<ColumnConfig>,
    #[serde(
        default = "default_due_date_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_field_id: Option<String>,
    #[serde(default = "default_color_rules", deserialize_with = "rules_or_default")]
    pub color_rules: Vec<ColorRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: String::new(),
            username: Some(String::new()),
            jql: default_jql(),
            filter_id: Some(String::new()),
            statuses: default_columns(),
            due_date_field: default_due_date_field(),
            cost_field_id: Some(String::new()),
            sprint_field_id: Some(String::new()),
            color_rules: default_color_rules(),
            dashboard_url: None,
        }
    }
}

/// Resolved tracker connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub base_url: String,
    pub token: String,
    pub username: Option<String>,
}

/// Connection values taken from the environment when the settings leave
/// them empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionDefaults {
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub username: Option<String>,
}

impl ConnectionDefaults {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            base_url: lookup("JIRA_BASE_URL").and_then(non_empty),
            api_token: lookup("API_TOKEN").and_then(non_empty),
            username: lookup("JIRA_USERNAME").and_then(non_empty),
        }
    }
}

impl Settings {
    pub fn connection(&self, defaults: &ConnectionDefaults) -> Result<Connection> {
        let base_url = non_empty(self.base_url.clone())
            .or_else(|| defaults.base_url.clone())
            .and_then(normalize_base_url)
            .ok_or_else(|| anyhow!("Missing Jira baseUrl"))?;
        let token = non_empty(self.api_token.clone())
            .or_else(|| defaults.api_token.clone())
            .unwrap_or_default();
        let username = self
            .username
            .clone()
            .and_then(non_empty)
            .or_else(|| defaults.username.clone());

        Ok(Connection {
            base_url,
            token,
            username,
        })
    }

    pub fn due_date_field(&self) -> &str {
        non_empty_str(self.due_date_field.as_deref()).unwrap_or(DEFAULT_DUE_DATE_FIELD)
    }

    /// Cost field requested from search; analytics reads [`Self::estimate_field`].
    pub fn search_cost_field(&self) -> &str {
        non_empty_str(self.cost_field_id.as_deref()).unwrap_or(DEFAULT_SEARCH_COST_FIELD)
    }

    pub fn estimate_field(&self) -> &str {
        non_empty_str(self.cost_field_id.as_deref()).unwrap_or(DEFAULT_ESTIMATE_FIELD)
    }

    pub fn sprint_field(&self) -> &str {
        non_empty_str(self.sprint_field_id.as_deref()).unwrap_or(DEFAULT_SPRINT_FIELD)
    }

    pub fn search_fields(&self) -> Vec<String> {
        [
            "summary",
            self.due_date_field(),
            self.search_cost_field(),
            "status",
            "assignee",
            "priority",
            "labels",
            "components",
        ]
        .iter()
        .map(|field| field.to_string())
        .collect()
    }

    /// The requested JQL, or the configured one when none is given.
    pub fn effective_jql(&self, requested: Option<&str>) -> String {
        non_empty_str(requested)
            .unwrap_or(self.jql.as_str())
            .to_string()
    }

    pub fn rule_config<'a>(&'a self, fallback: &'a [ColorRule]) -> RuleConfig<'a> {
        RuleConfig::new(self.due_date_field.as_deref(), &self.color_rules, fallback)
    }

    /// Board columns, or `fallback` when none are configured.
    pub fn columns<'a>(&'a self, fallback: &'a [ColumnConfig]) -> &'a [ColumnConfig] {
        if self.statuses.is_empty() {
            fallback
        } else {
            &self.statuses
        }
    }
}

/// Overlays the top-level keys of `overlay` on `base`.
pub fn merge_settings(base: &Settings, overlay: Value) -> Result<Settings> {
    let mut merged = serde_json::to_value(base).with_context(|| "failed to encode settings")?;
    if let (Value::Object(target), Value::Object(source)) = (&mut merged, overlay) {
        for (key, value) in source {
            target.insert(key, value);
        }
    }
    serde_json::from_value(merged).with_context(|| "invalid settings overlay")
}

#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        Self::new(default_settings_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document, writing the defaults first when it does not exist.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            let settings = Settings::default();
            self.save(&settings)?;
            return Ok(settings);
        }

        let payload = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read settings at {}", self.path.display()))?;
        serde_json::from_str(&payload)
            .with_context(|| format!("invalid settings document at {}", self.path.display()))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut payload =
            serde_json::to_string_pretty(settings).with_context(|| "failed to encode settings")?;
        payload.push('\n');
        fs::write(&self.path, payload)
            .with_context(|| format!("failed to write settings at {}", self.path.display()))
    }
}

pub fn default_settings_path() -> PathBuf {
    if let Some(override_path) = env::var_os("KANBAN_SETTINGS_FILE") {
        return PathBuf::from(override_path);
    }
    PathBuf::from(DEFAULT_SETTINGS_PATH)
}

fn default_jql() -> String {
    DEFAULT_JQL.to_string()
}

fn default_due_date_field() -> Option<String> {
    Some(DEFAULT_DUE_DATE_FIELD.to_string())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn columns_or_default<'de, D>(deserializer: D) -> Result<Vec<ColumnConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_else(default_columns))
}

fn rules_or_default<'de, D>(deserializer: D) -> Result<Vec<ColorRule>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_else(default_color_rules))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn non_empty_str(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

fn normalize_base_url(value: String) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
