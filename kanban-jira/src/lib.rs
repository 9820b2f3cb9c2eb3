use std::time::Duration;

use kanban_config::Connection;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, RequestBuilder, Response, Url,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

mod error;

pub use error::{JiraError, TRANSITION_UNAVAILABLE};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const API_PATH: [&str; 3] = ["rest", "api", "2"];

pub type Result<T> = std::result::Result<T, JiraError>;

/// Body of `POST /search`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub jql: String,
    pub start_at: u64,
    pub max_results: u64,
    pub fields: Vec<String>,
    pub expand: Vec<String>,
}

impl SearchRequest {
    pub fn new(jql: String, start_at: u64, max_results: u64, fields: Vec<String>) -> Self {
        Self {
            jql,
            start_at,
            max_results,
            fields,
            expand: vec!["changelog".to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssueTransition {
    pub id: String,
    pub name: Option<String>,
    pub to_status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum AuthMode {
    Basic { user: String, password: String },
    Bearer { token: String },
}

/// Thin forwarder over the Jira REST v2 API.
pub struct JiraClient {
    api_root: Url,
    http: Client,
    auth_mode: AuthMode,
}

#[derive(Default, Deserialize)]
struct TransitionsPayload {
    #[serde(default)]
    transitions: Vec<TransitionPayload>,
}

#[derive(Default, Deserialize)]
struct TransitionPayload {
    id: Option<String>,
    name: Option<String>,
    to: Option<StatusLike>,
}

#[derive(Default, Deserialize)]
struct StatusLike {
    name: Option<String>,
}

impl JiraClient {
    pub fn new(connection: &Connection) -> Result<Self> {
        let api_root = api_root(&connection.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(JiraError::Client)?;

        Ok(Self {
            api_root,
            http,
            auth_mode: auth_mode(connection),
        })
    }

    /// Connectivity check: the user the credentials belong to.
    pub async fn myself(&self) -> Result<Value> {
        let response = self.send(self.http.get(self.endpoint(&["myself"]))).await?;
        read_json(response).await
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Value> {
        let response = self
            .send(self.http.post(self.endpoint(&["search"])).json(request))
            .await?;
        read_json(response).await
    }

    pub async fn issue(&self, key: &str) -> Result<Value> {
        let response = self
            .send(
                self.http
                    .get(self.endpoint(&["issue", key]))
                    .query(&[("expand", "changelog")]),
            )
            .await?;
        read_json(response).await
    }

    pub async fn transitions(&self, key: &str) -> Result<Vec<IssueTransition>> {
        let response = self
            .send(self.http.get(self.endpoint(&["issue", key, "transitions"])))
            .await?;
        let payload: TransitionsPayload =
            serde_json::from_value(read_json(response).await?).map_err(JiraError::Decode)?;
        Ok(payload
            .transitions
            .into_iter()
            .map(into_issue_transition)
            .collect())
    }

    /// Moves `key` to the status named `to_status` through the first
    /// transition leading there.
    pub async fn transition_to_status(
        &self,
        key: &str,
        to_status: &str,
        fields: Option<Value>,
    ) -> Result<()> {
        let transitions = self.transitions(key).await?;
        let transition =
            find_transition(&transitions, to_status).ok_or(JiraError::TransitionUnavailable)?;

        let mut body = json!({
            "transition": {"id": transition.id}
        });
        if let Some(fields) = fields {
            body["fields"] = fields;
        }

        let response = self
            .send(
                self.http
                    .post(self.endpoint(&["issue", key, "transitions"]))
                    .json(&body),
            )
            .await?;
        ensure_success(response).await
    }

    pub async fn comments(&self, key: &str) -> Result<Value> {
        let response = self
            .send(self.http.get(self.endpoint(&["issue", key, "comment"])))
            .await?;
        read_json(response).await
    }

    pub async fn add_comment(&self, key: &str, body: &str) -> Result<()> {
        if body.trim().is_empty() {
            return Err(JiraError::EmptyComment);
        }

        let response = self
            .send(
                self.http
                    .post(self.endpoint(&["issue", key, "comment"]))
                    .json(&json!({ "body": body })),
            )
            .await?;
        ensure_success(response).await
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_root.clone();
        // api_root was validated as a base URL in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.with_auth(request)
            .send()
            .await
            .map_err(JiraError::Transport)
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_mode {
            AuthMode::Basic { user, password } => request.basic_auth(user, Some(password)),
            AuthMode::Bearer { token } => request.bearer_auth(token),
        }
    }
}

fn api_root(base_url: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).map_err(|_| JiraError::InvalidBaseUrl(base_url.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| JiraError::InvalidBaseUrl(base_url.to_string()))?
        .pop_if_empty()
        .extend(API_PATH);
    Ok(url)
}

/// Basic auth when a username is configured or the token already carries
/// `user:password`; bearer otherwise.
fn auth_mode(connection: &Connection) -> AuthMode {
    let token = connection.token.clone();
    if let Some(user) = connection
        .username
        .as_deref()
        .filter(|user| !user.is_empty())
    {
        return AuthMode::Basic {
            user: user.to_string(),
            password: token,
        };
    }

    match token.split_once(':') {
        Some((user, password)) => AuthMode::Basic {
            user: user.to_string(),
            password: password.to_string(),
        },
        None => AuthMode::Bearer { token },
    }
}

fn find_transition<'a>(
    transitions: &'a [IssueTransition],
    to_status: &str,
) -> Option<&'a IssueTransition> {
    let wanted = to_status.to_lowercase();
    transitions.iter().find(|transition| {
        transition
            .to_status
            .as_deref()
            .is_some_and(|status| status.to_lowercase() == wanted)
    })
}

async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.map_err(JiraError::Transport)?;
    if !status.is_success() {
        return Err(JiraError::upstream(status.as_u16(), &body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(JiraError::Decode)
}

async fn ensure_success(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(JiraError::upstream(status.as_u16(), &body))
}

fn into_issue_transition(payload: TransitionPayload) -> IssueTransition {
    IssueTransition {
        id: payload
            .id
            .and_then(non_empty)
            .unwrap_or_else(|| "unknown".to_string()),
        name: payload.name.and_then(non_empty),
        to_status: payload.to.and_then(|to| to.name).and_then(non_empty),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
