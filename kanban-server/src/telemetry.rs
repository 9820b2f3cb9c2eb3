use std::{
    future::Future,
    time::{Duration, Instant},
};

use kanban_jira::JiraError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. `LOG_LEVEL` wins over `RUST_LOG`.
pub fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Runs one upstream operation and records its outcome and latency.
pub async fn observe<T, F>(op: &str, key: Option<&str>, operation: F) -> Result<T, JiraError>
where
    F: Future<Output = Result<T, JiraError>>,
{
    let started = Instant::now();
    let result = operation.await;
    match &result {
        Ok(_) => emit_success(op, key, started.elapsed()),
        Err(error) => emit_failure(op, key, started.elapsed(), error),
    }
    result
}

pub fn emit_success(op: &str, key: Option<&str>, elapsed: Duration) {
    tracing::info!(
        op,
        key = key.unwrap_or("-"),
        status = "ok",
        duration_ms = duration_ms(elapsed),
        "jira request"
    );
}

pub fn emit_failure(op: &str, key: Option<&str>, elapsed: Duration, error: &JiraError) {
    tracing::warn!(
        op,
        key = key.unwrap_or("-"),
        status = "error",
        upstream_status = error.status(),
        duration_ms = duration_ms(elapsed),
        error = %error,
        "jira request"
    );
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kanban_jira::JiraError;

    use super::{duration_ms, observe};

    #[test]
    fn converts_elapsed_to_millis() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
    }

    #[tokio::test]
    async fn observe_passes_results_through() {
        let ok = observe("search", None, async { Ok::<_, JiraError>(7) }).await;
        assert_eq!(ok.expect("ok"), 7);

        let failed = observe("comment.add", Some("DEMO-1"), async {
            Err::<(), _>(JiraError::EmptyComment)
        })
        .await;
        assert!(matches!(failed, Err(JiraError::EmptyComment)));
    }
}
