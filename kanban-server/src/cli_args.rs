use std::path::PathBuf;

use clap::Parser;

/// Kanban dashboard backend for Jira.
#[derive(Debug, Parser)]
#[command(name = "kanban-server", version)]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// Settings document (defaults to $KANBAN_SETTINGS_FILE or data/settings.json)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, env = "KANBAN_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::Args;

    #[test]
    fn parses_explicit_flags() {
        let args = Args::try_parse_from([
            "kanban-server",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--settings",
            "/tmp/settings.json",
        ])
        .expect("args");

        assert_eq!(args.bind_addr(), "127.0.0.1:8080");
        assert_eq!(args.settings, Some(PathBuf::from("/tmp/settings.json")));
    }

    #[test]
    fn rejects_invalid_port() {
        let error = Args::try_parse_from(["kanban-server", "--port", "http"]).expect_err("error");
        assert!(error.to_string().contains("--port"));
    }
}
