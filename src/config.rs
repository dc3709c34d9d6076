use crate::core::{PipelineError, Result};
use crate::sink::supabase::DEFAULT_TABLE;
use crate::source::realtime::{DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE};
use clap::Parser;
use std::time::Duration;

/// Lines polled when `--lines` is not given.
pub const DEFAULT_LINES: &[&str] = &[
    "1호선", "2호선", "3호선", "4호선", "5호선", "6호선", "7호선", "8호선", "9호선",
];

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Polls realtime subway positions and stores them.
#[derive(Parser, Debug, Clone)]
#[command(name = "subway-ingest", version, about)]
pub struct Config {
    /// Upstream API token.
    #[arg(long, env = "SEOUL_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Storage endpoint (Supabase project URL).
    #[arg(long, env = "SUPABASE_URL", default_value = "")]
    pub supabase_url: String,

    /// Storage access key.
    #[arg(long, env = "SUPABASE_KEY", default_value = "", hide_env_values = true)]
    pub supabase_key: String,

    /// Fail at startup when a secret is missing.
    #[arg(long, env = "INGEST_STRICT", default_value_t = false)]
    pub strict: bool,

    #[arg(long, env = "SEOUL_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// Destination table.
    #[arg(long, env = "INGEST_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Comma-separated line names, polled in order.
    #[arg(long, env = "INGEST_LINES", value_delimiter = ',')]
    pub lines: Vec<String>,

    /// Seconds between run starts.
    #[arg(long, env = "INGEST_INTERVAL_SECS", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_secs: u64,

    #[arg(long, env = "INGEST_FETCH_TIMEOUT_SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub fetch_timeout_secs: u64,

    #[arg(long, env = "INGEST_WRITE_TIMEOUT_SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub write_timeout_secs: u64,

    /// Abort a run that takes longer than this and back off.
    #[arg(long, env = "INGEST_RUN_TIMEOUT_SECS", default_value_t = 600, value_parser = clap::value_parser!(u64).range(1..))]
    pub run_timeout_secs: u64,

    /// Pause after a scheduler error.
    #[arg(long, env = "INGEST_BACKOFF_SECS", default_value_t = 5)]
    pub backoff_secs: u64,

    /// Consecutive failed runs before a source is reported at error level.
    #[arg(long, env = "INGEST_FAILURE_THRESHOLD", default_value_t = 3)]
    pub failure_threshold: u32,

    /// Last record index requested per line.
    #[arg(long, env = "INGEST_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

impl Config {
    /// Configured lines with blanks dropped, or the defaults.
    pub fn source_lines(&self) -> Vec<String> {
        let lines: Vec<String> = self
            .lines
            .iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        if lines.is_empty() {
            DEFAULT_LINES.iter().map(|line| line.to_string()).collect()
        } else {
            lines
        }
    }

    /// Names of the required secrets that are empty.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        [
            ("SEOUL_API_KEY", &self.api_key),
            ("SUPABASE_URL", &self.supabase_url),
            ("SUPABASE_KEY", &self.supabase_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Warns about missing secrets, or rejects them in strict mode.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_secrets();
        if missing.is_empty() {
            return Ok(());
        }
        if self.strict {
            return Err(PipelineError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        tracing::warn!(missing = %missing.join(", "), "required settings are missing, affected calls will fail");
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}
