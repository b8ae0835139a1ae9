use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_INDEX_PAGE: &str = "journey-board.html";

/// Where deal and contact records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Synthetic records, no external dependency.
    Mock,
    /// Records fetched through the HubSpot CLI (`hs`).
    Hubspot,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Mock => "mock",
            DataSource::Hubspot => "hubspot",
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            DataSource::Mock => 7036,
            DataSource::Hubspot => 7037,
        }
    }
}

impl FromStr for DataSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(DataSource::Mock),
            "hubspot" | "hs" => Ok(DataSource::Hubspot),
            other => anyhow::bail!("DATA_SOURCE must be 'mock' or 'hubspot', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub data_source: DataSource,
    pub public_dir: PathBuf,
    pub index_page: String,
    pub hubspot_cli_bin: String,
    pub cli_timeout: Duration,
    pub cli_list_timeout: Duration,
    pub list_limit: usize,
    pub record_cache_ttl: Duration,
    pub open_browser: bool,
    pub browser_delay: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_source = var("DATA_SOURCE")
            .map(|s| s.parse::<DataSource>())
            .transpose()?
            .unwrap_or(DataSource::Mock);

        let config = Self {
            bind_addr: var("BIND_ADDR")
                .unwrap_or_else(|| "127.0.0.1".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BIND_ADDR must be a valid IP address"))?,
            port: match var("PORT") {
                Some(port) => port
                    .trim()
                    .parse()
                    .ok()
                    .filter(|p: &u16| *p > 0)
                    .ok_or_else(|| {
                        anyhow::anyhow!("PORT must be a valid number between 1-65535")
                    })?,
                None => data_source.default_port(),
            },
            data_source,
            public_dir: PathBuf::from(var("PUBLIC_DIR").unwrap_or_else(|| "public".to_string())),
            index_page: var("INDEX_PAGE").unwrap_or_else(|| DEFAULT_INDEX_PAGE.to_string()),
            hubspot_cli_bin: var("HUBSPOT_CLI_BIN").unwrap_or_else(|| "hs".to_string()),
            cli_timeout: seconds(var("CLI_TIMEOUT_SECS"), "CLI_TIMEOUT_SECS", 30)?,
            cli_list_timeout: seconds(var("CLI_LIST_TIMEOUT_SECS"), "CLI_LIST_TIMEOUT_SECS", 60)?,
            list_limit: var("LIST_LIMIT")
                .map(|v| v.trim().parse::<usize>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("LIST_LIMIT must be a positive integer"))?
                .unwrap_or(100),
            record_cache_ttl: seconds(var("RECORD_CACHE_TTL_SECS"), "RECORD_CACHE_TTL_SECS", 60)?,
            open_browser: flag(var("OPEN_BROWSER"), "OPEN_BROWSER", true)?,
            browser_delay: Duration::from_millis(
                var("BROWSER_DELAY_MS")
                    .map(|v| v.trim().parse::<u64>())
                    .transpose()
                    .map_err(|_| anyhow::anyhow!("BROWSER_DELAY_MS must be a number"))?
                    .unwrap_or(2000),
            ),
        };

        if config.list_limit == 0 {
            anyhow::bail!("LIST_LIMIT must be greater than zero");
        }
        if config.index_page.contains('/') || config.index_page.contains("..") {
            anyhow::bail!("INDEX_PAGE must be a file name inside PUBLIC_DIR");
        }

        tracing::debug!("Data source: {}", config.data_source.as_str());
        tracing::debug!("Public dir: {}", config.public_dir.display());
        tracing::debug!("Server address: {}:{}", config.bind_addr, config.port);
        if config.data_source == DataSource::Hubspot {
            tracing::debug!(
                "HubSpot CLI: {} (timeouts {:?}/{:?})",
                config.hubspot_cli_bin,
                config.cli_timeout,
                config.cli_list_timeout
            );
        }

        Ok(config)
    }

    /// Base URL the server is reachable at from the local machine.
    pub fn local_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

fn seconds(value: Option<String>, name: &str, default: u64) -> anyhow::Result<Duration> {
    let secs = match value {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{} must be a number of seconds", name))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn flag(value: Option<String>, name: &str, default: bool) -> anyhow::Result<bool> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(_) => anyhow::bail!("{} must be true or false", name),
    }
}
