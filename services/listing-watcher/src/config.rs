//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The app secret and account password are loaded from LISTING_APP_SECRET /
//! LISTING_PASSWORD or from `app_secret_file` / `password_file`, never
//! stored in the TOML directly.

use common::Secret;
use listing_watch::FeedTarget;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const APP_SECRET_ENV: &str = "LISTING_APP_SECRET";
pub const PASSWORD_ENV: &str = "LISTING_PASSWORD";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    #[serde(default)]
    pub account: Option<AccountConfig>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default, rename = "watch")]
    pub watches: Vec<WatchConfig>,
}

/// Outbound request settings shared by every watcher
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    pub user_agent: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_automatic_retries")]
    pub automatic_retries: bool,
    /// Whole-request timeout for every outbound call, including the token exchange
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_origin: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub public_origin: Option<String>,
}

/// Account used for the password grant. Absent: feeds are read anonymously.
#[derive(Debug, Deserialize)]
pub struct AccountConfig {
    pub app_id: String,
    pub username: String,
    #[serde(skip)]
    pub app_secret: Option<Secret<String>>,
    #[serde(default)]
    pub app_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    #[serde(default)]
    pub password_file: Option<PathBuf>,
}

/// Health and metrics listener
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// One `[[watch]]` entry
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "target", rename_all = "lowercase")]
pub enum WatchConfig {
    Comments {
        subreddit: String,
    },
    Posts {
        subreddit: String,
    },
    Multi {
        user: String,
        multi: String,
    },
    Listing {
        #[serde(default)]
        subreddit: Option<String>,
        #[serde(default = "default_listing")]
        listing: String,
        #[serde(default = "default_limit")]
        limit: usize,
    },
}

impl WatchConfig {
    pub fn target(&self) -> listing_watch::Result<FeedTarget> {
        match self {
            WatchConfig::Comments { subreddit } => Ok(FeedTarget::comments(subreddit)),
            WatchConfig::Posts { subreddit } => Ok(FeedTarget::posts(subreddit)),
            WatchConfig::Multi { user, multi } => Ok(FeedTarget::multi(user, multi)),
            WatchConfig::Listing {
                subreddit,
                listing,
                limit,
            } => FeedTarget::listing(subreddit.as_deref(), listing, *limit),
        }
    }

    fn validate(&self, field: &str) -> common::Result<()> {
        let required = |name: &str, value: &str| {
            if value.trim().is_empty() {
                Err(common::Error::invalid(
                    &format!("{field}.{name}"),
                    "must not be empty",
                ))
            } else {
                Ok(())
            }
        };
        match self {
            WatchConfig::Comments { subreddit } | WatchConfig::Posts { subreddit } => {
                required("subreddit", subreddit)?
            }
            WatchConfig::Multi { user, multi } => {
                required("user", user)?;
                required("multi", multi)?;
            }
            WatchConfig::Listing { limit, .. } => {
                if *limit == 0 {
                    return Err(common::Error::invalid(
                        &format!("{field}.limit"),
                        "must be greater than 0",
                    ));
                }
            }
        }
        self.target()
            .map(|_| ())
            .map_err(|e| common::Error::invalid(field, e))
    }
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_automatic_retries() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_connections() -> usize {
    64
}

fn default_listing() -> String {
    "hot".into()
}

fn default_limit() -> usize {
    25
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order (per secret):
    /// 1. env var
    /// 2. `*_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        if config.client.user_agent.trim().is_empty() {
            return Err(common::Error::invalid(
                "client.user_agent",
                "must not be empty",
            ));
        }

        if config.client.requests_per_minute == 0 {
            return Err(common::Error::invalid(
                "client.requests_per_minute",
                "must be greater than 0",
            ));
        }

        if config.client.timeout_secs == 0 {
            return Err(common::Error::invalid(
                "client.timeout_secs",
                "must be greater than 0",
            ));
        }

        if config.watches.is_empty() {
            return Err(common::Error::invalid(
                "watch",
                "at least one [[watch]] entry is required",
            ));
        }
        for (i, watch) in config.watches.iter().enumerate() {
            watch.validate(&format!("watch[{i}]"))?;
        }

        if config.server.as_ref().is_some_and(|s| s.max_connections == 0) {
            return Err(common::Error::invalid(
                "server.max_connections",
                "must be greater than 0",
            ));
        }

        if let Some(account) = config.account.as_mut() {
            if account.app_id.trim().is_empty() {
                return Err(common::Error::invalid("account.app_id", "must not be empty"));
            }
            if account.username.trim().is_empty() {
                return Err(common::Error::invalid(
                    "account.username",
                    "must not be empty",
                ));
            }
            account.app_secret = Some(resolve_secret(
                "app_secret",
                APP_SECRET_ENV,
                "app_secret_file",
                account.app_secret_file.as_deref(),
            )?);
            account.password = Some(resolve_secret(
                "password",
                PASSWORD_ENV,
                "password_file",
                account.password_file.as_deref(),
            )?);
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("listing-watcher.toml")
    }
}

/// Env var takes precedence over file.
fn resolve_secret(
    name: &'static str,
    env: &'static str,
    file_field: &'static str,
    file: Option<&Path>,
) -> common::Result<Secret<String>> {
    if let Ok(value) = std::env::var(env)
        && !value.trim().is_empty()
    {
        return Ok(Secret::new(value.trim().to_owned()));
    }
    if let Some(path) = file {
        let secret = Secret::from_file(path).map_err(|e| {
            common::Error::Config(format!(
                "failed to read {file_field} {}: {e}",
                path.display()
            ))
        })?;
        if let Some(secret) = secret {
            return Ok(secret);
        }
    }
    Err(common::Error::MissingSecret {
        name,
        env,
        file_field,
    })
}
