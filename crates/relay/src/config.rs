use std::time::Duration;

use pushrelay_stream::client::PUSHBULLET_STREAM_ENDPOINT;
use tokio::sync::Semaphore;

/// Relay configuration loaded from environment variables.
///
/// Secrets are read once at startup; both are required.
#[derive(Clone)]
pub struct RelayConfig {
    /// Pushbullet access token, appended to the stream endpoint.
    pub pushbullet_token: String,
    /// Discord webhook URL receiving forwarded pushes.
    pub discord_webhook: String,
    /// Realtime stream endpoint (default: public Pushbullet endpoint).
    pub stream_endpoint: String,
    /// Per-request timeout for webhook delivery (default: `30s`).
    pub webhook_timeout: Duration,
    /// Cap on concurrently running handlers (default: unbounded).
    pub max_in_flight: Option<usize>,
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

impl RelayConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                      | Default                                   |
    /// |------------------------------|-------------------------------------------|
    /// | `PUSHBULLET_TOKEN`           | required                                  |
    /// | `DISCORD_WEBHOOK`            | required                                  |
    /// | `PUSHBULLET_STREAM_ENDPOINT` | `wss://stream.pushbullet.com/websocket`   |
    /// | `WEBHOOK_TIMEOUT_SECS`       | `30`                                      |
    /// | `DISPATCH_MAX_IN_FLIGHT`     | unbounded                                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let pushbullet_token = get("PUSHBULLET_TOKEN").ok_or(ConfigError::Missing("PUSHBULLET_TOKEN"))?;
        let discord_webhook = get("DISCORD_WEBHOOK").ok_or(ConfigError::Missing("DISCORD_WEBHOOK"))?;

        let stream_endpoint =
            get("PUSHBULLET_STREAM_ENDPOINT").unwrap_or_else(|| PUSHBULLET_STREAM_ENDPOINT.to_string());

        let webhook_timeout_secs: u64 = match get("WEBHOOK_TIMEOUT_SECS") {
            Some(raw) => parse_positive("WEBHOOK_TIMEOUT_SECS", &raw)?,
            None => 30,
        };

        let max_in_flight = match get("DISPATCH_MAX_IN_FLIGHT") {
            Some(raw) => {
                let limit = parse_positive::<usize>("DISPATCH_MAX_IN_FLIGHT", &raw)?;
                if limit > Semaphore::MAX_PERMITS {
                    return Err(ConfigError::Invalid {
                        var: "DISPATCH_MAX_IN_FLIGHT",
                        value: raw,
                    });
                }
                Some(limit)
            }
            None => None,
        };

        Ok(Self {
            pushbullet_token,
            discord_webhook,
            stream_endpoint,
            webhook_timeout: Duration::from_secs(webhook_timeout_secs),
            max_in_flight,
        })
    }
}

fn parse_positive<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
        }),
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("stream_endpoint", &self.stream_endpoint)
            .field("webhook_timeout", &self.webhook_timeout)
            .field("max_in_flight", &self.max_in_flight)
            .finish_non_exhaustive()
    }
}
