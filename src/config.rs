use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::ProviderHints;

/// Upper bound on the backoff growth factor accepted from configuration.
const MAX_BACKOFF_MULTIPLIER: f64 = 100.0;

/// PEM material for mutual TLS towards the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientTls {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Exponential backoff applied between reconnection attempts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
    /// Each delay is drawn uniformly from `delay * (1 ± factor)`.
    pub randomization_factor: f64,
    /// An attempt that lived at least this long resets the backoff.
    pub min_job_interval_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            max_interval_ms: 60_000,
            multiplier: 1.5,
            randomization_factor: 0.5,
            min_job_interval_ms: 30_000,
        }
    }
}

/// How long a swarm service event may wait for its tasks to converge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub retry_delay_ms: u64,
    /// `None` waits for as long as it takes.
    pub max_attempts: Option<u32>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1_000,
            max_attempts: Some(60),
        }
    }
}

impl ReadinessConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// `unix:///path`, `tcp://host:port` or `https://host:port`.
    pub endpoint: String,
    /// Default domain handed to the configuration builder.
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<ClientTls>,
    pub exposed_by_default: bool,
    pub use_bind_port_ip: bool,
    pub swarm_mode: bool,
    pub watch: bool,
    /// Service label that opts a swarm service into VIP load balancing.
    pub swarm_lb_label: String,
    pub request_timeout_secs: u64,
    pub channel_capacity: usize,
    pub backoff: BackoffConfig,
    pub readiness: ReadinessConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "unix:///var/run/docker.sock".into(),
            domain: String::new(),
            tls: None,
            exposed_by_default: true,
            use_bind_port_ip: false,
            swarm_mode: false,
            watch: true,
            swarm_lb_label: "traefik.backend.loadbalancer.swarm".into(),
            request_timeout_secs: 120,
            channel_capacity: 1,
            backoff: BackoffConfig::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config: Config = Self::figment()
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("docksync.toml"))
            .merge(Json::file("docksync.json"))
            .merge(Env::prefixed("DOCKSYNC_").split("__"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.endpoint.trim().is_empty() {
            anyhow::bail!("endpoint must not be empty");
        }
        if self.channel_capacity == 0 {
            anyhow::bail!("channel_capacity must be at least 1");
        }
        if !self.backoff.multiplier.is_finite()
            || !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.backoff.multiplier)
        {
            anyhow::bail!("backoff.multiplier must be within [1, {MAX_BACKOFF_MULTIPLIER}]");
        }
        if self.backoff.initial_interval_ms == 0 {
            anyhow::bail!("backoff.initial_interval_ms must be at least 1");
        }
        if self.readiness.retry_delay_ms == 0 && self.readiness.max_attempts.is_none() {
            anyhow::bail!("readiness.retry_delay_ms must be at least 1 when max_attempts is unset");
        }
        if !(0.0..=1.0).contains(&self.backoff.randomization_factor) {
            anyhow::bail!("backoff.randomization_factor must be within [0, 1]");
        }
        Ok(())
    }

    pub fn hints(&self) -> ProviderHints {
        ProviderHints {
            domain: self.domain.clone(),
            exposed_by_default: self.exposed_by_default,
            use_bind_port_ip: self.use_bind_port_ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.readiness.retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn layers_file_and_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "docksync.toml",
                r#"
                    endpoint = "tcp://manager:2375"
                    swarm_mode = true

                    [readiness]
                    max_attempts = 5
                "#,
            )?;
            jail.set_env("DOCKSYNC_DOMAIN", "example.org");
            jail.set_env("DOCKSYNC_BACKOFF__MAX_INTERVAL_MS", "1000");

            let config: Config = Config::figment().extract()?;
            assert_eq!(config.endpoint, "tcp://manager:2375");
            assert!(config.swarm_mode);
            assert_eq!(config.domain, "example.org");
            assert_eq!(config.readiness.max_attempts, Some(5));
            assert_eq!(config.readiness.retry_delay_ms, 1_000);
            assert_eq!(config.backoff.max_interval_ms, 1_000);
            assert_eq!(config.backoff.initial_interval_ms, 500);
            Ok(())
        });
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = Config {
            channel_capacity: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unbounded_backoff_growth() {
        for multiplier in [1e30, f64::INFINITY, f64::NAN, 0.5] {
            let config = Config {
                backoff: BackoffConfig {
                    multiplier,
                    max_interval_ms: u64::MAX,
                    ..BackoffConfig::default()
                },
                ..Config::default()
            };
            assert!(config.validate().is_err(), "multiplier {multiplier} accepted");
        }
    }

    #[test]
    fn rejects_hot_retry_loops() {
        let config = Config {
            backoff: BackoffConfig {
                initial_interval_ms: 0,
                ..BackoffConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let unbounded = Config {
            readiness: ReadinessConfig {
                retry_delay_ms: 0,
                max_attempts: None,
            },
            ..Config::default()
        };
        assert!(unbounded.validate().is_err());

        let bounded = Config {
            readiness: ReadinessConfig {
                retry_delay_ms: 0,
                max_attempts: Some(3),
            },
            ..Config::default()
        };
        assert!(bounded.validate().is_ok());
    }
}
