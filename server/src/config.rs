use std::{env, fmt::Display, net::IpAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context};
use carpool_data_management::{football_data::FootballDataConfig, DEFAULT_DATABASE_PATH};
use tracing::{info, warn};

const DEFAULT_LOG_DIR: &str = "server/log";

pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub football: FootballDataConfig,
    pub chat_room_capacity: usize,
    pub tls: Option<TlsPaths>,
}

pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source; `load` uses the environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("JWT_SECRET_KEY")
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| anyhow!("JWT_SECRET_KEY must be set"))?;

        let bcrypt_cost: u32 = try_load(&lookup, "BCRYPT_COST", "10")?;
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31, got {bcrypt_cost}");
        }

        let chat_room_capacity: usize = try_load(&lookup, "CHAT_ROOM_CAPACITY", "100")?;
        if chat_room_capacity == 0 {
            bail!("CHAT_ROOM_CAPACITY must be positive");
        }

        let api_key = lookup("FOOTBALL_DATA_API_KEY").unwrap_or_else(|| {
            warn!("FOOTBALL_DATA_API_KEY not set");
            String::new()
        });

        let tls = match (lookup("TLS_CERT_PATH"), lookup("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert: cert.into(), key: key.into() }),
            (None, None) => None,
            _ => bail!("TLS_CERT_PATH and TLS_KEY_PATH must be set together"),
        };

        Ok(Self {
            host: try_load(&lookup, "HOST", "0.0.0.0")?,
            port: try_load(&lookup, "PORT", "5000")?,
            database_path: try_load(&lookup, "DATABASE_PATH", DEFAULT_DATABASE_PATH)?,
            jwt_secret,
            token_ttl: Duration::from_secs(try_load(&lookup, "TOKEN_TTL_SECS", "3600")?),
            bcrypt_cost,
            football: FootballDataConfig {
                base_url: try_load(&lookup, "FOOTBALL_DATA_API_URL", "https://api.football-data.org/v4")?,
                api_key,
                default_competition: try_load(&lookup, "FOOTBALL_DEFAULT_COMPETITION", "FL1")?,
                match_window_days: try_load(&lookup, "MATCH_WINDOW_DAYS", "13")?,
                cache_ttl: Duration::from_secs(try_load(&lookup, "FOOTBALL_CACHE_TTL_SECS", "300")?),
            },
            chat_room_capacity,
            tls,
        })
    }
}

/// Where the log file goes. Logging starts before the rest of the config is loaded.
pub fn log_dir() -> PathBuf {
    env::var("LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string()).into()
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET_KEY", "secret")])).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.bcrypt_cost, 10);
        assert_eq!(config.football.match_window_days, 13);
        assert_eq!(config.football.default_competition, "FL1");
        assert_eq!(config.database_path, PathBuf::from("data/database.db"));
        assert!(config.tls.is_none());
    }

    #[test]
    fn secret_is_required() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("JWT_SECRET_KEY", "")])).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_port = Config::from_lookup(lookup(&[("JWT_SECRET_KEY", "s"), ("PORT", "eighty")]));
        assert!(bad_port.is_err());

        let bad_cost = Config::from_lookup(lookup(&[("JWT_SECRET_KEY", "s"), ("BCRYPT_COST", "2")]));
        assert!(bad_cost.is_err());

        let half_tls = Config::from_lookup(lookup(&[("JWT_SECRET_KEY", "s"), ("TLS_CERT_PATH", "/etc/cert.pem")]));
        assert!(half_tls.is_err());
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s"),
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("MATCH_WINDOW_DAYS", "7"),
            ("TLS_CERT_PATH", "/etc/cert.pem"),
            ("TLS_KEY_PATH", "/etc/key.pem"),
        ])).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host.to_string(), "127.0.0.1");
        assert_eq!(config.football.match_window_days, 7);
        assert_eq!(config.tls.map(|tls| tls.key), Some(PathBuf::from("/etc/key.pem")));
    }
}
