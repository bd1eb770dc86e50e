use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    /// Unset selects the single-instance in-memory store.
    pub database_url: Option<String>,
    pub broadcast_capacity: usize,
    pub keep_alive: Duration,
    pub reset_on_start: bool,
    pub health_check_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: None,
            broadcast_capacity: 100,
            keep_alive: Duration::from_secs(30),
            reset_on_start: true,
            health_check_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        if dotenvy::dotenv().is_ok() {
            info!("Loaded environment from .env");
        }

        let defaults = Self::default();

        Self {
            port: try_load("PORT", defaults.port),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            broadcast_capacity: try_load("BROADCAST_CAPACITY", defaults.broadcast_capacity)
                .max(1),
            keep_alive: Duration::from_secs(try_load(
                "KEEP_ALIVE_SECS",
                defaults.keep_alive.as_secs(),
            )),
            reset_on_start: try_load("RESET_ON_START", defaults.reset_on_start),
            health_check_interval: Duration::from_secs(
                try_load("HEALTH_CHECK_SECS", defaults.health_check_interval.as_secs()).max(1),
            ),
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

fn parse_or<T>(key: &str, raw: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back() {
        assert_eq!(parse_or("PORT", "8080", 3000u16), 8080);
        assert_eq!(parse_or("PORT", "not-a-port", 3000u16), 3000);
        assert!(!parse_or("RESET_ON_START", " false ", true));
    }
}
