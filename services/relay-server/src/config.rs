use std::env;

use relay_protocol::Edition;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub edition: Edition,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
        let redis_url = env::var("REDIS_URL").ok().filter(|v| !v.is_empty());
        let edition = match env::var("RELAY_EDITION").as_deref() {
            Ok("enterprise") => Edition::Enterprise,
            _ => Edition::Community,
        };
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        Self { bind_addr, redis_url, edition, allowed_origins, log_level }
    }

    pub fn is_enterprise(&self) -> bool {
        matches!(self.edition, Edition::Enterprise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_edition_defaults_to_community() {
        env::remove_var("RELAY_EDITION");
        let config = Config::from_env();
        assert!(!config.is_enterprise());
    }

    #[test]
    fn allowed_origins_splits_and_trims_commas() {
        env::set_var("ALLOWED_ORIGINS", "https://a.example, https://b.example ,");
        let config = Config::from_env();
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
        );
        env::remove_var("ALLOWED_ORIGINS");
    }
}
