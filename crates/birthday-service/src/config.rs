// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;

use birthday_store::RedisConfig;
use birthday_trace::ReporterConfig;

const DEFAULT_FRONTEND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_BACKEND_ADDRESS: &str = "0.0.0.0:9090";
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:9090";

#[derive(Debug)]
pub struct Config {
    /// frontend listen address
    pub frontend_address: String,
    /// backend listen address
    pub backend_address: String,
    /// base url the frontend relays to
    pub backend_url: String,
    pub redis: RedisConfig,
    pub reporter: ReporterConfig,
    pub max_request_content_length: usize,
    /// server-side header read timeout and relay client timeout, in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn new() -> Result<Config, Box<dyn std::error::Error>> {
        let frontend_address =
            env::var("FRONTEND_ADDRESS").unwrap_or_else(|_| DEFAULT_FRONTEND_ADDRESS.to_string());
        let backend_address =
            env::var("BACKEND_ADDRESS").unwrap_or_else(|_| DEFAULT_BACKEND_ADDRESS.to_string());
        let backend_url =
            env::var("BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        reqwest::Url::parse(&backend_url)
            .map_err(|e| anyhow::anyhow!("BACKEND_URL {backend_url:?} is not a valid url: {e}"))?;

        let redis = RedisConfig {
            address: env::var("REDIS_ADDRESS")
                .unwrap_or_else(|_| RedisConfig::default().address),
            password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
            db: env::var("REDIS_DB")
                .ok()
                .and_then(|db| db.parse::<u32>().ok())
                .unwrap_or(0),
            ..RedisConfig::default()
        };

        let mut reporter = ReporterConfig::default();
        if let Ok(url) = env::var("TRACE_COLLECTOR_URL") {
            reporter.collector_url = url;
        }
        if let Some(secs) = env::var("TRACE_FLUSH_INTERVAL_SECS")
            .ok()
            .and_then(|secs| secs.parse::<u64>().ok())
        {
            reporter.flush_interval_secs = secs;
        }

        Ok(Config {
            frontend_address,
            backend_address,
            backend_url,
            redis,
            reporter,
            max_request_content_length: 1024 * 1024, // 1MB in Bytes
            request_timeout_secs: 15,
        })
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use std::env;

    use crate::config;

    #[test]
    #[serial]
    fn test_defaults() {
        env::remove_var("BACKEND_URL");
        env::remove_var("REDIS_ADDRESS");
        env::remove_var("TRACE_COLLECTOR_URL");
        let config = config::Config::new().unwrap();
        assert_eq!(config.frontend_address, "0.0.0.0:8080");
        assert_eq!(config.backend_address, "0.0.0.0:9090");
        assert_eq!(config.backend_url, "http://127.0.0.1:9090");
        assert_eq!(config.redis.address, "127.0.0.1:6379");
        assert_eq!(config.redis.password, None);
        assert_eq!(config.redis.db, 0);
        assert_eq!(
            config.reporter.collector_url,
            "http://127.0.0.1:14268/api/traces"
        );
    }

    #[test]
    #[serial]
    fn test_custom_redis_settings() {
        env::set_var("REDIS_ADDRESS", "10.0.0.7:6390");
        env::set_var("REDIS_PASSWORD", "hunter2");
        env::set_var("REDIS_DB", "3");
        let config = config::Config::new().unwrap();
        assert_eq!(config.redis.address, "10.0.0.7:6390");
        assert_eq!(config.redis.password.as_deref(), Some("hunter2"));
        assert_eq!(config.redis.db, 3);
        env::remove_var("REDIS_ADDRESS");
        env::remove_var("REDIS_PASSWORD");
        env::remove_var("REDIS_DB");
    }

    #[test]
    #[serial]
    fn test_unparseable_redis_db_falls_back_to_default() {
        env::set_var("REDIS_DB", "not-a-number");
        let config = config::Config::new().unwrap();
        assert_eq!(config.redis.db, 0);
        env::remove_var("REDIS_DB");
    }

    #[test]
    #[serial]
    fn test_invalid_backend_url_is_rejected() {
        env::set_var("BACKEND_URL", "not a url");
        let config = config::Config::new();
        assert!(config.is_err());
        env::remove_var("BACKEND_URL");
    }

    #[test]
    #[serial]
    fn test_custom_collector_url() {
        env::set_var("TRACE_COLLECTOR_URL", "http://127.0.0.1:3333/api/traces");
        env::set_var("TRACE_FLUSH_INTERVAL_SECS", "7");
        let config = config::Config::new().unwrap();
        assert_eq!(
            config.reporter.collector_url,
            "http://127.0.0.1:3333/api/traces"
        );
        assert_eq!(config.reporter.flush_interval_secs, 7);
        env::remove_var("TRACE_COLLECTOR_URL");
        env::remove_var("TRACE_FLUSH_INTERVAL_SECS");
    }
}
