// src/config.rs - Service configuration
//
// Precedence, lowest to highest: built-in defaults, then an optional
// key=value file named by CONFIG_FILE, then environment variables.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use crate::behavioral::controller::MonitorConfig;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub workers: usize,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Seconds between analysis ticks
    pub tick_interval_secs: u64,
    /// Seconds before an analyze round trip fails open
    pub analyze_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub monitor: MonitorSettings,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origin: "http://localhost:5173".to_string(),
                workers: 4,
            },
            monitor: MonitorSettings {
                tick_interval_secs: 15,
                analyze_timeout_secs: 5,
            },
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            tick_interval: Duration::from_secs(self.monitor.tick_interval_secs),
            analyze_timeout: Duration::from_secs(self.monitor.analyze_timeout_secs),
            ..MonitorConfig::default()
        }
    }
}

pub fn load_config() -> Result<Config> {
    dotenv::dotenv().ok();

    let mut config = Config::default();

    if let Ok(path) = env::var("CONFIG_FILE") {
        load_from_file(&mut config, Path::new(&path))?;
    }
    load_from_env(&mut config);
    validate(&config)?;

    Ok(config)
}

fn load_from_env(config: &mut Config) {
    if let Ok(host) = env::var("API_HOST") {
        config.api.host = host;
    }
    if let Ok(port) = env::var("API_PORT") {
        if let Ok(port) = port.parse() {
            config.api.port = port;
        }
    }
    if let Ok(origin) = env::var("CORS_ORIGIN") {
        config.api.cors_origin = origin;
    }
    if let Ok(workers) = env::var("API_WORKERS") {
        if let Ok(workers) = workers.parse() {
            config.api.workers = workers;
        }
    }
    if let Ok(secs) = env::var("TICK_INTERVAL_SECS") {
        if let Ok(secs) = secs.parse() {
            config.monitor.tick_interval_secs = secs;
        }
    }
    if let Ok(secs) = env::var("ANALYZE_TIMEOUT_SECS") {
        if let Ok(secs) = secs.parse() {
            config.monitor.analyze_timeout_secs = secs;
        }
    }
    if let Ok(level) = env::var("LOG_LEVEL") {
        config.log_level = level;
    }
}

fn load_from_file(config: &mut Config, path: &Path) -> Result<()> {
    let file = File::open(path).context("Failed to open configuration file")?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line.context("Failed to read line from configuration file")?;
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(index) = line.find('=') {
            let key = line[..index].trim();
            let value = line[index + 1..].trim();

            match key {
                "API_HOST" => config.api.host = value.to_string(),
                "API_PORT" => {
                    if let Ok(port) = value.parse() {
                        config.api.port = port;
                    }
                }
                "CORS_ORIGIN" => config.api.cors_origin = value.to_string(),
                "API_WORKERS" => {
                    if let Ok(workers) = value.parse() {
                        config.api.workers = workers;
                    }
                }
                "TICK_INTERVAL_SECS" => {
                    if let Ok(secs) = value.parse() {
                        config.monitor.tick_interval_secs = secs;
                    }
                }
                "ANALYZE_TIMEOUT_SECS" => {
                    if let Ok(secs) = value.parse() {
                        config.monitor.analyze_timeout_secs = secs;
                    }
                }
                "LOG_LEVEL" => config.log_level = value.to_string(),
                _ => {}
            }
        }
    }

    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    if config.api.workers == 0 {
        bail!("API_WORKERS must be at least 1");
    }
    if config.monitor.tick_interval_secs == 0 {
        bail!("TICK_INTERVAL_SECS must be at least 1");
    }
    if config.monitor.analyze_timeout_secs == 0 {
        bail!("ANALYZE_TIMEOUT_SECS must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.api.port, 8080);

        let monitor = config.monitor_config();
        assert_eq!(monitor.tick_interval, Duration::from_secs(15));
        assert_eq!(monitor.analyze_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_file_overrides_and_ignores_noise() {
        let path = env::temp_dir().join(format!("securebank_config_{}.conf", std::process::id()));
        fs::write(
            &path,
            "# comment\n\nAPI_PORT=9090\nTICK_INTERVAL_SECS=30\nUNKNOWN_KEY=ignored\nAPI_WORKERS=not_a_number\n",
        )
        .unwrap();

        let mut config = Config::default();
        load_from_file(&mut config, &path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.api.port, 9090);
        assert_eq!(config.monitor.tick_interval_secs, 30);
        // Unparseable values keep the default
        assert_eq!(config.api.workers, 4);
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut config = Config::default();
        config.monitor.tick_interval_secs = 0;
        assert!(validate(&config).is_err());
    }
}
