use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;

pub struct AsnscopeConfig {
    /// Path to the directory to hold asnscope's data
    pub data_dir: String,

    /// TTL for cached ASN holder metadata in seconds (default: 24 hours)
    pub holder_cache_ttl_secs: u64,

    /// TTL for cached ASN neighbour lists in seconds (default: 24 hours)
    pub neighbor_cache_ttl_secs: u64,

    /// Sleep between consecutive remote calls in milliseconds (default: 1 second)
    pub batch_sleep_ms: u64,
}

const EMPTY_CONFIG: &str = r#"### asnscope configuration file

### directory for cached data used by asnscope
# data_dir = "~/.asnscope"

### cache TTL settings (in seconds)
# holder_cache_ttl_secs = 86400     # 24 hours
# neighbor_cache_ttl_secs = 86400   # 24 hours

### rate limiting between remote lookup calls (in milliseconds)
# batch_sleep_ms = 1000
"#;

impl Default for AsnscopeConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.asnscope", home_dir),
            holder_cache_ttl_secs: 86400,   // 24 hours
            neighbor_cache_ttl_secs: 86400, // 24 hours
            batch_sleep_ms: 1000,
        }
    }
}

impl AsnscopeConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<AsnscopeConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.asnscope/asnscope.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        // Config dir
        let asnscope_dir = format!("{}/.asnscope", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(asnscope_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create asnscope directory: {}", e))?;
                let p = format!("{}/asnscope.toml", asnscope_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of ASNSCOPE)
        // E.g., `ASNSCOPE_DATA_DIR=~/.asnscope ./asnscope` would set the data directory
        builder = builder.add_source(config::Environment::with_prefix("ASNSCOPE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        // Parse data directory
        let data_dir = match config.get("data_dir") {
            Some(p) => {
                let path = Path::new(p);
                path.to_str()
                    .ok_or_else(|| anyhow!("Could not convert data_dir path to string"))?
                    .to_string()
            }
            None => {
                let dir = format!("{}/.asnscope/", home_dir.as_str());
                std::fs::create_dir_all(dir.as_str())
                    .map_err(|e| anyhow!("Unable to create data directory: {}", e))?;
                dir
            }
        };

        // Parse holder cache TTL (default: 24 hours)
        let holder_cache_ttl_secs = config
            .get("holder_cache_ttl_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        // Parse neighbour cache TTL (default: 24 hours)
        let neighbor_cache_ttl_secs = config
            .get("neighbor_cache_ttl_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        // Parse sleep between remote calls (default: 1 second)
        let batch_sleep_ms = config
            .get("batch_sleep_ms")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        Ok(AsnscopeConfig {
            data_dir,
            holder_cache_ttl_secs,
            neighbor_cache_ttl_secs,
            batch_sleep_ms,
        })
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/asnscope-data.sqlite3", data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AsnscopeConfig::default();
        assert!(config.data_dir.ends_with(".asnscope"));
        assert_eq!(config.holder_cache_ttl_secs, 86400);
        assert_eq!(config.batch_sleep_ms, 1000);
    }

    #[test]
    fn test_sqlite_path() {
        let config = AsnscopeConfig {
            data_dir: "/tmp/asnscope/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.sqlite_path(), "/tmp/asnscope/asnscope-data.sqlite3");
    }
}
