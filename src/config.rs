use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};

/// default size of content blocks produced by `snapshot` (1 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// default capacity of the per-dump block cache (64 MiB)
pub const DEFAULT_CACHE_SIZE: usize = 64 * 1024 * 1024;

/// repository configuration stored in config.toml
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// size files are split at when snapshotting
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// zstd level for stored objects
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// defaults for dump operations
    #[serde(default)]
    pub dump: DumpConfig,
}

/// `[dump]` section
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpConfig {
    /// block cache capacity in bytes
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// archive format used when none is given on the command line
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_compression_level() -> i32 {
    3
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_format() -> String {
    "tar".to_string()
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            compression_level: default_compression_level(),
            dump: DumpConfig::default(),
        }
    }
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            format: default_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config {
            block_size: 4096,
            compression_level: 9,
            dump: DumpConfig {
                cache_size: 1 << 20,
                format: "zip".to_string(),
            },
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.dump.cache_size, DEFAULT_CACHE_SIZE);
        assert_eq!(config.dump.format, "tar");
    }

    #[test]
    fn test_config_partial_dump_section() {
        let toml_str = r#"
block_size = 65536

[dump]
format = "zip"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.block_size, 65536);
        assert_eq!(config.compression_level, 3);
        assert_eq!(config.dump.format, "zip");
        assert_eq!(config.dump.cache_size, DEFAULT_CACHE_SIZE);
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.dump.cache_size = 1234;
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
