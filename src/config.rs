use crate::tlog;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_RECENT_FILES: usize = 5;
const DEFAULT_SEARCH_CHUNK_LINES: usize = 5_000;
const DEFAULT_TICK_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub max_recent_files: usize,
    /// Lines scanned per tick by a filter search.
    pub search_chunk_lines: usize,
    pub tick_ms: u64,
}

#[derive(Deserialize)]
struct ConfigFile {
    logdeck: Option<LogdeckSection>,
}

#[derive(Deserialize, Default)]
struct LogdeckSection {
    data_dir: Option<PathBuf>,
    max_recent_files: Option<usize>,
    search_chunk_lines: Option<usize>,
    tick_ms: Option<u64>,
}

impl AppConfig {
    /// Reads `~/.logdeck/config.toml`. `data_dir_override` (from the command
    /// line) wins over `LOGDECK_DATA_DIR`, which wins over the file.
    pub fn load(data_dir_override: Option<PathBuf>) -> Result<Self> {
        let section = config_path()
            .and_then(|p| read_section(&p))
            .unwrap_or_default();

        let config = Self::from_section(section, data_dir_override);
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;

        tlog!(
            info,
            "config loaded: data_dir={} recent={} chunk={} tick={}ms",
            config.data_dir.display(),
            config.max_recent_files,
            config.search_chunk_lines,
            config.tick_ms,
        );

        Ok(config)
    }

    fn from_section(section: LogdeckSection, data_dir_override: Option<PathBuf>) -> Self {
        let env_dir = std::env::var("LOGDECK_DATA_DIR")
            .ok()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);

        let data_dir = data_dir_override
            .or(env_dir)
            .or(section.data_dir)
            .unwrap_or_else(default_data_dir);

        Self {
            data_dir,
            max_recent_files: section
                .max_recent_files
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_RECENT_FILES),
            search_chunk_lines: section
                .search_chunk_lines
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_SEARCH_CHUNK_LINES),
            tick_ms: section.tick_ms.unwrap_or(DEFAULT_TICK_MS),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("state.db")
    }
}

fn read_section(path: &Path) -> Option<LogdeckSection> {
    let content = std::fs::read_to_string(path).ok()?;
    match parse_section(&content) {
        Ok(section) => Some(section),
        Err(e) => {
            tlog!(warn, "ignoring {}: {}", path.display(), e);
            None
        }
    }
}

fn parse_section(content: &str) -> Result<LogdeckSection, toml::de::Error> {
    let file: ConfigFile = toml::from_str(content)?;
    Ok(file.logdeck.unwrap_or_default())
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("~"))
        .join(".logdeck")
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".logdeck").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path() {
        let path = config_path();
        assert!(path.is_some());
        let p = path.unwrap();
        assert!(p.ends_with(".logdeck/config.toml"));
    }

    #[test]
    fn test_parse_section() {
        let section = parse_section(
            r#"
            [logdeck]
            data_dir = "/var/tmp/deck"
            max_recent_files = 8
            tick_ms = 20
            "#,
        )
        .unwrap();
        let config = AppConfig::from_section(section, Some(PathBuf::from("/override")));
        assert_eq!(config.data_dir, PathBuf::from("/override"));
        assert_eq!(config.max_recent_files, 8);
        assert_eq!(config.search_chunk_lines, DEFAULT_SEARCH_CHUNK_LINES);
        assert_eq!(config.tick_ms, 20);
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let section = parse_section("[logdeck]\nmax_recent_files = 0\nsearch_chunk_lines = 0\n").unwrap();
        let config = AppConfig::from_section(section, Some(PathBuf::from("/x")));
        assert_eq!(config.max_recent_files, DEFAULT_MAX_RECENT_FILES);
        assert_eq!(config.search_chunk_lines, DEFAULT_SEARCH_CHUNK_LINES);
    }

    #[test]
    fn test_missing_section() {
        let section = parse_section("[other]\nkey = 1\n").unwrap();
        assert!(section.data_dir.is_none());
        assert!(parse_section("not = [valid").is_err());
    }
}
