//! Optional `cellflow.toml` configuration.

use crate::error::{CliError, Result};
use cellflow_core::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const MAX_CONFIG_FILE_BYTES: u64 = 65_536; // 64 KiB
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    sheet: Option<SheetSection>,
    log: Option<LogSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SheetSection {
    width: Option<usize>,
    height: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    filter: Option<String>,
}

/// Settings after merging the config file over built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub width: usize,
    pub height: usize,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Load the configuration.
///
/// An explicitly requested file must exist. Problems with the file itself
/// (too large, unreadable, malformed, out-of-range values) are reported as
/// warnings and the affected settings keep their defaults.
pub fn load_config(config_file: Option<&PathBuf>) -> Result<(Config, Vec<String>)> {
    let mut warnings: Vec<String> = Vec::new();
    let mut config = Config::default();

    let Some(path) = config_file.cloned().or_else(user_config_path) else {
        return Ok((config, warnings));
    };
    if !path.exists() {
        if config_file.is_some() {
            return Err(CliError::Config {
                path,
                message: "file not found".to_string(),
            });
        }
        return Ok((config, warnings));
    }

    if let Some(file) = read_config_file(&path, &mut warnings) {
        apply(&mut config, file, &path, &mut warnings);
    }
    Ok((config, warnings))
}

fn read_config_file(path: &Path, warnings: &mut Vec<String>) -> Option<ConfigFile> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_CONFIG_FILE_BYTES => {
            warnings.push(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            ));
            None
        }
        Ok(_) => match std::fs::read_to_string(path) {
            Ok(content) => parse_config(&content, path, warnings),
            Err(err) => {
                warnings.push(format!("Failed to read {}: {}", path.display(), err));
                None
            }
        },
        Err(err) => {
            warnings.push(format!(
                "Failed to read metadata for {}: {}",
                path.display(),
                err
            ));
            None
        }
    }
}

fn parse_config(content: &str, path: &Path, warnings: &mut Vec<String>) -> Option<ConfigFile> {
    match toml::from_str::<ConfigFile>(content) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warnings.push(format!("Failed to parse {}: {}", path.display(), err));
            None
        }
    }
}

fn apply(config: &mut Config, file: ConfigFile, path: &Path, warnings: &mut Vec<String>) {
    let sheet = file.sheet.unwrap_or_default();
    for (name, value, target) in [
        ("width", sheet.width, &mut config.width),
        ("height", sheet.height, &mut config.height),
    ] {
        match value {
            Some(0) => warnings.push(format!(
                "Ignoring sheet.{} in {}: must be at least 1",
                name,
                path.display()
            )),
            Some(n) => *target = n,
            None => {}
        }
    }

    if let Some(filter) = file.log.and_then(|log| log.filter) {
        let filter = filter.trim();
        if filter.is_empty() {
            warnings.push(format!("Ignoring empty log.filter in {}", path.display()));
        } else {
            config.log_filter = filter.to_string();
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "cellflow")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("cellflow.toml");
    Some(path)
}
