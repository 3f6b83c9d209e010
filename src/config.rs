//! File configuration for CLI defaults.
//!
//! A small `key = value` config file supplies defaults for options the CLI
//! does not pass explicitly. Unknown keys and out-of-range values are hard
//! errors so typos do not silently fall back to defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// File-backed configuration defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Destination folder for downloaded documents.
    pub dest_dir: Option<PathBuf>,
    /// Folder the status sink files are written into.
    pub output_dir: Option<PathBuf>,
    /// Worker pool size (same range as the CLI).
    pub concurrency: Option<usize>,
    /// Whole-item retry budget (extra rounds after the first).
    pub retry_budget: Option<u32>,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against the same ranges the CLI enforces.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key and expected range.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=1000).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=1000");
        }
        if let Some(retry_budget) = self.retry_budget
            && retry_budget > 10
        {
            bail!("Invalid config value for `retry_budget`: {retry_budget}. Expected range: 0..=10");
        }
        if let Some(timeout_secs) = self.timeout_secs
            && !(1..=3600).contains(&timeout_secs)
        {
            bail!("Invalid config value for `timeout_secs`: {timeout_secs}. Expected range: 1..=3600");
        }
        Ok(())
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/reportfetch/config.toml`
/// 2. `$HOME/.config/reportfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("reportfetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("reportfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if a file exists there.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be read or parsed.
pub fn load_default_file_config() -> Result<FileConfig> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(FileConfig::default());
    };
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    load_file_config(&path)
}

/// Loads and validates a config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "dest_dir" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `dest_dir` value on line {}", line_index + 1)
                })?;
                cfg.dest_dir = Some(PathBuf::from(parsed));
            }
            "output_dir" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `output_dir` value on line {}", line_index + 1)
                })?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "concurrency" => {
                let parsed = parse_integer(value).with_context(|| {
                    format!("Invalid `concurrency` value on line {}", line_index + 1)
                })?;
                cfg.concurrency = Some(usize::try_from(parsed).with_context(|| {
                    format!("Invalid `concurrency` value on line {}", line_index + 1)
                })?);
            }
            "retry_budget" => {
                let parsed = parse_integer(value).with_context(|| {
                    format!("Invalid `retry_budget` value on line {}", line_index + 1)
                })?;
                cfg.retry_budget = Some(u32::try_from(parsed).with_context(|| {
                    format!("Invalid `retry_budget` value on line {}", line_index + 1)
                })?);
            }
            "timeout_secs" => {
                let parsed = parse_integer(value).with_context(|| {
                    format!("Invalid `timeout_secs` value on line {}", line_index + 1)
                })?;
                cfg.timeout_secs = Some(parsed);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range"))
}
