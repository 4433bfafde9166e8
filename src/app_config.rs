//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use drivefetch_core::{FetchStrategy, TransferConfig};

use crate::cli::Args;

/// Name of the directory holding the config file under the config home.
const CONFIG_DIR_NAME: &str = "drivefetch";

/// File configuration for transfer defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default storage directory for finished files.
    pub storage_dir: Option<PathBuf>,
    /// Default overall transfer timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Default transfer strategy.
    pub strategy: Option<FetchStrategy>,
    /// External program used by the subprocess strategy.
    pub subprocess_program: Option<String>,
    /// Service base URL.
    pub base_url: Option<String>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            bail!("Invalid config value for `timeout_secs`: {timeout}. Expected range: 1..=3600");
        }
        if let Some(program) = &self.subprocess_program
            && program.trim().is_empty()
        {
            bail!("Invalid config value for `subprocess_program`: must not be empty");
        }
        if let Some(base_url) = &self.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            bail!("Invalid config value for `base_url`: {base_url}. Expected an http(s) URL");
        }
        Ok(())
    }
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }

    fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    /// Indicates whether configuration was loaded from disk.
    #[must_use]
    pub fn loaded_from_file(&self) -> bool {
        self.config.is_some()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/drivefetch/config.toml`
/// 2. `$HOME/.config/drivefetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();

    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            bail!("Expected `key = value` on line {line_no}");
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "storage_dir" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `storage_dir` value on line {line_no}")
                })?;
                cfg.storage_dir = Some(PathBuf::from(parsed));
            }
            "timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `timeout_secs` value on line {line_no}")
                })?;
                cfg.timeout_secs = Some(parsed);
            }
            "strategy" => {
                let parsed = parse_string_literal(value)
                    .and_then(|s| s.parse::<FetchStrategy>().map_err(anyhow::Error::msg))
                    .with_context(|| format!("Invalid `strategy` value on line {line_no}"))?;
                cfg.strategy = Some(parsed);
            }
            "subprocess_program" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `subprocess_program` value on line {line_no}")
                })?;
                cfg.subprocess_program = Some(parsed);
            }
            "base_url" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `base_url` value on line {line_no}"))?;
                cfg.base_url = Some(parsed);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value)
                    .and_then(|s| parse_verbosity(&s))
                    .with_context(|| format!("Invalid `verbosity` value on line {line_no}"))?;
                cfg.verbosity = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
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

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

/// Builds the effective transfer config.
///
/// CLI flags win over the config file, which wins over built-in defaults.
#[must_use]
pub fn resolve_transfer_config(args: &Args, file: Option<&FileConfig>) -> TransferConfig {
    let defaults = TransferConfig::default();
    let file = file.cloned().unwrap_or_default();

    let timeout_secs = args.timeout.or(file.timeout_secs);

    TransferConfig {
        storage_dir: args
            .output_dir
            .clone()
            .or(file.storage_dir)
            .unwrap_or(defaults.storage_dir),
        strategy: args.strategy.or(file.strategy).unwrap_or(defaults.strategy),
        timeout: timeout_secs.map_or(defaults.timeout, Duration::from_secs),
        connect_timeout: defaults.connect_timeout,
        user_agent: defaults.user_agent,
        base_url: args
            .base_url
            .clone()
            .or(file.base_url)
            .unwrap_or(defaults.base_url),
        subprocess_program: args
            .program
            .clone()
            .or(file.subprocess_program)
            .unwrap_or(defaults.subprocess_program),
    }
}

/// Picks the default log filter.
///
/// Priority: quiet flag > verbose flag > config verbosity > `info`.
/// `RUST_LOG` still overrides the result at subscriber setup.
#[must_use]
pub fn resolve_log_level(args: &Args, file: Option<&FileConfig>) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => file
            .and_then(|cfg| cfg.verbosity)
            .map_or("info", VerbositySetting::log_level),
        1 => "debug",
        _ => "trace",
    }
}
