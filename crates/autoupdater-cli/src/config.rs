//! # Settings Provider
//!
//! Loads the YAML configuration file and folds in the command-line
//! overrides to produce one immutable [`Settings`] for the run, plus the
//! filesystem locations the binary needs around it.
//!
//! ```yaml
//! settings:
//!   enabled: true
//!   branch: stable
//!   version_file: /lib/gluon/release
//! branches:
//!   stable:
//!     good_signatures: 2
//!     mirrors:
//!       - http://1.updates.example/stable
//!       - http://2.updates.example/stable
//!     pubkeys:
//!       - 6f1e...
//! runtime:
//!   lock_file: /var/run/autoupdater.lock
//!   hook_dir: /usr/lib/autoupdater
//!   work_dir: /tmp/autoupdater
//! ```
//!
//! Every error here is fatal: the engine never starts with partial settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;

use autoupdater_core::{CryptoError, Settings, SettingsError};
use autoupdater_crypto::Ed25519PublicKey;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/config/autoupdater.yaml";

/// Single-instance lock file.
pub const DEFAULT_LOCK_FILE: &str = "/var/run/autoupdater.lock";

/// Directory holding `download.d`, `abort.d` and `upgrade.d`.
pub const DEFAULT_HOOK_DIR: &str = "/usr/lib/autoupdater";

/// Scratch directory the download stage writes the manifest into.
pub const DEFAULT_WORK_DIR: &str = "/tmp/autoupdater";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("unable to read {}: {}", .path.display(), .source)]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML of the expected shape.
    #[error("unable to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// There is no `settings` section.
    #[error("unable to load settings: no 'settings' section")]
    MissingSettings,

    /// Neither the file nor the command line names a branch.
    #[error("no branch given in settings or command line")]
    NoBranch,

    /// The selected branch has no section under `branches`.
    #[error("unable to load configuration for branch '{0}'")]
    UnknownBranch(String),

    /// A required option is absent from the branch section.
    #[error("unable to load option '{0}'")]
    MissingOption(&'static str),

    /// An option is present but unusable.
    #[error("invalid value for option '{option}': {value}")]
    InvalidValue {
        /// Option name.
        option: &'static str,
        /// The rejected value as written.
        value: String,
    },

    /// A configured trust anchor is not an Ed25519 public key.
    #[error("invalid value for option 'pubkeys': {key}: {source}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        #[source]
        source: CryptoError,
    },

    /// The assembled settings failed validation.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Branch to use instead of `settings.branch`.
    pub branch: Option<String>,
    /// Update even when disabled.
    pub force: bool,
    /// Use the fallback rollout policy.
    pub fallback: bool,
}

/// Everything the binary needs for one run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Validated engine settings.
    pub settings: Settings,
    /// Path of the single-instance lock.
    pub lock_file: PathBuf,
    /// Root of the stage directories.
    pub hook_dir: PathBuf,
    /// Where the download stage writes the manifest.
    pub work_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: Option<SettingsSection>,
    #[serde(default)]
    branches: BTreeMap<String, BranchSection>,
    #[serde(default)]
    runtime: RuntimeSection,
}

#[derive(Debug, Deserialize)]
struct SettingsSection {
    #[serde(default)]
    enabled: Value,
    branch: Option<String>,
    version_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct BranchSection {
    good_signatures: Option<Value>,
    mirrors: Option<Vec<String>>,
    pubkeys: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuntimeSection {
    lock_file: Option<PathBuf>,
    hook_dir: Option<PathBuf>,
    work_dir: Option<PathBuf>,
}

/// Read and resolve the configuration file at `path`.
pub fn load(path: &Path, overrides: &Overrides) -> Result<RuntimeConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, overrides)
}

/// Resolve configuration from YAML text.
pub fn parse(text: &str, overrides: &Overrides) -> Result<RuntimeConfig, ConfigError> {
    let file: ConfigFile = serde_yaml::from_str(text)?;
    let general = file.settings.ok_or(ConfigError::MissingSettings)?;

    let branch = overrides
        .branch
        .clone()
        .or(general.branch)
        .filter(|b| !b.trim().is_empty())
        .ok_or(ConfigError::NoBranch)?;

    let section = file
        .branches
        .get(&branch)
        .ok_or_else(|| ConfigError::UnknownBranch(branch.clone()))?;

    let threshold = load_positive_number("good_signatures", section.good_signatures.as_ref())?;
    let mirrors = load_string_list("mirrors", section.mirrors.as_ref())?;
    let pubkeys = load_string_list("pubkeys", section.pubkeys.as_ref())?;
    for key in &pubkeys {
        Ed25519PublicKey::from_hex(key.trim()).map_err(|source| ConfigError::InvalidKey {
            key: key.clone(),
            source,
        })?;
    }

    let previous_version = general.version_file.as_deref().and_then(read_one_line);
    tracing::debug!(
        branch = %branch,
        mirrors = mirrors.len(),
        pubkeys = pubkeys.len(),
        threshold,
        previous_version = previous_version.as_deref().unwrap_or("unknown"),
        "loaded settings"
    );

    let settings = Settings::builder(branch)
        .enabled(is_enabled(&general.enabled))
        .force(overrides.force)
        .fallback(overrides.fallback)
        .mirrors(mirrors)
        .public_keys(pubkeys)
        .signature_threshold(threshold)
        .previous_version(previous_version)
        .build()?;

    let runtime = file.runtime;
    Ok(RuntimeConfig {
        settings,
        lock_file: runtime.lock_file.unwrap_or_else(|| DEFAULT_LOCK_FILE.into()),
        hook_dir: runtime.hook_dir.unwrap_or_else(|| DEFAULT_HOOK_DIR.into()),
        work_dir: runtime.work_dir.unwrap_or_else(|| DEFAULT_WORK_DIR.into()),
    })
}

/// Parse a positive integer option. Strings follow C `strtoul` base-0
/// rules: `0x` prefix for hex, leading `0` for octal, decimal otherwise.
/// Trailing garbage and zero are rejected.
pub fn load_positive_number(option: &'static str, value: Option<&Value>) -> Result<usize, ConfigError> {
    let value = value.ok_or(ConfigError::MissingOption(option))?;
    let invalid = || ConfigError::InvalidValue {
        option,
        value: describe(value),
    };

    let n = match value {
        Value::Number(n) => n.as_u64().ok_or_else(invalid)?,
        Value::String(s) => parse_c_integer(s).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    if n == 0 {
        return Err(invalid());
    }
    usize::try_from(n).map_err(|_| invalid())
}

/// Unsigned integer with C base prefixes. `None` on any unparsed input.
pub fn parse_c_integer(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

fn load_string_list(option: &'static str, value: Option<&Vec<String>>) -> Result<Vec<String>, ConfigError> {
    value.cloned().ok_or(ConfigError::MissingOption(option))
}

/// Only `true` or `1` enables updates; anything else, including absence,
/// leaves them disabled.
fn is_enabled(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_u64() == Some(1),
        Value::String(s) => s == "1",
        _ => false,
    }
}

/// First line of a file without its newline. `None` if the file cannot be
/// read or is empty.
pub fn read_one_line(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    text.lines().next().map(str::to_string)
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => format!("{other:?}"),
    }
}
