//! Runtime settings and persisted user preferences.
//!
//! [`Configuration`] holds what the binaries need to run (bridge address, timeout, logging) and
//! can be created programmatically with [`Configuration::new()`] or from environment variables
//! with [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are enabled by the (case-insensitive) value `"true"`.
//!
//! - `ATM_BRIDGE_ADDR`: address of the native host (default: `127.0.0.1:49153`)
//! - `ATM_TIMEOUT_MS`: per-sample wall-clock limit in milliseconds (default: `2000`)
//! - `ATM_LOG`: write a log file in the current directory (default: `false`)
//! - `ATM_CONFIG`: path to the user config file (default: `~/.atm_config.json`)
//!
//! [`UserConfig`] is the JSON file the user edits by hand, [`TaskMetadata`] is the
//! `metadata.json` written next to each downloaded task.

use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{AtmError, Result};

/// Loopback port the native host listens on.
pub const BRIDGE_PORT: u16 = 49153;

/// Default wall-clock limit for one sample.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Name of the per-task metadata file.
pub const METADATA_FILE: &str = "metadata.json";

/// Settings shared by both binaries.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) bridge_addr: SocketAddr,
    pub(crate) timeout: Duration,
    pub(crate) log: bool,
    pub(crate) user_config_path: Option<PathBuf>,
}

impl Configuration {
    /// Create a configuration with default parameters.
    ///
    /// By default:
    /// - The bridge is expected on `127.0.0.1:49153`.
    /// - Each sample may run for 2 seconds.
    /// - Logging to file is disabled.
    /// - The user config is read from `~/.atm_config.json` (when `HOME` is set).
    pub fn new() -> Self {
        Self {
            bridge_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, BRIDGE_PORT)),
            timeout: DEFAULT_TIMEOUT,
            log: false,
            user_config_path: home_dir().map(|home| home.join(".atm_config.json")),
        }
    }

    /// Create configuration from environment variables, see the module documentation.
    ///
    /// Unparseable values are ignored (with a warning) and the default is kept.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        let mut config = Self::new().with_log(get_env_flag("ATM_LOG", false));

        if let Ok(addr) = std::env::var("ATM_BRIDGE_ADDR") {
            match addr.parse() {
                Ok(addr) => config.bridge_addr = addr,
                Err(e) => warn!("ignoring ATM_BRIDGE_ADDR='{addr}': {e}"),
            }
        }
        if let Ok(ms) = std::env::var("ATM_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => config.timeout = Duration::from_millis(ms),
                Err(e) => warn!("ignoring ATM_TIMEOUT_MS='{ms}': {e}"),
            }
        }
        if let Some(path) = std::env::var_os("ATM_CONFIG") {
            config.user_config_path = Some(PathBuf::from(path));
        }
        config
    }

    /// Address of the native host.
    pub fn with_bridge_addr(mut self, addr: SocketAddr) -> Self {
        self.bridge_addr = addr;
        self
    }

    /// Wall-clock limit for one sample.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Where to read the user config from. `None` disables it.
    pub fn with_user_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.user_config_path = path;
        self
    }

    pub fn bridge_addr(&self) -> SocketAddr {
        self.bridge_addr
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn log(&self) -> bool {
        self.log
    }

    /// Load the user config. A missing or broken file yields the defaults.
    pub fn user_config(&self) -> UserConfig {
        match &self.user_config_path {
            Some(path) => UserConfig::load(path),
            None => UserConfig::default(),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

/// Home directory of the current user, if known.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Command line given either as an array or as a single whitespace separated string.
fn command_line<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Line(String),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::List(list) => list,
        Raw::Line(line) => line.split_whitespace().map(str::to_owned).collect(),
    }))
}

/// User override of the compile/run templates of one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandOverride {
    #[serde(default, deserialize_with = "command_line")]
    pub compile: Option<Vec<String>>,
    #[serde(default, deserialize_with = "command_line")]
    pub run: Option<Vec<String>>,
}

/// Content of `~/.atm_config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserConfig {
    /// Preferred language symbol.
    #[serde(default)]
    pub lang: Option<String>,
    /// Source template used by external scaffolding tools. Read but not used here.
    #[serde(default)]
    pub template_path: Option<String>,
    /// Per-language command overrides, keyed by symbol.
    #[serde(default)]
    pub test_commands: HashMap<String, CommandOverride>,
}

impl UserConfig {
    /// Read `path`. Missing file → defaults, broken file → defaults and a warning.
    pub fn load(path: &Path) -> UserConfig {
        if !path.is_file() {
            return UserConfig::default();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| Ok(serde_json::from_str(&content)?));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                warn!("failed to parse {}: {e}", path.display());
                eprintln!("Warning: failed to parse {} -> {e}", path.display());
                UserConfig::default()
            }
        }
    }

    /// Override for `symbol`, if any.
    pub fn command_override(&self, symbol: &str) -> Option<&CommandOverride> {
        self.test_commands.get(symbol)
    }
}

/// Judge section of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeMetadata {
    pub judge_type: String,
}

/// Contest section of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestMetadata {
    pub contest_id: String,
}

/// Problem section of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemMetadata {
    pub alphabet: String,
    pub contest: ContestMetadata,
    pub problem_id: String,
}

/// `metadata.json` written next to each downloaded task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub code_filename: String,
    pub judge: JudgeMetadata,
    pub lang: String,
    pub problem: ProblemMetadata,
    pub sample_in_pattern: String,
    pub sample_out_pattern: String,
    pub timeout_ms: u64,
}

impl TaskMetadata {
    pub fn new(contest_id: &str, label: &str, problem_id: &str, lang: &str, code_filename: &str) -> Self {
        TaskMetadata {
            code_filename: code_filename.to_owned(),
            judge: JudgeMetadata {
                judge_type: "normal".to_owned(),
            },
            lang: lang.to_owned(),
            problem: ProblemMetadata {
                alphabet: label.to_owned(),
                contest: ContestMetadata {
                    contest_id: contest_id.to_owned(),
                },
                problem_id: problem_id.to_owned(),
            },
            sample_in_pattern: "in_*.txt".to_owned(),
            sample_out_pattern: "out_*.txt".to_owned(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }

    /// Read `metadata.json` from `task_dir`. Missing or broken → `None`.
    pub fn load(task_dir: &Path) -> Option<TaskMetadata> {
        let path = task_dir.join(METADATA_FILE);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("ignoring {}: {e}", path.display());
                None
            }
        }
    }

    /// Write `metadata.json` into `task_dir` (pretty printed, trailing newline).
    pub fn save(&self, task_dir: &Path) -> Result<()> {
        let path = task_dir.join(METADATA_FILE);
        let mut content = serde_json::to_string_pretty(self)
            .map_err(|e| AtmError::Protocol(format!("could not encode metadata: {e}")))?;
        content.push('\n');
        std::fs::write(&path, content)
            .map_err(|e| AtmError::io(format!("could not write {}", path.display()), e))
    }
}
