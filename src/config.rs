//! config.rs
//!
//! Engine settings: defaults, then `<config_dir>/codejudge/config.toml`,
//! then `CODEJUDGE_*` environment variables. CLI flags are applied last by
//! the binary.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::screen::ScreenPolicy;

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_CONCURRENT: usize = 5;
pub const DEFAULT_PYTHON: &str = "python3";

const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_CONCURRENT_LIMIT: usize = 64;

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    sandbox: Option<SandboxSection>,
}

#[derive(Debug, Default, Deserialize)]
struct SandboxSection {
    timeout_secs: Option<u64>,
    max_concurrent: Option<usize>,
    python: Option<String>,
    reject_unparsable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Wall-clock limit per sandboxed process.
    pub timeout: Duration,
    /// Capacity of the shared concurrency budget.
    pub max_concurrent: usize,
    /// Interpreter used for every sandboxed run.
    pub python: String,
    pub reject_unparsable: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            python: DEFAULT_PYTHON.to_string(),
            reject_unparsable: false,
        }
    }
}

pub fn config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("codejudge");
    dir.push("config.toml");
    dir
}

impl EngineConfig {
    /// Default file location plus process environment.
    pub fn load() -> Result<Self, String> {
        Self::load_from(&config_path())
    }

    /// A missing file is fine; an unreadable or malformed one is not.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
            Self::from_toml_str(&raw).map_err(|e| format!("{}: {}", path.display(), e))?
        } else {
            Self::default()
        };

        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, String> {
        let file: FileConfig = toml::from_str(raw).map_err(|e| e.to_string())?;
        let section = file.sandbox.unwrap_or_default();

        let mut cfg = Self::default();
        if let Some(secs) = section.timeout_secs {
            cfg = cfg.with_timeout_secs(secs);
        }
        if let Some(n) = section.max_concurrent {
            cfg = cfg.with_max_concurrent(n);
        }
        if let Some(python) = section.python.filter(|p| !p.trim().is_empty()) {
            cfg.python = python;
        }
        if let Some(v) = section.reject_unparsable {
            cfg.reject_unparsable = v;
        }
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> Result<(), String> {
        self.apply_env_with(|key| env::var(key).ok())
    }

    /// Overrides from `get`, which maps a variable name to its value.
    pub fn apply_env_with<F>(&mut self, get: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("CODEJUDGE_TIMEOUT") {
            let secs: u64 = v
                .trim()
                .parse()
                .map_err(|_| format!("CODEJUDGE_TIMEOUT: expected seconds, got {:?}", v))?;
            *self = self.clone().with_timeout_secs(secs);
        }
        if let Some(v) = get("CODEJUDGE_MAX_CONCURRENT") {
            let n: usize = v
                .trim()
                .parse()
                .map_err(|_| format!("CODEJUDGE_MAX_CONCURRENT: expected a count, got {:?}", v))?;
            *self = self.clone().with_max_concurrent(n);
        }
        if let Some(v) = get("CODEJUDGE_PYTHON").filter(|v| !v.trim().is_empty()) {
            self.python = v.trim().to_string();
        }
        if let Some(v) = get("CODEJUDGE_REJECT_UNPARSABLE") {
            self.reject_unparsable = truthy(&v);
        }
        Ok(())
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.clamp(1, MAX_TIMEOUT_SECS));
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.clamp(1, MAX_CONCURRENT_LIMIT);
        self
    }

    pub fn screen_policy(&self) -> ScreenPolicy {
        ScreenPolicy {
            reject_unparsable: self.reject_unparsable,
        }
    }
}

fn truthy(val: &str) -> bool {
    let v = val.trim().to_ascii_lowercase();
    matches!(v.as_str(), "1" | "true" | "yes" | "on")
}
