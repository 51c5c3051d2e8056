use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Overlay file merged on top of the defaults, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Settings {
    /// Optional file that receives a copy of every log line.
    #[serde(default)]
    pub log_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct EngineConfig {
    /// Env var that must hold the path to the policy engine executable.
    #[serde(default)]
    pub binary_env_var: String,
    /// Per-document evaluation bound. Zero disables it.
    #[serde(default)]
    pub timeout_secs: u64,
    /// Passed to `opa eval` ahead of the query.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct PolicyConfig {
    /// Rule name whose boolean value decides compliance for a package.
    #[serde(default)]
    pub leaf: String,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    engine: EngineOverlay,
    #[serde(default)]
    policy: PolicyOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    log_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EngineOverlay {
    #[serde(default)]
    replace: bool,
    binary_env_var: Option<String>,
    timeout_secs: Option<u64>,
    #[serde(default)]
    extra_args: Vec<String>,
    #[serde(default)]
    remove_extra_args: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PolicyOverlay {
    leaf: Option<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

/// Validated settings the gate runs with. Built once at startup by [`Config::resolve`].
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Policy engine executable, after `~`/`$VAR` expansion.
    pub engine_path: PathBuf,
    /// `None` when the bound is disabled.
    pub timeout: Option<Duration>,
    pub extra_args: Vec<String>,
    pub leaf: String,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the overlay from `explicit`, or from ~/.config/opa-gate/config.toml
    ///    when no path is given and that file exists
    ///
    /// An explicit path that cannot be read, or any overlay that fails to parse,
    /// is a configuration error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, GateError> {
        let mut config = Self::default_config();
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::user_config_path().filter(|p| p.is_file()),
        };
        if let Some(path) = path {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                GateError::config(format!("cannot read config {}: {e}", path.display()))
            })?;
            let overlay: ConfigOverlay = toml::from_str(&content).map_err(|e| {
                GateError::config(format!("config parse error in {}: {e}", path.display()))
            })?;
            config.apply_overlay(overlay);
            config.source = Some(path);
        }
        Ok(config)
    }

    fn user_config_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".config/opa-gate/config.toml"))
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(v) = overlay.settings.log_file {
            self.settings.log_file = Some(v);
        }

        let e = overlay.engine;
        merge_list(
            &mut self.engine.extra_args,
            e.extra_args,
            &e.remove_extra_args,
            e.replace,
        );
        if let Some(v) = e.binary_env_var {
            self.engine.binary_env_var = v;
        }
        if let Some(v) = e.timeout_secs {
            self.engine.timeout_secs = v;
        }

        if let Some(v) = overlay.policy.leaf {
            self.policy.leaf = v;
        }
    }

    /// Validate the merged config against the environment.
    ///
    /// `env` looks up environment variables; the binary uses `std::env::var`.
    pub fn resolve(&self, env: impl Fn(&str) -> Option<String>) -> Result<GateConfig, GateError> {
        let var = self.engine.binary_env_var.trim();
        if var.is_empty() {
            return Err(GateError::config("engine.binary_env_var must not be empty"));
        }
        let raw = env(var)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                GateError::config(format!(
                    "{var} is not set; it must point to the policy engine executable"
                ))
            })?;
        let engine_path = expand_path(&raw, &env)?;

        let leaf = self.policy.leaf.trim();
        if leaf.is_empty() {
            return Err(GateError::config("policy.leaf must not be empty"));
        }

        let log_file = match &self.settings.log_file {
            Some(f) if !f.trim().is_empty() => Some(expand_path(f, &env)?),
            _ => None,
        };

        Ok(GateConfig {
            engine_path,
            timeout: (self.engine.timeout_secs > 0)
                .then(|| Duration::from_secs(self.engine.timeout_secs)),
            extra_args: self.engine.extra_args.clone(),
            leaf: leaf.to_string(),
            log_file,
        })
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

/// Expand `~` and `$VAR` using the supplied environment.
fn expand_path(raw: &str, env: &impl Fn(&str) -> Option<String>) -> Result<PathBuf, GateError> {
    let expanded = shellexpand::full_with_context(
        raw,
        || env("HOME"),
        |name| env(name).map(Some).ok_or(std::env::VarError::NotPresent),
    )
    .map_err(|e| GateError::config(format!("cannot expand {raw}: {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
