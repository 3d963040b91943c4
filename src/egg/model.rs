//! Egg descriptor types
//!
//! An egg is a declarative template for a class of game server: which images
//! it can run under, how its startup command is built, which config files
//! need rewriting before boot, and what variables an operator may tune.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// A declarative server template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Egg {
    /// Stable identifier, also the filename stem in the eggs directory
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: String,

    /// Human label -> image reference, e.g. "Java 17" -> "ghcr.io/pyro/java:17"
    pub docker_images: HashMap<String, String>,

    /// Startup command template, expanded against the instance before exec
    pub startup: String,

    #[serde(default)]
    pub config: EggRuntimeConfig,

    #[serde(default)]
    pub scripts: EggScripts,

    #[serde(default)]
    pub variables: Vec<EggVariable>,
}

/// Runtime-facing config: files to rewrite, the online sentinel, and the stop command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EggRuntimeConfig {
    /// path relative to instance root -> file descriptor
    #[serde(default)]
    pub files: HashMap<String, EggConfigFile>,

    #[serde(default)]
    pub startup: EggStartupConfig,

    /// Console command (or `^`-prefixed signal marker, e.g. `^C`) sent before termination
    #[serde(default = "default_stop")]
    pub stop: String,
}

fn default_stop() -> String {
    "^C".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EggStartupConfig {
    /// Sentinel substring whose appearance in the log stream marks the server online
    #[serde(default)]
    pub done: String,
}

/// A single config file this egg wants rewritten at install/start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EggConfigFile {
    /// properties | file | yaml
    pub parser: String,

    /// key -> templated value (properties/yaml), or a single literal "content" key for `file`
    #[serde(default)]
    pub find: HashMap<String, String>,
}

/// One-shot installation script bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EggScripts {
    #[serde(default)]
    pub installation: Option<InstallationScriptDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationScriptDescriptor {
    /// Shell script body, written verbatim into the instance directory before running
    pub script: String,

    /// Image the installer container runs (may differ from the runtime image)
    pub container: String,

    /// Entrypoint executed inside the installer container
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
}

fn default_entrypoint() -> String {
    "bash".to_string()
}

/// A declared, operator-tunable variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EggVariable {
    pub name: String,

    /// Key used both as the container env var name and the `{{KEY}}` template placeholder
    pub env_variable: String,

    #[serde(default)]
    pub default_value: String,

    #[serde(default = "default_true")]
    pub user_viewable: bool,

    #[serde(default = "default_true")]
    pub user_editable: bool,

    /// Pipe-separated validation DSL, see `crate::egg::validate`
    #[serde(default)]
    pub rules: String,
}

fn default_true() -> bool {
    true
}

impl Egg {
    /// Basic structural validation enforced by the registry on `put`
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("egg id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("egg name must not be empty".to_string());
        }
        if self.docker_images.is_empty() {
            return Err("egg must declare at least one docker image".to_string());
        }
        Ok(())
    }
}
